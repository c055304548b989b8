//! Configuration command handler.
//!
//! Prints every configuration key with its resolved value and where it came
//! from (`default`, `file` or `env`):
//!
//! ```json
//! {
//!   "hold_window_secs": {
//!     "value": 30,
//!     "source": "default"
//!   },
//!   ...
//! }
//! ```

use crate::error::CliError;
use gambit_web::config::{self, ConfigResolved};
use serde_json::{Map, Value};
use std::io::Write;

pub fn handle_cfg_command(out: &mut dyn Write) -> Result<(), CliError> {
    let resolved = config::load_with_sources()?;
    let display = render(&resolved)?;
    let text = serde_json::to_string_pretty(&display)
        .map_err(|e| CliError::Config(format!("failed to render configuration: {}", e)))?;
    writeln!(out, "{}", text)?;
    Ok(())
}

fn render(resolved: &ConfigResolved) -> Result<Value, CliError> {
    let values = serde_json::to_value(&resolved.config)
        .map_err(|e| CliError::Config(format!("failed to render configuration: {}", e)))?;
    let mut display = Map::new();
    for (key, source) in &resolved.sources {
        let value = values.get(*key).cloned().unwrap_or(Value::Null);
        display.insert(
            (*key).to_string(),
            serde_json::json!({ "value": value, "source": source }),
        );
    }
    Ok(Value::Object(display))
}
