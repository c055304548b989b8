//! Sweep command: run the timeout enforcer once against the shared store.
//!
//! Takes the same job locks and cooldowns as the server's background loop,
//! so running it next to live servers never resolves a round twice.

use crate::error::CliError;
use chrono::Utc;
use gambit_web::config;
use gambit_web::{CombatService, EnforcerConfig, EventBus, SqliteStore, TimeoutEnforcer};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

pub fn handle_sweep_command(db: Option<PathBuf>, out: &mut dyn Write) -> Result<(), CliError> {
    let mut cfg = config::load()?;
    if let Some(path) = db {
        cfg.database_path = path;
    }
    // Already initialised when embedded in another process
    let _ = gambit_web::init_logging();

    let store = Arc::new(SqliteStore::open(&cfg.database_path)?);
    let combat = Arc::new(CombatService::new(
        store,
        EventBus::new(),
        cfg.round_config(),
        cfg.opponent.clone(),
    ));
    let enforcer = TimeoutEnforcer::new(combat, EnforcerConfig::from(&cfg));

    let now = Utc::now();
    let timeout = enforcer.run_timeout_sweep(now)?;
    let warning = enforcer.run_warning_sweep(now)?;

    let report = serde_json::json!({
        "instance_id": enforcer.instance_id(),
        "database_path": cfg.database_path,
        "timeout": timeout,
        "warning": warning,
    });
    let text = serde_json::to_string_pretty(&report)
        .map_err(|e| CliError::Engine(format!("failed to render sweep report: {}", e)))?;
    writeln!(out, "{}", text)?;
    Ok(())
}
