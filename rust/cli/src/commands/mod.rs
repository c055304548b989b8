//! Command handlers, one module per subcommand.
//!
//! Each handler takes its parsed arguments plus the output streams
//! (`&mut dyn Write`) and returns `Result<(), CliError>`.

mod cfg;
mod deal;
mod eval;
mod sim;
mod sweep;

pub use cfg::handle_cfg_command;
pub use deal::handle_deal_command;
pub use eval::handle_eval_command;
pub use sim::{handle_sim_command, SimOptions};
pub use sweep::handle_sweep_command;
