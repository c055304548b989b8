//! HTTP service for timed combat rounds and wagering tables.
//!
//! Every instance shares one SQLite store; round and table writes are
//! compare-and-swap on a version, and the [`TimeoutEnforcer`] sweeps run
//! under advisory locks so only one instance works a job at a time.

pub mod config;
pub mod enforcer;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod logging;
pub mod metrics;
pub mod middleware;
pub mod server;
pub mod services;
pub mod store;
pub mod views;

pub use config::{ConfigError, ConfigResolved, GambitConfig, ValueSource};
pub use enforcer::{EnforcerConfig, EnforcerError, SweepOutcome, SweepReport, TimeoutEnforcer};
pub use errors::{ErrorResponse, ErrorSeverity, IntoErrorResponse};
pub use events::{ChannelId, EventBus, EventSubscription, Notification};
pub use logging::{LogEntry, LogFormat, TestLogSubscriber, init_logging, init_test_logging};
pub use metrics::{EnforcerMetrics, EnforcerSnapshot};
pub use server::{AppContext, ServerError, ServerHandle, WebServer};
pub use services::{
    CombatService, EncounterSummary, RoundAction, ServiceError, StartEncounter, TableService,
};
pub use store::{SqliteStore, StoreError, StoredRound, StoredTable};
pub use views::{RoundView, TableView};
