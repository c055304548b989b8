//! Log setup for the server and CLI, and log capture for tests.
//!
//! Production output goes to stderr, as human-readable lines or as one JSON
//! object per event when `GAMBIT_LOG_FORMAT=json`. Filtering follows
//! `RUST_LOG`, falling back to [`DEFAULT_FILTER`].

use std::fmt::Debug;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::field::{Field, Visit};
use tracing::subscriber::DefaultGuard;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, Layer, Registry};

pub const DEFAULT_FILTER: &str = "info,gambit_web=debug";
pub const LOG_FORMAT_ENV: &str = "GAMBIT_LOG_FORMAT";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    /// `json` (any case) selects JSON; anything else, or unset, is text.
    pub fn from_env() -> Self {
        match std::env::var(LOG_FORMAT_ENV) {
            Ok(v) if v.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Text,
        }
    }
}

/// Installs the global subscriber. Fails if one is already installed.
pub fn init_logging() -> Result<(), tracing::subscriber::SetGlobalDefaultError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(true);

    match LogFormat::from_env() {
        LogFormat::Json => tracing::subscriber::set_global_default(
            builder.json().with_current_span(false).finish(),
        ),
        LogFormat::Text => tracing::subscriber::set_global_default(
            builder.with_file(true).with_line_number(true).finish(),
        ),
    }
}

/// One captured event.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub level: Level,
    pub target: String,
    pub message: String,
    pub fields: Vec<(String, String)>,
}

impl LogEntry {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Shared buffer of captured events. Clones see the same entries.
#[derive(Debug, Clone, Default)]
pub struct TestLogSubscriber {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl TestLogSubscriber {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.lock().clone()
    }

    /// Entries at `level` carrying a field `name` whose value contains `value`.
    pub fn with_field(&self, level: Level, name: &str, value: &str) -> Vec<LogEntry> {
        self.lock()
            .iter()
            .filter(|e| e.level == level && e.field(name).is_some_and(|v| v.contains(value)))
            .cloned()
            .collect()
    }

    pub fn messages(&self, level: Level) -> Vec<String> {
        self.lock()
            .iter()
            .filter(|e| e.level == level)
            .map(|e| e.message.clone())
            .collect()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, Vec<LogEntry>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn into_layer<S>(self) -> TestLayer<S>
    where
        S: Subscriber + for<'a> LookupSpan<'a>,
    {
        TestLayer {
            sink: self,
            _subscriber: PhantomData,
        }
    }
}

/// Captures every event on the current thread until the guard drops.
pub fn init_test_logging() -> (TestLogSubscriber, DefaultGuard) {
    let logs = TestLogSubscriber::new();
    let registry = Registry::default().with(logs.clone().into_layer::<Registry>());
    let guard = tracing::subscriber::set_default(registry);
    (logs, guard)
}

pub struct TestLayer<S> {
    sink: TestLogSubscriber,
    _subscriber: PhantomData<S>,
}

impl<S> Layer<S> for TestLayer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut fields = EventFields::default();
        event.record(&mut fields);
        let metadata = event.metadata();
        self.sink.lock().push(LogEntry {
            level: *metadata.level(),
            target: metadata.target().to_string(),
            message: fields.message,
            fields: fields.values,
        });
    }
}

#[derive(Default)]
struct EventFields {
    message: String,
    values: Vec<(String, String)>,
}

impl EventFields {
    fn push(&mut self, field: &Field, value: String) {
        match field.name() {
            "message" => self.message = value,
            name => self.values.push((name.to_string(), value)),
        }
    }
}

impl Visit for EventFields {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.push(field, value.to_string());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.push(field, value.to_string());
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.push(field, value.to_string());
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.push(field, value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn Debug) {
        self.push(field, format!("{:?}", value));
    }
}
