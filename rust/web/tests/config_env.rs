use gambit_web::config::{self, ConfigError, ValueSource, CONFIG_ENV};
use serial_test::serial;
use std::env;
use std::fs;
use tempfile::TempDir;

const VARS: [&str; 5] = [
    CONFIG_ENV,
    "GAMBIT_PORT",
    "GAMBIT_OPPONENT",
    "GAMBIT_HOLD_WINDOW_SECS",
    "GAMBIT_DB",
];

fn clear_env() {
    for var in VARS {
        env::remove_var(var);
    }
}

#[test]
#[serial]
fn defaults_without_file_or_env() {
    clear_env();
    let resolved = config::load_with_sources().unwrap();
    assert_eq!(resolved.config.port, 8080);
    assert_eq!(resolved.config.hold_window_secs, 30);
    assert!(resolved.sources.values().all(|s| *s == ValueSource::Default));
}

#[test]
#[serial]
fn env_overrides_file() {
    clear_env();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("gambit.toml");
    fs::write(&path, "port = 9000\nopponent = \"easy\"\nhold_window_secs = 45\n").unwrap();
    env::set_var(CONFIG_ENV, &path);
    env::set_var("GAMBIT_PORT", "9100");
    env::set_var("GAMBIT_DB", dir.path().join("x.db"));

    let resolved = config::load_with_sources().unwrap();
    clear_env();

    assert_eq!(resolved.config.port, 9100);
    assert_eq!(resolved.sources["port"], ValueSource::Env);
    assert_eq!(resolved.config.opponent, "easy");
    assert_eq!(resolved.sources["opponent"], ValueSource::File);
    assert_eq!(resolved.config.hold_window_secs, 45);
    assert_eq!(resolved.config.database_path, dir.path().join("x.db"));
    assert_eq!(resolved.sources["rerolls"], ValueSource::Default);
}

#[test]
#[serial]
fn unparsable_env_value_is_an_error() {
    clear_env();
    env::set_var("GAMBIT_HOLD_WINDOW_SECS", "soon");
    let err = config::load().unwrap_err();
    clear_env();
    assert!(matches!(err, ConfigError::Invalid(msg) if msg.contains("GAMBIT_HOLD_WINDOW_SECS")));
}

#[test]
#[serial]
fn unknown_opponent_fails_validation() {
    clear_env();
    env::set_var("GAMBIT_OPPONENT", "grandmaster");
    let result = config::load();
    clear_env();
    assert!(matches!(result, Err(ConfigError::Invalid(_))));
}

#[test]
#[serial]
fn missing_config_file_is_an_io_error() {
    clear_env();
    env::set_var(CONFIG_ENV, "/definitely/not/here/gambit.toml");
    let result = config::load();
    clear_env();
    assert!(matches!(result, Err(ConfigError::Io(_))));
}
