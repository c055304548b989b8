use gambit_ai::Difficulty;
use gambit_engine::round::RoundConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub const CONFIG_ENV: &str = "GAMBIT_CONFIG";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GambitConfig {
    pub database_path: PathBuf,
    pub host: String,
    pub port: u16,
    pub hold_window_secs: u32,
    pub rerolls: u32,
    pub peeks: u32,
    pub base_damage: u32,
    pub bonus_multiplier: f64,
    /// Default opponent supplier for new encounters
    pub opponent: String,
    pub sweep_interval_ms: u64,
    pub warning_interval_ms: u64,
    pub warning_lead_secs: u32,
    pub sweep_batch_size: usize,
    pub lock_ttl_secs: u64,
}

impl Default for GambitConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("gambit.db"),
            host: "127.0.0.1".into(),
            port: 8080,
            hold_window_secs: 30,
            rerolls: 1,
            peeks: 1,
            base_damage: 10,
            bonus_multiplier: 1.0,
            opponent: "normal".into(),
            sweep_interval_ms: 5_000,
            warning_interval_ms: 1_000,
            warning_lead_secs: 10,
            sweep_batch_size: 50,
            lock_ttl_secs: 30,
        }
    }
}

impl GambitConfig {
    /// Round tuning for new encounters. The opponent hits as hard as the player's base.
    pub fn round_config(&self) -> RoundConfig {
        RoundConfig {
            hold_window_secs: self.hold_window_secs,
            rerolls: self.rerolls,
            peeks: self.peeks,
            base_damage: self.base_damage,
            bonus_multiplier: self.bonus_multiplier,
            opponent_base_damage: self.base_damage,
        }
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    pub fn warning_interval(&self) -> Duration {
        Duration::from_millis(self.warning_interval_ms)
    }

    pub fn lock_ttl(&self) -> Duration {
        Duration::from_secs(self.lock_ttl_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.hold_window_secs == 0 {
            return Err(invalid("hold_window_secs must be >0"));
        }
        if self.sweep_interval_ms == 0 || self.warning_interval_ms == 0 {
            return Err(invalid("sweep intervals must be >0"));
        }
        if self.warning_lead_secs == 0 {
            return Err(invalid("warning_lead_secs must be >0"));
        }
        if self.sweep_batch_size == 0 {
            return Err(invalid("sweep_batch_size must be >0"));
        }
        if self.lock_ttl_secs < 1 {
            return Err(invalid("lock_ttl_secs must be at least 1"));
        }
        if !self.bonus_multiplier.is_finite() || self.bonus_multiplier < 0.0 {
            return Err(invalid("bonus_multiplier must be a finite number >=0"));
        }
        Difficulty::from_str(&self.opponent).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueSource {
    Default,
    File,
    Env,
}

/// The resolved configuration and where each value came from.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigResolved {
    pub config: GambitConfig,
    pub sources: BTreeMap<&'static str, ValueSource>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

fn invalid(msg: &str) -> ConfigError {
    ConfigError::Invalid(msg.to_string())
}

pub fn load() -> Result<GambitConfig, ConfigError> {
    load_with_sources().map(|resolved| resolved.config)
}

/// Defaults, then the TOML file named by `GAMBIT_CONFIG`, then `GAMBIT_*` variables.
pub fn load_with_sources() -> Result<ConfigResolved, ConfigError> {
    let mut resolved = ConfigResolved {
        config: GambitConfig::default(),
        sources: KEYS.iter().map(|k| (*k, ValueSource::Default)).collect(),
    };

    if let Ok(path) = std::env::var(CONFIG_ENV) {
        if !path.is_empty() {
            let text = fs::read_to_string(&path)?;
            let file: FileConfig = toml::from_str(&text)?;
            file.apply(&mut resolved);
        }
    }

    let cfg = &mut resolved.config;
    let src = &mut resolved.sources;
    env_override("database_path", "GAMBIT_DB", &mut cfg.database_path, src)?;
    env_override("host", "GAMBIT_HOST", &mut cfg.host, src)?;
    env_override("port", "GAMBIT_PORT", &mut cfg.port, src)?;
    env_override("hold_window_secs", "GAMBIT_HOLD_WINDOW_SECS", &mut cfg.hold_window_secs, src)?;
    env_override("rerolls", "GAMBIT_REROLLS", &mut cfg.rerolls, src)?;
    env_override("peeks", "GAMBIT_PEEKS", &mut cfg.peeks, src)?;
    env_override("base_damage", "GAMBIT_BASE_DAMAGE", &mut cfg.base_damage, src)?;
    env_override("bonus_multiplier", "GAMBIT_BONUS_MULTIPLIER", &mut cfg.bonus_multiplier, src)?;
    env_override("opponent", "GAMBIT_OPPONENT", &mut cfg.opponent, src)?;
    env_override("sweep_interval_ms", "GAMBIT_SWEEP_INTERVAL_MS", &mut cfg.sweep_interval_ms, src)?;
    env_override("warning_interval_ms", "GAMBIT_WARNING_INTERVAL_MS", &mut cfg.warning_interval_ms, src)?;
    env_override("warning_lead_secs", "GAMBIT_WARNING_LEAD_SECS", &mut cfg.warning_lead_secs, src)?;
    env_override("sweep_batch_size", "GAMBIT_SWEEP_BATCH_SIZE", &mut cfg.sweep_batch_size, src)?;
    env_override("lock_ttl_secs", "GAMBIT_LOCK_TTL_SECS", &mut cfg.lock_ttl_secs, src)?;

    resolved.config.validate()?;
    Ok(resolved)
}

const KEYS: [&str; 14] = [
    "database_path",
    "host",
    "port",
    "hold_window_secs",
    "rerolls",
    "peeks",
    "base_damage",
    "bonus_multiplier",
    "opponent",
    "sweep_interval_ms",
    "warning_interval_ms",
    "warning_lead_secs",
    "sweep_batch_size",
    "lock_ttl_secs",
];

fn env_override<T: FromStr>(
    key: &'static str,
    var: &str,
    slot: &mut T,
    sources: &mut BTreeMap<&'static str, ValueSource>,
) -> Result<(), ConfigError> {
    let Ok(raw) = std::env::var(var) else {
        return Ok(());
    };
    if raw.is_empty() {
        return Ok(());
    }
    *slot = raw
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid(format!("{var}: cannot parse `{raw}` for {key}")))?;
    sources.insert(key, ValueSource::Env);
    Ok(())
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    database_path: Option<PathBuf>,
    host: Option<String>,
    port: Option<u16>,
    hold_window_secs: Option<u32>,
    rerolls: Option<u32>,
    peeks: Option<u32>,
    base_damage: Option<u32>,
    bonus_multiplier: Option<f64>,
    opponent: Option<String>,
    sweep_interval_ms: Option<u64>,
    warning_interval_ms: Option<u64>,
    warning_lead_secs: Option<u32>,
    sweep_batch_size: Option<usize>,
    lock_ttl_secs: Option<u64>,
}

impl FileConfig {
    fn apply(self, resolved: &mut ConfigResolved) {
        fn set<T>(key: &'static str, value: Option<T>, slot: &mut T, r: &mut BTreeMap<&'static str, ValueSource>) {
            if let Some(v) = value {
                *slot = v;
                r.insert(key, ValueSource::File);
            }
        }
        let cfg = &mut resolved.config;
        let src = &mut resolved.sources;
        set("database_path", self.database_path, &mut cfg.database_path, src);
        set("host", self.host, &mut cfg.host, src);
        set("port", self.port, &mut cfg.port, src);
        set("hold_window_secs", self.hold_window_secs, &mut cfg.hold_window_secs, src);
        set("rerolls", self.rerolls, &mut cfg.rerolls, src);
        set("peeks", self.peeks, &mut cfg.peeks, src);
        set("base_damage", self.base_damage, &mut cfg.base_damage, src);
        set("bonus_multiplier", self.bonus_multiplier, &mut cfg.bonus_multiplier, src);
        set("opponent", self.opponent, &mut cfg.opponent, src);
        set("sweep_interval_ms", self.sweep_interval_ms, &mut cfg.sweep_interval_ms, src);
        set("warning_interval_ms", self.warning_interval_ms, &mut cfg.warning_interval_ms, src);
        set("warning_lead_secs", self.warning_lead_secs, &mut cfg.warning_lead_secs, src);
        set("sweep_batch_size", self.sweep_batch_size, &mut cfg.sweep_batch_size, src);
        set("lock_ttl_secs", self.lock_ttl_secs, &mut cfg.lock_ttl_secs, src);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = GambitConfig::default();
        cfg.validate().unwrap();
        let round = cfg.round_config();
        assert_eq!(round, RoundConfig::default());
    }

    #[test]
    fn validation_rejects_bad_values() {
        let bad = [
            GambitConfig {
                hold_window_secs: 0,
                ..GambitConfig::default()
            },
            GambitConfig {
                sweep_batch_size: 0,
                ..GambitConfig::default()
            },
            GambitConfig {
                lock_ttl_secs: 0,
                ..GambitConfig::default()
            },
            GambitConfig {
                bonus_multiplier: -0.5,
                ..GambitConfig::default()
            },
            GambitConfig {
                bonus_multiplier: f64::NAN,
                ..GambitConfig::default()
            },
            GambitConfig {
                opponent: "grandmaster".into(),
                ..GambitConfig::default()
            },
        ];
        for cfg in bad {
            assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))), "{cfg:?}");
        }
    }

    #[test]
    fn file_values_are_tracked() {
        let file: FileConfig = toml::from_str("port = 9000\nopponent = \"hard\"").unwrap();
        let mut resolved = ConfigResolved {
            config: GambitConfig::default(),
            sources: KEYS.iter().map(|k| (*k, ValueSource::Default)).collect(),
        };
        file.apply(&mut resolved);
        assert_eq!(resolved.config.port, 9000);
        assert_eq!(resolved.config.opponent, "hard");
        assert_eq!(resolved.sources["port"], ValueSource::File);
        assert_eq!(resolved.sources["host"], ValueSource::Default);
    }

    #[test]
    fn unknown_file_keys_are_rejected() {
        assert!(toml::from_str::<FileConfig>("prot = 1").is_err());
    }
}
