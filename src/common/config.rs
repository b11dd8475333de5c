//! Configuration for minidht components
//!
//! Values are layered: built-in defaults, then an optional TOML file, then
//! `MINIDHT__SECTION__FIELD` environment variables.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Global configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Responsibility ledger settings
    #[serde(default)]
    pub ledger: LedgerConfig,

    /// In-process overlay simulation settings
    #[serde(default)]
    pub simulation: SimulationConfig,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ledger: LedgerConfig::default(),
            simulation: SimulationConfig::default(),
            log_level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from `path` (or `./minidht.toml` if present) and the environment
    pub fn load(path: Option<&Path>) -> crate::Result<Self> {
        let mut builder = config::Config::builder();
        builder = match path {
            Some(path) => builder.add_source(config::File::from(path).required(true)),
            None => builder.add_source(config::File::with_name("minidht").required(false)),
        };
        let config: Config = builder
            .add_source(config::Environment::with_prefix("MINIDHT").separator("__"))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> crate::Result<()> {
        self.ledger.validate()?;
        self.simulation.validate()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerBackend {
    Memory,
    RocksDb,
}

/// Responsibility ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    #[serde(default = "default_backend")]
    pub backend: LedgerBackend,

    /// RocksDB directory (rocksdb backend only)
    #[serde(default = "default_ledger_path")]
    pub path: PathBuf,

    /// Number of lock stripes guarding per-key updates (rocksdb backend)
    #[serde(default = "default_stripes")]
    pub stripes: usize,
}

fn default_backend() -> LedgerBackend {
    LedgerBackend::Memory
}
fn default_ledger_path() -> PathBuf {
    PathBuf::from("./ledger-data")
}
fn default_stripes() -> usize {
    64
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            path: default_ledger_path(),
            stripes: default_stripes(),
        }
    }
}

impl LedgerConfig {
    pub fn validate(&self) -> crate::Result<()> {
        if self.stripes == 0 {
            return Err(crate::Error::InvalidConfig(
                "ledger.stripes must be at least 1".into(),
            ));
        }
        if self.backend == LedgerBackend::RocksDb && self.path.as_os_str().is_empty() {
            return Err(crate::Error::InvalidConfig(
                "ledger.path is required for the rocksdb backend".into(),
            ));
        }
        Ok(())
    }
}

/// Overlay simulation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Initial number of peers
    #[serde(default = "default_peers")]
    pub peers: usize,

    /// Number of content keys tracked
    #[serde(default = "default_keys")]
    pub keys: usize,

    /// Membership changes (joins and departures) applied
    #[serde(default = "default_churn_rounds")]
    pub churn_rounds: usize,

    /// Run a request-handling sweep every N membership changes (0 = only at the end)
    #[serde(default = "default_sweep_every")]
    pub sweep_every: usize,

    /// RNG seed, for reproducible runs
    #[serde(default)]
    pub seed: u64,
}

fn default_peers() -> usize {
    16
}
fn default_keys() -> usize {
    256
}
fn default_churn_rounds() -> usize {
    32
}
fn default_sweep_every() -> usize {
    8
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            peers: default_peers(),
            keys: default_keys(),
            churn_rounds: default_churn_rounds(),
            sweep_every: default_sweep_every(),
            seed: 0,
        }
    }
}

impl SimulationConfig {
    pub fn validate(&self) -> crate::Result<()> {
        if self.peers == 0 {
            return Err(crate::Error::InvalidConfig(
                "simulation.peers must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
