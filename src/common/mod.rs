//! Common utilities and types shared across minidht

pub mod config;
pub mod error;
pub mod hash;
pub mod utils;

pub use self::config::{Config, LedgerBackend, LedgerConfig, SimulationConfig};
pub use error::{Error, Result};
pub use hash::{distance_cmp, Number160, ID_LEN};
pub use utils::{pluralize, timestamp_now_millis};
