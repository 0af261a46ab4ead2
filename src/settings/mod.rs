pub(crate) mod config;

pub use self::config::{load, TriageConfig};

use std::path::PathBuf;

/// Environment variable naming an alternative config file
const CONFIG_PATH_VAR: &str = "TRIAGE_CONFIG";

pub fn config_path() -> Option<PathBuf> {
    std::env::var_os(CONFIG_PATH_VAR).map(PathBuf::from)
}

impl TriageConfig {
    pub fn log_level(&self) -> tracing::Level {
        match self.log.level.parse() {
            Ok(level) => level,
            Err(_) => {
                eprintln!("Unknown log.level `{}`, using warn", self.log.level);
                tracing::Level::WARN
            }
        }
    }
}
