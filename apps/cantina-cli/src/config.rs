//! # CLI Settings
//!
//! Loaded once at startup and read-only afterwards.
//!
//! ## Sources (later wins)
//! 1. Defaults (this file)
//! 2. `cantina.toml` in the working directory, or the file given with `--config`
//! 3. Environment variables `CANTINA_*` (`CANTINA_DATABASE_PATH`,
//!    `CANTINA_STATION_CODE`, `CANTINA_OPERATOR`, ...)
//! 4. Command line flags (`--db`, `--station`, `--operator`)

use std::path::PathBuf;
use std::time::Duration;

use cantina_db::DbConfig;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_FILE: &str = "cantina.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// SQLite database file.
    pub database_path: String,

    pub max_connections: u32,

    /// How long a register waits for a locked database, in seconds.
    pub busy_timeout_secs: u64,

    /// Register used by `sell` when `--station` is not given.
    pub station_code: String,

    /// Operator id or username acting for this terminal.
    pub operator: Option<String>,

    /// Shown on sale receipts.
    pub store_name: String,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            database_path: "cantina.db".to_string(),
            max_connections: 5,
            busy_timeout_secs: 5,
            station_code: "CAJA-1".to_string(),
            operator: None,
            store_name: "Cantina Escolar".to_string(),
        }
    }
}

impl Settings {
    /// Layers defaults, the optional file and `CANTINA_*` variables.
    ///
    /// A missing default file is fine; an explicit `path` must exist.
    pub fn load(path: Option<&PathBuf>) -> Result<Self, ConfigError> {
        let defaults = Settings::default();

        let mut builder = Config::builder()
            .set_default("database_path", defaults.database_path)?
            .set_default("max_connections", i64::from(defaults.max_connections))?
            .set_default("busy_timeout_secs", defaults.busy_timeout_secs as i64)?
            .set_default("station_code", defaults.station_code)?
            .set_default("store_name", defaults.store_name)?;

        builder = match path {
            Some(path) => builder.add_source(File::from(path.as_path()).required(true)),
            None => builder.add_source(File::with_name(DEFAULT_CONFIG_FILE).required(false)),
        };

        builder
            .add_source(Environment::with_prefix("CANTINA"))
            .build()?
            .try_deserialize()
    }

    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(&self.database_path)
            .max_connections(self.max_connections)
            .busy_timeout(Duration::from_secs(self.busy_timeout_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "database_path = \"/tmp/otra.db\"\nstation_code = \"CAJA-2\"").unwrap();

        let settings = Settings::load(Some(&file.path().to_path_buf())).unwrap();
        assert_eq!(settings.database_path, "/tmp/otra.db");
        assert_eq!(settings.station_code, "CAJA-2");
        assert_eq!(settings.max_connections, 5);
        assert!(settings.operator.is_none());
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let missing = PathBuf::from("/definitely/not/here/cantina.toml");
        assert!(Settings::load(Some(&missing)).is_err());
    }
}
