use std::path::Path;

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::config::Config;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid log rotation: {0}. Must be one of: daily, hourly, never")]
    InvalidLogRotation(String),

    #[error("Database path cannot be empty")]
    EmptyDatabasePath,

    #[error("Invalid max_connections: {0}. Must be at least 1")]
    InvalidMaxConnections(u32),

    #[error("Invalid max_walk_nodes: {0}. Must be at least 1")]
    InvalidMaxWalkNodes(usize),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .trellis/config.yaml (project config)
    /// 3. .trellis/local.yaml (local overrides, optional)
    /// 4. Environment variables (TRELLIS_* prefix, `__` separates nested keys)
    pub fn load() -> Result<Config> {
        Self::load_from_dir(".")
    }

    /// Same as [`ConfigLoader::load`], resolving `.trellis/` under `root`.
    pub fn load_from_dir(root: impl AsRef<Path>) -> Result<Config> {
        let dir = root.as_ref().join(".trellis");
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(dir.join("config.yaml")))
            .merge(Yaml::file(dir.join("local.yaml")))
            .merge(Env::prefixed("TRELLIS_").split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.database.path.is_empty() {
            return Err(ConfigError::EmptyDatabasePath);
        }

        if config.database.max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections(
                config.database.max_connections,
            ));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&config.logging.rotation.as_str()) {
            return Err(ConfigError::InvalidLogRotation(
                config.logging.rotation.clone(),
            ));
        }

        if config.engine.max_walk_nodes == 0 {
            return Err(ConfigError::InvalidMaxWalkNodes(config.engine.max_walk_nodes));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.database.path, ".trellis/trellis.db");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.engine.max_walk_nodes, 100_000);
        assert!(config.engine.require_reviewed_task_checklists);
        ConfigLoader::validate(&config).expect("Default config should be valid");
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml = r"
database:
  path: /custom/path.db
  max_connections: 3
logging:
  level: debug
  format: json
  rotation: hourly
engine:
  max_walk_nodes: 500
  require_reviewed_task_checklists: false
";

        let config: Config = serde_yaml::from_str(yaml).expect("YAML should parse");

        assert_eq!(config.database.path, "/custom/path.db");
        assert_eq!(config.database.max_connections, 3);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.rotation, "hourly");
        assert_eq!(config.engine.max_walk_nodes, 500);
        assert!(!config.engine.require_reviewed_task_checklists);

        ConfigLoader::validate(&config).expect("Parsed config should be valid");
    }

    #[test]
    fn test_validate_invalid_log_level() {
        let mut config = Config::default();
        config.logging.level = "invalid".to_string();

        match ConfigLoader::validate(&config).unwrap_err() {
            ConfigError::InvalidLogLevel(level) => assert_eq!(level, "invalid"),
            other => panic!("Expected InvalidLogLevel error, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_invalid_log_format() {
        let mut config = Config::default();
        config.logging.format = "xml".to_string();

        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::InvalidLogFormat(_)
        ));
    }

    #[test]
    fn test_validate_invalid_rotation() {
        let mut config = Config::default();
        config.logging.rotation = "weekly".to_string();

        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::InvalidLogRotation(_)
        ));
    }

    #[test]
    fn test_validate_empty_database_path() {
        let mut config = Config::default();
        config.database.path = String::new();

        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::EmptyDatabasePath
        ));
    }

    #[test]
    fn test_validate_zero_max_connections() {
        let mut config = Config::default();
        config.database.max_connections = 0;

        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::InvalidMaxConnections(0)
        ));
    }

    #[test]
    fn test_validate_zero_walk_nodes() {
        let mut config = Config::default();
        config.engine.max_walk_nodes = 0;

        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::InvalidMaxWalkNodes(0)
        ));
    }

    #[test]
    fn test_load_from_file_rejects_invalid() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "engine:\n  max_walk_nodes: 0").unwrap();
        file.flush().unwrap();

        assert!(ConfigLoader::load_from_file(file.path()).is_err());
    }

    #[test]
    fn test_hierarchical_merging_with_env() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join(".trellis");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("config.yaml"),
            "database:\n  path: project.db\nlogging:\n  level: info\n  format: json\n",
        )
        .unwrap();
        std::fs::write(dir.join("local.yaml"), "logging:\n  level: warn\n").unwrap();

        temp_env::with_vars(
            [
                ("TRELLIS_LOGGING__LEVEL", Some("debug")),
                ("TRELLIS_ENGINE__MAX_WALK_NODES", Some("42")),
            ],
            || {
                let config = ConfigLoader::load_from_dir(root.path()).unwrap();
                assert_eq!(config.database.path, "project.db", "Project file applies");
                assert_eq!(config.logging.format, "json", "Base value persists");
                assert_eq!(config.logging.level, "debug", "Environment wins");
                assert_eq!(config.engine.max_walk_nodes, 42);
            },
        );

        temp_env::with_var_unset("TRELLIS_LOGGING__LEVEL", || {
            let config = ConfigLoader::load_from_dir(root.path()).unwrap();
            assert_eq!(config.logging.level, "warn", "Local overrides project");
        });
    }
}
