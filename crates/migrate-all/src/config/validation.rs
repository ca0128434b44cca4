//! Configuration validation.

use super::{Config, TargetConfig};
use crate::error::{MigrateError, Result};

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    // Source validation
    if config.source.host.is_empty() {
        return Err(MigrateError::Config("MSSQL_HOST is required".into()));
    }
    if config.source.database.is_empty() {
        return Err(MigrateError::Config("MSSQL_DATABASE is required".into()));
    }
    if config.source.user.is_empty() {
        return Err(MigrateError::Config("MSSQL_USER is required".into()));
    }

    if config.migration.batch_size == 0 {
        return Err(MigrateError::Config("BATCH_SIZE must be at least 1".into()));
    }
    if config.migration.max_connections == 0 {
        return Err(MigrateError::Config(
            "MAX_CONNECTIONS must be at least 1".into(),
        ));
    }

    if let Some(schema) = &config.target.schema {
        crate::identifier::validate_identifier(schema)
            .map_err(|e| MigrateError::Config(format!("PG_SCHEMA: {}", e)))?;
    }

    Ok(())
}

/// Validate the target connection settings.
pub fn validate_target(target: &TargetConfig) -> Result<()> {
    if target.host.is_empty() {
        return Err(MigrateError::Config("PG_HOST is required".into()));
    }
    if target.database.is_empty() {
        return Err(MigrateError::Config("PG_DATABASE is required".into()));
    }
    if target.user.is_empty() {
        return Err(MigrateError::Config("PG_USER is required".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MigrationConfig, SourceConfig};

    fn valid_config() -> Config {
        Config {
            source: SourceConfig {
                host: "localhost".to_string(),
                port: 1433,
                database: "source_db".to_string(),
                user: "sa".to_string(),
                password: "password".to_string(),
                encrypt: "false".to_string(),
                trust_server_cert: true,
            },
            target: TargetConfig {
                host: "localhost".to_string(),
                port: 5432,
                database: "target_db".to_string(),
                user: "postgres".to_string(),
                password: "password".to_string(),
                schema: None,
            },
            migration: MigrationConfig::default(),
        }
    }

    #[test]
    fn test_valid_config() {
        let config = valid_config();
        assert!(validate(&config).is_ok());
        assert!(validate_target(&config.target).is_ok());
    }

    #[test]
    fn test_missing_source_host() {
        let mut config = valid_config();
        config.source.host = "".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_missing_target_database_only_fails_target_validation() {
        let mut config = valid_config();
        config.target.database = "".to_string();
        assert!(validate(&config).is_ok());
        assert!(validate_target(&config.target).is_err());
    }

    #[test]
    fn test_zero_batch_size() {
        let mut config = valid_config();
        config.migration.batch_size = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_source_config_debug_redacts_password() {
        let mut config = valid_config();
        config.source.password = "super_secret_password_123".to_string();
        let debug_output = format!("{:?}", config.source);
        assert!(
            debug_output.contains("[REDACTED]"),
            "Debug output should contain [REDACTED]"
        );
        assert!(
            !debug_output.contains("super_secret_password_123"),
            "Debug output should not contain actual password value"
        );
    }

    #[test]
    fn test_target_config_debug_redacts_password() {
        let mut config = valid_config();
        config.target.password = "super_secret_password_456".to_string();
        let debug_output = format!("{:?}", config.target);
        assert!(
            debug_output.contains("[REDACTED]"),
            "Debug output should contain [REDACTED]"
        );
        assert!(
            !debug_output.contains("super_secret_password_456"),
            "Debug output should not contain actual password value"
        );
    }
}
