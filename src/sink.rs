//! Direct execution of the generated script against PostgreSQL.
//!
//! Execution is best-effort: missing configuration and a missing driver are
//! informational skips, and a failed batch is logged and reported without
//! ever taking the pipeline down.  The script file on disk stays the durable
//! fallback artifact in all of those cases.

use log::{error, info};

/// Connection settings resolved from `DB_*` environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    pub name: String,
    pub user: String,
    pub password: String,
}

impl DbConfig {
    /// Resolve from the process environment.  `None` when any required
    /// setting is absent; `DB_PORT` defaults to 5432.
    pub fn from_env() -> Option<DbConfig> {
        DbConfig::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(get: F) -> Option<DbConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = get("DB_PORT")
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(5432);
        Some(DbConfig {
            host: get("DB_HOST")?,
            port,
            name: get("DB_NAME")?,
            user: get("DB_USER")?,
            password: get("DB_PASSWORD")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkOutcome {
    /// A required `DB_*` setting is absent; execution skipped.
    NotConfigured,
    /// Built without the `postgres` feature; execution skipped.
    DriverUnavailable,
    Executed,
    Failed(String),
}

impl SinkOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, SinkOutcome::Failed(_))
    }
}

/// Execute the script as a single autocommit batch over one connection.
pub async fn execute_script(script: &str, config: Option<&DbConfig>) -> SinkOutcome {
    let Some(config) = config else {
        info!("database environment variables not set, skipping direct execution");
        return SinkOutcome::NotConfigured;
    };
    run_batch(script, config).await
}

#[cfg(feature = "postgres")]
async fn run_batch(script: &str, config: &DbConfig) -> SinkOutcome {
    use sqlx::postgres::PgConnectOptions;
    use sqlx::{ConnectOptions, Connection};

    let options = PgConnectOptions::new()
        .host(&config.host)
        .port(config.port)
        .database(&config.name)
        .username(&config.user)
        .password(&config.password);

    let mut conn = match options.connect().await {
        Ok(conn) => conn,
        Err(e) => {
            error!("failed to connect to {}:{}: {}", config.host, config.port, e);
            return SinkOutcome::Failed(e.to_string());
        }
    };

    // Simple-query protocol runs the whole multi-statement script with
    // autocommit semantics.  Close the connection on both paths.
    let result = sqlx::raw_sql(script).execute(&mut conn).await;
    let _ = conn.close().await;

    match result {
        Ok(_) => {
            info!("script executed directly against PostgreSQL");
            SinkOutcome::Executed
        }
        Err(e) => {
            error!("failed to execute script against PostgreSQL: {}", e);
            SinkOutcome::Failed(e.to_string())
        }
    }
}

#[cfg(not(feature = "postgres"))]
async fn run_batch(_script: &str, _config: &DbConfig) -> SinkOutcome {
    info!("built without the postgres feature, script file only");
    SinkOutcome::DriverUnavailable
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn vars(entries: &[(&str, &str)]) -> HashMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn full_configuration() {
        let env = vars(&[
            ("DB_HOST", "localhost"),
            ("DB_PORT", "5433"),
            ("DB_NAME", "indicators"),
            ("DB_USER", "etl"),
            ("DB_PASSWORD", "secret"),
        ]);
        let config = DbConfig::from_lookup(|k| env.get(k).cloned()).unwrap();
        assert_eq!(config.port, 5433);
        assert_eq!(config.name, "indicators");
    }

    #[test]
    fn port_defaults() {
        let env = vars(&[
            ("DB_HOST", "localhost"),
            ("DB_NAME", "indicators"),
            ("DB_USER", "etl"),
            ("DB_PASSWORD", "secret"),
        ]);
        let config = DbConfig::from_lookup(|k| env.get(k).cloned()).unwrap();
        assert_eq!(config.port, 5432);
    }

    #[test]
    fn any_missing_setting_means_not_configured() {
        for missing in ["DB_HOST", "DB_NAME", "DB_USER", "DB_PASSWORD"] {
            let env = vars(&[
                ("DB_HOST", "localhost"),
                ("DB_NAME", "indicators"),
                ("DB_USER", "etl"),
                ("DB_PASSWORD", "secret"),
            ]);
            let config = DbConfig::from_lookup(|k| {
                if k == missing {
                    None
                } else {
                    env.get(k).cloned()
                }
            });
            assert!(config.is_none(), "expected None without {}", missing);
        }
    }

    #[cfg(feature = "postgres")]
    #[tokio::test]
    async fn connection_failure_is_caught() {
        // Nothing listens on port 1; the refused connection must come back
        // as Failed, not as a panic.
        let config = DbConfig {
            host: "127.0.0.1".to_string(),
            port: 1,
            name: "indicators".to_string(),
            user: "etl".to_string(),
            password: "secret".to_string(),
        };
        let outcome = execute_script("SELECT 1;", Some(&config)).await;
        assert!(matches!(outcome, SinkOutcome::Failed(_)));
        assert!(outcome.is_failure());
    }

    #[tokio::test]
    async fn unconfigured_sink_skips() {
        let outcome = execute_script("SELECT 1;", None).await;
        assert_eq!(outcome, SinkOutcome::NotConfigured);
        assert!(!outcome.is_failure());
    }
}
