use std::env;
use std::time::Duration;

use crate::error::DaemonError;

/// Daemon-wide configuration, loaded once from the environment at startup.
///
/// Mirrors the teacher's `load_db_connection`-style direct `env::var` reads:
/// no layered config files, just the scalar variables the spec names.
#[derive(Debug, Clone)]
pub struct Config {
    pub configuration_key: String,
    pub poll_interval: Duration,
    pub store_interval: Duration,
    pub sync_interval: Duration,
    pub forward_interval: Duration,
    pub db_host: String,
    pub db_port: String,
    pub db_database: String,
    pub db_username: String,
    pub db_password: String,
    pub local_buffer_path: String,
}

/// Fixed cadence for draining staged log rows to the cloud store (§4.1).
pub const LOG_FORWARD_INTERVAL: Duration = Duration::from_secs(5);

/// How many consecutive paused `poll` cycles are skipped between warnings.
pub const PAUSED_SOURCE_LOG_EVERY: u64 = 30;

/// Upper bound on concurrent PLC worker connections per source (§4.3).
pub const DRIVER_THREADS: usize = 20;

/// Upper bound on tags read in a single batched PLC request (§4.3).
pub const TAGS_PER_REQUEST: usize = 1000;

impl Config {
    pub fn from_env() -> Result<Self, DaemonError> {
        let configuration_key = required("CONFIGURATION_KEY")?;

        let poll_interval = duration_from_env("POLL_TIME")?;
        let store_interval = duration_from_env("STORE_TIME")?;
        let sync_interval = duration_from_env("SYNC_TIME")?;
        let forward_interval = duration_from_env("FORWARD_TIME")?;

        let db_connection = required("DB_CONNECTION")?;
        if db_connection != "pgsql" {
            return Err(DaemonError::ConfigFatal(format!(
                "unsupported DB_CONNECTION '{db_connection}', only 'pgsql' is supported"
            )));
        }

        let db_host = required("DB_HOST")?;
        let db_port = required("DB_PORT")?;
        let db_database = required("DB_DATABASE")?;
        let db_username = required("DB_USERNAME")?;
        let db_password = required("DB_PASSWORD")?;

        let local_buffer_path =
            env::var("LOCAL_BUFFER_PATH").unwrap_or_else(|_| "./data/store.db".to_string());

        Ok(Config {
            configuration_key,
            poll_interval,
            store_interval,
            sync_interval,
            forward_interval,
            db_host,
            db_port,
            db_database,
            db_username,
            db_password,
            local_buffer_path,
        })
    }

    pub fn cloud_database_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.db_username, self.db_password, self.db_host, self.db_port, self.db_database
        )
    }
}

fn required(key: &str) -> Result<String, DaemonError> {
    env::var(key).map_err(|_| DaemonError::ConfigFatal(format!("missing required env var {key}")))
}

fn duration_from_env(key: &str) -> Result<Duration, DaemonError> {
    let raw = required(key)?;
    let secs: f64 = raw
        .parse()
        .map_err(|_| DaemonError::ConfigFatal(format!("{key} must be a number of seconds, got '{raw}'")))?;
    if secs <= 0.0 {
        return Err(DaemonError::ConfigFatal(format!("{key} must be positive")));
    }
    Ok(Duration::from_secs_f64(secs))
}
