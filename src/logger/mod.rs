use chrono::Utc;

use crate::buffer::models::NewLocalLogEntry;
use crate::buffer::LocalBuffer;
use crate::cloud::models::NewCloudLogEntry;
use crate::cloud::repositories::LogRepository;
use crate::cloud::CloudStore;
use crate::error::DaemonResult;
use crate::shared::LogLevelEnum;

/// Structured log sink with the same stage-then-drain semantics as
/// observations (§4.6): `write` stages a row locally and emits a console
/// event via `tracing`; `forward` drains staged rows to the cloud and
/// deletes them locally on success.
pub struct Logger {
    daemon_id: i32,
    buffer: std::sync::Arc<LocalBuffer>,
}

impl Logger {
    pub fn new(daemon_id: i32, buffer: std::sync::Arc<LocalBuffer>) -> Self {
        Logger { daemon_id, buffer }
    }

    pub async fn write(&self, level: LogLevelEnum, message: impl Into<String>) -> DaemonResult<()> {
        let message = message.into();
        match level {
            LogLevelEnum::Info => tracing::info!(daemon_id = self.daemon_id, "{message}"),
            LogLevelEnum::Success => {
                tracing::info!(daemon_id = self.daemon_id, success = true, "{message}")
            }
            LogLevelEnum::Warning => tracing::warn!(daemon_id = self.daemon_id, "{message}"),
            LogLevelEnum::Danger => tracing::error!(daemon_id = self.daemon_id, "{message}"),
        }

        self.buffer
            .insert_log(NewLocalLogEntry {
                time: Utc::now().naive_utc(),
                message,
                level: level.to_string(),
                daemon_id: self.daemon_id,
            })
            .await
    }

    pub async fn info(&self, message: impl Into<String>) -> DaemonResult<()> {
        self.write(LogLevelEnum::Info, message).await
    }

    pub async fn warning(&self, message: impl Into<String>) -> DaemonResult<()> {
        self.write(LogLevelEnum::Warning, message).await
    }

    pub async fn danger(&self, message: impl Into<String>) -> DaemonResult<()> {
        self.write(LogLevelEnum::Danger, message).await
    }

    pub async fn success(&self, message: impl Into<String>) -> DaemonResult<()> {
        self.write(LogLevelEnum::Success, message).await
    }

    /// Drains staged log rows to the cloud store and deletes them locally
    /// on success, mirroring the fact-drain in `Daemon`'s `forward` task.
    pub async fn forward(&self, cloud: &CloudStore) -> DaemonResult<usize> {
        let now = Utc::now().naive_utc();
        let staged = self.buffer.logs_until(now).await?;
        if staged.is_empty() {
            return Ok(0);
        }

        let rows: Vec<NewCloudLogEntry> = staged
            .into_iter()
            .map(|entry| NewCloudLogEntry {
                time: entry.time,
                message: entry.message,
                level: entry.level.parse().unwrap_or(LogLevelEnum::Info),
                daemon_id: entry.daemon_id,
            })
            .collect();

        let mut conn = cloud.conn().await?;
        let inserted = LogRepository::insert_batch(&mut conn, rows)
            .await
            .map_err(|e| crate::error::DaemonError::CloudUnavailable(e.to_string()))?;

        self.buffer.delete_logs_until(now).await?;
        Ok(inserted)
    }
}
