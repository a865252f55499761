use thiserror::Error;

/// Taxonomy of failures the daemon can hit, mapped to differentiated
/// retry/log/propagate policies by call sites (see module docs on
/// `daemon`, `source`, and `logger`).
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("configuration error: {0}")]
    ConfigFatal(String),

    #[error("cloud store unavailable: {0}")]
    CloudUnavailable(String),

    #[error("plc unavailable: {0}")]
    PlcUnavailable(String),

    #[error("invalid value: {0}")]
    InvalidValue(String),

    #[error("catalog mismatch: {0}")]
    CatalogMismatch(String),

    #[error("local buffer error: {0}")]
    LocalBufferError(String),
}

pub type DaemonResult<T> = Result<T, DaemonError>;

impl From<diesel::result::Error> for DaemonError {
    fn from(e: diesel::result::Error) -> Self {
        DaemonError::LocalBufferError(e.to_string())
    }
}

impl From<r2d2::Error> for DaemonError {
    fn from(e: r2d2::Error) -> Self {
        DaemonError::LocalBufferError(e.to_string())
    }
}

impl From<diesel_async::pooled_connection::bb8::RunError> for DaemonError {
    fn from(e: diesel_async::pooled_connection::bb8::RunError) -> Self {
        DaemonError::CloudUnavailable(e.to_string())
    }
}

impl From<tokio::task::JoinError> for DaemonError {
    fn from(e: tokio::task::JoinError) -> Self {
        DaemonError::LocalBufferError(format!("blocking task panicked: {e}"))
    }
}
