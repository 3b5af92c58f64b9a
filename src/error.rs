use thiserror::Error;

/// Failures talking to the persistent key-value store
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("malformed value for key {key:?}: {source}")]
    Json {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to prepare store location: {0}")]
    Io(#[from] std::io::Error),
}

/// Rejected inspection settings
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("inspection duration must be one of 10, 15, 20 or 30 seconds, got {0}")]
    UnsupportedDuration(u32),

    #[error("warning threshold must be one of 2, 3 or 5 seconds, got {0}")]
    UnsupportedWarningThreshold(u32),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
