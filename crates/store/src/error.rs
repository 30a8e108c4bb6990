/// Crate-wide result type for store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Typed storage errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A row exists but cannot be decoded into its domain type.
    #[error("corrupt row: {message}")]
    Corrupt { message: String },

    /// The backend rejected or could not perform the operation.
    #[error("store unavailable: {message}")]
    Unavailable { message: String },

    /// A unique key was written twice.
    #[error("conflict: {message}")]
    Conflict { message: String },

    /// Database error.
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    /// Migration error.
    #[error(transparent)]
    Migrate(#[from] sqlx::migrate::MigrateError),

    /// JSON (de)serialization failed.
    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
}

impl Error {
    #[must_use]
    pub fn corrupt(message: impl std::fmt::Display) -> Self {
        Self::Corrupt {
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn unavailable(message: impl std::fmt::Display) -> Self {
        Self::Unavailable {
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn conflict(message: impl std::fmt::Display) -> Self {
        Self::Conflict {
            message: message.to_string(),
        }
    }
}
