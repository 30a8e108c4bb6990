/// Crate-wide result type for platform operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Typed failures the chat platform can report.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A guild, channel, message or sink does not resolve.
    #[error("not found: {what}")]
    NotFound { what: String },

    /// The bot lacks the permission the operation needs.
    #[error("permission denied: {what}")]
    PermissionDenied { what: String },

    /// The platform could not be reached or answered with a server error.
    #[error("transport failure: {what}")]
    Transport { what: String },
}

impl Error {
    #[must_use]
    pub fn not_found(what: impl std::fmt::Display) -> Self {
        Self::NotFound {
            what: what.to_string(),
        }
    }

    #[must_use]
    pub fn permission_denied(what: impl std::fmt::Display) -> Self {
        Self::PermissionDenied {
            what: what.to_string(),
        }
    }

    #[must_use]
    pub fn transport(what: impl std::fmt::Display) -> Self {
        Self::Transport {
            what: what.to_string(),
        }
    }
}
