/// Crate-wide result type for relay operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Typed errors surfaced by the relay's operator-facing operations.
///
/// Per-destination delivery failures never appear here; the dispatcher
/// counts them and moves on. Platform calls made while taking a message
/// down are best-effort and only logged.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No relay record matches the queried id or origin message.
    #[error("not found: {what}")]
    NotFound { what: String },

    /// The relay record trail could not be read or written.
    #[error(transparent)]
    Store(#[from] guildlink_store::Error),
}

impl Error {
    #[must_use]
    pub fn not_found(what: impl std::fmt::Display) -> Self {
        Self::NotFound {
            what: what.to_string(),
        }
    }
}
