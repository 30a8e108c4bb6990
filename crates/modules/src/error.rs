/// Crate-wide result type for module operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Typed errors for module registration and lifecycle.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The module id is not registered.
    #[error("unknown module: {module_id}")]
    UnknownModule { module_id: String },

    /// A config is missing keys the module declares as required.
    #[error("missing required fields: {}", fields.join(", "))]
    MissingFields { fields: Vec<String> },

    /// A config failed the module's own validation.
    #[error("invalid config: {reason}")]
    InvalidConfig { reason: String },

    /// Platform lookup failed during validation.
    #[error(transparent)]
    Platform(#[from] guildlink_platform::Error),

    /// Persistence failed; in-memory state is unchanged.
    #[error(transparent)]
    Store(#[from] guildlink_store::Error),

    /// JSON (de)serialization failed.
    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
}

impl Error {
    #[must_use]
    pub fn unknown_module(module_id: impl std::fmt::Display) -> Self {
        Self::UnknownModule {
            module_id: module_id.to_string(),
        }
    }

    #[must_use]
    pub fn invalid_config(reason: impl std::fmt::Display) -> Self {
        Self::InvalidConfig {
            reason: reason.to_string(),
        }
    }
}
