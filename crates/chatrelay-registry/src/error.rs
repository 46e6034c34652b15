//! Error types for the registry.

/// Why a login could not be registered.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// Every slot is taken.
    #[error("server is full ({capacity} users)")]
    Full { capacity: usize },

    /// Someone is already logged in under this name.
    #[error("username {0} is already taken")]
    NameTaken(String),
}
