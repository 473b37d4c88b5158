//! Error types for Claimward.
//!
//! All errors are strongly typed and propagated without panicking.
//! Storage errors are logged at the gateway boundary before they reach
//! callers, so every variant here is safe to report back to a user.

/// Claim error types covering all operations.
#[derive(Debug, thiserror::Error)]
pub enum ClaimError {
    #[error("Invalid syntax: {0}")]
    InvalidSyntax(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Not trusted in this claim: {0}")]
    NotTrusted(String),

    #[error("Cannot change the trust level of the claim owner: {0}")]
    OwnerNotTrustable(String),

    #[error("A group named {name} already exists for {owner}")]
    GroupExists { owner: String, name: String },

    #[error("Region conflict: {0}")]
    RegionConflict(String),

    #[error("Storage failure: {0}")]
    StorageFailure(String),

    #[error("Schema inconsistency: {0}")]
    SchemaInconsistency(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rusqlite::Error> for ClaimError {
    fn from(e: rusqlite::Error) -> Self {
        ClaimError::StorageFailure(e.to_string())
    }
}

impl From<serde_json::Error> for ClaimError {
    fn from(e: serde_json::Error) -> Self {
        ClaimError::Serialization(e.to_string())
    }
}

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, ClaimError>;
