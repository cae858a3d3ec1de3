//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic validation failures of domain values.
/// Authorization outcomes belong to `orgkey-auth`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// An organization identifier was not a well-formed digit string.
    #[error("invalid organization id: {0}")]
    InvalidOrganizationId(String),
}

impl DomainError {
    pub fn invalid_organization_id(msg: impl Into<String>) -> Self {
        Self::InvalidOrganizationId(msg.into())
    }
}
