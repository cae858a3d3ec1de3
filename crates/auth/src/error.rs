use thiserror::Error;

use orgkey_core::DomainError;

use crate::Role;
use crate::authorize::DenialKind;

/// Per-request authorization failure.
///
/// Every variant is an expected outcome (bad input or a policy denial), never a
/// process-level fault.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("invalid token format: {0}")]
    InvalidTokenFormat(String),

    #[error("invalid organization id: {0}")]
    InvalidOrganizationId(String),

    #[error("invalid role code: {0:?}")]
    InvalidRoleCode(String),

    #[error("not a member of organization {0}")]
    NotAMember(String),

    #[error("insufficient role: has {actual}, requires one of {required:?}")]
    InsufficientRole { actual: Role, required: Vec<Role> },
}

impl AuthzError {
    pub fn kind(&self) -> DenialKind {
        match self {
            AuthzError::InvalidTokenFormat(_) => DenialKind::InvalidTokenFormat,
            AuthzError::InvalidOrganizationId(_) => DenialKind::InvalidOrganizationId,
            AuthzError::InvalidRoleCode(_) => DenialKind::InvalidRoleCode,
            AuthzError::NotAMember(_) => DenialKind::NotAMember,
            AuthzError::InsufficientRole { .. } => DenialKind::InsufficientRole,
        }
    }
}

impl From<DomainError> for AuthzError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::InvalidOrganizationId(msg) => AuthzError::InvalidOrganizationId(msg),
        }
    }
}
