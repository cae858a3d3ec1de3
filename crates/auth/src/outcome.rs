//! Mapping decisions onto transport-level outcomes.
//!
//! The HTTP layer owns status codes and response bodies; this module only says
//! which class of response a decision belongs to.

use serde::Serialize;

use crate::authorize::{self, AccessDecision, AccessRequirement, DenialKind};
use crate::payload::{self, Payload};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessOutcome {
    Allowed,
    /// No principal at all.
    Unauthenticated,
    /// Principal present but not permitted.
    Forbidden,
    /// Malformed token contents or target id.
    BadRequest,
}

impl AccessOutcome {
    pub fn from_denial(kind: DenialKind) -> Self {
        match kind {
            DenialKind::NotAMember | DenialKind::InsufficientRole => AccessOutcome::Forbidden,
            DenialKind::InvalidOrganizationId
            | DenialKind::InvalidTokenFormat
            | DenialKind::InvalidRoleCode => AccessOutcome::BadRequest,
        }
    }

    pub fn status_code(self) -> u16 {
        match self {
            AccessOutcome::Allowed => 200,
            AccessOutcome::Unauthenticated => 401,
            AccessOutcome::Forbidden => 403,
            AccessOutcome::BadRequest => 400,
        }
    }
}

impl AccessDecision {
    pub fn outcome(&self) -> AccessOutcome {
        match self.reason {
            None if self.granted => AccessOutcome::Allowed,
            Some(kind) => AccessOutcome::from_denial(kind),
            None => AccessOutcome::Forbidden,
        }
    }
}

/// Outcome of authorizing a raw payload, plus the decision when one was made.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PayloadAuthorization {
    pub outcome: AccessOutcome,
    pub decision: Option<AccessDecision>,
}

/// Normalize `payload` and decide `requirement` in one step.
///
/// `None` means the request carried no verified token.
pub fn authorize_payload(
    payload: Option<&Payload>,
    requirement: &AccessRequirement,
) -> PayloadAuthorization {
    let Some(payload) = payload else {
        return PayloadAuthorization {
            outcome: AccessOutcome::Unauthenticated,
            decision: None,
        };
    };

    let decision = match payload::normalize(payload) {
        Ok(principal) => authorize::decide(&principal, requirement),
        Err(e) => {
            tracing::debug!(error = %e, "token payload rejected");
            AccessDecision::from(e)
        }
    };

    PayloadAuthorization {
        outcome: decision.outcome(),
        decision: Some(decision),
    }
}
