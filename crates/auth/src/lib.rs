//! `orgkey-auth` — token-embedded organization authorization (zero lookups).
//!
//! Packs memberships into compact token entries, normalizes every historical
//! token payload shape into one [`Principal`], and decides organization-scoped
//! access from the principal alone. Decoupled from HTTP, storage and signing.

pub mod authorize;
pub mod claims;
pub mod codec;
pub mod config;
pub mod error;
pub mod outcome;
pub mod payload;
pub mod principal;
pub mod roles;

pub use authorize::{
    AccessDecision, AccessRequirement, DenialKind, OrganizationDecision, authorize, decide,
    decide_many, is_admin_anywhere, memberships_by_role,
};
pub use claims::CompactClaims;
pub use codec::CompactEntry;
pub use config::AuthzConfig;
pub use error::AuthzError;
pub use outcome::{AccessOutcome, PayloadAuthorization, authorize_payload};
pub use payload::{AdminAccess, Payload, PayloadShape, normalize, normalize_value};
pub use principal::{Membership, Principal, PrincipalBuilder, RejectedEntry, UserType};
pub use roles::{EffectiveRole, Role};
