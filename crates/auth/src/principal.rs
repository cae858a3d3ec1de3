use serde::{Serialize, Serializer};

use orgkey_core::{InstituteId, OrganizationId, ValueObject};

use crate::{AuthzError, Role, codec};

/// A principal's role within one organization.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Membership {
    pub organization_id: OrganizationId,
    pub role: Role,
}

impl Membership {
    pub fn new(organization_id: OrganizationId, role: Role) -> Self {
        Self {
            organization_id,
            role,
        }
    }
}

impl ValueObject for Membership {}

/// Account category carried by the token.
///
/// Tokens carry either a two-letter code (`ut`/`t` keys) or the full name
/// (`userType` key). Unknown values are preserved verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum UserType {
    SuperAdmin,
    GlobalAdmin,
    OrganizationManager,
    InstituteAdmin,
    Teacher,
    Student,
    User,
    Other(String),
}

const USER_TYPES: [(UserType, &str, &str); 7] = [
    (UserType::SuperAdmin, "SA", "SUPER_ADMIN"),
    (UserType::GlobalAdmin, "GA", "GLOBAL_ADMIN"),
    (UserType::OrganizationManager, "OM", "ORGANIZATION_MANAGER"),
    (UserType::InstituteAdmin, "IA", "INSTITUTE_ADMIN"),
    (UserType::Teacher, "TE", "TEACHER"),
    (UserType::Student, "ST", "STUDENT"),
    (UserType::User, "US", "USER"),
];

impl UserType {
    /// Expand a short code (`"OM"`).
    pub fn from_code(code: &str) -> Self {
        USER_TYPES
            .iter()
            .find(|(_, c, _)| *c == code)
            .map(|(t, _, _)| t.clone())
            .unwrap_or_else(|| UserType::Other(code.to_string()))
    }

    /// Parse a full name (`"ORGANIZATION_MANAGER"`, case-insensitive) or, failing
    /// that, a short code.
    pub fn parse(value: &str) -> Self {
        USER_TYPES
            .iter()
            .find(|(_, _, name)| name.eq_ignore_ascii_case(value))
            .map(|(t, _, _)| t.clone())
            .unwrap_or_else(|| Self::from_code(value))
    }

    pub fn code(&self) -> &str {
        match self {
            UserType::Other(raw) => raw.as_str(),
            known => USER_TYPES
                .iter()
                .find(|(t, _, _)| t == known)
                .map_or("", |(_, code, _)| *code),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            UserType::Other(raw) => raw.as_str(),
            known => USER_TYPES
                .iter()
                .find(|(t, _, _)| t == known)
                .map_or("", |(_, _, name)| *name),
        }
    }

    /// User types whose code alone makes the principal a global admin.
    pub fn grants_global_admin(&self) -> bool {
        matches!(self, UserType::SuperAdmin | UserType::GlobalAdmin)
    }
}

impl core::fmt::Display for UserType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for UserType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

/// A membership entry that could not be decoded while normalizing a token.
///
/// `organization_hint` is the raw organization part of the entry, if any. A
/// decision for exactly that organization reports `error` instead of `NotAMember`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedEntry {
    pub raw: String,
    pub organization_hint: Option<String>,
    pub error: AuthzError,
}

/// The authenticated caller, rebuilt from token contents on every request.
///
/// Immutable once built. Holds at most one membership per organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    id: String,
    email: Option<String>,
    display_name: Option<String>,
    user_type: Option<UserType>,
    is_global_admin: bool,
    memberships: Vec<Membership>,
    institute_ids: Vec<InstituteId>,
    #[serde(skip)]
    rejected: Vec<RejectedEntry>,
}

impl Principal {
    pub fn builder(id: impl Into<String>) -> PrincipalBuilder {
        PrincipalBuilder {
            principal: Principal {
                id: id.into(),
                email: None,
                display_name: None,
                user_type: None,
                is_global_admin: false,
                memberships: Vec::new(),
                institute_ids: Vec::new(),
                rejected: Vec::new(),
            },
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    pub fn user_type(&self) -> Option<&UserType> {
        self.user_type.as_ref()
    }

    pub fn is_global_admin(&self) -> bool {
        self.is_global_admin
    }

    pub fn is_organization_manager(&self) -> bool {
        self.user_type == Some(UserType::OrganizationManager)
    }

    pub fn memberships(&self) -> &[Membership] {
        &self.memberships
    }

    pub fn institute_ids(&self) -> &[InstituteId] {
        &self.institute_ids
    }

    /// Entries dropped during normalization.
    pub fn rejected(&self) -> &[RejectedEntry] {
        &self.rejected
    }

    /// Exact-match lookup of the membership for `organization_id`, by the same
    /// rule as [`codec::find_membership`].
    ///
    /// If no decoded membership matches but a rejected entry names this exact
    /// organization, that entry's error is returned.
    pub fn find_membership(
        &self,
        organization_id: &OrganizationId,
    ) -> Result<Option<&Membership>, AuthzError> {
        codec::select_membership(&self.memberships, &self.rejected, organization_id)
    }
}

/// Builder for [`Principal`]; the only way to construct one.
#[derive(Debug, Clone)]
pub struct PrincipalBuilder {
    principal: Principal,
}

impl PrincipalBuilder {
    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.principal.email = Some(email.into());
        self
    }

    pub fn display_name(mut self, name: impl Into<String>) -> Self {
        self.principal.display_name = Some(name.into());
        self
    }

    pub fn user_type(mut self, user_type: UserType) -> Self {
        self.principal.user_type = Some(user_type);
        self
    }

    pub fn global_admin(mut self, is_global_admin: bool) -> Self {
        self.principal.is_global_admin = is_global_admin;
        self
    }

    pub fn institute_ids<I, T>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<InstituteId>,
    {
        self.principal
            .institute_ids
            .extend(ids.into_iter().map(Into::into));
        self
    }

    /// Add a membership. A second membership for the same organization replaces
    /// the role of the first (last write wins), keeping its position.
    pub fn membership(mut self, membership: Membership) -> Self {
        let existing = self
            .principal
            .memberships
            .iter_mut()
            .find(|m| m.organization_id == membership.organization_id);

        match existing {
            Some(existing) => {
                tracing::debug!(
                    principal_id = %self.principal.id,
                    organization_id = %membership.organization_id,
                    previous = %existing.role,
                    role = %membership.role,
                    "duplicate membership; last entry wins"
                );
                existing.role = membership.role;
            }
            None => self.principal.memberships.push(membership),
        }
        self
    }

    pub fn memberships(self, memberships: impl IntoIterator<Item = Membership>) -> Self {
        memberships
            .into_iter()
            .fold(self, |builder, m| builder.membership(m))
    }

    pub fn reject(mut self, entry: RejectedEntry) -> Self {
        tracing::warn!(
            principal_id = %self.principal.id,
            entry = %entry.raw,
            error = %entry.error,
            "skipping undecodable membership entry"
        );
        self.principal.rejected.push(entry);
        self
    }

    pub fn build(self) -> Principal {
        self.principal
    }
}
