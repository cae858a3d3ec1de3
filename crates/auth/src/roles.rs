//! Organization role hierarchy.

use core::str::FromStr;

use serde::{Deserialize, Serialize, Serializer};

use crate::AuthzError;

/// Role held within one organization.
///
/// Roles are totally ordered by [`Role::level`]:
/// `MEMBER(1) < MODERATOR(2) < ADMIN(3) < PRESIDENT(4)`.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Member,
    Moderator,
    Admin,
    President,
}

impl Role {
    /// All roles, lowest level first.
    pub const ALL: [Role; 4] = [Role::Member, Role::Moderator, Role::Admin, Role::President];

    pub fn level(self) -> u8 {
        match self {
            Role::Member => 1,
            Role::Moderator => 2,
            Role::Admin => 3,
            Role::President => 4,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Member => "MEMBER",
            Role::Moderator => "MODERATOR",
            Role::Admin => "ADMIN",
            Role::President => "PRESIDENT",
        }
    }

    /// Any-of check: `true` if `required` is empty, or if this role's level is at
    /// least the level of *some* entry in `required`.
    ///
    /// The lowest listed role therefore sets the bar: `[ADMIN, MODERATOR]` admits a
    /// MODERATOR. Callers meaning "ADMIN or above" must pass `[ADMIN]` alone.
    pub fn meets_requirement(self, required: &[Role]) -> bool {
        required.is_empty() || required.iter().any(|r| self.level() >= r.level())
    }

    /// Roles that grant administrative rights over an organization.
    pub fn is_admin(self) -> bool {
        matches!(self, Role::Admin | Role::President)
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parses role names case-insensitively (`"ADMIN"`, `"admin"`).
impl FromStr for Role {
    type Err = AuthzError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|r| r.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| AuthzError::InvalidRoleCode(s.to_string()))
    }
}

/// The role a granted decision was made on.
///
/// `GlobalAdmin` and `OrganizationManager` sit outside the hierarchy: they are
/// never compared by level and satisfy every requirement.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum EffectiveRole {
    Role(Role),
    GlobalAdmin,
    OrganizationManager,
}

impl EffectiveRole {
    pub fn as_str(self) -> &'static str {
        match self {
            EffectiveRole::Role(role) => role.as_str(),
            EffectiveRole::GlobalAdmin => "GLOBAL_ADMIN",
            EffectiveRole::OrganizationManager => "ORGANIZATION_MANAGER",
        }
    }

    pub fn is_bypass(self) -> bool {
        !matches!(self, EffectiveRole::Role(_))
    }
}

impl From<Role> for EffectiveRole {
    fn from(value: Role) -> Self {
        EffectiveRole::Role(value)
    }
}

impl core::fmt::Display for EffectiveRole {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for EffectiveRole {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}
