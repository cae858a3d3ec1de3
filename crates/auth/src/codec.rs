//! Compact membership encoding for token payloads.
//!
//! One membership becomes a single role-code character followed directly by the
//! organization id digits, with no separator: `(PRESIDENT, 66)` is `"P66"`.

use serde::{Deserialize, Serialize};

use orgkey_core::OrganizationId;

use crate::{AuthzError, Membership, RejectedEntry, Role};

/// The role-code alphabet. The only place role codes are defined.
pub fn role_code(role: Role) -> char {
    match role {
        Role::President => 'P',
        Role::Admin => 'A',
        Role::Moderator => 'O',
        Role::Member => 'M',
    }
}

pub fn role_from_code(code: char) -> Option<Role> {
    Role::ALL.into_iter().find(|role| role_code(*role) == code)
}

/// One encoded membership, as carried in a token's `o` array.
///
/// Entries read from a token are not validated until decoded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompactEntry(String);

impl CompactEntry {
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The part after the role code, if the entry is non-empty.
    pub fn organization_part(&self) -> Option<&str> {
        organization_part(&self.0)
    }
}

impl core::fmt::Display for CompactEntry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<CompactEntry> for String {
    fn from(value: CompactEntry) -> Self {
        value.0
    }
}

/// Encode one membership after validating `organization_id`.
pub fn encode(role: Role, organization_id: &str) -> Result<CompactEntry, AuthzError> {
    let organization_id = OrganizationId::parse(organization_id)?;
    Ok(encode_membership(&Membership::new(organization_id, role)))
}

pub fn encode_membership(membership: &Membership) -> CompactEntry {
    let mut raw = String::with_capacity(1 + membership.organization_id.as_str().len());
    raw.push(role_code(membership.role));
    raw.push_str(membership.organization_id.as_str());
    CompactEntry(raw)
}

/// Encode memberships in order, for the `o` key of an issued token.
pub fn encode_all(memberships: &[Membership]) -> Vec<CompactEntry> {
    memberships.iter().map(encode_membership).collect()
}

/// Decode one entry. The first character is the role code, the rest the
/// organization id.
pub fn decode(entry: &str) -> Result<Membership, AuthzError> {
    let mut chars = entry.chars();
    let code = chars
        .next()
        .ok_or_else(|| AuthzError::InvalidRoleCode(String::new()))?;
    let role =
        role_from_code(code).ok_or_else(|| AuthzError::InvalidRoleCode(code.to_string()))?;
    let organization_id = OrganizationId::parse(chars.as_str())?;
    Ok(Membership::new(organization_id, role))
}

/// Decode one entry, keeping what a lookup needs to report it when it fails.
pub fn decode_entry(entry: &str) -> Result<Membership, RejectedEntry> {
    decode(entry).map_err(|error| RejectedEntry {
        raw: entry.to_string(),
        organization_hint: organization_part(entry).map(str::to_string),
        error,
    })
}

/// Locate the membership for `organization_id` among raw entries.
///
/// Each entry is decoded and its organization id compared for exact equality,
/// so `"A12"` never matches organization `"1"`. See [`select_membership`] for
/// how duplicates and undecodable entries are resolved.
pub fn find_membership(
    entries: &[CompactEntry],
    organization_id: &OrganizationId,
) -> Result<Option<Membership>, AuthzError> {
    let mut memberships = Vec::with_capacity(entries.len());
    let mut rejected = Vec::new();
    for entry in entries {
        match decode_entry(entry.as_str()) {
            Ok(m) => memberships.push(m),
            Err(r) => rejected.push(r),
        }
    }

    select_membership(&memberships, &rejected, organization_id).map(|m| m.cloned())
}

/// The lookup rule shared by raw entries and normalized principals.
///
/// Among decoded memberships the last one for exactly `organization_id` wins.
/// With none, the first rejected entry naming that organization returns its
/// error; rejected entries for other organizations are ignored.
pub fn select_membership<'a>(
    memberships: &'a [Membership],
    rejected: &[RejectedEntry],
    organization_id: &OrganizationId,
) -> Result<Option<&'a Membership>, AuthzError> {
    if let Some(m) = memberships
        .iter()
        .rev()
        .find(|m| &m.organization_id == organization_id)
    {
        return Ok(Some(m));
    }

    match rejected
        .iter()
        .find(|r| r.organization_hint.as_deref() == Some(organization_id.as_str()))
    {
        Some(r) => Err(r.error.clone()),
        None => Ok(None),
    }
}

pub(crate) fn organization_part(entry: &str) -> Option<&str> {
    let mut chars = entry.chars();
    chars.next()?;
    Some(chars.as_str())
}
