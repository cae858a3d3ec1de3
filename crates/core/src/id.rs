//! Strongly-typed identifiers used across the domain.

use core::cmp::Ordering;
use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// Upper bound on organization id digits; keeps every id inside the `u64` domain.
pub const MAX_ORGANIZATION_ID_DIGITS: usize = 15;

/// Identifier of an organization (the authorization scope of a membership).
///
/// Serialized as a non-empty ASCII digit string with no leading zero (except the
/// literal `"0"`) and at most [`MAX_ORGANIZATION_ID_DIGITS`] digits. Comparison is
/// exact string equality; `"1"` and `"12"` never match each other.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OrganizationId(String);

/// Identifier of an institute. Opaque: carried through tokens untouched.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstituteId(String);

macro_rules! impl_string_newtype {
    ($t:ty) => {
        impl $t {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $t {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<$t> for String {
            fn from(value: $t) -> Self {
                value.0
            }
        }
    };
}

impl_string_newtype!(OrganizationId);
impl_string_newtype!(InstituteId);

impl OrganizationId {
    /// Validate and wrap a digit string.
    pub fn parse(s: &str) -> DomainResult<Self> {
        if s.is_empty() {
            return Err(DomainError::invalid_organization_id("empty string"));
        }
        if s.len() > MAX_ORGANIZATION_ID_DIGITS {
            return Err(DomainError::invalid_organization_id(format!(
                "{s:?}: more than {MAX_ORGANIZATION_ID_DIGITS} digits"
            )));
        }
        if !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(DomainError::invalid_organization_id(format!(
                "{s:?}: non-digit character"
            )));
        }
        if s.len() > 1 && s.starts_with('0') {
            return Err(DomainError::invalid_organization_id(format!(
                "{s:?}: leading zero"
            )));
        }
        Ok(Self(s.to_owned()))
    }

    /// `false` only for the literal `"0"`, which is well-formed but never a valid target.
    pub fn is_positive(&self) -> bool {
        self.0 != "0"
    }

    pub fn as_u64(&self) -> u64 {
        // Validated digits, at most 15 of them: cannot overflow.
        self.0
            .bytes()
            .fold(0u64, |acc, b| acc * 10 + u64::from(b - b'0'))
    }
}

impl FromStr for OrganizationId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for OrganizationId {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl TryFrom<u64> for OrganizationId {
    type Error = DomainError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        Self::parse(&value.to_string())
    }
}

/// Numeric order: shorter digit strings are smaller, equal lengths compare lexically.
impl Ord for OrganizationId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .len()
            .cmp(&other.0.len())
            .then_with(|| self.0.cmp(&other.0))
    }
}

impl PartialOrd for OrganizationId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl crate::ValueObject for OrganizationId {}

impl InstituteId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }
}

impl From<String> for InstituteId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for InstituteId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl crate::ValueObject for InstituteId {}
