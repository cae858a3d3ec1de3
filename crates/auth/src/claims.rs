use serde::{Deserialize, Serialize};
use serde_json::Value;

use orgkey_core::InstituteId;

use crate::codec::{self, CompactEntry};
use crate::payload::Payload;
use crate::{AuthzError, Membership, Principal, UserType};

/// Compact claims placed into an outgoing token.
///
/// This is the issuance side of the ultra-compact payload shape: the external
/// signer embeds [`CompactClaims::to_payload`] and the normalizer reads it back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompactClaims {
    /// Subject / principal identifier.
    #[serde(rename = "s")]
    pub subject: String,

    #[serde(rename = "e")]
    pub email: String,

    #[serde(rename = "n", default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    /// Encoded memberships (`"P66"`).
    #[serde(rename = "o")]
    pub organizations: Vec<CompactEntry>,

    #[serde(rename = "ins", default, skip_serializing_if = "Vec::is_empty")]
    pub institute_ids: Vec<InstituteId>,

    /// Short user-type code.
    #[serde(rename = "t", default, skip_serializing_if = "Option::is_none")]
    pub user_type: Option<String>,

    /// `1` for global admins, omitted otherwise.
    #[serde(rename = "g", default, skip_serializing_if = "Option::is_none")]
    pub global_admin: Option<u8>,
}

impl CompactClaims {
    /// Claims for memberships resolved from persistence.
    pub fn issue(
        subject: impl Into<String>,
        email: impl Into<String>,
        memberships: &[Membership],
    ) -> Self {
        Self {
            subject: subject.into(),
            email: email.into(),
            display_name: None,
            organizations: codec::encode_all(memberships),
            institute_ids: Vec::new(),
            user_type: None,
            global_admin: None,
        }
    }

    /// Re-issue claims for an already normalized principal.
    ///
    /// The compact shape requires an email; principals without one cannot be
    /// expressed in it.
    pub fn from_principal(principal: &Principal) -> Result<Self, AuthzError> {
        let email = principal.email().ok_or_else(|| {
            AuthzError::InvalidTokenFormat(format!(
                "principal {} has no email for compact claims",
                principal.id()
            ))
        })?;

        let mut claims = Self::issue(principal.id(), email, principal.memberships())
            .with_institute_ids(principal.institute_ids().iter().cloned())
            .with_global_admin(principal.is_global_admin());
        if let Some(name) = principal.display_name() {
            claims = claims.with_display_name(name);
        }
        if let Some(user_type) = principal.user_type() {
            claims = claims.with_user_type(user_type);
        }
        Ok(claims)
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn with_institute_ids(mut self, ids: impl IntoIterator<Item = InstituteId>) -> Self {
        self.institute_ids.extend(ids);
        self
    }

    pub fn with_user_type(mut self, user_type: &UserType) -> Self {
        self.user_type = Some(user_type.code().to_string());
        self
    }

    pub fn with_global_admin(mut self, is_global_admin: bool) -> Self {
        self.global_admin = is_global_admin.then_some(1);
        self
    }

    /// The key/value map handed to the token signer.
    pub fn to_payload(&self) -> Payload {
        let mut payload = Payload::new();
        payload.insert("s".into(), Value::from(self.subject.as_str()));
        payload.insert("e".into(), Value::from(self.email.as_str()));
        if let Some(name) = &self.display_name {
            payload.insert("n".into(), Value::from(name.as_str()));
        }
        payload.insert(
            "o".into(),
            self.organizations
                .iter()
                .map(|entry| Value::from(entry.as_str()))
                .collect(),
        );
        if !self.institute_ids.is_empty() {
            payload.insert(
                "ins".into(),
                self.institute_ids
                    .iter()
                    .map(|id| Value::from(id.as_str()))
                    .collect(),
            );
        }
        if let Some(code) = &self.user_type {
            payload.insert("t".into(), Value::from(code.as_str()));
        }
        if let Some(flag) = self.global_admin {
            payload.insert("g".into(), Value::from(flag));
        }
        payload
    }
}
