//! Normalization of verified token payloads into a [`Principal`].
//!
//! Tokens issued over time carry one of several payload shapes. Each shape has a
//! parser; parsers are tried in a fixed order and the first that recognizes the
//! payload produces the principal. Nothing downstream sees which shape it was.
//!
//! Signature, issuer and expiry are checked before a payload reaches this module.

use std::collections::BTreeSet;

use serde::Serialize;
use serde_json::{Map, Value};

use orgkey_core::{InstituteId, OrganizationId};

use crate::codec;
use crate::{AuthzError, Membership, Principal, PrincipalBuilder, RejectedEntry, Role, UserType};

/// A decoded, verified token payload.
pub type Payload = Map<String, Value>;

/// Payload shapes, listed in detection order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadShape {
    /// `s`, `e`, `o` (compact entries); optional `n`, `ins`, `t`, `g`.
    UltraCompact,
    /// `s`, `ut == "OM"`, `aa` (admin-access map).
    OrganizationManager,
    /// `s`, `ut` (any code but `OM`); optional `aa`.
    UltraCompactUserType,
    /// `sub`, `email`, `organizations` (array of `{organizationId, role}`).
    Standard,
    /// `sub`, `email`, no `organizations`.
    Legacy,
}

type ShapeParser = fn(&Payload) -> Option<Principal>;

const SHAPES: [(PayloadShape, ShapeParser); 5] = [
    (PayloadShape::UltraCompact, parse_ultra_compact),
    (PayloadShape::OrganizationManager, parse_organization_manager),
    (PayloadShape::UltraCompactUserType, parse_ultra_compact_user_type),
    (PayloadShape::Standard, parse_standard),
    (PayloadShape::Legacy, parse_legacy),
];

/// Build the canonical principal for `payload`.
pub fn normalize(payload: &Payload) -> Result<Principal, AuthzError> {
    normalize_with_shape(payload).map(|(_, principal)| principal)
}

/// Like [`normalize`], also reporting which shape matched.
pub fn normalize_with_shape(payload: &Payload) -> Result<(PayloadShape, Principal), AuthzError> {
    for (shape, parse) in SHAPES {
        if let Some(principal) = parse(payload) {
            tracing::debug!(
                ?shape,
                principal_id = %principal.id(),
                memberships = principal.memberships().len(),
                rejected = principal.rejected().len(),
                "normalized token payload"
            );
            return Ok((shape, principal));
        }
    }

    let keys: Vec<&str> = payload.keys().map(String::as_str).collect();
    tracing::debug!(?keys, "token payload matches no known shape");
    Err(AuthzError::InvalidTokenFormat(format!(
        "no known payload shape matches keys {keys:?}"
    )))
}

/// Normalize an untyped JSON value; anything but an object is rejected.
pub fn normalize_value(value: &Value) -> Result<Principal, AuthzError> {
    let payload = value
        .as_object()
        .ok_or_else(|| {
            AuthzError::InvalidTokenFormat("payload is not a JSON object".to_string())
        })?;
    normalize(payload)
}

/// Organizations the principal administers, from an `aa` map of
/// `organizationId -> 1|0`. Presence in the set means admin access.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdminAccess(BTreeSet<OrganizationId>);

impl AdminAccess {
    /// Collect truthy keys. Keys that are not valid organization ids come back as
    /// rejected entries.
    pub fn from_map(map: &Map<String, Value>) -> (Self, Vec<RejectedEntry>) {
        let mut organizations = BTreeSet::new();
        let mut rejected = Vec::new();

        for key in map
            .iter()
            .filter(|(_, flag)| is_truthy(flag))
            .map(|(key, _)| key)
        {
            match OrganizationId::parse(key) {
                Ok(id) => {
                    organizations.insert(id);
                }
                Err(e) => rejected.push(RejectedEntry {
                    raw: key.clone(),
                    organization_hint: Some(key.clone()),
                    error: e.into(),
                }),
            }
        }

        (Self(organizations), rejected)
    }

    pub fn contains(&self, organization_id: &OrganizationId) -> bool {
        self.0.contains(organization_id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// One ADMIN membership per organization, in numeric order.
    pub fn memberships(&self) -> impl Iterator<Item = Membership> + '_ {
        self.0
            .iter()
            .map(|id| Membership::new(id.clone(), Role::Admin))
    }
}

fn parse_ultra_compact(payload: &Payload) -> Option<Principal> {
    let id = subject(field(payload, "s")?)?;
    let email = field(payload, "e")?.as_str()?;
    let entries = field(payload, "o")?.as_array()?;

    let mut builder = compact_profile(Principal::builder(id).email(email), payload);
    if let Some(code) = field(payload, "t").and_then(Value::as_str) {
        builder = builder.user_type(UserType::from_code(code));
    }
    builder = builder.global_admin(field(payload, "g").is_some_and(is_truthy));

    Some(
        entries
            .iter()
            .fold(builder, add_compact_entry)
            .build(),
    )
}

fn parse_organization_manager(payload: &Payload) -> Option<Principal> {
    let id = subject(field(payload, "s")?)?;
    if field(payload, "ut")?.as_str()? != UserType::OrganizationManager.code() {
        return None;
    }
    let access = field(payload, "aa")?.as_object()?;

    let builder = compact_profile(Principal::builder(id), payload)
        .user_type(UserType::OrganizationManager)
        .global_admin(false);
    Some(with_admin_access(builder, access).build())
}

fn parse_ultra_compact_user_type(payload: &Payload) -> Option<Principal> {
    let id = subject(field(payload, "s")?)?;
    let user_type = UserType::from_code(field(payload, "ut")?.as_str()?);
    // Manager tokens without an admin-access map are not a known shape.
    if user_type == UserType::OrganizationManager {
        return None;
    }

    let mut builder = compact_profile(Principal::builder(id), payload)
        .global_admin(user_type.grants_global_admin())
        .user_type(user_type);
    if let Some(access) = field(payload, "aa") {
        builder = with_admin_access(builder, access.as_object()?);
    }
    Some(builder.build())
}

fn parse_standard(payload: &Payload) -> Option<Principal> {
    let id = subject(field(payload, "sub")?)?;
    let email = field(payload, "email")?.as_str()?;
    let organizations = field(payload, "organizations")?.as_array()?;

    let builder = standard_profile(Principal::builder(id).email(email), payload);
    Some(
        organizations
            .iter()
            .fold(builder, add_standard_membership)
            .build(),
    )
}

fn parse_legacy(payload: &Payload) -> Option<Principal> {
    let id = subject(field(payload, "sub")?)?;
    let email = field(payload, "email")?.as_str()?;
    if field(payload, "organizations").is_some() {
        return None;
    }

    Some(standard_profile(Principal::builder(id).email(email), payload).build())
}

/// Present and not `null`.
fn field<'a>(payload: &'a Payload, key: &str) -> Option<&'a Value> {
    payload.get(key).filter(|v| !v.is_null())
}

/// Subjects are opaque strings; numeric subjects are accepted as their digits.
fn subject(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Flags are integers in compact tokens; `1` and `true` are set, anything else is not.
fn is_truthy(value: &Value) -> bool {
    matches!(value, Value::Bool(true)) || value.as_u64() == Some(1)
}

fn institute_ids(value: &Value) -> Vec<InstituteId> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(InstituteId::new(s.as_str())),
                    Value::Number(n) => Some(InstituteId::new(n.to_string())),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default()
}

fn compact_profile(mut builder: PrincipalBuilder, payload: &Payload) -> PrincipalBuilder {
    if let Some(email) = field(payload, "e").and_then(Value::as_str) {
        builder = builder.email(email);
    }
    if let Some(name) = field(payload, "n").and_then(Value::as_str) {
        builder = builder.display_name(name);
    }
    if let Some(ids) = field(payload, "ins") {
        builder = builder.institute_ids(institute_ids(ids));
    }
    builder
}

fn standard_profile(mut builder: PrincipalBuilder, payload: &Payload) -> PrincipalBuilder {
    if let Some(name) = field(payload, "name").and_then(Value::as_str) {
        builder = builder.display_name(name);
    }
    if let Some(user_type) = field(payload, "userType").and_then(Value::as_str) {
        builder = builder.user_type(UserType::parse(user_type));
    }
    if let Some(ids) = field(payload, "instituteIds") {
        builder = builder.institute_ids(institute_ids(ids));
    }
    builder.global_admin(field(payload, "isGlobalAdmin").is_some_and(is_truthy))
}

fn with_admin_access(builder: PrincipalBuilder, map: &Map<String, Value>) -> PrincipalBuilder {
    let (access, rejected) = AdminAccess::from_map(map);
    let builder = builder.memberships(access.memberships());
    rejected.into_iter().fold(builder, PrincipalBuilder::reject)
}

fn add_compact_entry(builder: PrincipalBuilder, entry: &Value) -> PrincipalBuilder {
    let Some(raw) = entry.as_str() else {
        return builder.reject(RejectedEntry {
            raw: entry.to_string(),
            organization_hint: None,
            error: AuthzError::InvalidTokenFormat("membership entry is not a string".to_string()),
        });
    };

    match codec::decode_entry(raw) {
        Ok(membership) => builder.membership(membership),
        Err(rejected) => builder.reject(rejected),
    }
}

fn add_standard_membership(builder: PrincipalBuilder, entry: &Value) -> PrincipalBuilder {
    let organization_id = entry.get("organizationId").and_then(|v| match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    });
    let role = entry.get("role").and_then(Value::as_str);

    let (Some(organization_id), Some(role)) = (organization_id.clone(), role) else {
        return builder.reject(RejectedEntry {
            raw: entry.to_string(),
            organization_hint: organization_id,
            error: AuthzError::InvalidTokenFormat(
                "organization entry needs organizationId and role".to_string(),
            ),
        });
    };

    let membership = OrganizationId::parse(&organization_id)
        .map_err(AuthzError::from)
        .and_then(|id| Ok(Membership::new(id, parse_role(role)?)));

    match membership {
        Ok(membership) => builder.membership(membership),
        Err(error) => builder.reject(RejectedEntry {
            raw: entry.to_string(),
            organization_hint: Some(organization_id),
            error,
        }),
    }
}

/// Role names (`"ADMIN"`) or a lone role code (`"A"`).
fn parse_role(raw: &str) -> Result<Role, AuthzError> {
    let mut chars = raw.chars();
    if let (Some(code), None) = (chars.next(), chars.next()) {
        if let Some(role) = codec::role_from_code(code) {
            return Ok(role);
        }
    }
    raw.parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(value: Value) -> Payload {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    fn org(id: &str) -> OrganizationId {
        OrganizationId::parse(id).unwrap()
    }

    fn shape_of(value: Value) -> PayloadShape {
        normalize_with_shape(&payload(value)).unwrap().0
    }

    #[test]
    fn ultra_compact_with_organizations() {
        let principal = normalize(&payload(json!({
            "s": "9",
            "e": "a@b.com",
            "o": ["P66"]
        })))
        .unwrap();

        assert_eq!(principal.id(), "9");
        assert_eq!(principal.email(), Some("a@b.com"));
        assert_eq!(
            principal.memberships(),
            &[Membership::new(org("66"), Role::President)]
        );
        assert!(!principal.is_global_admin());
        assert!(principal.user_type().is_none());
    }

    #[test]
    fn ultra_compact_optional_fields() {
        let principal = normalize(&payload(json!({
            "s": 9,
            "e": "a@b.com",
            "n": "Ada",
            "o": ["A12", "M7"],
            "ins": ["inst-1", 42],
            "t": "TE",
            "g": 1
        })))
        .unwrap();

        assert_eq!(principal.id(), "9");
        assert_eq!(principal.display_name(), Some("Ada"));
        assert_eq!(principal.user_type(), Some(&UserType::Teacher));
        assert!(principal.is_global_admin());
        let ids: Vec<&str> = principal.institute_ids().iter().map(|i| i.as_str()).collect();
        assert_eq!(ids, vec!["inst-1", "42"]);
        assert_eq!(principal.memberships().len(), 2);
    }

    #[test]
    fn global_admin_flag_requires_one() {
        for (g, expected) in [
            (json!(1), true),
            (json!(true), true),
            (json!(0), false),
            (json!("1"), false),
            (json!(2), false),
        ] {
            let principal = normalize(&payload(json!({
                "s": "9", "e": "a@b.com", "o": [], "g": g
            })))
            .unwrap();
            assert_eq!(principal.is_global_admin(), expected);
        }
    }

    #[test]
    fn bad_compact_entries_are_skipped_not_fatal() {
        let principal = normalize(&payload(json!({
            "s": "9",
            "e": "a@b.com",
            "o": ["P66", "X12", "A012", 7, "M7"]
        })))
        .unwrap();

        let held: Vec<&str> = principal
            .memberships()
            .iter()
            .map(|m| m.organization_id.as_str())
            .collect();
        assert_eq!(held, vec!["66", "7"]);

        let errors: Vec<&AuthzError> = principal.rejected().iter().map(|r| &r.error).collect();
        assert_eq!(errors.len(), 3);
        assert_eq!(errors[0], &AuthzError::InvalidRoleCode("X".to_string()));
        assert!(matches!(errors[1], AuthzError::InvalidOrganizationId(_)));
        assert!(matches!(errors[2], AuthzError::InvalidTokenFormat(_)));
        assert_eq!(principal.rejected()[0].organization_hint.as_deref(), Some("12"));
    }

    #[test]
    fn organization_manager_shape_keeps_truthy_keys_only() {
        let (shape, principal) = normalize_with_shape(&payload(json!({
            "s": "31",
            "ut": "OM",
            "aa": { "12": 1, "13": 0, "66": 1 }
        })))
        .unwrap();

        assert_eq!(shape, PayloadShape::OrganizationManager);
        assert_eq!(principal.user_type(), Some(&UserType::OrganizationManager));
        assert!(!principal.is_global_admin());
        assert_eq!(
            principal.memberships(),
            &[
                Membership::new(org("12"), Role::Admin),
                Membership::new(org("66"), Role::Admin),
            ]
        );
    }

    #[test]
    fn generic_user_type_shape() {
        let (shape, principal) = normalize_with_shape(&payload(json!({
            "s": "4",
            "ut": "IA",
            "aa": { "8": 1, "x": 1 }
        })))
        .unwrap();

        assert_eq!(shape, PayloadShape::UltraCompactUserType);
        assert_eq!(principal.user_type(), Some(&UserType::InstituteAdmin));
        assert!(!principal.is_global_admin());
        assert_eq!(principal.memberships(), &[Membership::new(org("8"), Role::Admin)]);
        assert_eq!(principal.rejected().len(), 1);
    }

    #[test]
    fn super_and_global_admin_codes_grant_global_admin() {
        for code in ["SA", "GA"] {
            let principal = normalize(&payload(json!({ "s": "1", "ut": code }))).unwrap();
            assert!(principal.is_global_admin(), "{code}");
            assert!(principal.memberships().is_empty());
        }
        let other = normalize(&payload(json!({ "s": "1", "ut": "QQ" }))).unwrap();
        assert!(!other.is_global_admin());
        assert_eq!(other.user_type(), Some(&UserType::Other("QQ".to_string())));
    }

    #[test]
    fn organization_manager_without_admin_map_is_rejected() {
        for value in [
            json!({ "s": "31", "ut": "OM" }),
            json!({ "s": "31", "ut": "OM", "aa": null }),
            json!({ "s": "31", "ut": "OM", "aa": [12] }),
        ] {
            assert!(
                matches!(
                    normalize_with_shape(&payload(value.clone())),
                    Err(AuthzError::InvalidTokenFormat(_))
                ),
                "expected rejection of {value}"
            );
        }
    }

    #[test]
    fn standard_shape_builds_memberships_as_given() {
        let principal = normalize(&payload(json!({
            "sub": "9",
            "email": "a@b.com",
            "name": "Ada",
            "organizations": [
                { "organizationId": "12", "role": "ADMIN" },
                { "organizationId": 66, "role": "president" },
                { "organizationId": "7", "role": "O" }
            ]
        })))
        .unwrap();

        assert_eq!(principal.display_name(), Some("Ada"));
        assert_eq!(
            principal.memberships(),
            &[
                Membership::new(org("12"), Role::Admin),
                Membership::new(org("66"), Role::President),
                Membership::new(org("7"), Role::Moderator),
            ]
        );
    }

    #[test]
    fn standard_shape_rejects_bad_entries_individually() {
        let principal = normalize(&payload(json!({
            "sub": "9",
            "email": "a@b.com",
            "organizations": [
                { "organizationId": "12", "role": "OWNER" },
                { "organizationId": "012", "role": "ADMIN" },
                { "role": "ADMIN" },
                "P5",
                { "organizationId": "5", "role": "MEMBER" }
            ]
        })))
        .unwrap();

        assert_eq!(principal.memberships(), &[Membership::new(org("5"), Role::Member)]);
        assert_eq!(principal.rejected().len(), 4);
        assert_eq!(
            principal.find_membership(&org("12")),
            Err(AuthzError::InvalidRoleCode("OWNER".to_string()))
        );
    }

    #[test]
    fn standard_shape_reads_optional_user_fields() {
        let principal = normalize(&payload(json!({
            "sub": "9",
            "email": "a@b.com",
            "organizations": [],
            "userType": "ORGANIZATION_MANAGER",
            "isGlobalAdmin": true,
            "instituteIds": ["i-1"]
        })))
        .unwrap();

        assert!(principal.is_organization_manager());
        assert!(principal.is_global_admin());
        assert_eq!(principal.institute_ids().len(), 1);
    }

    #[test]
    fn legacy_shape_has_no_memberships() {
        let (shape, principal) =
            normalize_with_shape(&payload(json!({ "sub": "9", "email": "a@b.com" }))).unwrap();

        assert_eq!(shape, PayloadShape::Legacy);
        assert_eq!(principal.id(), "9");
        assert!(principal.memberships().is_empty());
    }

    #[test]
    fn null_organizations_counts_as_absent() {
        assert_eq!(
            shape_of(json!({ "sub": "9", "email": "a@b.com", "organizations": null })),
            PayloadShape::Legacy
        );
    }

    #[test]
    fn detection_order_prefers_compact_shapes() {
        assert_eq!(
            shape_of(json!({ "s": "1", "e": "x@y.z", "o": [], "ut": "OM", "aa": {} })),
            PayloadShape::UltraCompact
        );
        assert_eq!(
            shape_of(json!({ "s": "1", "ut": "OM", "aa": {}, "sub": "1", "email": "x@y.z" })),
            PayloadShape::OrganizationManager
        );
        assert_eq!(
            shape_of(json!({ "s": "1", "e": "x@y.z", "sub": "1", "email": "x@y.z", "organizations": [] })),
            PayloadShape::Standard
        );
    }

    #[test]
    fn unknown_shapes_are_rejected() {
        for value in [
            json!({ "foo": "bar" }),
            json!({}),
            json!({ "s": "1", "e": "x@y.z" }),
            json!({ "s": "1", "e": "x@y.z", "o": "P66" }),
            json!({ "sub": "1" }),
            json!({ "sub": "1", "email": "x@y.z", "organizations": "12" }),
            json!({ "s": "", "ut": "OM", "aa": {} }),
        ] {
            assert!(
                matches!(
                    normalize(&payload(value.clone())),
                    Err(AuthzError::InvalidTokenFormat(_))
                ),
                "expected rejection of {value}"
            );
        }
    }

    #[test]
    fn non_object_values_are_rejected() {
        assert!(matches!(
            normalize_value(&json!(["s", "e"])),
            Err(AuthzError::InvalidTokenFormat(_))
        ));
        assert!(normalize_value(&json!({ "sub": "1", "email": "x@y.z" })).is_ok());
    }

    #[test]
    fn admin_access_set_membership() {
        let map = payload(json!({ "5": 1, "6": 0, "007": 1, "8": true }));
        let (access, rejected) = AdminAccess::from_map(&map);

        assert_eq!(access.len(), 2);
        assert!(access.contains(&org("5")));
        assert!(!access.contains(&org("6")));
        assert!(access.contains(&org("8")));
        assert_eq!(rejected.len(), 1);
        assert_eq!(rejected[0].raw, "007");
    }
}
