//! Token-local access decisions.
//!
//! - No IO
//! - No panics
//! - No lookups beyond the principal itself

use serde::Serialize;

use orgkey_core::OrganizationId;

use crate::{AuthzError, EffectiveRole, Membership, Principal, Role};

/// What an operation scoped to one organization demands of the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessRequirement {
    /// Raw target id as supplied by routing; validated by [`decide`].
    pub organization_id: String,
    /// Any-of role list; empty means any membership suffices.
    pub required_roles: Vec<Role>,
    pub allow_global_admin_bypass: bool,
}

impl AccessRequirement {
    pub fn new(organization_id: impl Into<String>, required_roles: impl Into<Vec<Role>>) -> Self {
        Self {
            organization_id: organization_id.into(),
            required_roles: required_roles.into(),
            allow_global_admin_bypass: true,
        }
    }

    /// Any membership in the organization suffices.
    pub fn any_member(organization_id: impl Into<String>) -> Self {
        Self::new(organization_id, Vec::<Role>::new())
    }

    pub fn with_global_admin_bypass(mut self, allow: bool) -> Self {
        self.allow_global_admin_bypass = allow;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialKind {
    InvalidTokenFormat,
    InvalidOrganizationId,
    InvalidRoleCode,
    NotAMember,
    InsufficientRole,
}

/// Result of evaluating a principal against one requirement.
///
/// Denials are data: the transport layer decides how to render them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessDecision {
    pub granted: bool,
    pub effective_role: Option<EffectiveRole>,
    pub reason: Option<DenialKind>,
    /// Role actually held, set on `InsufficientRole`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_role: Option<Role>,
    /// Role set that was not met, set on `InsufficientRole`.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub required_roles: Vec<Role>,
}

impl AccessDecision {
    pub fn granted(role: EffectiveRole) -> Self {
        Self {
            granted: true,
            effective_role: Some(role),
            reason: None,
            actual_role: None,
            required_roles: Vec::new(),
        }
    }

    pub fn denied(reason: DenialKind) -> Self {
        Self {
            granted: false,
            effective_role: None,
            reason: Some(reason),
            actual_role: None,
            required_roles: Vec::new(),
        }
    }
}

impl From<AuthzError> for AccessDecision {
    fn from(value: AuthzError) -> Self {
        match value {
            AuthzError::InsufficientRole { actual, required } => Self {
                actual_role: Some(actual),
                required_roles: required,
                ..Self::denied(DenialKind::InsufficientRole)
            },
            other => Self::denied(other.kind()),
        }
    }
}

/// Evaluate `requirement` for `principal`; the `?`-friendly form of [`decide`].
///
/// Checks run in a fixed order and the first applicable one wins:
/// 1. the target id must be a well-formed digit string greater than zero;
/// 2. organization managers are granted unconditionally;
/// 3. global admins are granted when the requirement allows the bypass;
/// 4. the principal must hold a membership for exactly that organization;
/// 5. the membership role must meet the requirement.
pub fn authorize(
    principal: &Principal,
    requirement: &AccessRequirement,
) -> Result<EffectiveRole, AuthzError> {
    let organization_id = OrganizationId::parse(&requirement.organization_id)?;
    if !organization_id.is_positive() {
        return Err(AuthzError::InvalidOrganizationId(format!(
            "{:?}: must be greater than zero",
            requirement.organization_id
        )));
    }

    if principal.is_organization_manager() {
        return Ok(EffectiveRole::OrganizationManager);
    }

    if requirement.allow_global_admin_bypass && principal.is_global_admin() {
        return Ok(EffectiveRole::GlobalAdmin);
    }

    let membership = principal
        .find_membership(&organization_id)?
        .ok_or_else(|| AuthzError::NotAMember(organization_id.to_string()))?;

    if !membership.role.meets_requirement(&requirement.required_roles) {
        return Err(AuthzError::InsufficientRole {
            actual: membership.role,
            required: requirement.required_roles.clone(),
        });
    }

    Ok(EffectiveRole::Role(membership.role))
}

/// Decide whether `principal` satisfies `requirement`.
pub fn decide(principal: &Principal, requirement: &AccessRequirement) -> AccessDecision {
    let decision = match authorize(principal, requirement) {
        Ok(role) => AccessDecision::granted(role),
        Err(e) => AccessDecision::from(e),
    };

    tracing::debug!(
        principal_id = %principal.id(),
        organization_id = %requirement.organization_id,
        granted = decision.granted,
        effective_role = decision.effective_role.map(EffectiveRole::as_str),
        reason = ?decision.reason,
        "access decision"
    );

    decision
}

/// A decision for one organization in a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationDecision {
    pub organization_id: String,
    pub decision: AccessDecision,
}

impl OrganizationDecision {
    pub fn evaluate(principal: &Principal, requirement: AccessRequirement) -> Self {
        Self {
            decision: decide(principal, &requirement),
            organization_id: requirement.organization_id,
        }
    }
}

/// Apply [`decide`] to each id independently (global-admin bypass allowed).
///
/// Not a transaction: one denial does not affect the others.
pub fn decide_many<I, S>(
    principal: &Principal,
    organization_ids: I,
    required_roles: &[Role],
) -> Vec<OrganizationDecision>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    organization_ids
        .into_iter()
        .map(|id| {
            OrganizationDecision::evaluate(
                principal,
                AccessRequirement::new(id.as_ref(), required_roles.to_vec()),
            )
        })
        .collect()
}

/// Memberships held by `principal`, optionally only those with `role`.
pub fn memberships_by_role(principal: &Principal, role: Option<Role>) -> Vec<Membership> {
    principal
        .memberships()
        .iter()
        .filter(|m| role.is_none_or(|r| m.role == r))
        .cloned()
        .collect()
}

/// `true` for global admins and for anyone holding ADMIN or PRESIDENT somewhere.
pub fn is_admin_anywhere(principal: &Principal) -> bool {
    principal.is_global_admin() || principal.memberships().iter().any(|m| m.role.is_admin())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{RejectedEntry, UserType};

    fn org(id: &str) -> OrganizationId {
        OrganizationId::parse(id).unwrap()
    }

    fn member_of(memberships: &[(&str, Role)]) -> Principal {
        Principal::builder("user-1")
            .email("alice@example.com")
            .memberships(
                memberships
                    .iter()
                    .map(|(id, role)| Membership::new(org(id), *role)),
            )
            .build()
    }

    #[test]
    fn member_with_required_role_is_granted() {
        let principal = member_of(&[("12", Role::Admin)]);
        let decision = decide(&principal, &AccessRequirement::new("12", vec![Role::Admin]));

        assert!(decision.granted);
        assert_eq!(decision.effective_role, Some(EffectiveRole::Role(Role::Admin)));
        assert_eq!(decision.reason, None);
    }

    #[test]
    fn malformed_or_zero_target_is_rejected_first() {
        let principal = Principal::builder("om")
            .user_type(UserType::OrganizationManager)
            .build();

        for bad in ["", "0", "012", "abc", "-3", "1000000000000000"] {
            let decision = decide(&principal, &AccessRequirement::any_member(bad));
            assert!(!decision.granted);
            assert_eq!(decision.reason, Some(DenialKind::InvalidOrganizationId), "{bad:?}");
        }
    }

    #[test]
    fn organization_manager_bypass_ignores_the_global_admin_flag() {
        let principal = Principal::builder("om")
            .user_type(UserType::OrganizationManager)
            .build();
        let requirement =
            AccessRequirement::new("98765", vec![Role::President]).with_global_admin_bypass(false);

        let decision = decide(&principal, &requirement);
        assert!(decision.granted);
        assert_eq!(decision.effective_role, Some(EffectiveRole::OrganizationManager));
    }

    #[test]
    fn global_admin_bypass_is_optional() {
        let principal = Principal::builder("root").global_admin(true).build();

        let allowed = decide(&principal, &AccessRequirement::new("5", vec![Role::President]));
        assert!(allowed.granted);
        assert_eq!(allowed.effective_role, Some(EffectiveRole::GlobalAdmin));

        let strict = AccessRequirement::new("5", vec![Role::President]).with_global_admin_bypass(false);
        let denied = decide(&principal, &strict);
        assert!(!denied.granted);
        assert_eq!(denied.reason, Some(DenialKind::NotAMember));
    }

    #[test]
    fn global_admin_without_bypass_falls_back_to_membership() {
        let principal = Principal::builder("root")
            .global_admin(true)
            .membership(Membership::new(org("5"), Role::Moderator))
            .build();
        let strict = AccessRequirement::new("5", vec![Role::Moderator]).with_global_admin_bypass(false);

        let decision = decide(&principal, &strict);
        assert_eq!(decision.effective_role, Some(EffectiveRole::Role(Role::Moderator)));
    }

    #[test]
    fn suffix_of_another_organization_is_not_a_membership() {
        let principal = member_of(&[("66", Role::President), ("12", Role::Admin), ("7", Role::Member)]);

        for required in [vec![], vec![Role::Member], vec![Role::Admin]] {
            let decision = decide(&principal, &AccessRequirement::new("1", required));
            assert_eq!(decision.reason, Some(DenialKind::NotAMember));
        }
    }

    #[test]
    fn insufficient_role_carries_diagnostics() {
        let principal = member_of(&[("12", Role::Moderator)]);
        let decision = decide(&principal, &AccessRequirement::new("12", vec![Role::Admin]));

        assert!(!decision.granted);
        assert_eq!(decision.reason, Some(DenialKind::InsufficientRole));
        assert_eq!(decision.actual_role, Some(Role::Moderator));
        assert_eq!(decision.required_roles, vec![Role::Admin]);
    }

    #[test]
    fn listing_a_lower_role_lowers_the_bar() {
        let principal = member_of(&[("12", Role::Moderator)]);
        let decision = decide(
            &principal,
            &AccessRequirement::new("12", vec![Role::Admin, Role::Moderator]),
        );
        assert!(decision.granted);
    }

    #[test]
    fn rejected_entry_for_the_target_surfaces_its_error() {
        let principal = Principal::builder("user-1")
            .membership(Membership::new(org("66"), Role::Admin))
            .reject(RejectedEntry {
                raw: "Z12".to_string(),
                organization_hint: Some("12".to_string()),
                error: AuthzError::InvalidRoleCode("Z".to_string()),
            })
            .build();

        let target = decide(&principal, &AccessRequirement::any_member("12"));
        assert_eq!(target.reason, Some(DenialKind::InvalidRoleCode));

        let other = decide(&principal, &AccessRequirement::any_member("66"));
        assert!(other.granted);
    }

    #[test]
    fn authorize_returns_typed_errors() {
        let principal = member_of(&[("12", Role::Member)]);

        assert_eq!(
            authorize(&principal, &AccessRequirement::any_member("13")),
            Err(AuthzError::NotAMember("13".to_string()))
        );
        assert_eq!(
            authorize(&principal, &AccessRequirement::any_member("12")),
            Ok(EffectiveRole::Role(Role::Member))
        );
    }

    #[test]
    fn decide_many_is_independent_per_organization() {
        let principal = member_of(&[("12", Role::Admin), ("7", Role::Member)]);
        let results = decide_many(&principal, ["12", "7", "1", "bad"], &[Role::Admin]);

        let reasons: Vec<(&str, Option<DenialKind>)> = results
            .iter()
            .map(|r| (r.organization_id.as_str(), r.decision.reason))
            .collect();
        assert_eq!(
            reasons,
            vec![
                ("12", None),
                ("7", Some(DenialKind::InsufficientRole)),
                ("1", Some(DenialKind::NotAMember)),
                ("bad", Some(DenialKind::InvalidOrganizationId)),
            ]
        );
    }

    #[test]
    fn memberships_by_role_filters() {
        let principal = member_of(&[("12", Role::Admin), ("7", Role::Member), ("9", Role::Admin)]);

        assert_eq!(memberships_by_role(&principal, None).len(), 3);
        let admins: Vec<String> = memberships_by_role(&principal, Some(Role::Admin))
            .into_iter()
            .map(|m| m.organization_id.to_string())
            .collect();
        assert_eq!(admins, vec!["12", "9"]);
        assert!(memberships_by_role(&principal, Some(Role::President)).is_empty());
    }

    #[test]
    fn admin_anywhere_counts_admin_president_and_global_admin() {
        assert!(!is_admin_anywhere(&member_of(&[("1", Role::Moderator), ("2", Role::Member)])));
        assert!(is_admin_anywhere(&member_of(&[("1", Role::Member), ("2", Role::Admin)])));
        assert!(is_admin_anywhere(&member_of(&[("3", Role::President)])));
        assert!(is_admin_anywhere(&Principal::builder("root").global_admin(true).build()));
    }

    #[test]
    fn decision_serializes_for_transport() {
        let principal = member_of(&[("12", Role::Member)]);
        let decision = decide(&principal, &AccessRequirement::new("12", vec![Role::Admin]));
        let json = serde_json::to_value(&decision).unwrap();

        assert_eq!(json["granted"], false);
        assert_eq!(json["reason"], "insufficient_role");
        assert_eq!(json["actualRole"], "MEMBER");
        assert_eq!(json["requiredRoles"][0], "ADMIN");
    }
}
