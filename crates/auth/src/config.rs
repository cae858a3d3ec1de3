//! Runtime configuration for authorization decisions.

use serde::Deserialize;

use crate::authorize::{AccessRequirement, OrganizationDecision};
use crate::{Principal, Role};

pub const GLOBAL_ADMIN_BYPASS_ENV: &str = "ORGKEY_GLOBAL_ADMIN_BYPASS";
pub const MAX_LISTED_ORGANIZATIONS_ENV: &str = "ORGKEY_MAX_LISTED_ORGANIZATIONS";

const DEFAULT_MAX_LISTED_ORGANIZATIONS: usize = 500;

/// Deployment-level defaults. Embeddable in a host config via serde; missing
/// keys take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AuthzConfig {
    /// Default of [`AccessRequirement::allow_global_admin_bypass`].
    pub global_admin_bypass: bool,
    /// Upper bound on organizations evaluated by one listing call.
    pub max_listed_organizations: usize,
}

impl Default for AuthzConfig {
    fn default() -> Self {
        Self {
            global_admin_bypass: true,
            max_listed_organizations: DEFAULT_MAX_LISTED_ORGANIZATIONS,
        }
    }
}

impl AuthzConfig {
    /// Read overrides from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read overrides through `lookup`; unparsable values keep the default.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup(GLOBAL_ADMIN_BYPASS_ENV) {
            match parse_flag(&raw) {
                Some(flag) => config.global_admin_bypass = flag,
                None => tracing::warn!(
                    key = GLOBAL_ADMIN_BYPASS_ENV,
                    value = %raw,
                    "not a boolean; keeping default"
                ),
            }
        }

        if let Some(raw) = lookup(MAX_LISTED_ORGANIZATIONS_ENV) {
            match raw.trim().parse::<usize>() {
                Ok(max) if max > 0 => config.max_listed_organizations = max,
                _ => tracing::warn!(
                    key = MAX_LISTED_ORGANIZATIONS_ENV,
                    value = %raw,
                    "not a positive integer; keeping default"
                ),
            }
        }

        config
    }

    /// A requirement carrying this deployment's bypass default.
    pub fn requirement(
        &self,
        organization_id: impl Into<String>,
        required_roles: impl Into<Vec<Role>>,
    ) -> AccessRequirement {
        AccessRequirement::new(organization_id, required_roles)
            .with_global_admin_bypass(self.global_admin_bypass)
    }

    /// [`crate::authorize::decide_many`] bounded by `max_listed_organizations`, using
    /// this deployment's bypass default.
    pub fn decide_many<I, S>(
        &self,
        principal: &Principal,
        organization_ids: I,
        required_roles: &[Role],
    ) -> Vec<OrganizationDecision>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut ids = organization_ids.into_iter();
        let decisions: Vec<OrganizationDecision> = ids
            .by_ref()
            .take(self.max_listed_organizations)
            .map(|id| {
                OrganizationDecision::evaluate(
                    principal,
                    self.requirement(id.as_ref(), required_roles.to_vec()),
                )
            })
            .collect();

        let dropped = ids.count();
        if dropped > 0 {
            tracing::warn!(
                principal_id = %principal.id(),
                limit = self.max_listed_organizations,
                dropped,
                "organization listing truncated"
            );
        }

        decisions
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
