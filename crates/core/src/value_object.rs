//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects are **immutable** and **compared by value**. Identifiers,
/// memberships and principals decoded from a token are all value objects: two
/// memberships naming the same organization and role are the same membership.
///
/// ```ignore
/// #[derive(Debug, Clone, PartialEq, Eq)]
/// struct Membership {
///     organization_id: OrganizationId,
///     role: Role,
/// }
///
/// impl ValueObject for Membership {}
/// ```
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
