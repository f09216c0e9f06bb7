//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod assignment;
mod catalog;
mod context;
mod role;
mod security;
mod user;

pub use assignment::{
    AssignmentScope, NewRoleAssignment, Revocation, RoleAssignment, RoleAssignmentId,
    RoleAssignmentParts, ScopeBinding, is_assignment_effective,
};
pub use catalog::{PermissionCatalog, SubscriptionTier};
pub use context::{
    BusinessContext, BusinessContextId, BusinessContextInput, BusinessContextParts, ContextPath,
    ContextType,
};
pub use role::Role;
pub use security::{AuditAction, Permission, PermissionCategory};
pub use user::UserId;
