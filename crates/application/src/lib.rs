//! Application services and ports for scoped role-based access control.

#![forbid(unsafe_code)]

mod access_ports;
mod business_context_service;
mod permission_evaluator;
mod role_assignment_service;

#[cfg(test)]
mod test_support;

pub use access_ports::{
    AuditEvent, AuditRepository, BusinessContextRepository, Clock, RoleAssignmentRepository,
    SystemClock,
};
pub use business_context_service::{BusinessContextService, ContextStatistics};
pub use permission_evaluator::{
    PermissionContext, PermissionDecision, PermissionEvaluator, PermissionGrant,
};
pub use role_assignment_service::{AssignRoleInput, RoleAssignmentService};
