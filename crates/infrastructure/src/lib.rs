//! Infrastructure adapters for access-control ports.

#![forbid(unsafe_code)]

mod in_memory_audit_repository;
mod in_memory_business_context_repository;
mod in_memory_role_assignment_repository;
mod postgres_audit_repository;
mod postgres_business_context_repository;
mod postgres_errors;
mod postgres_role_assignment_repository;

#[cfg(test)]
mod postgres_test_support;

pub use in_memory_audit_repository::InMemoryAuditRepository;
pub use in_memory_business_context_repository::InMemoryBusinessContextRepository;
pub use in_memory_role_assignment_repository::InMemoryRoleAssignmentRepository;
pub use postgres_audit_repository::PostgresAuditRepository;
pub use postgres_business_context_repository::PostgresBusinessContextRepository;
pub use postgres_role_assignment_repository::PostgresRoleAssignmentRepository;
