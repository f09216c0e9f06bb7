use std::sync::Arc;

use rendezvous_application::{
    AuditRepository, BusinessContextRepository, BusinessContextService, Clock,
    PermissionEvaluator, RoleAssignmentRepository, RoleAssignmentService,
};
use rendezvous_domain::PermissionCatalog;
use rendezvous_infrastructure::{
    PostgresAuditRepository, PostgresBusinessContextRepository, PostgresRoleAssignmentRepository,
};
use sqlx::PgPool;

/// Access services wired over one set of stores.
#[derive(Clone)]
pub struct AdminServices {
    pub evaluator: PermissionEvaluator,
    pub contexts: BusinessContextService,
    pub assignments: RoleAssignmentService,
}

impl AdminServices {
    pub fn new(
        context_repository: Arc<dyn BusinessContextRepository>,
        assignment_repository: Arc<dyn RoleAssignmentRepository>,
        audit_repository: Arc<dyn AuditRepository>,
        catalog: PermissionCatalog,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let evaluator = PermissionEvaluator::new(
            assignment_repository.clone(),
            context_repository.clone(),
            Arc::new(catalog),
            clock.clone(),
        );
        let contexts = BusinessContextService::new(
            context_repository.clone(),
            assignment_repository.clone(),
            audit_repository.clone(),
            clock.clone(),
        );
        let assignments = RoleAssignmentService::new(
            evaluator.clone(),
            assignment_repository,
            context_repository,
            audit_repository,
            clock,
        );

        Self {
            evaluator,
            contexts,
            assignments,
        }
    }

    pub fn postgres(pool: PgPool, catalog: PermissionCatalog, clock: Arc<dyn Clock>) -> Self {
        Self::new(
            Arc::new(PostgresBusinessContextRepository::new(pool.clone())),
            Arc::new(PostgresRoleAssignmentRepository::new(pool.clone())),
            Arc::new(PostgresAuditRepository::new(pool)),
            catalog,
            clock,
        )
    }
}
