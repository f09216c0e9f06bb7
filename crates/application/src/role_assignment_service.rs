use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::info;

use rendezvous_core::{AppError, AppResult, DenialReason, PermissionDenial};
use rendezvous_domain::{
    AssignmentScope, AuditAction, BusinessContext, BusinessContextId, ContextType,
    NewRoleAssignment, Permission, Revocation, Role, RoleAssignment, RoleAssignmentId,
    ScopeBinding, UserId, is_assignment_effective,
};

use crate::access_ports::{
    AuditEvent, AuditRepository, BusinessContextRepository, Clock, RoleAssignmentRepository,
};
use crate::permission_evaluator::{PermissionContext, PermissionEvaluator};

/// Input payload for granting a role.
#[derive(Debug, Clone, PartialEq)]
pub struct AssignRoleInput {
    /// User receiving the role.
    pub user_id: UserId,
    /// Granted role.
    pub role: Role,
    /// Requested scope granularity.
    pub scope: AssignmentScope,
    /// Owning business.
    pub business_id: BusinessContextId,
    /// Location for LOCATION and DEPARTMENT scopes.
    pub location_id: Option<BusinessContextId>,
    /// Department for DEPARTMENT scope.
    pub department_id: Option<BusinessContextId>,
    /// Optional expiry instant.
    pub expires_at: Option<DateTime<Utc>>,
    /// Optional free-form note.
    pub notes: Option<String>,
    /// Free-form JSON object.
    pub metadata: Value,
}

/// Application service for granting and revoking scoped roles.
#[derive(Clone)]
pub struct RoleAssignmentService {
    evaluator: PermissionEvaluator,
    repository: Arc<dyn RoleAssignmentRepository>,
    context_repository: Arc<dyn BusinessContextRepository>,
    audit_repository: Arc<dyn AuditRepository>,
    clock: Arc<dyn Clock>,
}

impl RoleAssignmentService {
    /// Creates a new service from required dependencies.
    #[must_use]
    pub fn new(
        evaluator: PermissionEvaluator,
        repository: Arc<dyn RoleAssignmentRepository>,
        context_repository: Arc<dyn BusinessContextRepository>,
        audit_repository: Arc<dyn AuditRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            evaluator,
            repository,
            context_repository,
            audit_repository,
            clock,
        }
    }

    /// Grants a role at the requested scope.
    ///
    /// The assigner needs `MANAGE_ROLES` over the target scope and must
    /// outrank the granted role unless they are a platform admin.
    pub async fn assign(
        &self,
        assigned_by: UserId,
        input: AssignRoleInput,
    ) -> AppResult<RoleAssignment> {
        let binding = ScopeBinding::resolve(
            input.scope,
            input.business_id,
            input.location_id,
            input.department_id,
        )?;

        self.authorize_management(assigned_by, &binding, input.role)
            .await?;
        self.ensure_binding_matches_hierarchy(&binding).await?;

        let assignment = RoleAssignment::new(
            NewRoleAssignment {
                user_id: input.user_id,
                role: input.role,
                binding,
                assigned_by,
                expires_at: input.expires_at,
                notes: input.notes,
                metadata: input.metadata,
            },
            self.clock.now(),
        )?;

        self.persist_grant(&assignment).await?;
        Ok(assignment)
    }

    /// Bootstraps the first owner of a business that has no active assignments.
    ///
    /// The granter needs `CREATE_BUSINESS` over the business. Nobody holds a
    /// role there yet, so in practice only platform admins pass.
    pub async fn grant_initial_owner(
        &self,
        granted_by: UserId,
        business_id: BusinessContextId,
        owner_id: UserId,
    ) -> AppResult<RoleAssignment> {
        self.evaluator
            .require_permission(
                granted_by,
                Permission::CreateBusiness,
                &PermissionContext::at(business_id),
            )
            .await?;

        let business = self.load_context(business_id).await?;
        if business.context_type() != ContextType::Business || !business.is_active() {
            return Err(AppError::Validation(format!(
                "context '{business_id}' is not an active BUSINESS"
            )));
        }

        let now = self.clock.now();
        let existing = self
            .repository
            .list_active_for_context(business_id, now)
            .await?;
        if existing
            .iter()
            .any(|assignment| is_assignment_effective(assignment, now))
        {
            return Err(AppError::Conflict(format!(
                "business '{business_id}' already has active role assignments"
            )));
        }

        let assignment = RoleAssignment::new(
            NewRoleAssignment {
                user_id: owner_id,
                role: Role::BusinessOwner,
                binding: ScopeBinding::Business { business_id },
                assigned_by: granted_by,
                expires_at: None,
                notes: Some("initial owner".to_owned()),
                metadata: Value::Null,
            },
            now,
        )?;

        self.persist_grant(&assignment).await?;
        Ok(assignment)
    }

    /// Returns the user's assignments that are active and unexpired.
    pub async fn find_active_by_user(&self, user_id: UserId) -> AppResult<Vec<RoleAssignment>> {
        self.evaluator.active_assignments(user_id).await
    }

    /// Returns one assignment, whatever its state.
    pub async fn get(&self, assignment_id: RoleAssignmentId) -> AppResult<RoleAssignment> {
        self.repository
            .find_assignment(assignment_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("role assignment '{assignment_id}'")))
    }

    /// Lists effective assignments referencing a context, for role managers of it.
    pub async fn list_for_context(
        &self,
        actor: UserId,
        context_id: BusinessContextId,
    ) -> AppResult<Vec<RoleAssignment>> {
        self.evaluator
            .require_permission(
                actor,
                Permission::ManageRoles,
                &PermissionContext::at(context_id),
            )
            .await?;

        let now = self.clock.now();
        let mut assignments: Vec<RoleAssignment> = self
            .repository
            .list_active_for_context(context_id, now)
            .await?
            .into_iter()
            .filter(|assignment| is_assignment_effective(assignment, now))
            .collect();

        assignments.sort_by(|left, right| {
            right
                .role()
                .rank()
                .cmp(&left.role().rank())
                .then_with(|| left.assigned_at().cmp(&right.assigned_at()))
        });

        Ok(assignments)
    }

    /// Revokes an assignment. Revoking an inactive assignment is a no-op.
    pub async fn revoke(
        &self,
        assignment_id: RoleAssignmentId,
        revoked_by: UserId,
        reason: Option<String>,
    ) -> AppResult<RoleAssignment> {
        let mut assignment = self.get(assignment_id).await?;
        if !assignment.is_active() {
            return Ok(assignment);
        }

        self.authorize_management(revoked_by, assignment.binding(), assignment.role())
            .await?;

        let now = self.clock.now();
        if !assignment.revoke(revoked_by, reason.clone(), now) {
            return Ok(assignment);
        }

        let changed = self
            .repository
            .mark_revoked(
                assignment_id,
                Revocation {
                    revoked_at: now,
                    revoked_by,
                    reason,
                },
            )
            .await?;
        if !changed {
            return self.get(assignment_id).await;
        }

        info!(
            assignment_id = %assignment_id,
            user_id = %assignment.user_id(),
            role = assignment.role().as_str(),
            revoked_by = %revoked_by,
            "role assignment revoked"
        );

        self.audit_repository
            .append_event(AuditEvent {
                business_id: assignment.binding().business_id(),
                actor: revoked_by,
                action: AuditAction::RoleRevoked,
                resource_type: "role_assignment".to_owned(),
                resource_id: assignment_id.to_string(),
                detail: Some(format!(
                    "revoked {} from user '{}'",
                    assignment.role(),
                    assignment.user_id()
                )),
            })
            .await?;

        Ok(assignment)
    }

    async fn authorize_management(
        &self,
        actor: UserId,
        binding: &ScopeBinding,
        role: Role,
    ) -> AppResult<()> {
        let context = PermissionContext::at(binding.context_id())
            .with_resource(format!("{}:{}", binding.scope(), binding.context_id()));
        let grant = self
            .evaluator
            .require_grant(actor, Permission::ManageRoles, &context)
            .await?;

        if grant.most_senior_role != Role::PlatformAdmin
            && !grant.most_senior_role.is_senior_to(role)
        {
            info!(
                user_id = %actor,
                role = role.as_str(),
                held_role = grant.most_senior_role.as_str(),
                "role management denied by seniority"
            );

            return Err(AppError::from(PermissionDenial {
                user_id: actor.to_string(),
                permission: Permission::ManageRoles.as_str().to_owned(),
                resource: Some(format!("role:{role}")),
                reason: DenialReason::InsufficientScopeOrPermission,
            }));
        }

        Ok(())
    }

    async fn ensure_binding_matches_hierarchy(&self, binding: &ScopeBinding) -> AppResult<()> {
        let context = self.load_context(binding.context_id()).await?;

        if context.context_type() != binding.scope().context_type() {
            return Err(AppError::Validation(format!(
                "{} scope requires a {} context, '{}' is {}",
                binding.scope(),
                binding.scope().context_type(),
                context.id(),
                context.context_type()
            )));
        }
        if context.business_id() != binding.business_id() {
            return Err(AppError::Validation(format!(
                "context '{}' does not belong to business '{}'",
                context.id(),
                binding.business_id()
            )));
        }
        if let Some(location_id) = binding.location_id()
            && !context.path().contains(location_id)
        {
            return Err(AppError::Validation(format!(
                "context '{}' is not under location '{location_id}'",
                context.id()
            )));
        }
        if !context.is_active() {
            return Err(AppError::Validation(format!(
                "roles cannot be granted on inactive context '{}'",
                context.id()
            )));
        }

        Ok(())
    }

    async fn load_context(&self, context_id: BusinessContextId) -> AppResult<BusinessContext> {
        self.context_repository
            .find_context(context_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("business context '{context_id}'")))
    }

    async fn persist_grant(&self, assignment: &RoleAssignment) -> AppResult<()> {
        self.repository.insert_assignment(assignment.clone()).await?;

        info!(
            assignment_id = %assignment.id(),
            user_id = %assignment.user_id(),
            role = assignment.role().as_str(),
            scope = assignment.scope().as_str(),
            assigned_by = %assignment.assigned_by(),
            "role assigned"
        );

        self.audit_repository
            .append_event(AuditEvent {
                business_id: assignment.binding().business_id(),
                actor: assignment.assigned_by(),
                action: AuditAction::RoleAssigned,
                resource_type: "role_assignment".to_owned(),
                resource_id: assignment.id().to_string(),
                detail: Some(format!(
                    "assigned {} at {} scope to user '{}'",
                    assignment.role(),
                    assignment.scope(),
                    assignment.user_id()
                )),
            })
            .await
    }
}

#[cfg(test)]
mod tests;
