use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use rendezvous_core::{AppError, AppResult};
use rendezvous_domain::{
    AuditAction, BusinessContext, BusinessContextId, BusinessContextInput, ContextType, UserId,
    is_assignment_effective,
};

use crate::access_ports::{
    AuditEvent, AuditRepository, BusinessContextRepository, Clock, RoleAssignmentRepository,
};

/// Node counts for one business hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ContextStatistics {
    /// Business the counts belong to.
    pub business_id: BusinessContextId,
    /// Number of LOCATION nodes.
    pub locations: usize,
    /// Number of DEPARTMENT nodes.
    pub departments: usize,
    /// Active nodes, the business node included.
    pub active: usize,
    /// Deactivated nodes.
    pub inactive: usize,
}

/// Application service owning the business-context hierarchy.
#[derive(Clone)]
pub struct BusinessContextService {
    repository: Arc<dyn BusinessContextRepository>,
    assignment_repository: Arc<dyn RoleAssignmentRepository>,
    audit_repository: Arc<dyn AuditRepository>,
    clock: Arc<dyn Clock>,
}

impl BusinessContextService {
    /// Creates a new service from required dependencies.
    #[must_use]
    pub fn new(
        repository: Arc<dyn BusinessContextRepository>,
        assignment_repository: Arc<dyn RoleAssignmentRepository>,
        audit_repository: Arc<dyn AuditRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repository,
            assignment_repository,
            audit_repository,
            clock,
        }
    }

    /// Provisions a context node under its parent.
    pub async fn create_context(
        &self,
        actor: UserId,
        input: BusinessContextInput,
    ) -> AppResult<BusinessContext> {
        let parent = match input.parent_context_id {
            Some(parent_id) => Some(
                self.repository
                    .find_context(parent_id)
                    .await?
                    .ok_or_else(|| {
                        AppError::Validation(format!(
                            "parent context '{parent_id}' does not exist"
                        ))
                    })?,
            ),
            None => None,
        };

        let context = BusinessContext::create(input, parent.as_ref(), self.clock.now())?;
        self.ensure_unique_name(&context, None).await?;

        if let Some(code) = context.code()
            && self
                .repository
                .code_exists(context.business_id(), code)
                .await?
        {
            return Err(AppError::Validation(format!(
                "code '{code}' is already used in business '{}'",
                context.business_id()
            )));
        }

        self.repository.insert_context(context.clone()).await?;

        info!(
            context_id = %context.id(),
            context_type = context.context_type().as_str(),
            business_id = %context.business_id(),
            "business context created"
        );

        self.append_audit(
            &context,
            actor,
            AuditAction::ContextCreated,
            format!("created {} '{}'", context.context_type(), context.name()),
        )
        .await?;

        Ok(context)
    }

    /// Returns one context node.
    pub async fn get(&self, context_id: BusinessContextId) -> AppResult<BusinessContext> {
        self.repository
            .find_context(context_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("business context '{context_id}'")))
    }

    /// Returns the ancestors of a node ordered from the business root to the parent.
    pub async fn get_ancestors(
        &self,
        context_id: BusinessContextId,
    ) -> AppResult<Vec<BusinessContext>> {
        let context = self.get(context_id).await?;
        let ancestor_ids = context.path().ancestors();
        if ancestor_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut ancestors = self.repository.find_contexts(ancestor_ids).await?;
        if ancestors.len() != ancestor_ids.len() {
            return Err(AppError::PermissionService(format!(
                "ancestor chain of context '{context_id}' is incomplete"
            )));
        }

        ancestors.sort_by_key(BusinessContext::level);
        Ok(ancestors)
    }

    /// Lists every node of a business ordered by level, display order and name.
    pub async fn list_for_business(
        &self,
        business_id: BusinessContextId,
    ) -> AppResult<Vec<BusinessContext>> {
        let mut contexts = self
            .repository
            .list_contexts_for_business(business_id)
            .await?;

        contexts.sort_by(|left, right| {
            left.level()
                .cmp(&right.level())
                .then_with(|| left.display_order().cmp(&right.display_order()))
                .then_with(|| left.name().cmp(right.name()))
        });

        Ok(contexts)
    }

    /// Renames a node, keeping names unique per business and type.
    pub async fn rename(
        &self,
        actor: UserId,
        context_id: BusinessContextId,
        name: &str,
    ) -> AppResult<BusinessContext> {
        let mut context = self.get(context_id).await?;
        let previous_name = context.name().to_owned();

        context.rename(name, self.clock.now())?;
        if context.name() == previous_name {
            return Ok(context);
        }

        self.ensure_unique_name(&context, Some(context_id)).await?;
        self.repository.update_context(context.clone()).await?;

        self.append_audit(
            &context,
            actor,
            AuditAction::ContextRenamed,
            format!("renamed '{previous_name}' to '{}'", context.name()),
        )
        .await?;

        Ok(context)
    }

    /// Moves a department under another location of the same business.
    ///
    /// Departments referenced by active role assignments cannot move, since
    /// those assignments record the location they were granted under.
    pub async fn move_department(
        &self,
        actor: UserId,
        department_id: BusinessContextId,
        new_location_id: BusinessContextId,
    ) -> AppResult<BusinessContext> {
        let mut department = self.get(department_id).await?;
        let new_location = self
            .repository
            .find_context(new_location_id)
            .await?
            .ok_or_else(|| {
                AppError::Validation(format!("parent context '{new_location_id}' does not exist"))
            })?;

        if department.parent_context_id() == Some(new_location_id) {
            return Ok(department);
        }

        department.move_under(&new_location, self.clock.now())?;
        self.ensure_unreferenced(department_id, "moved").await?;
        self.repository.update_context(department.clone()).await?;

        info!(
            context_id = %department_id,
            location_id = %new_location_id,
            "department moved"
        );

        self.append_audit(
            &department,
            actor,
            AuditAction::ContextMoved,
            format!("moved under location '{}'", new_location.name()),
        )
        .await?;

        Ok(department)
    }

    /// Soft-deactivates a node that no active role assignment references.
    pub async fn deactivate(
        &self,
        actor: UserId,
        context_id: BusinessContextId,
    ) -> AppResult<BusinessContext> {
        let mut context = self.get(context_id).await?;
        self.ensure_unreferenced(context_id, "deactivated").await?;

        if !context.deactivate(self.clock.now()) {
            return Ok(context);
        }

        self.repository.update_context(context.clone()).await?;
        info!(context_id = %context_id, "business context deactivated");

        self.append_audit(
            &context,
            actor,
            AuditAction::ContextDeactivated,
            format!("deactivated {} '{}'", context.context_type(), context.name()),
        )
        .await?;

        Ok(context)
    }

    /// Reactivates a node whose parent is active.
    pub async fn reactivate(
        &self,
        actor: UserId,
        context_id: BusinessContextId,
    ) -> AppResult<BusinessContext> {
        let mut context = self.get(context_id).await?;

        if let Some(parent_id) = context.parent_context_id() {
            let parent = self.get(parent_id).await?;
            if !parent.is_active() {
                return Err(AppError::Conflict(format!(
                    "context '{context_id}' cannot be reactivated under inactive parent '{parent_id}'"
                )));
            }
        }

        if !context.reactivate(self.clock.now()) {
            return Ok(context);
        }

        self.repository.update_context(context.clone()).await?;
        info!(context_id = %context_id, "business context reactivated");

        self.append_audit(
            &context,
            actor,
            AuditAction::ContextReactivated,
            format!("reactivated {} '{}'", context.context_type(), context.name()),
        )
        .await?;

        Ok(context)
    }

    /// Counts the nodes of a business hierarchy.
    pub async fn statistics(&self, business_id: BusinessContextId) -> AppResult<ContextStatistics> {
        let business = self.get(business_id).await?;
        if business.context_type() != ContextType::Business {
            return Err(AppError::Validation(format!(
                "context '{business_id}' is a {}, not a BUSINESS",
                business.context_type()
            )));
        }

        let contexts = self
            .repository
            .list_contexts_for_business(business_id)
            .await?;

        let count_type = |context_type: ContextType| {
            contexts
                .iter()
                .filter(|context| context.context_type() == context_type)
                .count()
        };
        let active = contexts.iter().filter(|context| context.is_active()).count();

        Ok(ContextStatistics {
            business_id,
            locations: count_type(ContextType::Location),
            departments: count_type(ContextType::Department),
            active,
            inactive: contexts.len() - active,
        })
    }

    async fn ensure_unique_name(
        &self,
        context: &BusinessContext,
        excluding: Option<BusinessContextId>,
    ) -> AppResult<()> {
        if self
            .repository
            .name_exists(
                context.business_id(),
                context.context_type(),
                context.name(),
                excluding,
            )
            .await?
        {
            return Err(AppError::Validation(format!(
                "a {} named '{}' already exists in business '{}'",
                context.context_type(),
                context.name(),
                context.business_id()
            )));
        }

        Ok(())
    }

    async fn ensure_unreferenced(
        &self,
        context_id: BusinessContextId,
        verb: &str,
    ) -> AppResult<()> {
        let now = self.clock.now();
        let referencing = self
            .assignment_repository
            .list_active_for_context(context_id, now)
            .await?
            .into_iter()
            .filter(|assignment| is_assignment_effective(assignment, now))
            .count();

        if referencing > 0 {
            return Err(AppError::Conflict(format!(
                "context '{context_id}' cannot be {verb} while {referencing} active role assignment(s) reference it"
            )));
        }

        Ok(())
    }

    async fn append_audit(
        &self,
        context: &BusinessContext,
        actor: UserId,
        action: AuditAction,
        detail: String,
    ) -> AppResult<()> {
        self.audit_repository
            .append_event(AuditEvent {
                business_id: context.business_id(),
                actor,
                action,
                resource_type: "business_context".to_owned(),
                resource_id: context.id().to_string(),
                detail: Some(detail),
            })
            .await
    }
}
