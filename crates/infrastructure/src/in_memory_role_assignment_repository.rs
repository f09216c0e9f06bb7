use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use rendezvous_application::RoleAssignmentRepository;
use rendezvous_core::{AppError, AppResult};
use rendezvous_domain::{
    BusinessContextId, Revocation, RoleAssignment, RoleAssignmentId, UserId,
    is_assignment_effective,
};

/// In-memory role assignment store.
#[derive(Debug, Default)]
pub struct InMemoryRoleAssignmentRepository {
    assignments: RwLock<HashMap<RoleAssignmentId, RoleAssignment>>,
}

impl InMemoryRoleAssignmentRepository {
    /// Creates an empty in-memory repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    async fn list_effective(
        &self,
        now: DateTime<Utc>,
        predicate: impl Fn(&RoleAssignment) -> bool + Send,
    ) -> Vec<RoleAssignment> {
        let assignments = self.assignments.read().await;
        let mut values: Vec<RoleAssignment> = assignments
            .values()
            .filter(|assignment| predicate(assignment) && is_assignment_effective(assignment, now))
            .cloned()
            .collect();
        values.sort_by_key(RoleAssignment::assigned_at);

        values
    }
}

#[async_trait]
impl RoleAssignmentRepository for InMemoryRoleAssignmentRepository {
    async fn insert_assignment(&self, assignment: RoleAssignment) -> AppResult<()> {
        let mut assignments = self.assignments.write().await;

        if assignments.contains_key(&assignment.id()) {
            return Err(AppError::Conflict(format!(
                "role assignment '{}' already exists",
                assignment.id()
            )));
        }

        assignments.insert(assignment.id(), assignment);
        Ok(())
    }

    async fn find_assignment(
        &self,
        assignment_id: RoleAssignmentId,
    ) -> AppResult<Option<RoleAssignment>> {
        Ok(self.assignments.read().await.get(&assignment_id).cloned())
    }

    async fn list_active_for_user(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<RoleAssignment>> {
        Ok(self
            .list_effective(now, |assignment| assignment.user_id() == user_id)
            .await)
    }

    async fn list_active_for_context(
        &self,
        context_id: BusinessContextId,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<RoleAssignment>> {
        Ok(self
            .list_effective(now, |assignment| {
                assignment.binding().references(context_id)
            })
            .await)
    }

    async fn mark_revoked(
        &self,
        assignment_id: RoleAssignmentId,
        revocation: Revocation,
    ) -> AppResult<bool> {
        let mut assignments = self.assignments.write().await;
        let assignment = assignments.get_mut(&assignment_id).ok_or_else(|| {
            AppError::NotFound(format!("role assignment '{assignment_id}'"))
        })?;

        Ok(assignment.revoke(
            revocation.revoked_by,
            revocation.reason,
            revocation.revoked_at,
        ))
    }
}
