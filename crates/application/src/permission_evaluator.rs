use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use rendezvous_core::{AppError, AppResult, DenialReason, PermissionDenial};
use rendezvous_domain::{
    AssignmentScope, BusinessContext, BusinessContextId, Permission, PermissionCatalog, Role,
    RoleAssignment, RoleAssignmentId, UserId, is_assignment_effective,
};

use crate::access_ports::{BusinessContextRepository, Clock, RoleAssignmentRepository};

/// Target of a permission check.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionContext {
    /// Context node the action applies to. `None` is a platform-wide check
    /// that only platform admins pass.
    pub business_context_id: Option<BusinessContextId>,
    /// Owner of the resource for self-service checks.
    pub target_user_id: Option<UserId>,
    /// Optional resource label reported in denials.
    pub resource: Option<String>,
}

impl PermissionContext {
    /// Platform-wide check without a target context.
    #[must_use]
    pub fn global() -> Self {
        Self::default()
    }

    /// Check against one context node.
    #[must_use]
    pub fn at(business_context_id: BusinessContextId) -> Self {
        Self {
            business_context_id: Some(business_context_id),
            ..Self::default()
        }
    }

    /// Check against resources owned by `target_user_id`.
    #[must_use]
    pub fn for_user(target_user_id: UserId) -> Self {
        Self {
            target_user_id: Some(target_user_id),
            ..Self::default()
        }
    }

    /// Attaches a resource label.
    #[must_use]
    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    fn resource_label(&self) -> Option<String> {
        self.resource.clone().or_else(|| {
            self.business_context_id
                .map(|context_id| format!("business_context:{context_id}"))
        })
    }
}

/// Assignment that satisfied a permission check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PermissionGrant {
    /// Assignment selected by scope priority.
    pub assignment_id: RoleAssignmentId,
    /// Role of the selected assignment.
    pub role: Role,
    /// Scope of the selected assignment.
    pub scope: AssignmentScope,
    /// Most senior role among every matching assignment.
    pub most_senior_role: Role,
    /// Whether the grant came from the own-resource path.
    pub self_service: bool,
}

/// Outcome of a permission evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PermissionDecision {
    /// Permission holds.
    Allowed(PermissionGrant),
    /// Permission does not hold.
    Denied {
        /// Why the check failed.
        reason: DenialReason,
    },
}

impl PermissionDecision {
    /// Returns whether the decision allows the action.
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed(_))
    }
}

/// Stateless evaluator deciding whether a user holds a permission at a context.
#[derive(Clone)]
pub struct PermissionEvaluator {
    assignment_repository: Arc<dyn RoleAssignmentRepository>,
    context_repository: Arc<dyn BusinessContextRepository>,
    catalog: Arc<PermissionCatalog>,
    clock: Arc<dyn Clock>,
}

impl PermissionEvaluator {
    /// Creates an evaluator over the given stores and catalog.
    #[must_use]
    pub fn new(
        assignment_repository: Arc<dyn RoleAssignmentRepository>,
        context_repository: Arc<dyn BusinessContextRepository>,
        catalog: Arc<PermissionCatalog>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            assignment_repository,
            context_repository,
            catalog,
            clock,
        }
    }

    /// Returns the injected permission catalog.
    #[must_use]
    pub fn catalog(&self) -> &PermissionCatalog {
        &self.catalog
    }

    /// Evaluates a permission and returns the full decision.
    pub async fn evaluate(
        &self,
        user_id: UserId,
        permission: Permission,
        context: &PermissionContext,
    ) -> AppResult<PermissionDecision> {
        let now = self.clock.now();
        let assignments = self.load_effective_assignments(user_id, now).await?;

        let decision = if assignments.is_empty() {
            PermissionDecision::Denied {
                reason: DenialReason::NoAssignments,
            }
        } else if let Some(grant) = self_service_grant(&assignments, user_id, permission, context)
        {
            PermissionDecision::Allowed(grant)
        } else if permission.is_self_scoped() {
            PermissionDecision::Denied {
                reason: DenialReason::InsufficientScopeOrPermission,
            }
        } else {
            let target = self.resolve_target(context).await?;
            match target {
                Target::Unknown => PermissionDecision::Denied {
                    reason: DenialReason::InsufficientScopeOrPermission,
                },
                target => {
                    let matching: Vec<&RoleAssignment> = assignments
                        .iter()
                        .filter(|assignment| target.is_contained_by(assignment))
                        .filter(|assignment| {
                            self.catalog
                                .role_has_permission(assignment.role(), permission)
                        })
                        .collect();

                    select_grant(&matching, false)
                        .map(PermissionDecision::Allowed)
                        .unwrap_or(PermissionDecision::Denied {
                            reason: DenialReason::InsufficientScopeOrPermission,
                        })
                }
            }
        };

        debug!(
            user_id = %user_id,
            permission = permission.as_str(),
            allowed = decision.is_allowed(),
            "permission evaluated"
        );

        Ok(decision)
    }

    /// Returns whether the user holds the permission.
    pub async fn has_permission(
        &self,
        user_id: UserId,
        permission: Permission,
        context: &PermissionContext,
    ) -> AppResult<bool> {
        Ok(self
            .evaluate(user_id, permission, context)
            .await?
            .is_allowed())
    }

    /// Ensures the user holds the permission.
    pub async fn require_permission(
        &self,
        user_id: UserId,
        permission: Permission,
        context: &PermissionContext,
    ) -> AppResult<()> {
        self.require_grant(user_id, permission, context)
            .await
            .map(|_| ())
    }

    /// Ensures the user holds the permission and returns the grant that satisfied it.
    pub async fn require_grant(
        &self,
        user_id: UserId,
        permission: Permission,
        context: &PermissionContext,
    ) -> AppResult<PermissionGrant> {
        match self.evaluate(user_id, permission, context).await? {
            PermissionDecision::Allowed(grant) => Ok(grant),
            PermissionDecision::Denied { reason } => {
                info!(
                    user_id = %user_id,
                    permission = permission.as_str(),
                    reason = reason.as_str(),
                    "permission denied"
                );

                Err(AppError::from(PermissionDenial {
                    user_id: user_id.to_string(),
                    permission: permission.as_str().to_owned(),
                    resource: context.resource_label(),
                    reason,
                }))
            }
        }
    }

    /// Returns the union of permissions that apply to the user at the context.
    ///
    /// Self-service permissions are included only when the context targets
    /// the user and the user holds a staff role.
    pub async fn effective_permissions(
        &self,
        user_id: UserId,
        context: &PermissionContext,
    ) -> AppResult<BTreeSet<Permission>> {
        let now = self.clock.now();
        let assignments = self.load_effective_assignments(user_id, now).await?;
        if assignments.is_empty() {
            return Ok(BTreeSet::new());
        }

        let target = self.resolve_target(context).await?;
        let mut permissions: BTreeSet<Permission> = assignments
            .iter()
            .filter(|assignment| target.is_contained_by(assignment))
            .flat_map(|assignment| self.catalog.permissions_for(assignment.role()).iter())
            .copied()
            .collect();

        if context.target_user_id == Some(user_id)
            && assignments.iter().any(|assignment| assignment.role().is_staff())
        {
            permissions.extend(
                Permission::all()
                    .iter()
                    .copied()
                    .filter(Permission::is_self_scoped),
            );
        }

        Ok(permissions)
    }

    /// Lists the user's assignments that are effective now.
    pub async fn active_assignments(&self, user_id: UserId) -> AppResult<Vec<RoleAssignment>> {
        self.load_effective_assignments(user_id, self.clock.now())
            .await
    }

    async fn load_effective_assignments(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<RoleAssignment>> {
        let assignments = self
            .assignment_repository
            .list_active_for_user(user_id, now)
            .await?;

        Ok(assignments
            .into_iter()
            .filter(|assignment| is_assignment_effective(assignment, now))
            .collect())
    }

    async fn resolve_target(&self, context: &PermissionContext) -> AppResult<Target> {
        let Some(context_id) = context.business_context_id else {
            return Ok(Target::Anywhere);
        };

        Ok(self
            .context_repository
            .find_context(context_id)
            .await?
            .map_or(Target::Unknown, Target::Node))
    }
}

enum Target {
    Anywhere,
    Unknown,
    Node(BusinessContext),
}

impl Target {
    fn is_contained_by(&self, assignment: &RoleAssignment) -> bool {
        match self {
            Self::Anywhere => assignment.role() == Role::PlatformAdmin,
            Self::Unknown => false,
            Self::Node(target) => {
                assignment.role() == Role::PlatformAdmin
                    || target.path().contains(assignment.binding().context_id())
            }
        }
    }
}

fn self_service_grant(
    assignments: &[RoleAssignment],
    user_id: UserId,
    permission: Permission,
    context: &PermissionContext,
) -> Option<PermissionGrant> {
    if !permission.is_self_scoped() || context.target_user_id != Some(user_id) {
        return None;
    }

    let staff: Vec<&RoleAssignment> = assignments
        .iter()
        .filter(|assignment| assignment.role().is_staff())
        .collect();

    select_grant(&staff, true)
}

/// Picks the narrowest-scope assignment, preferring the most recent on ties.
fn select_grant(matching: &[&RoleAssignment], self_service: bool) -> Option<PermissionGrant> {
    let selected = matching.iter().max_by(|left, right| {
        left.scope()
            .specificity()
            .cmp(&right.scope().specificity())
            .then_with(|| left.assigned_at().cmp(&right.assigned_at()))
    })?;

    let most_senior_role = matching
        .iter()
        .map(|assignment| assignment.role())
        .max_by_key(Role::rank)
        .unwrap_or(selected.role());

    Some(PermissionGrant {
        assignment_id: selected.id(),
        role: selected.role(),
        scope: selected.scope(),
        most_senior_role,
        self_service,
    })
}
