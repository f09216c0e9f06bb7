use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use tokio::sync::Mutex;

use rendezvous_core::{AppError, AppResult};
use rendezvous_domain::{
    BusinessContext, BusinessContextId, BusinessContextInput, ContextType, NewRoleAssignment,
    PermissionCatalog, Revocation, Role, RoleAssignment, RoleAssignmentId,
    RoleAssignmentParts, ScopeBinding, SubscriptionTier, UserId, is_assignment_effective,
};

use crate::access_ports::{
    AuditEvent, AuditRepository, BusinessContextRepository, Clock, RoleAssignmentRepository,
};
use crate::{BusinessContextService, PermissionEvaluator, RoleAssignmentService};

pub struct FixedClock {
    millis: AtomicI64,
}

impl FixedClock {
    pub fn new() -> Self {
        let start = Utc
            .with_ymd_and_hms(2025, 3, 1, 9, 0, 0)
            .single()
            .unwrap_or_default();
        Self {
            millis: AtomicI64::new(start.timestamp_millis()),
        }
    }

    pub fn advance(&self, duration: Duration) {
        self.millis
            .fetch_add(duration.num_milliseconds(), Ordering::SeqCst);
    }

    pub fn now_plus(&self, duration: Duration) -> DateTime<Utc> {
        self.now() + duration
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.millis.load(Ordering::SeqCst)).unwrap_or_default()
    }
}

#[derive(Default)]
pub struct FakeBusinessContextRepository {
    contexts: Mutex<HashMap<BusinessContextId, BusinessContext>>,
}

#[async_trait]
impl BusinessContextRepository for FakeBusinessContextRepository {
    async fn insert_context(&self, context: BusinessContext) -> AppResult<()> {
        self.contexts.lock().await.insert(context.id(), context);
        Ok(())
    }

    async fn update_context(&self, context: BusinessContext) -> AppResult<()> {
        let mut contexts = self.contexts.lock().await;
        if !contexts.contains_key(&context.id()) {
            return Err(AppError::NotFound(format!("business context '{}'", context.id())));
        }
        contexts.insert(context.id(), context);
        Ok(())
    }

    async fn find_context(
        &self,
        context_id: BusinessContextId,
    ) -> AppResult<Option<BusinessContext>> {
        Ok(self.contexts.lock().await.get(&context_id).cloned())
    }

    async fn find_contexts(
        &self,
        context_ids: &[BusinessContextId],
    ) -> AppResult<Vec<BusinessContext>> {
        let contexts = self.contexts.lock().await;
        Ok(context_ids
            .iter()
            .filter_map(|context_id| contexts.get(context_id).cloned())
            .collect())
    }

    async fn list_contexts_for_business(
        &self,
        business_id: BusinessContextId,
    ) -> AppResult<Vec<BusinessContext>> {
        Ok(self
            .contexts
            .lock()
            .await
            .values()
            .filter(|context| context.business_id() == business_id)
            .cloned()
            .collect())
    }

    async fn name_exists(
        &self,
        business_id: BusinessContextId,
        context_type: ContextType,
        name: &str,
        excluding: Option<BusinessContextId>,
    ) -> AppResult<bool> {
        Ok(self.contexts.lock().await.values().any(|context| {
            context.business_id() == business_id
                && context.context_type() == context_type
                && context.name() == name
                && Some(context.id()) != excluding
        }))
    }

    async fn code_exists(&self, business_id: BusinessContextId, code: &str) -> AppResult<bool> {
        Ok(self
            .contexts
            .lock()
            .await
            .values()
            .any(|context| context.business_id() == business_id && context.code() == Some(code)))
    }
}

#[derive(Default)]
pub struct FakeRoleAssignmentRepository {
    assignments: Mutex<HashMap<RoleAssignmentId, RoleAssignment>>,
    fail_reads: AtomicBool,
}

impl FakeRoleAssignmentRepository {
    pub fn fail_reads(&self) {
        self.fail_reads.store(true, Ordering::SeqCst);
    }

    /// Stores an assignment bypassing the service, e.g. one that already expired.
    pub async fn seed(&self, assignment: RoleAssignment) {
        self.assignments
            .lock()
            .await
            .insert(assignment.id(), assignment);
    }

    fn check_reads(&self) -> AppResult<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(AppError::PermissionService(
                "role assignment store unavailable".to_owned(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl RoleAssignmentRepository for FakeRoleAssignmentRepository {
    async fn insert_assignment(&self, assignment: RoleAssignment) -> AppResult<()> {
        self.seed(assignment).await;
        Ok(())
    }

    async fn find_assignment(
        &self,
        assignment_id: RoleAssignmentId,
    ) -> AppResult<Option<RoleAssignment>> {
        self.check_reads()?;
        Ok(self.assignments.lock().await.get(&assignment_id).cloned())
    }

    async fn list_active_for_user(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<RoleAssignment>> {
        self.check_reads()?;
        Ok(self
            .assignments
            .lock()
            .await
            .values()
            .filter(|assignment| {
                assignment.user_id() == user_id && is_assignment_effective(assignment, now)
            })
            .cloned()
            .collect())
    }

    async fn list_active_for_context(
        &self,
        context_id: BusinessContextId,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<RoleAssignment>> {
        self.check_reads()?;
        Ok(self
            .assignments
            .lock()
            .await
            .values()
            .filter(|assignment| {
                assignment.binding().references(context_id)
                    && is_assignment_effective(assignment, now)
            })
            .cloned()
            .collect())
    }

    async fn mark_revoked(
        &self,
        assignment_id: RoleAssignmentId,
        revocation: Revocation,
    ) -> AppResult<bool> {
        let mut assignments = self.assignments.lock().await;
        let Some(assignment) = assignments.get_mut(&assignment_id) else {
            return Err(AppError::NotFound(format!(
                "role assignment '{assignment_id}'"
            )));
        };

        Ok(assignment.revoke(revocation.revoked_by, revocation.reason, revocation.revoked_at))
    }
}

#[derive(Default)]
pub struct FakeAuditRepository {
    pub events: Mutex<Vec<AuditEvent>>,
}

#[async_trait]
impl AuditRepository for FakeAuditRepository {
    async fn append_event(&self, event: AuditEvent) -> AppResult<()> {
        self.events.lock().await.push(event);
        Ok(())
    }
}

/// Wires every service over shared fakes.
pub struct Harness {
    pub clock: Arc<FixedClock>,
    pub assignments: Arc<FakeRoleAssignmentRepository>,
    pub audit: Arc<FakeAuditRepository>,
    pub evaluator: PermissionEvaluator,
    pub context_service: BusinessContextService,
    pub assignment_service: RoleAssignmentService,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_catalog(PermissionCatalog::standard(SubscriptionTier::Premium))
    }

    pub fn with_catalog(catalog: PermissionCatalog) -> Self {
        let clock = Arc::new(FixedClock::new());
        let contexts = Arc::new(FakeBusinessContextRepository::default());
        let assignments = Arc::new(FakeRoleAssignmentRepository::default());
        let audit = Arc::new(FakeAuditRepository::default());

        let evaluator = PermissionEvaluator::new(
            assignments.clone(),
            contexts.clone(),
            Arc::new(catalog),
            clock.clone(),
        );
        let context_service = BusinessContextService::new(
            contexts.clone(),
            assignments.clone(),
            audit.clone(),
            clock.clone(),
        );
        let assignment_service = RoleAssignmentService::new(
            evaluator.clone(),
            assignments.clone(),
            contexts.clone(),
            audit.clone(),
            clock.clone(),
        );

        Self {
            clock,
            assignments,
            audit,
            evaluator,
            context_service,
            assignment_service,
        }
    }

    pub async fn create(
        &self,
        context_type: ContextType,
        name: &str,
        parent: Option<BusinessContextId>,
    ) -> BusinessContext {
        self.context_service
            .create_context(
                UserId::new(),
                BusinessContextInput {
                    context_type,
                    name: name.to_owned(),
                    code: None,
                    parent_context_id: parent,
                    display_order: 0,
                    timezone: None,
                },
            )
            .await
            .unwrap_or_else(|error| unreachable!("context '{name}' should be created: {error}"))
    }

    /// Builds Business -> Location -> (Department A, Department B).
    pub async fn tree(&self) -> Tree {
        let business = self.create(ContextType::Business, "Glow Spa", None).await;
        let location = self
            .create(ContextType::Location, "Downtown", Some(business.id()))
            .await;
        let department_a = self
            .create(ContextType::Department, "Massage", Some(location.id()))
            .await;
        let department_b = self
            .create(ContextType::Department, "Nails", Some(location.id()))
            .await;

        Tree {
            business,
            location,
            department_a,
            department_b,
        }
    }

    /// Stores an assignment directly, bypassing assigner authorization.
    pub async fn grant(
        &self,
        user_id: UserId,
        role: Role,
        binding: ScopeBinding,
    ) -> RoleAssignment {
        let assignment = RoleAssignment::new(
            NewRoleAssignment {
                user_id,
                role,
                binding,
                assigned_by: UserId::new(),
                expires_at: None,
                notes: None,
                metadata: serde_json::Value::Null,
            },
            self.clock.now(),
        )
        .unwrap_or_else(|error| unreachable!("assignment should be valid: {error}"));

        self.assignments.seed(assignment.clone()).await;
        assignment
    }

    /// Grants a platform admin bound to its own operator business.
    pub async fn platform_admin(&self) -> UserId {
        let operator = self
            .create(ContextType::Business, "Platform Operations", None)
            .await;
        let admin = UserId::new();
        self.grant(
            admin,
            Role::PlatformAdmin,
            ScopeBinding::Business {
                business_id: operator.id(),
            },
        )
        .await;

        admin
    }

    /// Stores an assignment whose expiry has already passed.
    pub async fn grant_expired(
        &self,
        user_id: UserId,
        role: Role,
        binding: ScopeBinding,
    ) -> RoleAssignment {
        let now = self.clock.now();
        let assignment = RoleAssignment::restore(RoleAssignmentParts {
            id: RoleAssignmentId::new(),
            user_id,
            role,
            scope: binding.scope(),
            business_id: binding.business_id(),
            location_id: binding.location_id(),
            department_id: binding.department_id(),
            assigned_at: now - Duration::days(30),
            assigned_by: UserId::new(),
            expires_at: Some(now - Duration::days(1)),
            is_active: true,
            revocation: None,
            notes: None,
            metadata: serde_json::json!({}),
        })
        .unwrap_or_else(|error| unreachable!("assignment should restore: {error}"));

        self.assignments.seed(assignment.clone()).await;
        assignment
    }
}

pub struct Tree {
    pub business: BusinessContext,
    pub location: BusinessContext,
    pub department_a: BusinessContext,
    pub department_b: BusinessContext,
}

impl Tree {
    pub fn business_scope(&self) -> ScopeBinding {
        ScopeBinding::Business {
            business_id: self.business.id(),
        }
    }

    pub fn location_scope(&self) -> ScopeBinding {
        ScopeBinding::Location {
            business_id: self.business.id(),
            location_id: self.location.id(),
        }
    }

    pub fn department_a_scope(&self) -> ScopeBinding {
        ScopeBinding::Department {
            business_id: self.business.id(),
            location_id: self.location.id(),
            department_id: self.department_a.id(),
        }
    }

    pub fn department_b_scope(&self) -> ScopeBinding {
        ScopeBinding::Department {
            business_id: self.business.id(),
            location_id: self.location.id(),
            department_id: self.department_b.id(),
        }
    }
}
