use async_trait::async_trait;
use chrono::{DateTime, Utc};

use rendezvous_core::AppResult;
use rendezvous_domain::{
    AuditAction, BusinessContext, BusinessContextId, ContextType, Revocation, RoleAssignment,
    RoleAssignmentId, UserId,
};

/// Repository port for the business-context hierarchy.
#[async_trait]
pub trait BusinessContextRepository: Send + Sync {
    /// Persists a new context. Unique-key violations surface as validation errors.
    async fn insert_context(&self, context: BusinessContext) -> AppResult<()>;

    /// Replaces a stored context with its updated state.
    async fn update_context(&self, context: BusinessContext) -> AppResult<()>;

    /// Finds one context by id.
    async fn find_context(&self, context_id: BusinessContextId)
    -> AppResult<Option<BusinessContext>>;

    /// Finds several contexts by id. Missing ids are skipped.
    async fn find_contexts(
        &self,
        context_ids: &[BusinessContextId],
    ) -> AppResult<Vec<BusinessContext>>;

    /// Lists every context of a business, the business node included.
    async fn list_contexts_for_business(
        &self,
        business_id: BusinessContextId,
    ) -> AppResult<Vec<BusinessContext>>;

    /// Returns whether a context with this name and type exists in the business.
    async fn name_exists(
        &self,
        business_id: BusinessContextId,
        context_type: ContextType,
        name: &str,
        excluding: Option<BusinessContextId>,
    ) -> AppResult<bool>;

    /// Returns whether a context with this code exists in the business.
    async fn code_exists(&self, business_id: BusinessContextId, code: &str) -> AppResult<bool>;
}

/// Repository port for role assignments.
#[async_trait]
pub trait RoleAssignmentRepository: Send + Sync {
    /// Persists a new assignment.
    async fn insert_assignment(&self, assignment: RoleAssignment) -> AppResult<()>;

    /// Finds one assignment by id, whatever its state.
    async fn find_assignment(
        &self,
        assignment_id: RoleAssignmentId,
    ) -> AppResult<Option<RoleAssignment>>;

    /// Lists assignments of a user that are active and unexpired at `now`.
    async fn list_active_for_user(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<RoleAssignment>>;

    /// Lists assignments active at `now` that reference `context_id` in any scope column.
    async fn list_active_for_context(
        &self,
        context_id: BusinessContextId,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<RoleAssignment>>;

    /// Flags an active assignment as revoked.
    ///
    /// Returns `false` when the assignment was already inactive.
    async fn mark_revoked(
        &self,
        assignment_id: RoleAssignmentId,
        revocation: Revocation,
    ) -> AppResult<bool>;
}

/// Access-control audit event emitted by mutating use-cases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEvent {
    /// Business the event belongs to.
    pub business_id: BusinessContextId,
    /// Acting user.
    pub actor: UserId,
    /// Stable action identifier.
    pub action: AuditAction,
    /// Resource type.
    pub resource_type: String,
    /// Resource identifier.
    pub resource_id: String,
    /// Optional human-readable detail.
    pub detail: Option<String>,
}

/// Repository port for audit event persistence.
#[async_trait]
pub trait AuditRepository: Send + Sync {
    /// Appends an audit event.
    async fn append_event(&self, event: AuditEvent) -> AppResult<()>;
}

/// Source of the current time for lazy expiry checks.
pub trait Clock: Send + Sync {
    /// Returns the current UTC time.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock implementation of [`Clock`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
