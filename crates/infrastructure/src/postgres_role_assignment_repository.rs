use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{FromRow, PgPool};
use tracing::debug;
use uuid::Uuid;

use rendezvous_application::RoleAssignmentRepository;
use rendezvous_core::{AppError, AppResult};
use rendezvous_domain::{
    AssignmentScope, BusinessContextId, Revocation, Role, RoleAssignment, RoleAssignmentId,
    RoleAssignmentParts, UserId, is_assignment_effective,
};

/// PostgreSQL-backed role assignment store.
#[derive(Clone)]
pub struct PostgresRoleAssignmentRepository {
    pool: PgPool,
}

impl PostgresRoleAssignmentRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct RoleAssignmentRow {
    id: Uuid,
    user_id: Uuid,
    role: String,
    assignment_scope: String,
    business_id: Uuid,
    location_id: Option<Uuid>,
    department_id: Option<Uuid>,
    assigned_at: DateTime<Utc>,
    assigned_by: Uuid,
    expires_at: Option<DateTime<Utc>>,
    is_active: bool,
    revoked_at: Option<DateTime<Utc>>,
    revoked_by: Option<Uuid>,
    revocation_reason: Option<String>,
    notes: Option<String>,
    metadata: Value,
}

impl TryFrom<RoleAssignmentRow> for RoleAssignment {
    type Error = AppError;

    fn try_from(row: RoleAssignmentRow) -> Result<Self, Self::Error> {
        let id = row.id;
        let corrupt = |error: AppError| {
            AppError::PermissionService(format!(
                "stored role assignment '{id}' is corrupt: {error}"
            ))
        };

        let revocation = match (row.revoked_at, row.revoked_by) {
            (Some(revoked_at), Some(revoked_by)) => Some(Revocation {
                revoked_at,
                revoked_by: UserId::from_uuid(revoked_by),
                reason: row.revocation_reason,
            }),
            _ => None,
        };

        RoleAssignment::restore(RoleAssignmentParts {
            id: RoleAssignmentId::from_uuid(row.id),
            user_id: UserId::from_uuid(row.user_id),
            role: row.role.parse::<Role>().map_err(corrupt)?,
            scope: row
                .assignment_scope
                .parse::<AssignmentScope>()
                .map_err(corrupt)?,
            business_id: BusinessContextId::from_uuid(row.business_id),
            location_id: row.location_id.map(BusinessContextId::from_uuid),
            department_id: row.department_id.map(BusinessContextId::from_uuid),
            assigned_at: row.assigned_at,
            assigned_by: UserId::from_uuid(row.assigned_by),
            expires_at: row.expires_at,
            is_active: row.is_active,
            revocation,
            notes: row.notes,
            metadata: row.metadata,
        })
        .map_err(corrupt)
    }
}

fn to_assignments(
    rows: Vec<RoleAssignmentRow>,
    now: DateTime<Utc>,
) -> AppResult<Vec<RoleAssignment>> {
    let mut assignments = Vec::with_capacity(rows.len());
    for row in rows {
        let assignment = RoleAssignment::try_from(row)?;
        if is_assignment_effective(&assignment, now) {
            assignments.push(assignment);
        }
    }

    Ok(assignments)
}

const SELECT_COLUMNS: &str = r#"
    SELECT id, user_id, role, assignment_scope, business_id, location_id, department_id,
           assigned_at, assigned_by, expires_at, is_active, revoked_at, revoked_by,
           revocation_reason, notes, metadata
    FROM role_assignments
"#;

#[async_trait]
impl RoleAssignmentRepository for PostgresRoleAssignmentRepository {
    async fn insert_assignment(&self, assignment: RoleAssignment) -> AppResult<()> {
        let binding = assignment.binding();
        let revocation = assignment.revocation();

        sqlx::query(
            r#"
            INSERT INTO role_assignments (
                id,
                user_id,
                role,
                assignment_scope,
                business_id,
                location_id,
                department_id,
                assigned_at,
                assigned_by,
                expires_at,
                is_active,
                revoked_at,
                revoked_by,
                revocation_reason,
                notes,
                metadata
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(assignment.id().as_uuid())
        .bind(assignment.user_id().as_uuid())
        .bind(assignment.role().as_str())
        .bind(assignment.scope().as_str())
        .bind(binding.business_id().as_uuid())
        .bind(binding.location_id().map(|id| id.as_uuid()))
        .bind(binding.department_id().map(|id| id.as_uuid()))
        .bind(assignment.assigned_at())
        .bind(assignment.assigned_by().as_uuid())
        .bind(assignment.expires_at())
        .bind(assignment.is_active())
        .bind(revocation.map(|revocation| revocation.revoked_at))
        .bind(revocation.map(|revocation| revocation.revoked_by.as_uuid()))
        .bind(revocation.and_then(|revocation| revocation.reason.clone()))
        .bind(assignment.notes())
        .bind(assignment.metadata())
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::PermissionService(format!("failed to insert role assignment: {error}"))
        })?;

        Ok(())
    }

    async fn find_assignment(
        &self,
        assignment_id: RoleAssignmentId,
    ) -> AppResult<Option<RoleAssignment>> {
        let row =
            sqlx::query_as::<_, RoleAssignmentRow>(&format!("{SELECT_COLUMNS} WHERE id = $1"))
                .bind(assignment_id.as_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(|error| {
                    AppError::PermissionService(format!(
                        "failed to load role assignment: {error}"
                    ))
                })?;

        row.map(RoleAssignment::try_from).transpose()
    }

    async fn list_active_for_user(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<RoleAssignment>> {
        let rows = sqlx::query_as::<_, RoleAssignmentRow>(&format!(
            r#"{SELECT_COLUMNS}
            WHERE user_id = $1
              AND is_active
              AND (expires_at IS NULL OR expires_at > $2)
            ORDER BY assigned_at"#
        ))
        .bind(user_id.as_uuid())
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::PermissionService(format!("failed to list role assignments: {error}"))
        })?;

        to_assignments(rows, now)
    }

    async fn list_active_for_context(
        &self,
        context_id: BusinessContextId,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<RoleAssignment>> {
        let rows = sqlx::query_as::<_, RoleAssignmentRow>(&format!(
            r#"{SELECT_COLUMNS}
            WHERE (business_id = $1 OR location_id = $1 OR department_id = $1)
              AND is_active
              AND (expires_at IS NULL OR expires_at > $2)
            ORDER BY assigned_at"#
        ))
        .bind(context_id.as_uuid())
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::PermissionService(format!(
                "failed to list role assignments for context: {error}"
            ))
        })?;

        to_assignments(rows, now)
    }

    async fn mark_revoked(
        &self,
        assignment_id: RoleAssignmentId,
        revocation: Revocation,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE role_assignments
            SET is_active = FALSE,
                revoked_at = $2,
                revoked_by = $3,
                revocation_reason = $4
            WHERE id = $1 AND is_active
            "#,
        )
        .bind(assignment_id.as_uuid())
        .bind(revocation.revoked_at)
        .bind(revocation.revoked_by.as_uuid())
        .bind(
            revocation
                .reason
                .map(|reason| reason.trim().to_owned())
                .filter(|reason| !reason.is_empty()),
        )
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::PermissionService(format!("failed to revoke role assignment: {error}"))
        })?;

        let changed = result.rows_affected() > 0;
        debug!(assignment_id = %assignment_id, changed, "role assignment revocation applied");

        Ok(changed)
    }
}
