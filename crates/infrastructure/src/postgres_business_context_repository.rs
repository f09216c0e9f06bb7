use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use rendezvous_application::BusinessContextRepository;
use rendezvous_core::{AppError, AppResult};
use rendezvous_domain::{
    BusinessContext, BusinessContextId, BusinessContextParts, ContextPath, ContextType,
};

use crate::postgres_errors::map_write_error;

/// PostgreSQL-backed business-context hierarchy store.
#[derive(Clone)]
pub struct PostgresBusinessContextRepository {
    pool: PgPool,
}

impl PostgresBusinessContextRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct BusinessContextRow {
    id: Uuid,
    context_type: String,
    business_id: Uuid,
    parent_context_id: Option<Uuid>,
    name: String,
    code: Option<String>,
    level: i16,
    path: String,
    is_active: bool,
    display_order: i32,
    timezone: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<BusinessContextRow> for BusinessContext {
    type Error = AppError;

    fn try_from(row: BusinessContextRow) -> Result<Self, Self::Error> {
        let id = row.id;
        let corrupt = |error: AppError| {
            AppError::PermissionService(format!(
                "stored business context '{id}' is corrupt: {error}"
            ))
        };

        let level = u8::try_from(row.level)
            .map_err(|_| AppError::Validation(format!("invalid level {}", row.level)))
            .map_err(corrupt)?;

        BusinessContext::restore(BusinessContextParts {
            id: BusinessContextId::from_uuid(row.id),
            context_type: row.context_type.parse::<ContextType>().map_err(corrupt)?,
            business_id: BusinessContextId::from_uuid(row.business_id),
            parent_context_id: row.parent_context_id.map(BusinessContextId::from_uuid),
            name: row.name,
            code: row.code,
            level,
            path: ContextPath::parse(row.path.as_str()).map_err(corrupt)?,
            is_active: row.is_active,
            display_order: row.display_order,
            timezone: row.timezone,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
        .map_err(corrupt)
    }
}

fn to_contexts(rows: Vec<BusinessContextRow>) -> AppResult<Vec<BusinessContext>> {
    rows.into_iter().map(BusinessContext::try_from).collect()
}

const SELECT_COLUMNS: &str = r#"
    SELECT id, context_type, business_id, parent_context_id, name, code, level, path,
           is_active, display_order, timezone, created_at, updated_at
    FROM business_contexts
"#;

#[async_trait]
impl BusinessContextRepository for PostgresBusinessContextRepository {
    async fn insert_context(&self, context: BusinessContext) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO business_contexts (
                id,
                context_type,
                business_id,
                parent_context_id,
                name,
                code,
                level,
                path,
                is_active,
                display_order,
                timezone,
                created_at,
                updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(context.id().as_uuid())
        .bind(context.context_type().as_str())
        .bind(context.business_id().as_uuid())
        .bind(context.parent_context_id().map(|id| id.as_uuid()))
        .bind(context.name())
        .bind(context.code())
        .bind(i16::from(context.level()))
        .bind(context.path().to_storage())
        .bind(context.is_active())
        .bind(context.display_order())
        .bind(context.timezone())
        .bind(context.created_at())
        .bind(context.updated_at())
        .execute(&self.pool)
        .await
        .map_err(|error| {
            map_write_error(
                error,
                format!(
                    "business context '{}' collides with an existing name or code",
                    context.name()
                ),
                "failed to insert business context",
            )
        })?;

        Ok(())
    }

    async fn update_context(&self, context: BusinessContext) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE business_contexts
            SET parent_context_id = $2,
                name = $3,
                code = $4,
                path = $5,
                is_active = $6,
                display_order = $7,
                timezone = $8,
                updated_at = $9
            WHERE id = $1
            "#,
        )
        .bind(context.id().as_uuid())
        .bind(context.parent_context_id().map(|id| id.as_uuid()))
        .bind(context.name())
        .bind(context.code())
        .bind(context.path().to_storage())
        .bind(context.is_active())
        .bind(context.display_order())
        .bind(context.timezone())
        .bind(context.updated_at())
        .execute(&self.pool)
        .await
        .map_err(|error| {
            map_write_error(
                error,
                format!(
                    "business context '{}' collides with an existing name or code",
                    context.name()
                ),
                "failed to update business context",
            )
        })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "business context '{}'",
                context.id()
            )));
        }

        Ok(())
    }

    async fn find_context(
        &self,
        context_id: BusinessContextId,
    ) -> AppResult<Option<BusinessContext>> {
        let row =
            sqlx::query_as::<_, BusinessContextRow>(&format!("{SELECT_COLUMNS} WHERE id = $1"))
                .bind(context_id.as_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(|error| {
                    AppError::PermissionService(format!(
                        "failed to load business context: {error}"
                    ))
                })?;

        row.map(BusinessContext::try_from).transpose()
    }

    async fn find_contexts(
        &self,
        context_ids: &[BusinessContextId],
    ) -> AppResult<Vec<BusinessContext>> {
        let ids: Vec<Uuid> = context_ids.iter().map(|id| id.as_uuid()).collect();
        let rows = sqlx::query_as::<_, BusinessContextRow>(&format!(
            "{SELECT_COLUMNS} WHERE id = ANY($1) ORDER BY level"
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::PermissionService(format!("failed to load business contexts: {error}"))
        })?;

        to_contexts(rows)
    }

    async fn list_contexts_for_business(
        &self,
        business_id: BusinessContextId,
    ) -> AppResult<Vec<BusinessContext>> {
        let rows = sqlx::query_as::<_, BusinessContextRow>(&format!(
            "{SELECT_COLUMNS} WHERE business_id = $1 ORDER BY level, display_order, name"
        ))
        .bind(business_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::PermissionService(format!("failed to list business contexts: {error}"))
        })?;

        to_contexts(rows)
    }

    async fn name_exists(
        &self,
        business_id: BusinessContextId,
        context_type: ContextType,
        name: &str,
        excluding: Option<BusinessContextId>,
    ) -> AppResult<bool> {
        sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1
                FROM business_contexts
                WHERE business_id = $1
                  AND context_type = $2
                  AND name = $3
                  AND ($4::uuid IS NULL OR id <> $4)
            )
            "#,
        )
        .bind(business_id.as_uuid())
        .bind(context_type.as_str())
        .bind(name)
        .bind(excluding.map(|id| id.as_uuid()))
        .fetch_one(&self.pool)
        .await
        .map_err(|error| {
            AppError::PermissionService(format!("failed to check context name: {error}"))
        })
    }

    async fn code_exists(&self, business_id: BusinessContextId, code: &str) -> AppResult<bool> {
        sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1
                FROM business_contexts
                WHERE business_id = $1 AND code = $2
            )
            "#,
        )
        .bind(business_id.as_uuid())
        .bind(code)
        .fetch_one(&self.pool)
        .await
        .map_err(|error| {
            AppError::PermissionService(format!("failed to check context code: {error}"))
        })
    }
}
