use chrono::Utc;
use rendezvous_application::BusinessContextRepository;
use rendezvous_domain::{BusinessContext, BusinessContextInput, ContextType};
use sqlx::PgPool;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

use crate::PostgresBusinessContextRepository;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Connects to `DATABASE_URL` and migrates, or returns `None` when unset.
pub(crate) async fn test_pool() -> Option<PgPool> {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        return None;
    };

    let pool = match PgPoolOptions::new()
        .max_connections(2)
        .connect(database_url.as_str())
        .await
    {
        Ok(pool) => pool,
        Err(error) => panic!("failed to connect to DATABASE_URL in test: {error}"),
    };

    if let Err(error) = MIGRATOR.run(&pool).await {
        panic!("failed to run migrations for postgres access tests: {error}");
    }

    Some(pool)
}

/// Inserts a business with one location and one department.
pub(crate) async fn seed_tree(
    pool: &PgPool,
) -> (BusinessContext, BusinessContext, BusinessContext) {
    let repository = PostgresBusinessContextRepository::new(pool.clone());
    let suffix = Uuid::new_v4().simple().to_string();

    let business = create(ContextType::Business, format!("Spa {suffix}"), None);
    let location = create(ContextType::Location, "Downtown".to_owned(), Some(&business));
    let department = create(ContextType::Department, "Nails".to_owned(), Some(&location));

    for context in [business.clone(), location.clone(), department.clone()] {
        assert!(repository.insert_context(context).await.is_ok());
    }

    (business, location, department)
}

fn create(
    context_type: ContextType,
    name: String,
    parent: Option<&BusinessContext>,
) -> BusinessContext {
    BusinessContext::create(
        BusinessContextInput {
            context_type,
            name,
            code: None,
            parent_context_id: parent.map(BusinessContext::id),
            display_order: 0,
            timezone: Some("Europe/Berlin".to_owned()),
        },
        parent,
        Utc::now(),
    )
    .unwrap_or_else(|error| unreachable!("context should be valid: {error}"))
}
