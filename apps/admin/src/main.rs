//! Rendezvous access administration CLI.

#![forbid(unsafe_code)]

mod admin_config;
mod admin_services;

use std::sync::Arc;

use clap::{Parser, Subcommand};
use rendezvous_application::{PermissionContext, SystemClock};
use rendezvous_core::AppError;
use rendezvous_domain::{
    BusinessContextId, Permission, PermissionCatalog, Role, SubscriptionTier, UserId,
};
use serde::Serialize;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use tracing::{error, info};

use crate::admin_config::{AdminConfig, init_tracing};
use crate::admin_services::AdminServices;

#[derive(Parser, Debug)]
#[command(
    name = "rendezvous-admin",
    about = "Inspect and bootstrap Rendezvous access control"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Apply database migrations.
    Migrate,
    /// Print the permission catalog.
    Catalog {
        /// Subscription tier; defaults to SUBSCRIPTION_TIER.
        #[arg(value_parser = SubscriptionTier::parse)]
        tier: Option<SubscriptionTier>,
    },
    /// Evaluate one permission.
    Check {
        #[arg(value_parser = UserId::parse)]
        user_id: UserId,
        #[arg(value_parser = Permission::from_transport)]
        permission: Permission,
        /// Target context; omit for a platform-wide check.
        #[arg(value_parser = BusinessContextId::parse)]
        context_id: Option<BusinessContextId>,
        /// Owner of the resource, for self-service permissions.
        #[arg(long, value_name = "USER_ID", value_parser = UserId::parse)]
        target_user: Option<UserId>,
    },
    /// List the permissions a user holds at a context.
    Permissions {
        #[arg(value_parser = UserId::parse)]
        user_id: UserId,
        #[arg(value_parser = BusinessContextId::parse)]
        context_id: Option<BusinessContextId>,
    },
    /// List a user's effective role assignments.
    Active {
        #[arg(value_parser = UserId::parse)]
        user_id: UserId,
    },
    /// Count the nodes of a business tree.
    Stats {
        #[arg(value_parser = BusinessContextId::parse)]
        business_id: BusinessContextId,
    },
    /// Bootstrap the first owner of a business.
    GrantOwner {
        #[arg(value_parser = UserId::parse)]
        granted_by: UserId,
        #[arg(value_parser = BusinessContextId::parse)]
        business_id: BusinessContextId,
        #[arg(value_parser = UserId::parse)]
        owner_id: UserId,
    },
}

#[derive(Serialize)]
struct CatalogEntry {
    role: Role,
    rank: u8,
    permissions: Vec<Permission>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();
    init_tracing();

    if let Err(app_error) = run(cli.command).await {
        error!(code = app_error.code(), "{app_error}");
        std::process::exit(1);
    }
}

async fn run(command: Command) -> Result<(), AppError> {
    if let Command::Catalog { tier } = command {
        let tier = match tier {
            Some(tier) => tier,
            None => AdminConfig::tier_from_env()?,
        };
        return print_json(&catalog_entries(&PermissionCatalog::standard(tier)));
    }

    let config = AdminConfig::load()?;
    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await
        .map_err(|error| {
            AppError::PermissionService(format!("failed to connect to database: {error}"))
        })?;

    sqlx::migrate!("../../crates/infrastructure/migrations")
        .run(&pool)
        .await
        .map_err(|error| {
            AppError::PermissionService(format!("failed to run migrations: {error}"))
        })?;

    if matches!(command, Command::Migrate) {
        info!("database migrations applied successfully");
        return Ok(());
    }

    let services = AdminServices::postgres(
        pool,
        PermissionCatalog::standard(config.subscription_tier),
        Arc::new(SystemClock),
    );
    info!(tier = %config.subscription_tier, "permission evaluator ready");

    let output = execute(&services, command).await?;
    print_json(&output)
}

async fn execute(services: &AdminServices, command: Command) -> Result<Value, AppError> {
    match command {
        Command::Check {
            user_id,
            permission,
            context_id,
            target_user,
        } => {
            let context = PermissionContext {
                business_context_id: context_id,
                target_user_id: target_user,
                resource: None,
            };
            let decision = services
                .evaluator
                .evaluate(user_id, permission, &context)
                .await?;
            to_json(&decision)
        }
        Command::Permissions {
            user_id,
            context_id,
        } => {
            let context = PermissionContext {
                business_context_id: context_id,
                ..PermissionContext::global()
            };
            let permissions = services
                .evaluator
                .effective_permissions(user_id, &context)
                .await?;
            to_json(&permissions)
        }
        Command::Active { user_id } => {
            to_json(&services.evaluator.active_assignments(user_id).await?)
        }
        Command::Stats { business_id } => {
            to_json(&services.contexts.statistics(business_id).await?)
        }
        Command::GrantOwner {
            granted_by,
            business_id,
            owner_id,
        } => {
            let assignment = services
                .assignments
                .grant_initial_owner(granted_by, business_id, owner_id)
                .await?;
            info!(%business_id, %owner_id, "initial business owner granted");
            to_json(&assignment)
        }
        Command::Catalog { tier } => {
            let tier = tier.unwrap_or_else(|| services.evaluator.catalog().tier());
            to_json(&catalog_entries(&PermissionCatalog::standard(tier)))
        }
        Command::Migrate => Ok(Value::Null),
    }
}

fn catalog_entries(catalog: &PermissionCatalog) -> Vec<CatalogEntry> {
    let mut roles = Role::all().to_vec();
    roles.sort_by_key(|role| std::cmp::Reverse(role.rank()));

    roles
        .into_iter()
        .map(|role| CatalogEntry {
            role,
            rank: role.rank(),
            permissions: catalog.permissions_for(role).iter().copied().collect(),
        })
        .collect()
}

fn to_json<T: Serialize>(value: &T) -> Result<Value, AppError> {
    serde_json::to_value(value)
        .map_err(|error| AppError::Validation(format!("failed to render output: {error}")))
}

fn print_json<T: Serialize>(value: &T) -> Result<(), AppError> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|error| AppError::Validation(format!("failed to render output: {error}")))?;
    println!("{rendered}");
    Ok(())
}
