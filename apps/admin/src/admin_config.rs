use std::env;

use rendezvous_core::AppError;
use rendezvous_domain::SubscriptionTier;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
pub struct AdminConfig {
    pub database_url: String,
    pub database_max_connections: u32,
    pub subscription_tier: SubscriptionTier,
}

impl AdminConfig {
    pub fn load() -> Result<Self, AppError> {
        let database_url = required_env("DATABASE_URL")?;
        let database_max_connections = match env::var("DATABASE_MAX_CONNECTIONS") {
            Ok(value) => value.trim().parse::<u32>().map_err(|error| {
                AppError::Validation(format!("invalid DATABASE_MAX_CONNECTIONS: {error}"))
            })?,
            Err(_) => 10,
        };

        Ok(Self {
            database_url,
            database_max_connections,
            subscription_tier: Self::tier_from_env()?,
        })
    }

    /// Reads `SUBSCRIPTION_TIER`, defaulting to premium.
    pub fn tier_from_env() -> Result<SubscriptionTier, AppError> {
        Ok(env::var("SUBSCRIPTION_TIER")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(|value| SubscriptionTier::parse(value.as_str()))
            .transpose()?
            .unwrap_or(SubscriptionTier::Premium))
    }
}

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn required_env(name: &str) -> Result<String, AppError> {
    env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| AppError::Validation(format!("{name} must be set")))
}
