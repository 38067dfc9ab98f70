//! Infrastructure wiring: store, sessions, mail transport and the access service.

use std::sync::Arc;

use anyhow::Context;

use accessgate_core::{Clock, SystemClock};
use accessgate_infra::{
    AccessConfig, AccessService, AccountStore, InMemoryAccountStore, LogMailer, Mailer,
    NotificationDispatcher, SessionRegistry, bootstrap_admin,
};

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

/// Process-level settings read once at startup.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub use_persistent_stores: bool,
    pub database_url: Option<String>,
    /// Seeded as an active ADMIN when running on the in-memory store.
    pub seed_admin_email: Option<String>,
    pub access: AccessConfig,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let var = |key: &str| {
            std::env::var(key)
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let use_persistent_stores = var("USE_PERSISTENT_STORES")
            .map(|v| v.parse::<bool>().unwrap_or(false))
            .unwrap_or(false);

        Self {
            bind_addr: var("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            use_persistent_stores,
            database_url: var("DATABASE_URL"),
            seed_admin_email: var("ADMIN_EMAIL"),
            access: AccessConfig::from_env(),
        }
    }
}

/// Build the access service for the configured backend.
///
/// Notifications go through a background worker; its task lives as long as
/// the service.
pub async fn build_services(config: &ServerConfig) -> anyhow::Result<Arc<AccessService>> {
    let (store, sessions): (Arc<dyn AccountStore>, Arc<dyn SessionRegistry>) =
        if config.use_persistent_stores {
            build_persistent_stores(config).await?
        } else {
            let store = InMemoryAccountStore::new();
            if let Some(email) = &config.seed_admin_email {
                let outcome = bootstrap_admin(&store, email, None, chrono::Utc::now())
                    .await
                    .context("failed to seed admin")?;
                tracing::info!(user_id = %outcome.user.id, "seeded in-memory admin");
            }
            let sessions: Arc<dyn SessionRegistry> = Arc::new(store.clone());
            let store: Arc<dyn AccountStore> = Arc::new(store);
            (store, sessions)
        };

    let mailer: Arc<dyn Mailer> = Arc::new(LogMailer::new(config.access.mail_from.clone()));
    let (notifier, _worker) =
        NotificationDispatcher::background(mailer, config.access.notification_settings());

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    Ok(Arc::new(AccessService::new(
        store,
        sessions,
        notifier,
        clock,
        &config.access,
    )))
}

#[cfg(feature = "postgres")]
async fn build_persistent_stores(
    config: &ServerConfig,
) -> anyhow::Result<(Arc<dyn AccountStore>, Arc<dyn SessionRegistry>)> {
    let database_url = config
        .database_url
        .as_deref()
        .context("DATABASE_URL must be set when USE_PERSISTENT_STORES=true")?;

    let store = accessgate_infra::PostgresAccountStore::connect(database_url)
        .await
        .context("failed to connect to Postgres")?;
    store.migrate().await.context("failed to run migrations")?;

    let store = Arc::new(store);
    let sessions: Arc<dyn SessionRegistry> = store.clone();
    let store: Arc<dyn AccountStore> = store;
    Ok((store, sessions))
}

#[cfg(not(feature = "postgres"))]
async fn build_persistent_stores(
    _config: &ServerConfig,
) -> anyhow::Result<(Arc<dyn AccountStore>, Arc<dyn SessionRegistry>)> {
    tracing::warn!(
        "USE_PERSISTENT_STORES=true but postgres feature not enabled, falling back to in-memory"
    );
    let store = InMemoryAccountStore::new();
    let sessions: Arc<dyn SessionRegistry> = Arc::new(store.clone());
    let store: Arc<dyn AccountStore> = Arc::new(store);
    Ok((store, sessions))
}
