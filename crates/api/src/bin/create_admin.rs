//! Create or promote the operator account.
//!
//! Reads `ADMIN_EMAIL` (default `admin@example.com`), `ADMIN_NAME` (default
//! `Admin User`) and `DATABASE_URL`. Only meaningful against Postgres.

const DEFAULT_ADMIN_EMAIL: &str = "admin@example.com";
const DEFAULT_ADMIN_NAME: &str = "Admin User";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    accessgate_observability::init();

    let email = std::env::var("ADMIN_EMAIL").unwrap_or_else(|_| DEFAULT_ADMIN_EMAIL.to_string());
    let name = std::env::var("ADMIN_NAME").unwrap_or_else(|_| DEFAULT_ADMIN_NAME.to_string());

    run(&email, &name).await
}

#[cfg(feature = "postgres")]
async fn run(email: &str, name: &str) -> anyhow::Result<()> {
    use accessgate_infra::{PostgresAccountStore, bootstrap_admin};
    use anyhow::Context;

    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let store = PostgresAccountStore::connect(&database_url)
        .await
        .context("failed to connect to Postgres")?;
    store.migrate().await.context("failed to run migrations")?;

    let outcome = bootstrap_admin(&store, email, Some(name), chrono::Utc::now())
        .await
        .context("failed to create admin")?;

    if outcome.created {
        tracing::info!(user_id = %outcome.user.id, email = %outcome.user.email, "admin created");
    } else {
        tracing::info!(
            user_id = %outcome.user.id,
            email = %outcome.user.email,
            "admin already existed; ensured ADMIN/ACTIVE"
        );
    }
    Ok(())
}

#[cfg(not(feature = "postgres"))]
async fn run(_email: &str, _name: &str) -> anyhow::Result<()> {
    anyhow::bail!("create-admin needs a persistent store; rebuild with --features postgres")
}
