//! Runs the onboarding aggregation worker until Ctrl-C.
//!
//! Settings come from `TENANT_SCOPE_*` variables or CLI flags. Without a
//! `database_url` the worker runs over in-memory adapters, which is only
//! useful for smoke tests.
#![cfg_attr(not(any(test, doctest)), deny(clippy::unwrap_used))]
#![cfg_attr(not(any(test, doctest)), deny(clippy::expect_used))]

use std::env;
use std::sync::Arc;

use color_eyre::eyre::{Context, Result, eyre};
use mockable::{Clock, DefaultClock};
use ortho_config::OrthoConfig;
use tenant_scope::domain::ports::{CredentialVerifier, FixtureCredentialVerifier};
use tenant_scope::{AppAdapters, AppContainer, ScopeSettings, telemetry};
use tokio::runtime::Builder;
use tracing::{info, warn};

fn main() -> Result<()> {
    color_eyre::install()?;
    telemetry::init_tracing();
    let settings = ScopeSettings::load_from_iter(env::args_os())
        .map_err(|err| eyre!("failed to load settings: {err}"))?;

    let runtime = Builder::new_multi_thread()
        .enable_all()
        .build()
        .wrap_err("failed to build worker runtime")?;
    runtime.block_on(run(settings))
}

async fn run(settings: ScopeSettings) -> Result<()> {
    let clock: Arc<dyn Clock> = Arc::new(DefaultClock);
    // The worker never resolves principals.
    let credentials: Arc<dyn CredentialVerifier> = Arc::new(FixtureCredentialVerifier);
    let adapters = if settings.database_url.is_some() {
        AppAdapters::postgres(&settings, credentials, clock)
            .await
            .wrap_err("failed to connect adapters")?
    } else {
        warn!("database_url not set; running over in-memory adapters");
        AppAdapters::in_memory(credentials, clock)
    };

    let container = AppContainer::build(&settings, adapters);
    container.start_worker();
    info!(
        channel = %settings.onboarding_channel(),
        "onboarding aggregation worker running"
    );

    tokio::signal::ctrl_c()
        .await
        .wrap_err("failed to listen for shutdown signal")?;
    info!("shutdown requested");
    container.shutdown().await;
    Ok(())
}
