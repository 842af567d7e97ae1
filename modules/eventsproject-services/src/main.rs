use std::time::Duration;

use anyhow::Result;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use eventsproject_common::Config;
use eventsproject_services::EventServices;
use eventsproject_store::PgStore;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("eventsproject=info".parse()?))
        .init();

    let once = std::env::args().any(|arg| arg == "--once");

    let config = Config::from_env()?;
    let store = PgStore::connect(&config.database_url).await?;
    let services = EventServices::new(store.clone(), store.clone(), store);
    let organizer = config.file.organizer;

    if once {
        let updated = services.recompute_costs(&organizer).await?;
        info!(events = updated.len(), "Cost recomputation finished");
        return Ok(());
    }

    let period = Duration::from_secs(config.file.scheduler.recompute_interval_secs.max(1));
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
        info!("Shutting down");
    };

    services.run_recompute_loop(&organizer, period, shutdown).await;
    Ok(())
}
