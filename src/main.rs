//! Gatehouse - account and identity server for personal data pods

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gatehouse::{
    config::Args,
    interaction::{password::LogEmailSender, DisabledInteractionProvider},
    server, Gatehouse,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("gatehouse={},info", args.log_level).into());
    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("======================================");
    info!("  Gatehouse {}", env!("CARGO_PKG_VERSION"));
    info!("======================================");
    info!("Listen: {}", args.listen);
    info!("Base URL: {}", args.base_url());
    info!("Account API: {}", args.account_base_url());
    info!("Root pod: {}", if args.allow_root_pod { "allowed" } else { "disabled" });
    info!("======================================");
    if args.allow_external_webids {
        warn!("External WebIDs are linked without ownership verification");
    }

    let gatehouse = Gatehouse::new(
        args,
        Arc::new(DisabledInteractionProvider),
        Arc::new(LogEmailSender),
    );
    gatehouse.spawn_background_tasks();

    match gatehouse.seed_accounts().await {
        Ok(0) => {}
        Ok(count) => info!("Seeded {} accounts", count),
        Err(e) => {
            error!("Failed to seed accounts: {}", e);
            std::process::exit(1);
        }
    }

    server::run(Arc::clone(&gatehouse.state)).await?;
    Ok(())
}
