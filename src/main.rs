use std::time::Duration;

use tracing::{error, info, warn};

use rssy::{Config, Database, FeedFetcher, Poller};

/// How long shutdown waits for an in-flight poll cycle.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() {
    // Environment from .env, if present
    dotenvy::dotenv().ok();

    // Load configuration
    let config = match Config::load_with_env("config.toml") {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config.toml: {e}");
            eprintln!("Using default configuration.");
            let mut config = Config::default();
            config.apply_env_overrides();
            config
        }
    };

    // Initialize logging
    if let Err(e) = rssy::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        // Fall back to console-only logging
        rssy::logging::init_console_only(&config.logging.level);
    }

    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        std::process::exit(1);
    }

    info!("RSSY feed aggregator v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(config).await {
        error!("Fatal error: {}", e);
        std::process::exit(1);
    }
}

async fn run(config: Config) -> rssy::Result<()> {
    let db = Database::open(&config.database.path).await?;

    if config.poller.seed_default_feeds {
        rssy::seed_default_feeds(&db).await?;
    }

    let fetcher = FeedFetcher::with_config(db.clone(), &config)?;
    let poller = Poller::with_fetcher(fetcher, config.poller.interval());

    if config.poller.enabled {
        poller.start()?;
    } else {
        warn!("Feed poller disabled in configuration");
    }

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");

    poller.stop();
    if tokio::time::timeout(SHUTDOWN_TIMEOUT, poller.join())
        .await
        .is_err()
    {
        warn!("Poll cycle still running after {:?}, exiting", SHUTDOWN_TIMEOUT);
    }

    db.close().await;
    info!("Goodbye");
    Ok(())
}
