//! Garden Relay - Main entry point.
//!
//! This binary starts the relay with:
//! - Structured JSON logging for production
//! - The registered-user store loaded from disk
//! - The command API for the bot front-end
//! - Graceful shutdown handling (SIGTERM/SIGINT) that stops every session
//!
//! # Configuration
//!
//! See [`garden_relay::config`] for environment variable configuration.
//!
//! # Example
//!
//! ```bash
//! # Development mode (no auth)
//! GARDEN_RELAY_UNSAFE_NO_AUTH=true \
//! GARDEN_RELAY_DELIVERY_URL=http://localhost:3000 \
//! cargo run --bin garden-relay
//!
//! # Production mode
//! GARDEN_RELAY_DELIVERY_URL=http://bot:3000 \
//! GARDEN_RELAY_API_TOKEN="secret-token" \
//! PORT=8080 \
//! cargo run --release --bin garden-relay
//! ```

use std::process::ExitCode;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use garden_relay::feeds::StockApiClient;
use garden_relay::routes::{create_router, AppState};
use garden_relay::{
    CommandHandler, Config, JsonFileUserStore, ReportSource, SessionManager, StockAggregator,
    WebhookDelivery,
};

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, "Failed to load configuration");
            print_usage(&err.to_string());
            return ExitCode::from(1);
        }
    };

    match run(config).await {
        Ok(()) => {
            info!("Relay shutdown complete");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(error = %err, config_error = err.is_config_error(), "Relay failed");
            ExitCode::from(1)
        }
    }
}

async fn run(config: Config) -> garden_relay::Result<()> {
    let auth_mode = if config.unsafe_no_auth {
        "disabled (UNSAFE)"
    } else {
        "enabled"
    };
    info!(
        port = config.port,
        auth_mode = auth_mode,
        interval_secs = config.interval.as_secs(),
        users_file = %config.users_file.display(),
        "Garden relay starting"
    );

    let users = Arc::new(JsonFileUserStore::load(&config.users_file).await);

    let client = StockApiClient::new(config.endpoints.clone(), config.fetch_timeout)?;
    let reports: Arc<dyn ReportSource> = Arc::new(StockAggregator::new(client));
    let delivery = Arc::new(WebhookDelivery::new(config.delivery_url.clone())?);

    let sessions = SessionManager::with_interval(reports.clone(), delivery, config.interval);
    let commands = CommandHandler::new(users, sessions.clone());

    let bind_addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&bind_addr).await.inspect_err(|err| {
        error!(error = %err, address = %bind_addr, "Failed to bind to address");
    })?;
    info!(port = config.port, address = %bind_addr, "Command API listening");

    let app = create_router(AppState::new(config, commands, reports));
    let result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    info!(
        active_sessions = sessions.active_count(),
        "Stopping tracking sessions"
    );
    sessions.shutdown().await;

    result.map_err(Into::into)
}

fn print_usage(err: &str) {
    eprintln!("Error: {err}");
    eprintln!();
    eprintln!("Required environment variables:");
    eprintln!("  GARDEN_RELAY_DELIVERY_URL       - Base URL of the bot front-end webhook");
    eprintln!("  GARDEN_RELAY_API_TOKEN          - Bearer token for the command API");
    eprintln!();
    eprintln!("Optional environment variables:");
    eprintln!("  PORT                            - HTTP server port (default: 8080)");
    eprintln!("  RUST_LOG                        - Log level filter (default: info)");
    eprintln!("  GARDEN_RELAY_USERS_FILE         - Registered users file (default: registeredUsers.json)");
    eprintln!("  GARDEN_RELAY_STOCK_API_URL      - Gear, seed, egg, weather and cosmetics feed host");
    eprintln!("  GARDEN_RELAY_AUX_API_URL        - Honey and seed-emoji feed host");
    eprintln!("  GARDEN_RELAY_INTERVAL_SECS      - Seconds between reports, 1 to 86400 (default: 10)");
    eprintln!("  GARDEN_RELAY_FETCH_TIMEOUT_SECS - Per-feed request timeout (default: none)");
    eprintln!("  GARDEN_RELAY_UNSAFE_NO_AUTH     - Disable auth (dev only, set to 'true')");
}

/// Initialize structured logging with tracing.
///
/// JSON output, filtered by `RUST_LOG` with a default of `info`.
fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug,axum::rejection=trace"));

    let json_layer = fmt::layer()
        .json()
        .with_target(true)
        .with_level(true)
        .with_file(false)
        .with_line_number(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .init();
}

/// Resolves when SIGINT or SIGTERM is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!(error = %err, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                error!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C), initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
