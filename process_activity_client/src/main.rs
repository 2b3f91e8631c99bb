use std::sync::Arc;
use tokio::signal;
use tokio::time::Duration;

use process_activity_client::app_config::Settings;
use process_activity_client::collection::collector::ActivityCollector;
use process_activity_client::collection::process_source::SystemProcessSource;
use process_activity_client::errors::AppError;
use process_activity_client::internal_logger;
use process_activity_client::network::api_client::ApiClient;
use process_activity_client::services::reporter;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let settings = match Settings::new() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!(
                "FATAL: Configuration error: {}. Ensure 'client_settings.toml' exists and is valid in expected locations.",
                e
            );
            return Err(e);
        }
    };

    if let Err(e) = internal_logger::init_logging(&settings) {
        eprintln!("FATAL: Internal logger initialization error: {}", e);
        return Err(e);
    }

    tracing::info!(
        "Process activity client starting. Version: {}",
        env!("CARGO_PKG_VERSION")
    );
    tracing::debug!("Loaded settings. Server URL: '{}'", settings.server_url);

    let mut api_client = ApiClient::new(Arc::clone(&settings))?;

    if !api_client.check_server_status().await.is_reachable() {
        tracing::warn!(
            "Server at '{}' is not reachable yet; attempting login anyway",
            settings.server_url
        );
    }

    if !api_client.login(&settings.username, &settings.password).await {
        tracing::error!(
            "Could not authenticate against '{}' (status: {}). Verify credentials and server availability.",
            settings.server_url,
            api_client.session().status()
        );
        return Err(AppError::Authentication(
            "initial login failed".to_string(),
        ));
    }
    tracing::info!(
        "Authenticated (status: {}, role: {})",
        api_client.session().status(),
        api_client.session().role().unwrap_or("unknown")
    );

    let mut collector = ActivityCollector::new();
    // Prefer the identity the server handed back; fall back to the
    // configured user id for servers that omit it.
    let user_id = api_client.session().user_id().or(settings.user_id);
    collector.set_user_id(user_id)?;

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let mut reporter_task = tokio::spawn(reporter::run_reporter(
        Arc::clone(&settings),
        Box::new(SystemProcessSource::new()),
        collector,
        api_client,
        shutdown_rx,
    ));
    tracing::info!("Reporter task started.");

    tokio::select! {
        biased;

        _ = signal::ctrl_c() => {
            tracing::info!("Interrupt signal (Ctrl+C) received, initiating shutdown...");
            if shutdown_tx.send(true).is_err() {
                tracing::warn!("Failed to send shutdown signal (receiver dropped). Reporter may have already terminated.");
            }
            match tokio::time::timeout(Duration::from_secs(10), &mut reporter_task).await {
                Ok(Ok(Ok(()))) => tracing::debug!("Reporter completed shutdown."),
                Ok(Ok(Err(e))) => tracing::error!("Reporter completed with error during shutdown: {}", e),
                Ok(Err(e)) => tracing::error!("Reporter task panicked or was cancelled during shutdown: {}", e),
                Err(_) => tracing::warn!("Reporter timed out during shutdown."),
            }
        }
        result = &mut reporter_task => {
            tracing::error!("Reporter task exited prematurely. Outcome: {:?}", result);
        }
    }

    tracing::info!("Application shutdown sequence complete.");
    Ok(())
}
