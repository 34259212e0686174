use entity_api::PollingChangeFeed;
use events::{watch_patient_data, EventPublisher};
use log::*;
use sea_orm::DatabaseConnection;
use service::{config::Config, logging::Logger, AppState};
use sse::domain_event_handler::SseDomainEventHandler;
use sse::Manager;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::Notify;

#[tokio::main]
async fn main() {
    let config = Config::new();
    if let Err(e) = Logger::init_logger(&config) {
        eprintln!("Failed to start logger: {e}");
        std::process::exit(1);
    }

    info!("Starting up VitalSign API [{}]...", config.runtime_env());

    let db = match service::init_database(&config).await {
        Ok(db) => Arc::new(db),
        Err(e) => {
            error!("Failed to establish database connection: {e}");
            std::process::exit(1);
        }
    };

    let (sse_manager, hub) = Manager::start(config.hub_config());

    let publisher = EventPublisher::new()
        .with_handler(Arc::new(SseDomainEventHandler::new(sse_manager.clone())));
    let feed_stopped = Arc::new(Notify::new());
    let feed = tokio::spawn(watch_patients(
        Arc::clone(&db),
        config.clone(),
        publisher,
        Arc::clone(&feed_stopped),
    ));

    let app_state = AppState::new(config, &db, sse_manager.clone());

    let shutdown_manager = sse_manager.clone();
    let shutdown = async move {
        tokio::select! {
            _ = shutdown_signal() => info!("Shutdown signal received, closing event streams"),
            _ = feed_stopped.notified() => {
                error!("Live updates are unavailable, shutting down so the process can be restarted")
            }
        }
        shutdown_manager.shutdown().await;
    };

    let mut exit_code = 0;
    if let Err(e) = web::init_server(app_state, shutdown).await {
        error!("Server error: {e}");
        exit_code = 1;
    }

    // A change feed that stopped on its own leaves the service unable to do its job
    if feed.is_finished() {
        exit_code = 1;
    } else {
        feed.abort();
    }

    sse_manager.shutdown().await;
    if let Err(e) = hub.await {
        error!("SSE hub task failed: {e}");
    }

    info!("VitalSign API stopped");
    std::process::exit(exit_code);
}

async fn watch_patients(
    db: Arc<DatabaseConnection>,
    config: Config,
    publisher: EventPublisher,
    stopped: Arc<Notify>,
) {
    let mut feed = PollingChangeFeed::new(db, config.patient_poll_interval());

    match watch_patient_data(&mut feed, &publisher, config.feed_error_escalation).await {
        Ok(()) => error!("Patient change feed ended unexpectedly"),
        Err(e) => error!("Patient change feed failed: {e}"),
    }
    stopped.notify_one();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {e}");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
