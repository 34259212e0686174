use log::*;
use service::AppState;
use std::future::Future;
use tokio::net::TcpListener;

mod controller;
pub mod error;
pub mod router;
mod sse;

/// Bind the configured interface and port and serve until `shutdown` resolves.
///
/// Open event streams keep the server from draining; callers stop the hub
/// first so that those streams end.
pub async fn init_server(
    app_state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let address = format!("{}:{}", app_state.config.interface, app_state.config.port);
    let listener = TcpListener::bind(&address).await?;

    info!(
        "Server starting... listening for connections on http://{} ({})",
        listener.local_addr()?,
        app_state.config.runtime_env()
    );

    let router = router::define_routes(app_state);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
}
