//! axumサーバー起動・シャットダウンハンドリング

use crate::shutdown::ShutdownController;
use crate::AppState;
use driftwatch_common::error::WatchError;
use tracing::info;

/// ログAPIサーバーを起動し、シャットダウン要求まで待機する
pub async fn run(
    state: AppState,
    bind_addr: &str,
    shutdown: ShutdownController,
) -> Result<(), WatchError> {
    let app = crate::api::create_app(state);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;

    info!("Log API server listening on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.wait().await })
        .await?;

    info!("Server shutdown complete");
    Ok(())
}
