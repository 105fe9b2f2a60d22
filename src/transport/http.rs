use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::store::LatestStore;
use crate::utils::error::Result;

pub fn router(store: Arc<LatestStore>) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/weather/infos", get(latest))
        .with_state(store)
}

async fn health() -> &'static str {
    "OK"
}

/// The last relayed payload verbatim, or `204` before the first one.
/// `Last-Modified` carries the time it was stored.
async fn latest(State(store): State<Arc<LatestStore>>) -> Response {
    match store.snapshot() {
        Some(snapshot) => {
            let modified = snapshot
                .updated_at
                .format("%a, %d %b %Y %H:%M:%S GMT")
                .to_string();
            (
                [
                    (header::CONTENT_TYPE, "application/json".to_string()),
                    (header::LAST_MODIFIED, modified),
                ],
                snapshot.payload.to_string(),
            )
                .into_response()
        }
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

/// Binds `addr` and serves until `shutdown` is cancelled.
pub async fn serve(
    addr: SocketAddr,
    store: Arc<LatestStore>,
    shutdown: CancellationToken,
) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "http server listening");

    axum::serve(listener, router(store))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    info!("http server stopped");
    Ok(())
}
