//! Connection handling for the file server.
//!
//! The overlay network transport is abstracted behind axum's [`Listener`]
//! trait: anything that yields accepted, already-authenticated byte streams
//! can be served. [`bind`] provides the default plain TCP listener, meant to
//! be bound to the overlay interface address.
//!
//! Each accepted connection is served on its own tokio task; requests share
//! nothing but the [`FileServer`]'s immutable configuration.

use std::fmt::Debug;
use std::future::Future;
use std::io;
use std::net::SocketAddr;

use axum::extract::connect_info::ConnectInfo;
use axum::extract::{Request, State};
use axum::http::Extensions;
use axum::response::Response;
use axum::serve::ListenerExt;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

pub use axum::serve::Listener;

use crate::server::{FileServer, RequestMethod};

/// Bind a TCP listener on `addr`.
pub async fn bind(addr: SocketAddr) -> io::Result<TcpListener> {
    let listener = TcpListener::bind(addr).await?;
    tracing::debug!("Listener bound to {}", listener.local_addr()?);
    Ok(listener)
}

/// Build the router sending every path and method to `server`.
///
/// Peers are identified by [`SocketAddr`] when the connection carries one.
pub fn router(server: FileServer) -> Router {
    app::<SocketAddr>(server)
}

fn app<A>(server: FileServer) -> Router
where
    A: Debug + Clone + Send + Sync + 'static,
{
    Router::new()
        .fallback(dispatch::<A>)
        .with_state(server)
        .layer(TraceLayer::new_for_http())
}

async fn dispatch<A>(State(server): State<FileServer>, request: Request) -> Response
where
    A: Debug + Clone + Send + Sync + 'static,
{
    let peer = peer_addr::<A>(request.extensions());
    let (parts, body) = request.into_parts();
    server
        .handle(
            RequestMethod::from(&parts.method),
            peer.as_deref(),
            parts.uri.path(),
            body,
        )
        .await
}

/// The remote address recorded for the connection, if any.
fn peer_addr<A>(extensions: &Extensions) -> Option<String>
where
    A: Debug + Clone + Send + Sync + 'static,
{
    extensions
        .get::<ConnectInfo<A>>()
        .map(|ConnectInfo(addr)| format!("{:?}", addr))
}

/// Serve `server` on `listener` until `shutdown` resolves.
///
/// Each request is tagged with the listener's remote address for logging.
/// In-flight connections are allowed to finish after shutdown is requested.
pub async fn serve<L, F>(listener: L, server: FileServer, shutdown: F) -> io::Result<()>
where
    L: Listener,
    L::Addr: Debug + Clone + Send + Sync + 'static,
    F: Future<Output = ()> + Send + 'static,
{
    let listener = listener.tap_io(|_| {});
    let app = app::<L::Addr>(server).into_make_service_with_connect_info::<L::Addr>();

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}

/// Resolves when the process receives Ctrl-C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl-C, shutting down"),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}
