//! WebSocket server: accept loop and per-connection session startup.
//!
//! 1. Bind a TCP listener on the configured address.
//! 2. Accept connections and complete the WebSocket handshake.
//! 3. Register each connection with the hub as a subscriber and start its
//!    outbound and inbound loops (see [`session`](super::session)).
//! 4. Stop accepting once the `running` flag is cleared.
//!
//! Each connection is handled in its own Tokio task, so a slow handshake or
//! a failed one never delays the accept loop or other subscribers.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_tungstenite::accept_async;
use tracing::{debug, error, info, warn};

use crate::domain::SessionSettings;
use crate::infrastructure::hub::HubHandle;
use crate::infrastructure::session::start_session;

/// How often the accept loop re-checks the `running` flag when idle.
const ACCEPT_POLL: Duration = Duration::from_millis(200);

/// Binds the WebSocket listener.
///
/// # Errors
///
/// Returns an error if the address is in use or cannot be bound.
pub async fn bind(addr: SocketAddr) -> anyhow::Result<TcpListener> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind WebSocket listener on {addr}"))?;
    info!("WebSocket server listening on {}", listener.local_addr().unwrap_or(addr));
    Ok(listener)
}

/// Runs the accept loop until `running` is set to `false`.
///
/// Accept errors are logged and the loop continues.
pub async fn serve(
    listener: TcpListener,
    hub: HubHandle,
    settings: SessionSettings,
    running: Arc<AtomicBool>,
) {
    loop {
        if !running.load(Ordering::Relaxed) {
            info!("shutdown flag set; stopping accept loop");
            break;
        }

        match timeout(ACCEPT_POLL, listener.accept()).await {
            Ok(Ok((stream, peer_addr))) => {
                debug!("new connection from {peer_addr}");
                let hub = hub.clone();
                tokio::spawn(async move {
                    handle_connection(stream, peer_addr, hub, settings).await;
                });
            }
            Ok(Err(e)) => {
                // Transient (e.g. too many open files); keep serving.
                error!("accept error: {e}");
            }
            Err(_) => {
                // No connection in the last poll interval.
            }
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    hub: HubHandle,
    settings: SessionSettings,
) {
    let ws = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!("WebSocket handshake failed with {peer_addr}: {e}");
            return;
        }
    };

    match start_session(ws, &hub, settings).await {
        Ok(tasks) => {
            info!(id = %tasks.id, "subscriber connected from {peer_addr}");
            tasks.join().await;
        }
        Err(e) => warn!("could not register {peer_addr}: {e}"),
    }
}
