//! Notification sockets
//!
//! Keeps the open sockets of every notification subscription in process
//! memory. Sockets of subscriptions that expired are closed by a periodic
//! sweep. The registry is not shared between server processes.

mod registry;

pub use registry::{SocketHandle, SubscriptionInfo, WebSocketRegistry, DEFAULT_SOCKET_SWEEP_MINUTES};

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Spawn the task that closes sockets of expired subscriptions
pub fn spawn_cleanup_task(registry: Arc<WebSocketRegistry>, interval: Duration) {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;
            match registry.close_expired_sockets().await {
                Ok(0) => {}
                Ok(closed) => debug!("Closed {} sockets of expired subscriptions", closed),
                Err(e) => warn!("Notification socket sweep failed: {}", e),
            }
        }
    });
    info!("Notification socket sweep started (every {:?})", interval);
}
