use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

use crate::storage::{ExpiringStorage, MemoryStorage};
use crate::types::{GatehouseError, Result};

pub const DEFAULT_SOCKET_SWEEP_MINUTES: u64 = 60;

/// Messages buffered per socket before emits start dropping
const SOCKET_BUFFER: usize = 32;

/// A notification subscription sockets can attach to
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionInfo {
    pub id: String,
    /// Resource the subscription watches
    pub topic: String,
}

/// Receiving end of an attached socket
///
/// The connection task forwards received messages to the client. `recv`
/// returns `None` once the registry closed the socket.
#[derive(Debug)]
pub struct SocketHandle {
    pub socket_id: u64,
    pub subscription_id: String,
    receiver: mpsc::Receiver<String>,
}

impl SocketHandle {
    pub async fn recv(&mut self) -> Option<String> {
        self.receiver.recv().await
    }
}

struct OpenSocket {
    id: u64,
    sender: mpsc::Sender<String>,
}

/// Open sockets per subscription
pub struct WebSocketRegistry {
    subscriptions: Arc<dyn ExpiringStorage<SubscriptionInfo>>,
    sockets: DashMap<String, Vec<OpenSocket>>,
    next_id: AtomicU64,
}

impl WebSocketRegistry {
    pub fn new(subscriptions: Arc<dyn ExpiringStorage<SubscriptionInfo>>) -> Self {
        Self {
            subscriptions,
            sockets: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::new()))
    }

    /// Store a subscription, expiring after `ttl` if given
    pub async fn subscribe(&self, info: SubscriptionInfo, ttl: Option<Duration>) -> Result<()> {
        let id = info.id.clone();
        self.subscriptions.set_expiring(&id, info, ttl).await?;
        debug!("Stored notification subscription {}", id);
        Ok(())
    }

    /// Open a socket for an existing subscription
    pub async fn register(&self, subscription_id: &str) -> Result<SocketHandle> {
        if self.subscriptions.get(subscription_id).await?.is_none() {
            return Err(GatehouseError::NotFound(format!(
                "Unknown subscription {}",
                subscription_id
            )));
        }

        let (sender, receiver) = mpsc::channel(SOCKET_BUFFER);
        let socket_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.sockets
            .entry(subscription_id.to_string())
            .or_default()
            .push(OpenSocket { id: socket_id, sender });
        debug!("Socket {} attached to {}", socket_id, subscription_id);

        Ok(SocketHandle {
            socket_id,
            subscription_id: subscription_id.to_string(),
            receiver,
        })
    }

    /// Forget a socket, e.g. after the client disconnected
    pub fn unregister(&self, subscription_id: &str, socket_id: u64) {
        let now_empty = match self.sockets.get_mut(subscription_id) {
            Some(mut sockets) => {
                sockets.retain(|socket| socket.id != socket_id);
                sockets.is_empty()
            }
            None => false,
        };
        if now_empty {
            self.sockets.remove_if(subscription_id, |_, sockets| sockets.is_empty());
        }
    }

    /// Send a message to every socket of a subscription
    ///
    /// Returns how many sockets received it. Sockets whose client is gone
    /// are dropped; full sockets skip the message.
    pub fn emit(&self, subscription_id: &str, message: &str) -> usize {
        let Some(mut sockets) = self.sockets.get_mut(subscription_id) else {
            return 0;
        };
        let mut delivered = 0;
        sockets.retain(|socket| match socket.sender.try_send(message.to_string()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                debug!("Socket {} is full, dropping message", socket.id);
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        });
        delivered
    }

    /// Close the sockets of subscriptions that no longer exist
    pub async fn close_expired_sockets(&self) -> Result<usize> {
        let ids: Vec<String> = self.sockets.iter().map(|entry| entry.key().clone()).collect();
        let mut closed = 0;
        for id in ids {
            if self.subscriptions.get(&id).await?.is_none() {
                if let Some((_, sockets)) = self.sockets.remove(&id) {
                    closed += sockets.len();
                }
            }
        }
        Ok(closed)
    }

    /// Number of open sockets
    pub fn socket_count(&self) -> usize {
        self.sockets.iter().map(|entry| entry.value().len()).sum()
    }
}
