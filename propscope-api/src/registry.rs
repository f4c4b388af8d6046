//! Notification registry for live-update connections
//!
//! Every open `/api/stream` connection registers here, tagged with the
//! property URL it is waiting on. Delivery is best-effort per connection: a
//! dead connection is logged and skipped, never failing the rest of the
//! broadcast.
//!
//! Each connection gets two channels. Started notices go through a `watch`
//! that only holds the latest super_id, so repeated started callbacks never
//! queue up. The terminal ready event has its own `oneshot` and always finds
//! room, however far behind the connection is.

use std::sync::{Arc, Mutex, MutexGuard};

use propscope_common::{AnalysisStatus, StreamEvent};
use tokio::sync::{oneshot, watch};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Identifier of one registered connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientId(Uuid);

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

struct Client {
    id: ClientId,
    property_url: String,
    /// Latest started super_id not yet read by the stream
    started: watch::Sender<Option<String>>,
    terminal: oneshot::Sender<StreamEvent>,
}

/// Per-broadcast delivery counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delivery {
    pub delivered: usize,
    pub failed: usize,
}

/// Shared registry of open connections
#[derive(Clone, Default)]
pub struct ClientRegistry {
    clients: Arc<Mutex<Vec<Client>>>,
}

/// Registration handle held by a stream; dropping it deregisters the connection
pub struct Subscription {
    id: ClientId,
    started: watch::Receiver<Option<String>>,
    /// `None` once the terminal event was taken
    terminal: Option<oneshot::Receiver<StreamEvent>>,
    registry: ClientRegistry,
}

impl Subscription {
    pub fn id(&self) -> ClientId {
        self.id
    }

    /// Next event, or `None` once the registry released this connection.
    ///
    /// A pending terminal event is returned ahead of an unread started notice.
    pub async fn recv(&mut self) -> Option<StreamEvent> {
        loop {
            let terminal = self.terminal.as_mut()?;
            tokio::select! {
                biased;

                result = terminal => {
                    self.terminal = None;
                    return result.ok();
                }

                changed = self.started.changed() => {
                    if changed.is_err() {
                        // Sender gone: the terminal branch resolves on the next pass
                        continue;
                    }
                    let super_id = self.started.borrow_and_update().clone();
                    if let Some(super_id) = super_id {
                        return Some(StreamEvent::Started { super_id });
                    }
                }
            }
        }
    }

    /// Stop accepting events; later deliveries to this connection fail
    pub fn close(&mut self) {
        if let Some(terminal) = self.terminal.as_mut() {
            terminal.close();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.registry.remove_client(self.id);
    }
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Client>> {
        // A panic while holding the lock cannot leave the list half-updated
        self.clients.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register a connection waiting on `property_url`
    pub fn add_client(&self, property_url: &str) -> Subscription {
        let (started_tx, started_rx) = watch::channel(None);
        let (terminal_tx, terminal_rx) = oneshot::channel();
        let id = ClientId(Uuid::new_v4());
        let mut clients = self.lock();
        clients.push(Client {
            id,
            property_url: property_url.to_string(),
            started: started_tx,
            terminal: terminal_tx,
        });
        info!(
            "Stream client {} registered for {} ({} open)",
            id,
            property_url,
            clients.len()
        );

        Subscription {
            id,
            started: started_rx,
            terminal: Some(terminal_rx),
            registry: self.clone(),
        }
    }

    /// Deregister a connection; unknown ids are ignored
    pub fn remove_client(&self, id: ClientId) {
        let mut clients = self.lock();
        let before = clients.len();
        clients.retain(|c| c.id != id);
        if clients.len() < before {
            debug!("Stream client {} removed ({} open)", id, clients.len());
        }
    }

    /// Push a non-terminal started event; connections stay registered.
    ///
    /// An unread notice is replaced, and a redelivery of the same super_id
    /// produces no second frame.
    pub fn notify_started(&self, property_url: &str, super_id: &str) -> Delivery {
        let mut clients = self.lock();
        let mut delivery = Delivery::default();
        clients.retain(|client| {
            if client.property_url != property_url {
                return true;
            }
            if client.terminal.is_closed() {
                warn!("Stream client {} closed, removing", client.id);
                delivery.failed += 1;
                return false;
            }
            client.started.send_if_modified(|current| {
                if current.as_deref() == Some(super_id) {
                    return false;
                }
                *current = Some(super_id.to_string());
                true
            });
            delivery.delivered += 1;
            true
        });
        delivery
    }

    /// Push the terminal ready event and release every matching connection
    pub fn notify(
        &self,
        property_url: &str,
        super_id: Option<&str>,
        status: AnalysisStatus,
    ) -> Delivery {
        let event = StreamEvent::Ready {
            super_id: super_id.map(String::from),
            status,
        };

        let matched: Vec<Client> = {
            let mut clients = self.lock();
            let (matched, rest): (Vec<Client>, Vec<Client>) = clients
                .drain(..)
                .partition(|c| c.property_url == property_url);
            *clients = rest;
            matched
        };

        let mut delivery = Delivery::default();
        for client in matched {
            match client.terminal.send(event.clone()) {
                Ok(()) => delivery.delivered += 1,
                Err(_) => {
                    warn!("Failed to notify stream client {}: connection closed", client.id);
                    delivery.failed += 1;
                }
            }
        }

        info!(
            "Notified {} stream client(s) for {} ({} failed)",
            delivery.delivered, property_url, delivery.failed
        );
        delivery
    }

    /// Connections currently registered
    pub fn client_count(&self) -> usize {
        self.lock().len()
    }

    pub fn client_count_for(&self, property_url: &str) -> usize {
        self.lock().iter().filter(|c| c.property_url == property_url).count()
    }
}
