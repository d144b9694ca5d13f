//! Webhook broker — hands pushed payloads to the worker waiting for them.
//!
//! Each registered name owns a single-slot channel. A delivery is a blocking
//! hand-off: [`WebhookBroker::deliver`] returns only once a reader has taken
//! the payload, the webhook was removed, or the delivery timeout elapsed.
//!
//! Every accepted delivery is recorded in a process-wide history, newest
//! first, whether or not anyone was listening. The history is never pruned.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};

use areaflow_domain::error::{AreaFlowError, NotFoundError};
use areaflow_domain::webhook::{HistoryItem, WebhookError, WebhookMode};

use crate::lock;

/// Default bound on how long a delivery waits for a reader.
pub const DEFAULT_DELIVERY_TIMEOUT: Duration = Duration::from_secs(10);

struct Delivery {
    payload: Vec<u8>,
    ack: oneshot::Sender<()>,
}

struct Slot {
    mode: WebhookMode,
    sender: mpsc::Sender<Delivery>,
    receiver: Arc<tokio::sync::Mutex<mpsc::Receiver<Delivery>>>,
    // Dropped with the slot; pending deliveries watch it to notice removal.
    removed: watch::Sender<()>,
}

pub struct WebhookBroker {
    slots: Mutex<HashMap<String, Slot>>,
    history: Mutex<VecDeque<HistoryItem>>,
    delivery_timeout: Duration,
}

impl Default for WebhookBroker {
    fn default() -> Self {
        Self::new(DEFAULT_DELIVERY_TIMEOUT)
    }
}

impl WebhookBroker {
    #[must_use]
    pub fn new(delivery_timeout: Duration) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            history: Mutex::new(VecDeque::new()),
            delivery_timeout,
        }
    }

    /// Register `name`. Returns `false`, leaving the existing slot and its
    /// mode untouched, when the name is already registered.
    pub fn register(&self, name: &str, mode: WebhookMode) -> bool {
        let mut slots = lock(&self.slots);
        if slots.contains_key(name) {
            return false;
        }
        let (sender, receiver) = mpsc::channel(1);
        let (removed, _) = watch::channel(());
        slots.insert(
            name.to_string(),
            Slot {
                mode,
                sender,
                receiver: Arc::new(tokio::sync::Mutex::new(receiver)),
                removed,
            },
        );
        tracing::debug!(webhook = name, mode = mode.as_str(), "webhook registered");
        true
    }

    /// Unregister `name`. Deliveries blocked on it fail with
    /// [`WebhookError::Removed`].
    pub fn remove(&self, name: &str) -> bool {
        let removed = lock(&self.slots).remove(name).is_some();
        if removed {
            tracing::debug!(webhook = name, "webhook removed");
        }
        removed
    }

    #[must_use]
    pub fn is_registered(&self, name: &str) -> bool {
        lock(&self.slots).contains_key(name)
    }

    /// Mode `name` was registered with.
    #[must_use]
    pub fn mode(&self, name: &str) -> Option<WebhookMode> {
        lock(&self.slots).get(name).map(|slot| slot.mode)
    }

    /// Record the delivery in the history, then wait until a reader takes it.
    ///
    /// # Errors
    ///
    /// - [`AreaFlowError::NotFound`] if `name` is not registered (nothing is
    ///   recorded).
    /// - [`WebhookError::Removed`] if the webhook goes away while waiting.
    /// - [`WebhookError::DeliveryTimeout`] if no reader took the payload in
    ///   time. The item stays in the history.
    #[tracing::instrument(skip(self, payload), fields(bytes = payload.len()))]
    pub async fn deliver(
        &self,
        author: &str,
        name: &str,
        payload: Vec<u8>,
    ) -> Result<(), AreaFlowError> {
        let (sender, mut removed) = {
            let slots = lock(&self.slots);
            let slot = slots.get(name).ok_or_else(|| NotFoundError {
                entity: "Webhook",
                id: name.to_string(),
            })?;
            (slot.sender.clone(), slot.removed.subscribe())
        };
        self.record(author);

        let (ack, consumed) = oneshot::channel();
        let handoff = async move {
            sender.send(Delivery { payload, ack }).await.ok()?;
            consumed.await.ok()
        };

        tokio::select! {
            outcome = handoff => {
                outcome.ok_or_else(|| AreaFlowError::from(WebhookError::Removed(name.to_string())))
            }
            _ = removed.changed() => Err(WebhookError::Removed(name.to_string()).into()),
            () = tokio::time::sleep(self.delivery_timeout) => {
                tracing::warn!(webhook = name, "no reader took the delivery in time");
                Err(WebhookError::DeliveryTimeout(name.to_string()).into())
            }
        }
    }

    /// Get a read handle on `name`.
    ///
    /// # Errors
    ///
    /// [`AreaFlowError::NotFound`] if `name` is not registered, or
    /// [`WebhookError::ModeMismatch`] if it was registered with another mode.
    pub fn receive(&self, name: &str, mode: WebhookMode) -> Result<WebhookReader, AreaFlowError> {
        let slots = lock(&self.slots);
        let slot = slots.get(name).ok_or_else(|| NotFoundError {
            entity: "Webhook",
            id: name.to_string(),
        })?;
        if slot.mode != mode {
            return Err(WebhookError::ModeMismatch {
                name: name.to_string(),
                registered: slot.mode.as_str(),
                requested: mode.as_str(),
            }
            .into());
        }
        Ok(WebhookReader {
            receiver: Arc::clone(&slot.receiver),
        })
    }

    /// Snapshot of the history, newest first.
    #[must_use]
    pub fn history(&self) -> Vec<HistoryItem> {
        lock(&self.history).iter().cloned().collect()
    }

    #[must_use]
    pub fn history_len(&self) -> usize {
        lock(&self.history).len()
    }

    /// The most recent history item.
    #[must_use]
    pub fn latest(&self) -> Option<HistoryItem> {
        lock(&self.history).front().cloned()
    }

    fn record(&self, author: &str) {
        let mut history = lock(&self.history);
        let item = HistoryItem {
            id: history.len() as u64,
            author: author.to_string(),
        };
        history.push_front(item);
    }
}

/// Read side of one webhook.
pub struct WebhookReader {
    receiver: Arc<tokio::sync::Mutex<mpsc::Receiver<Delivery>>>,
}

impl WebhookReader {
    /// Wait at most `wait` for the next payload and acknowledge it.
    ///
    /// Deliveries whose sender already gave up are skipped.
    pub async fn recv_timeout(&self, wait: Duration) -> Option<Vec<u8>> {
        let read = async {
            let mut receiver = self.receiver.lock().await;
            loop {
                let delivery = receiver.recv().await?;
                if delivery.ack.send(()).is_ok() {
                    return Some(delivery.payload);
                }
            }
        };
        tokio::time::timeout(wait, read).await.ok().flatten()
    }
}
