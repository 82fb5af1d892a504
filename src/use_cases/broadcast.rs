// Best-effort fan-out of session packets to every subscribed outbox.

use crate::domain::{Outbox, Packet};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::mpsc;
use tracing::{trace, warn};

type Subscribers = Arc<RwLock<Vec<Outbox>>>;

/// Serializes outgoing packets for one session and copies each to all subscribers.
///
/// Packets go through a bounded inbox drained by a single task, so they reach
/// subscribers in publish order. A subscriber whose buffer is full simply
/// misses the packet; nobody else is held up by it.
#[derive(Clone)]
pub struct Broadcast {
    inbox: mpsc::Sender<Packet>,
    outbox: Subscribers,
}

impl Broadcast {
    /// Creates the broadcast and spawns its delivery task on the current runtime.
    pub fn new(inbox_capacity: usize) -> Self {
        let (inbox, mut inbox_rx) = mpsc::channel::<Packet>(inbox_capacity);
        let outbox: Subscribers = Arc::new(RwLock::new(Vec::with_capacity(2)));

        let subscribers = outbox.clone();
        tokio::spawn(async move {
            while let Some(packet) = inbox_rx.recv().await {
                deliver(&subscribers, &packet);
            }
            trace!("broadcast inbox closed; delivery task exiting");
        });

        Self { inbox, outbox }
    }

    /// Registers a subscriber. Adding the same outbox twice delivers twice.
    pub fn add(&self, subscriber: Outbox) {
        self.outbox
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(subscriber);
    }

    /// Removes every registration of `subscriber`.
    ///
    /// Once this returns no delivery will reach it, including one already in flight.
    pub fn del(&self, subscriber: &Outbox) {
        self.outbox
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|registered| !registered.same_channel(subscriber));
    }

    /// Queues a packet for delivery, waiting only while the inbox itself is full.
    pub async fn publish(&self, packet: Packet) -> Result<(), mpsc::error::SendError<Packet>> {
        self.inbox.send(packet).await
    }

    pub fn subscriber_count(&self) -> usize {
        self.outbox
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[cfg(test)]
    fn deliver(&self, packet: &Packet) {
        deliver(&self.outbox, packet);
    }
}

fn deliver(subscribers: &Subscribers, packet: &Packet) {
    let subscribers = subscribers.read().unwrap_or_else(PoisonError::into_inner);
    for (i, subscriber) in subscribers.iter().enumerate() {
        match subscriber.try_send(packet.clone()) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(subscriber = i, command = %packet.command, "subscriber full; dropping packet");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                trace!(subscriber = i, "subscriber gone; dropping packet");
            }
        }
    }
}
