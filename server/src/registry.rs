//! Connection registry and lead election for the session server
//!
//! This module owns the roster of live WebSocket connections:
//! - Identity assignment (a fresh uuid per connection, never reused)
//! - Lead election: the connection that finds the registry empty is the lead
//! - Outbound routing for single sends and whole-session broadcasts
//! - Emptiness detection that drives session teardown
//!
//! The registry is owned by the session task and only ever touched from
//! there, so it needs no locking of its own.

use log::{debug, info};
use shared::PlayerId;
use std::collections::HashMap;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use uuid::Uuid;

/// Tracks every live connection's outbound channel, keyed by identity.
///
/// Senders are the write half handed over by the network layer; dropping an
/// entry closes the channel and lets the connection's writer task finish.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: HashMap<PlayerId, mpsc::UnboundedSender<Message>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: HashMap::new(),
        }
    }

    /// Registers a connection and returns its fresh identity together with
    /// the lead flag.
    ///
    /// A connection is the lead iff the registry was empty immediately
    /// before this call. There is no lead handover: once elected, the lead
    /// keeps the role until the registry empties and a later connection
    /// wins a fresh election.
    pub fn add(&mut self, outbound: mpsc::UnboundedSender<Message>) -> (PlayerId, bool) {
        let is_lead = self.connections.is_empty();
        let id = Uuid::new_v4();
        self.connections.insert(id, outbound);
        info!("client {} connected (lead: {})", id, is_lead);
        (id, is_lead)
    }

    /// Removes a connection. Safe to call more than once per identity; the
    /// second call is a no-op and returns false.
    pub fn remove(&mut self, id: &PlayerId) -> bool {
        if self.connections.remove(id).is_some() {
            info!("client {} disconnected", id);
            true
        } else {
            false
        }
    }

    /// Queues a message for one connection. A send failure means the writer
    /// task is already gone; the disconnect path cleans the entry up.
    pub fn send(&self, id: &PlayerId, message: Message) -> bool {
        match self.connections.get(id) {
            Some(outbound) => outbound.send(message).is_ok(),
            None => false,
        }
    }

    /// Queues a text frame for every registered connection and returns how
    /// many sends were accepted. Failed sends are skipped, not retried.
    pub fn broadcast(&self, json: &str) -> usize {
        let mut sent = 0;
        for (id, outbound) in &self.connections {
            if outbound.send(Message::Text(json.to_string())).is_ok() {
                sent += 1;
            } else {
                debug!("skipping broadcast to {}: writer gone", id);
            }
        }
        sent
    }

    pub fn contains(&self, id: &PlayerId) -> bool {
        self.connections.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outbound() -> (
        mpsc::UnboundedSender<Message>,
        mpsc::UnboundedReceiver<Message>,
    ) {
        mpsc::unbounded_channel()
    }

    #[test]
    fn first_connection_is_lead() {
        let mut registry = ConnectionRegistry::new();
        let (tx, _rx) = outbound();

        let (_, is_lead) = registry.add(tx);
        assert!(is_lead);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn later_connections_are_not_lead() {
        let mut registry = ConnectionRegistry::new();
        let (tx1, _rx1) = outbound();
        let (tx2, _rx2) = outbound();
        let (tx3, _rx3) = outbound();

        let (_, lead1) = registry.add(tx1);
        let (_, lead2) = registry.add(tx2);
        let (_, lead3) = registry.add(tx3);

        assert!(lead1);
        assert!(!lead2);
        assert!(!lead3);
    }

    #[test]
    fn lead_is_re_elected_after_registry_empties() {
        let mut registry = ConnectionRegistry::new();
        let (tx1, _rx1) = outbound();
        let (tx2, _rx2) = outbound();

        let (id1, _) = registry.add(tx1);
        let (id2, lead2) = registry.add(tx2);
        assert!(!lead2);

        registry.remove(&id1);
        registry.remove(&id2);
        assert!(registry.is_empty());

        let (tx3, _rx3) = outbound();
        let (_, lead3) = registry.add(tx3);
        assert!(lead3);
    }

    #[test]
    fn identities_are_unique() {
        let mut registry = ConnectionRegistry::new();
        let (tx1, _rx1) = outbound();
        let (tx2, _rx2) = outbound();

        let (id1, _) = registry.add(tx1);
        let (id2, _) = registry.add(tx2);
        assert_ne!(id1, id2);
    }

    #[test]
    fn remove_is_idempotent() {
        let mut registry = ConnectionRegistry::new();
        let (tx, _rx) = outbound();
        let (id, _) = registry.add(tx);

        assert!(registry.remove(&id));
        assert!(!registry.remove(&id));
        assert!(registry.is_empty());
    }

    #[test]
    fn broadcast_reaches_every_connection() {
        let mut registry = ConnectionRegistry::new();
        let (tx1, mut rx1) = outbound();
        let (tx2, mut rx2) = outbound();
        registry.add(tx1);
        registry.add(tx2);

        let sent = registry.broadcast("{\"hello\":1}");
        assert_eq!(sent, 2);

        for rx in [&mut rx1, &mut rx2] {
            match rx.try_recv().unwrap() {
                Message::Text(text) => assert_eq!(text, "{\"hello\":1}"),
                other => panic!("unexpected frame {:?}", other),
            }
        }
    }

    #[test]
    fn broadcast_skips_dead_writers() {
        let mut registry = ConnectionRegistry::new();
        let (tx1, rx1) = outbound();
        let (tx2, _rx2) = outbound();
        registry.add(tx1);
        registry.add(tx2);

        drop(rx1);
        assert_eq!(registry.broadcast("{}"), 1);
    }

    #[test]
    fn send_to_unknown_identity_fails() {
        let registry = ConnectionRegistry::new();
        assert!(!registry.send(&Uuid::new_v4(), Message::Text("{}".to_string())));
    }
}
