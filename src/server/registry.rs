use log::debug;
use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Mutex;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::Message;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub type Outbound = mpsc::UnboundedSender<Message>;

struct Peer {
    addr: SocketAddr,
    sink: Outbound,
}

/// The live connection set. Holds only outbound sinks; no history.
#[derive(Default)]
pub struct ConnectionRegistry {
    peers: Mutex<HashMap<ConnectionId, Peer>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, addr: SocketAddr, sink: Outbound) -> ConnectionId {
        let id = ConnectionId::new();
        let mut peers = self.peers.lock().unwrap_or_else(|e| e.into_inner());
        peers.insert(id, Peer { addr, sink });
        debug!("Registered {} ({}), {} connected", id, addr, peers.len());
        id
    }

    pub fn unregister(&self, id: ConnectionId) -> bool {
        let mut peers = self.peers.lock().unwrap_or_else(|e| e.into_inner());
        let removed = peers.remove(&id);
        if let Some(peer) = &removed {
            debug!("Unregistered {} ({}), {} connected", id, peer.addr, peers.len());
        }
        removed.is_some()
    }

    pub fn len(&self) -> usize {
        self.peers.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn send_to(&self, id: ConnectionId, message: Message) -> bool {
        let peers = self.peers.lock().unwrap_or_else(|e| e.into_inner());
        peers
            .get(&id)
            .map(|p| p.sink.send(message).is_ok())
            .unwrap_or(false)
    }

    /// Queues `message` on every sink except the sender's. Sinks whose
    /// receiver is gone are skipped; the connection's own task removes them.
    /// Returns the number of peers the frame was queued for.
    pub fn broadcast_except(&self, sender: ConnectionId, message: &Message) -> usize {
        let peers = self.peers.lock().unwrap_or_else(|e| e.into_inner());
        let mut delivered = 0;
        for (id, peer) in peers.iter() {
            if *id == sender {
                continue;
            }
            if peer.sink.send(message.clone()).is_ok() {
                delivered += 1;
            } else {
                debug!("Skipping closed sink for {} ({})", id, peer.addr);
            }
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    #[test]
    fn test_broadcast_skips_sender() {
        let registry = ConnectionRegistry::new();
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        let (tx_c, mut rx_c) = mpsc::unbounded_channel();
        let a = registry.register(addr(1), tx_a);
        registry.register(addr(2), tx_b);
        registry.register(addr(3), tx_c);

        let frame = Message::Text("M".into());
        assert_eq!(registry.broadcast_except(a, &frame), 2);

        assert_eq!(rx_b.try_recv().unwrap(), frame);
        assert_eq!(rx_c.try_recv().unwrap(), frame);
        assert!(rx_a.try_recv().is_err());
        assert!(rx_b.try_recv().is_err());
    }

    #[test]
    fn test_closed_sink_does_not_stop_fan_out() {
        let registry = ConnectionRegistry::new();
        let (tx_a, rx_a) = mpsc::unbounded_channel();
        let (tx_b, _rx_b) = mpsc::unbounded_channel();
        let (tx_c, mut rx_c) = mpsc::unbounded_channel();
        registry.register(addr(1), tx_a);
        let b = registry.register(addr(2), tx_b);
        registry.register(addr(3), tx_c);
        drop(rx_a);

        assert_eq!(registry.broadcast_except(b, &Message::Text("N".into())), 1);
        assert_eq!(rx_c.try_recv().unwrap(), Message::Text("N".into()));
    }

    #[test]
    fn test_unregister_removes_peer() {
        let registry = ConnectionRegistry::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let id = registry.register(addr(1), tx);

        assert!(registry.unregister(id));
        assert!(!registry.unregister(id));
        assert!(registry.is_empty());
        assert!(!registry.send_to(id, Message::Text("x".into())));
    }
}
