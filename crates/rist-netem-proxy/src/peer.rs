//! Address pairing: the rule that makes the proxy transparent by routing
//! each received datagram to the peer other than its sender (spec §3, §4.3).

use std::net::SocketAddr;

/// An IPv4 + UDP port pair. `SocketAddr` already gives structural equality.
pub type Address = SocketAddr;

/// An ordered, append-only, at-most-two-entry table of learned peers.
#[derive(Debug, Default, Clone)]
pub struct PeerTable {
    peers: Vec<Address>,
}

impl PeerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the table with a peer known before the first packet arrives
    /// (the spec's default receiver endpoint, 127.0.0.1:2004).
    pub fn with_known_peer(addr: Address) -> Self {
        Self { peers: vec![addr] }
    }

    /// Learn `addr` as a peer if it is new. A third distinct address is a
    /// non-fatal configuration error: log once, ignore the surplus
    /// (spec §7 "Peer-table overflow").
    pub fn learn(&mut self, addr: Address) {
        if self.peers.contains(&addr) {
            return;
        }
        if self.peers.len() >= 2 {
            tracing::warn!(%addr, "peer-table overflow: ignoring surplus peer");
            return;
        }
        tracing::info!(%addr, "learned new peer");
        self.peers.push(addr);
    }

    /// The address to forward a packet received from `src` toward.
    ///
    /// With two known peers, returns the other one. With exactly one known
    /// peer equal to `src`, forwarding is not yet possible: returns `None`
    /// rather than indexing out of bounds (spec §9 "Degenerate single-peer"
    /// explicitly disclaims the original's crash here). With one known peer
    /// different from `src` (the seeded-receiver case), returns that peer.
    pub fn forward_for(&self, src: Address) -> Option<Address> {
        match self.peers.as_slice() {
            [] => None,
            [only] => {
                if *only == src {
                    None
                } else {
                    Some(*only)
                }
            }
            [a, b, ..] => Some(if src == *a { *b } else { *a }),
        }
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(port: u16) -> Address {
        format!("127.0.0.1:{port}").parse().unwrap()
    }

    #[test]
    fn learns_two_distinct_peers() {
        let mut t = PeerTable::new();
        t.learn(addr(1));
        t.learn(addr(2));
        assert_eq!(t.len(), 2);
    }

    #[test]
    fn relearning_known_peer_is_noop() {
        let mut t = PeerTable::new();
        t.learn(addr(1));
        t.learn(addr(1));
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn surplus_peer_is_ignored() {
        let mut t = PeerTable::new();
        t.learn(addr(1));
        t.learn(addr(2));
        t.learn(addr(3));
        assert_eq!(t.len(), 2);
        assert_eq!(t.forward_for(addr(1)), Some(addr(2)));
    }

    #[test]
    fn forwards_to_the_other_peer() {
        let mut t = PeerTable::new();
        t.learn(addr(1));
        t.learn(addr(2));
        assert_eq!(t.forward_for(addr(1)), Some(addr(2)));
        assert_eq!(t.forward_for(addr(2)), Some(addr(1)));
    }

    #[test]
    fn degenerate_single_peer_holds_when_src_is_the_known_peer() {
        let mut t = PeerTable::new();
        t.learn(addr(1));
        assert_eq!(t.forward_for(addr(1)), None);
    }

    #[test]
    fn single_seeded_peer_forwards_when_src_differs() {
        let t = PeerTable::with_known_peer(addr(2004));
        assert_eq!(t.forward_for(addr(2002)), Some(addr(2004)));
    }

    #[test]
    fn empty_table_holds_everything() {
        let t = PeerTable::new();
        assert_eq!(t.forward_for(addr(1)), None);
    }
}
