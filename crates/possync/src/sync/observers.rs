use std::collections::HashSet;

use super::{PeerId, SyncId};

pub trait ObserverSet {
    fn peers(&self) -> Vec<PeerId>;

    fn can_see(&self, peer: PeerId, id: SyncId) -> bool;
}

/// Byte-oriented, unreliable send primitive.
pub trait Transport {
    fn max_packet_size(&self) -> usize;

    fn send(&mut self, peer: PeerId, bytes: &[u8]);

    /// Sends to every connected peer.
    fn broadcast(&mut self, bytes: &[u8]);
}

#[derive(Debug, Clone, Default)]
pub struct ObserverList {
    peers: Vec<PeerId>,
    hidden: HashSet<(PeerId, u32)>,
}

impl ObserverList {
    pub fn new(peers: impl IntoIterator<Item = PeerId>) -> Self {
        Self {
            peers: peers.into_iter().collect(),
            hidden: HashSet::new(),
        }
    }

    pub fn add_peer(&mut self, peer: PeerId) {
        if !self.peers.contains(&peer) {
            self.peers.push(peer);
        }
    }

    pub fn remove_peer(&mut self, peer: PeerId) {
        self.peers.retain(|p| *p != peer);
        self.hidden.retain(|(p, _)| *p != peer);
    }

    pub fn hide(&mut self, peer: PeerId, entity: u32) {
        self.hidden.insert((peer, entity));
    }

    pub fn show(&mut self, peer: PeerId, entity: u32) {
        self.hidden.remove(&(peer, entity));
    }
}

impl ObserverSet for ObserverList {
    fn peers(&self) -> Vec<PeerId> {
        self.peers.clone()
    }

    fn can_see(&self, peer: PeerId, id: SyncId) -> bool {
        self.peers.contains(&peer) && !self.hidden.contains(&(peer, id.entity))
    }
}
