use std::cmp::Ordering;
use std::collections::BinaryHeap;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::sync::{PeerId, Transport};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConditions {
    pub loss_percent: f32,
    pub min_latency_ms: u32,
    pub max_latency_ms: u32,
    pub jitter_ms: u32,
}

impl LinkConditions {
    pub fn should_drop(&self, rng: &mut impl Rng) -> bool {
        if self.loss_percent <= 0.0 {
            return false;
        }
        rng.random_bool((self.loss_percent as f64 / 100.0).min(1.0))
    }

    pub fn delay_ms(&self, rng: &mut impl Rng) -> f64 {
        let base = self.min_latency_ms as f64;
        let range = self.max_latency_ms.saturating_sub(self.min_latency_ms) as f64;
        let jitter = self.jitter_ms as f64;
        base + rng.random::<f64>() * range + rng.random::<f64>() * jitter
    }
}

#[derive(Debug)]
struct DelayedPacket {
    release_time: f64,
    sequence: u64,
    to: PeerId,
    bytes: Vec<u8>,
}

impl PartialEq for DelayedPacket {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for DelayedPacket {}

impl PartialOrd for DelayedPacket {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DelayedPacket {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse order for min-heap
        other
            .release_time
            .total_cmp(&self.release_time)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkStats {
    pub packets_sent: u64,
    pub packets_dropped: u64,
    pub packets_delivered: u64,
    pub bytes_sent: u64,
}

/// One-directional lossy link on a simulated clock. Packets come out of
/// [`take_ready`](Self::take_ready) in arrival order, which jitter can make differ from send
/// order.
#[derive(Debug)]
pub struct SimulatedLink {
    conditions: LinkConditions,
    peers: Vec<PeerId>,
    max_packet_size: usize,
    now: f64,
    sequence: u64,
    queue: BinaryHeap<DelayedPacket>,
    rng: ChaCha8Rng,
    stats: LinkStats,
}

impl SimulatedLink {
    pub fn new(conditions: LinkConditions, seed: u64) -> Self {
        Self {
            conditions,
            peers: Vec::new(),
            max_packet_size: 1200,
            now: 0.0,
            sequence: 0,
            queue: BinaryHeap::new(),
            rng: ChaCha8Rng::seed_from_u64(seed),
            stats: LinkStats::default(),
        }
    }

    pub fn perfect() -> Self {
        Self::new(LinkConditions::default(), 0)
    }

    pub fn with_max_packet_size(mut self, max_packet_size: usize) -> Self {
        self.max_packet_size = max_packet_size;
        self
    }

    pub fn add_peer(&mut self, peer: PeerId) {
        if !self.peers.contains(&peer) {
            self.peers.push(peer);
        }
    }

    pub fn remove_peer(&mut self, peer: PeerId) {
        self.peers.retain(|p| *p != peer);
    }

    pub fn conditions(&self) -> &LinkConditions {
        &self.conditions
    }

    pub fn set_conditions(&mut self, conditions: LinkConditions) {
        self.conditions = conditions;
    }

    pub fn now(&self) -> f64 {
        self.now
    }

    pub fn advance(&mut self, dt: f64) {
        self.now += dt;
    }

    pub fn in_flight(&self) -> usize {
        self.queue.len()
    }

    pub fn stats(&self) -> &LinkStats {
        &self.stats
    }

    fn enqueue(&mut self, to: PeerId, bytes: &[u8]) {
        self.stats.packets_sent += 1;
        self.stats.bytes_sent += bytes.len() as u64;
        if self.conditions.should_drop(&mut self.rng) {
            self.stats.packets_dropped += 1;
            return;
        }

        let delay = self.conditions.delay_ms(&mut self.rng) / 1000.0;
        self.sequence += 1;
        self.queue.push(DelayedPacket {
            release_time: self.now + delay,
            sequence: self.sequence,
            to,
            bytes: bytes.to_vec(),
        });
    }

    pub fn take_ready(&mut self) -> Vec<(PeerId, Vec<u8>)> {
        let mut packets = Vec::new();
        while let Some(delayed) = self.queue.peek() {
            if delayed.release_time > self.now {
                break;
            }
            if let Some(delayed) = self.queue.pop() {
                packets.push((delayed.to, delayed.bytes));
            }
        }
        self.stats.packets_delivered += packets.len() as u64;
        packets
    }
}

impl Transport for SimulatedLink {
    fn max_packet_size(&self) -> usize {
        self.max_packet_size
    }

    fn send(&mut self, peer: PeerId, bytes: &[u8]) {
        self.enqueue(peer, bytes);
    }

    fn broadcast(&mut self, bytes: &[u8]) {
        let peers = self.peers.clone();
        for peer in peers {
            self.enqueue(peer, bytes);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perfect_link_delivers_immediately_in_order() {
        let mut link = SimulatedLink::perfect();
        link.add_peer(PeerId(1));
        link.add_peer(PeerId(2));

        link.broadcast(&[1]);
        link.send(PeerId(2), &[2]);

        let ready = link.take_ready();
        assert_eq!(
            ready,
            vec![
                (PeerId(1), vec![1]),
                (PeerId(2), vec![1]),
                (PeerId(2), vec![2])
            ]
        );
        assert_eq!(link.stats().packets_delivered, 3);
    }

    #[test]
    fn latency_holds_packets_back() {
        let conditions = LinkConditions {
            min_latency_ms: 100,
            max_latency_ms: 100,
            ..LinkConditions::default()
        };
        let mut link = SimulatedLink::new(conditions, 7);
        link.send(PeerId(1), &[9]);

        link.advance(0.099);
        assert!(link.take_ready().is_empty());
        link.advance(0.002);
        assert_eq!(link.take_ready().len(), 1);
        assert_eq!(link.in_flight(), 0);
    }

    #[test]
    fn loss_is_seeded_and_roughly_right() {
        let conditions = LinkConditions {
            loss_percent: 25.0,
            ..LinkConditions::default()
        };
        let run = |seed| {
            let mut link = SimulatedLink::new(conditions.clone(), seed);
            for _ in 0..4000 {
                link.send(PeerId(1), &[0]);
            }
            link.stats().packets_dropped
        };

        let dropped = run(3);
        assert_eq!(dropped, run(3));
        assert!((800..1200).contains(&dropped), "dropped {dropped}");
    }
}
