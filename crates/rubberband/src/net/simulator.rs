use std::cmp::Ordering;
use std::collections::BinaryHeap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::protocol::{Channel, SyncPacket};
use crate::error::PacketError;

#[derive(Debug, Clone, Default)]
pub struct PacketLossSimulation {
    pub enabled: bool,
    /// Percentage in `[0, 100]`.
    pub loss_percent: f32,
    pub min_latency_ms: u32,
    pub max_latency_ms: u32,
    pub jitter_ms: u32,
}

impl PacketLossSimulation {
    pub fn should_drop(&self, rng: &mut impl Rng) -> bool {
        if !self.enabled || self.loss_percent <= 0.0 {
            return false;
        }
        rng.random::<f32>() * 100.0 < self.loss_percent
    }

    pub fn delay_ms(&self, rng: &mut impl Rng) -> u32 {
        if !self.enabled || self.max_latency_ms == 0 {
            return 0;
        }
        let base = self.min_latency_ms.min(self.max_latency_ms);
        let latency = rng.random_range(base..=self.max_latency_ms);
        let jitter = if self.jitter_ms > 0 {
            rng.random_range(0..=self.jitter_ms)
        } else {
            0
        };
        latency + jitter
    }
}

#[derive(Debug, Clone, Default)]
pub struct LinkStats {
    pub packets_sent: u64,
    pub packets_delivered: u64,
    pub packets_dropped: u64,
    pub bytes_sent: u64,
}

impl LinkStats {
    pub fn loss_percent(&self) -> f32 {
        if self.packets_sent == 0 {
            return 0.0;
        }
        self.packets_dropped as f32 / self.packets_sent as f32 * 100.0
    }
}

#[derive(Debug)]
struct InFlight {
    release_time: f32,
    order: u64,
    bytes: Vec<u8>,
}

impl PartialEq for InFlight {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for InFlight {}

impl PartialOrd for InFlight {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for InFlight {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse order for min-heap
        other
            .release_time
            .total_cmp(&self.release_time)
            .then_with(|| other.order.cmp(&self.order))
    }
}

/// One-directional link that delays and drops serialized packets on a
/// simulated clock. Reliable packets are never dropped and never overtake
/// each other.
#[derive(Debug)]
pub struct LinkSimulator {
    config: PacketLossSimulation,
    rng: StdRng,
    in_flight: BinaryHeap<InFlight>,
    next_order: u64,
    last_reliable_release: f32,
    stats: LinkStats,
}

impl LinkSimulator {
    pub fn new(config: PacketLossSimulation, seed: u64) -> Self {
        Self {
            config,
            rng: StdRng::seed_from_u64(seed),
            in_flight: BinaryHeap::new(),
            next_order: 0,
            last_reliable_release: f32::NEG_INFINITY,
            stats: LinkStats::default(),
        }
    }

    pub fn perfect() -> Self {
        Self::new(PacketLossSimulation::default(), 0)
    }

    pub fn config(&self) -> &PacketLossSimulation {
        &self.config
    }

    /// Applies to packets sent from now on; packets in flight keep their
    /// release time.
    pub fn set_config(&mut self, config: PacketLossSimulation) {
        self.config = config;
    }

    pub fn stats(&self) -> &LinkStats {
        &self.stats
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub fn send(&mut self, now: f32, packet: &SyncPacket) -> Result<(), PacketError> {
        let bytes = packet.serialize()?;
        self.stats.packets_sent += 1;
        self.stats.bytes_sent += bytes.len() as u64;

        let channel = packet.channel();
        if channel == Channel::Unreliable && self.config.should_drop(&mut self.rng) {
            self.stats.packets_dropped += 1;
            return Ok(());
        }

        let mut release_time = now + self.config.delay_ms(&mut self.rng) as f32 / 1000.0;
        if channel == Channel::Reliable {
            release_time = release_time.max(self.last_reliable_release);
            self.last_reliable_release = release_time;
        }

        self.in_flight.push(InFlight {
            release_time,
            order: self.next_order,
            bytes,
        });
        self.next_order += 1;
        Ok(())
    }

    /// Everything due at or before `now`, in release order.
    pub fn receive(&mut self, now: f32) -> Result<Vec<SyncPacket>, PacketError> {
        let mut packets = Vec::new();
        while self
            .in_flight
            .peek()
            .is_some_and(|packet| packet.release_time <= now)
        {
            let Some(in_flight) = self.in_flight.pop() else {
                break;
            };
            packets.push(SyncPacket::deserialize(&in_flight.bytes)?);
            self.stats.packets_delivered += 1;
        }
        Ok(packets)
    }
}
