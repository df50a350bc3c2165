use rkyv::{rancor, Archive, Deserialize, Serialize};

use crate::error::PacketError;

pub const MAX_PACKET_SIZE: usize = 1200;

const SEQUENCE_WRAP_THRESHOLD: u32 = u32::MAX / 2;

#[inline]
pub fn sequence_greater_than(s1: u32, s2: u32) -> bool {
    ((s1 > s2) && (s1 - s2 <= SEQUENCE_WRAP_THRESHOLD))
        || ((s1 < s2) && (s2 - s1 > SEQUENCE_WRAP_THRESHOLD))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    /// Delivered in order, never dropped.
    Reliable,
    /// Fire and forget; losses are covered by the staleness snap.
    Unreliable,
}

#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub enum SyncMessage {
    /// Owning client to server, gated by the send interval.
    OwnerUpdate { entity_id: u32, payload: Vec<u8> },
    /// Server broadcast to observers whenever the transform changed.
    StateUpdate { entity_id: u32, payload: Vec<u8> },
    /// Server correction after the object was moved outside the sync path.
    ForcePosition { entity_id: u32, position: [f32; 3] },
}

impl SyncMessage {
    pub fn entity_id(&self) -> u32 {
        match self {
            Self::OwnerUpdate { entity_id, .. }
            | Self::StateUpdate { entity_id, .. }
            | Self::ForcePosition { entity_id, .. } => *entity_id,
        }
    }

    pub fn channel(&self) -> Channel {
        match self {
            Self::OwnerUpdate { .. } => Channel::Reliable,
            Self::ForcePosition { .. } => Channel::Reliable,
            Self::StateUpdate { .. } => Channel::Unreliable,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct SyncPacket {
    pub sequence: u32,
    pub message: SyncMessage,
}

impl SyncPacket {
    pub fn new(sequence: u32, message: SyncMessage) -> Self {
        Self { sequence, message }
    }

    pub fn channel(&self) -> Channel {
        self.message.channel()
    }

    pub fn serialize(&self) -> Result<Vec<u8>, PacketError> {
        rkyv::to_bytes::<rancor::Error>(self)
            .map(|aligned| aligned.into_vec())
            .map_err(PacketError::Serialize)
    }

    pub fn deserialize(data: &[u8]) -> Result<Self, PacketError> {
        rkyv::from_bytes::<Self, rancor::Error>(data).map_err(PacketError::Deserialize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_comparison_wraps() {
        assert!(sequence_greater_than(2, 1));
        assert!(!sequence_greater_than(1, 2));
        assert!(!sequence_greater_than(5, 5));
        assert!(sequence_greater_than(0, u32::MAX));
        assert!(!sequence_greater_than(u32::MAX, 0));
    }

    #[test]
    fn packet_serialization() {
        let packet = SyncPacket::new(
            7,
            SyncMessage::StateUpdate {
                entity_id: 3,
                payload: vec![1, 2, 3, 4],
            },
        );

        let bytes = packet.serialize().unwrap();
        assert!(bytes.len() <= MAX_PACKET_SIZE);
        let decoded = SyncPacket::deserialize(&bytes).unwrap();
        assert_eq!(decoded, packet);
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(SyncPacket::deserialize(&[0xFF; 3]).is_err());
    }

    #[test]
    fn channels_per_message() {
        let force = SyncMessage::ForcePosition {
            entity_id: 1,
            position: [0.0; 3],
        };
        let state = SyncMessage::StateUpdate {
            entity_id: 1,
            payload: Vec::new(),
        };
        assert_eq!(force.channel(), Channel::Reliable);
        assert_eq!(state.channel(), Channel::Unreliable);
        assert_eq!(force.entity_id(), 1);
    }
}
