use rkyv::rancor;

use crate::sync::EntityId;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    #[error("transform payload truncated: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },
    #[error("transform payload has {extra} trailing bytes")]
    TrailingBytes { extra: usize },
}

#[derive(Debug, thiserror::Error)]
pub enum PacketError {
    #[error("serialization failed: {0}")]
    Serialize(rancor::Error),
    #[error("deserialization failed: {0}")]
    Deserialize(rancor::Error),
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("send interval must be positive, got {0}")]
    SendInterval(f32),
    #[error("rubberband distance must be positive, got {0}")]
    RubberbandDistance(f32),
    #[error("staleness factor must be at least 1, got {0}")]
    StalenessFactor(f32),
}

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error(transparent)]
    Wire(#[from] WireError),
    #[error(transparent)]
    Packet(#[from] PacketError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("entity {0} is already registered")]
    DuplicateEntity(EntityId),
}
