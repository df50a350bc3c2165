mod protocol;
mod simulator;

pub use protocol::{
    sequence_greater_than, Channel, SyncMessage, SyncPacket, MAX_PACKET_SIZE,
};
pub use simulator::{LinkSimulator, LinkStats, PacketLossSimulation};
