pub mod codec;
pub mod config;
pub mod driver;
pub mod error;
pub mod guard;
pub mod interpolation;
pub mod net;
pub mod registry;
pub mod sample;
pub mod state;
pub mod sync;
pub mod wire;

pub use config::{SyncConfig, DEFAULT_SEND_INTERVAL};
pub use driver::{FrameClock, SyncDriver, TickReport};
pub use error::{ConfigError, PacketError, SyncError, WireError};
pub use guard::{DivergenceGuard, DEFAULT_RUBBERBAND_DISTANCE, DEFAULT_STALENESS_FACTOR};
pub use net::{Channel, LinkSimulator, LinkStats, PacketLossSimulation, SyncMessage, SyncPacket};
pub use registry::EntityRegistry;
pub use sample::Sample;
pub use state::{Anchor, ReplicationState, SnapReason, Step, Transform};
pub use sync::{EntityId, Role, SendGate, SyncEvent, TransformSync, UpdateOutput};
pub use wire::{AxisMask, CompressionMode, DecodedTransform, RotationLayout, WireFormat};
