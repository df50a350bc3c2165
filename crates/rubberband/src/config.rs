use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::guard::{DEFAULT_RUBBERBAND_DISTANCE, DEFAULT_STALENESS_FACTOR};
use crate::wire::{AxisMask, CompressionMode, RotationLayout, WireFormat};

pub const DEFAULT_SEND_INTERVAL: f32 = 0.1;

/// Per-entity sync settings. Compression and axis mask define the wire
/// layout, so both ends must use the same values and they can't change
/// after the entity is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub compression: CompressionMode,
    pub axes: AxisMask,
    /// Seconds between owner updates; also the bootstrap segment length.
    pub send_interval: f32,
    pub rubberband_distance: f32,
    pub staleness_factor: f32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            compression: CompressionMode::Much,
            axes: AxisMask::XYZ,
            send_interval: DEFAULT_SEND_INTERVAL,
            rubberband_distance: DEFAULT_RUBBERBAND_DISTANCE,
            staleness_factor: DEFAULT_STALENESS_FACTOR,
        }
    }
}

impl SyncConfig {
    pub fn wire_format(&self) -> WireFormat {
        WireFormat::new(self.compression, self.axes)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.send_interval > 0.0) {
            return Err(ConfigError::SendInterval(self.send_interval));
        }
        if !(self.rubberband_distance > 0.0) {
            return Err(ConfigError::RubberbandDistance(self.rubberband_distance));
        }
        if !(self.staleness_factor >= 1.0) {
            return Err(ConfigError::StalenessFactor(self.staleness_factor));
        }

        if self.compression == CompressionMode::Lots
            && self.wire_format().layout() == RotationLayout::Byte
        {
            log::warn!(
                "Lots compression needs all three rotation axes, falling back to one byte per axis for {:?}",
                self.axes
            );
        }
        Ok(())
    }
}
