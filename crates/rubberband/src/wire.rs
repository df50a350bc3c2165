//! Transform payload layout.
//!
//! A payload is the position as three little-endian `f32` followed by the
//! rotation as Euler degrees, compressed per [`CompressionMode`] and limited
//! to the axes in the [`AxisMask`]. Both ends must be configured with the
//! same mode and mask; nothing on the wire identifies the layout.

use bitflags::bitflags;
use glam::{EulerRot, Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::codec::{self, DEGREES};
use crate::error::WireError;

pub const POSITION_BYTES: usize = 12;

/// Rotation compression. Costs per synced axis: `None` 4 bytes, `Some` 2,
/// `Much` 1; `Lots` packs all three axes into 2 bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CompressionMode {
    None,
    Some,
    #[default]
    Much,
    Lots,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct AxisMask: u8 {
        const X = 1 << 0;
        const Y = 1 << 1;
        const Z = 1 << 2;
        const XYZ = Self::X.bits() | Self::Y.bits() | Self::Z.bits();
    }
}

impl Default for AxisMask {
    fn default() -> Self {
        Self::XYZ
    }
}

impl AxisMask {
    const ORDER: [AxisMask; 3] = [AxisMask::X, AxisMask::Y, AxisMask::Z];
}

/// Per-axis encoding actually used on the wire after resolving the
/// `Lots` fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationLayout {
    Float,
    Short,
    Byte,
    Packed,
}

impl RotationLayout {
    /// `Lots` only packs when every axis is synced; any partial mask falls
    /// back to one byte per enabled axis.
    pub fn resolve(mode: CompressionMode, mask: AxisMask) -> Self {
        match mode {
            CompressionMode::None => Self::Float,
            CompressionMode::Some => Self::Short,
            CompressionMode::Much => Self::Byte,
            CompressionMode::Lots if mask == AxisMask::XYZ => Self::Packed,
            CompressionMode::Lots => Self::Byte,
        }
    }

    fn axis_bytes(self) -> usize {
        match self {
            Self::Float => 4,
            Self::Short => 2,
            Self::Byte => 1,
            Self::Packed => 0,
        }
    }
}

/// Position and rotation read back from a payload.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecodedTransform {
    pub position: Vec3,
    pub rotation: Quat,
}

/// Resolved (mode, mask) pair. Cheap to copy; build once per entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WireFormat {
    mode: CompressionMode,
    mask: AxisMask,
    layout: RotationLayout,
}

impl WireFormat {
    pub fn new(mode: CompressionMode, mask: AxisMask) -> Self {
        Self {
            mode,
            mask,
            layout: RotationLayout::resolve(mode, mask),
        }
    }

    pub fn mode(&self) -> CompressionMode {
        self.mode
    }

    pub fn mask(&self) -> AxisMask {
        self.mask
    }

    pub fn layout(&self) -> RotationLayout {
        self.layout
    }

    pub fn rotation_len(&self) -> usize {
        match self.layout {
            RotationLayout::Packed => 2,
            layout => layout.axis_bytes() * self.mask.bits().count_ones() as usize,
        }
    }

    pub fn payload_len(&self) -> usize {
        POSITION_BYTES + self.rotation_len()
    }

    pub fn encode(&self, position: Vec3, rotation: Quat) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.payload_len());
        self.encode_into(&mut out, position, rotation);
        out
    }

    pub fn encode_into(&self, out: &mut Vec<u8>, position: Vec3, rotation: Quat) {
        for component in position.to_array() {
            out.extend_from_slice(&component.to_le_bytes());
        }
        self.encode_euler_into(out, euler_degrees(rotation));
    }

    /// Writes Euler degrees for the synced axes only.
    pub fn encode_euler_into(&self, out: &mut Vec<u8>, euler: Vec3) {
        if self.layout == RotationLayout::Packed {
            let packed = codec::pack_angles(euler.x, euler.y, euler.z);
            out.extend_from_slice(&packed.to_le_bytes());
            return;
        }

        for (axis, angle) in AxisMask::ORDER.into_iter().zip(euler.to_array()) {
            if !self.mask.contains(axis) {
                continue;
            }
            match self.layout {
                RotationLayout::Float => out.extend_from_slice(&angle.to_le_bytes()),
                RotationLayout::Short => {
                    out.extend_from_slice(&codec::encode_u16(angle, 0.0, DEGREES).to_le_bytes())
                }
                RotationLayout::Byte => out.push(codec::encode_u8(angle, 0.0, DEGREES)),
                RotationLayout::Packed => unreachable!("packed layout handled above"),
            }
        }
    }

    /// Decodes a payload that must be exactly [`Self::payload_len`] bytes.
    pub fn decode(&self, bytes: &[u8], previous_rotation: Quat) -> Result<DecodedTransform, WireError> {
        let mut cursor = bytes;
        let decoded = self.decode_from(&mut cursor, previous_rotation)?;
        if !cursor.is_empty() {
            return Err(WireError::TrailingBytes {
                extra: cursor.len(),
            });
        }
        Ok(decoded)
    }

    /// Reads one payload from the front of a shared stream and advances the
    /// cursor by exactly [`Self::payload_len`] bytes. On error the cursor is
    /// left untouched.
    pub fn decode_from(
        &self,
        cursor: &mut &[u8],
        previous_rotation: Quat,
    ) -> Result<DecodedTransform, WireError> {
        let expected = self.payload_len();
        if cursor.len() < expected {
            return Err(WireError::Truncated {
                expected,
                actual: cursor.len(),
            });
        }
        let data: &[u8] = *cursor;
        let (payload, rest) = data.split_at(expected);
        *cursor = rest;

        let mut reader = Reader::new(payload, expected);
        let position = Vec3::new(reader.f32()?, reader.f32()?, reader.f32()?);
        let euler = self.decode_euler(&mut reader, euler_degrees(previous_rotation))?;

        Ok(DecodedTransform {
            position,
            rotation: quat_from_euler_degrees(euler),
        })
    }

    fn decode_euler(&self, reader: &mut Reader<'_>, fallback: Vec3) -> Result<Vec3, WireError> {
        if self.layout == RotationLayout::Packed {
            return Ok(Vec3::from_array(codec::unpack_angles(reader.u16()?)));
        }

        let mut euler = fallback.to_array();
        for (axis, angle) in AxisMask::ORDER.into_iter().zip(euler.iter_mut()) {
            if !self.mask.contains(axis) {
                continue;
            }
            *angle = match self.layout {
                RotationLayout::Float => reader.f32()?,
                RotationLayout::Short => codec::decode_u16(reader.u16()?, 0.0, DEGREES),
                RotationLayout::Byte => codec::decode_u8(reader.u8()?, 0.0, DEGREES),
                RotationLayout::Packed => unreachable!("packed layout handled above"),
            };
        }
        Ok(Vec3::from_array(euler))
    }
}

pub fn serialize(position: Vec3, rotation: Quat, mode: CompressionMode, mask: AxisMask) -> Vec<u8> {
    WireFormat::new(mode, mask).encode(position, rotation)
}

pub fn deserialize(
    bytes: &[u8],
    mode: CompressionMode,
    mask: AxisMask,
    previous_rotation: Quat,
) -> Result<DecodedTransform, WireError> {
    WireFormat::new(mode, mask).decode(bytes, previous_rotation)
}

/// Euler angles in degrees, each in `[0, 360)`. Composition is yaw (Y) of
/// pitch (X) of roll (Z), so `x` is pitch, `y` yaw and `z` roll.
pub fn euler_degrees(rotation: Quat) -> Vec3 {
    let (yaw, pitch, roll) = rotation.to_euler(EulerRot::YXZ);
    Vec3::new(
        codec::wrap_degrees(pitch.to_degrees()),
        codec::wrap_degrees(yaw.to_degrees()),
        codec::wrap_degrees(roll.to_degrees()),
    )
}

pub fn quat_from_euler_degrees(euler: Vec3) -> Quat {
    Quat::from_euler(
        EulerRot::YXZ,
        euler.y.to_radians(),
        euler.x.to_radians(),
        euler.z.to_radians(),
    )
}

struct Reader<'a> {
    buf: &'a [u8],
    expected: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8], expected: usize) -> Self {
        Self { buf, expected }
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N], WireError> {
        let (head, rest) = self.buf.split_first_chunk::<N>().ok_or(WireError::Truncated {
            expected: self.expected,
            actual: self.expected - self.buf.len(),
        })?;
        self.buf = rest;
        Ok(*head)
    }

    fn u8(&mut self) -> Result<u8, WireError> {
        Ok(self.take::<1>()?[0])
    }

    fn u16(&mut self) -> Result<u16, WireError> {
        Ok(u16::from_le_bytes(self.take()?))
    }

    fn f32(&mut self) -> Result<f32, WireError> {
        Ok(f32::from_le_bytes(self.take()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::angle_distance;

    fn assert_euler_close(actual: Vec3, expected: Vec3, tolerance: f32) {
        for (a, e) in actual.to_array().into_iter().zip(expected.to_array()) {
            assert!(
                angle_distance(a, e) <= tolerance,
                "expected {expected:?}, got {actual:?}"
            );
        }
    }

    #[test]
    fn payload_lengths_per_mode() {
        let xyz = AxisMask::XYZ;
        assert_eq!(WireFormat::new(CompressionMode::None, xyz).payload_len(), 24);
        assert_eq!(WireFormat::new(CompressionMode::Some, xyz).payload_len(), 18);
        assert_eq!(WireFormat::new(CompressionMode::Much, xyz).payload_len(), 15);
        assert_eq!(WireFormat::new(CompressionMode::Lots, xyz).payload_len(), 14);

        let yaw_only = AxisMask::Y;
        assert_eq!(WireFormat::new(CompressionMode::None, yaw_only).payload_len(), 16);
        assert_eq!(WireFormat::new(CompressionMode::Some, yaw_only).payload_len(), 14);
        assert_eq!(WireFormat::new(CompressionMode::Lots, yaw_only).payload_len(), 13);
        assert_eq!(
            WireFormat::new(CompressionMode::Much, AxisMask::empty()).payload_len(),
            POSITION_BYTES
        );
    }

    #[test]
    fn lots_falls_back_to_bytes_for_partial_masks() {
        let two_axes = AxisMask::X | AxisMask::Y;
        let format = WireFormat::new(CompressionMode::Lots, two_axes);
        assert_eq!(format.layout(), RotationLayout::Byte);
        assert_eq!(format.rotation_len(), 2);

        let full = WireFormat::new(CompressionMode::Lots, AxisMask::XYZ);
        assert_eq!(full.layout(), RotationLayout::Packed);
    }

    #[test]
    fn encoded_length_matches_layout() {
        let rotation = Quat::from_rotation_y(1.0);
        for mode in [
            CompressionMode::None,
            CompressionMode::Some,
            CompressionMode::Much,
            CompressionMode::Lots,
        ] {
            for bits in 0..8u8 {
                let format = WireFormat::new(mode, AxisMask::from_bits_truncate(bits));
                let bytes = format.encode(Vec3::ONE, rotation);
                assert_eq!(bytes.len(), format.payload_len(), "{mode:?} mask {bits:03b}");
            }
        }
    }

    #[test]
    fn position_is_full_precision() {
        let position = Vec3::new(1234.567, -0.001, 98765.43);
        for mode in [CompressionMode::None, CompressionMode::Lots] {
            let bytes = serialize(position, Quat::IDENTITY, mode, AxisMask::XYZ);
            let decoded = deserialize(&bytes, mode, AxisMask::XYZ, Quat::IDENTITY).unwrap();
            assert_eq!(decoded.position, position);
        }
    }

    #[test]
    fn much_mode_round_trips_euler() {
        let format = WireFormat::new(CompressionMode::Much, AxisMask::XYZ);
        let euler = Vec3::new(0.0, 180.0, 359.0);
        let mut bytes = Vec::new();
        format.encode_euler_into(&mut bytes, euler);
        assert_eq!(bytes.len(), 3);

        let mut reader = Reader::new(&bytes, bytes.len());
        let decoded = format.decode_euler(&mut reader, Vec3::ZERO).unwrap();
        assert_euler_close(decoded, euler, DEGREES / 255.0);
    }

    #[test]
    fn much_mode_round_trips_quaternion() {
        let rotation = quat_from_euler_degrees(Vec3::new(0.0, 180.0, 359.0));
        let bytes = serialize(Vec3::ZERO, rotation, CompressionMode::Much, AxisMask::XYZ);
        let decoded =
            deserialize(&bytes, CompressionMode::Much, AxisMask::XYZ, Quat::IDENTITY).unwrap();
        // three axes each off by at most one byte step
        let tolerance = (DEGREES / 255.0 * 3.0).to_radians();
        assert!(decoded.rotation.angle_between(rotation) <= tolerance);
    }

    #[test]
    fn float_mode_is_near_lossless() {
        let rotation = quat_from_euler_degrees(Vec3::new(30.0, 45.0, 60.0));
        let bytes = serialize(Vec3::ZERO, rotation, CompressionMode::None, AxisMask::XYZ);
        let decoded =
            deserialize(&bytes, CompressionMode::None, AxisMask::XYZ, Quat::IDENTITY).unwrap();
        assert!(decoded.rotation.angle_between(rotation) < 1e-3);
    }

    #[test]
    fn unsynced_axes_come_from_previous_rotation() {
        let sent = quat_from_euler_degrees(Vec3::new(0.0, 90.0, 0.0));
        let previous = quat_from_euler_degrees(Vec3::new(20.0, 0.0, 10.0));
        let bytes = serialize(Vec3::ZERO, sent, CompressionMode::Some, AxisMask::Y);
        let decoded = deserialize(&bytes, CompressionMode::Some, AxisMask::Y, previous).unwrap();

        let euler = euler_degrees(decoded.rotation);
        assert_euler_close(euler, Vec3::new(20.0, 90.0, 10.0), 0.05);
    }

    #[test]
    fn shared_stream_stays_aligned() {
        let format = WireFormat::new(CompressionMode::Lots, AxisMask::X | AxisMask::Z);
        let mut stream = Vec::new();
        format.encode_into(&mut stream, Vec3::new(1.0, 2.0, 3.0), Quat::IDENTITY);
        format.encode_into(&mut stream, Vec3::new(4.0, 5.0, 6.0), Quat::IDENTITY);
        stream.push(0xAB);

        let mut cursor = stream.as_slice();
        let first = format.decode_from(&mut cursor, Quat::IDENTITY).unwrap();
        let second = format.decode_from(&mut cursor, Quat::IDENTITY).unwrap();
        assert_eq!(first.position, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(second.position, Vec3::new(4.0, 5.0, 6.0));
        assert_eq!(cursor, [0xABu8].as_slice());
    }

    #[test]
    fn truncated_payload_is_rejected_without_consuming() {
        let format = WireFormat::new(CompressionMode::Some, AxisMask::XYZ);
        let bytes = format.encode(Vec3::ONE, Quat::IDENTITY);
        let mut cursor = &bytes[..bytes.len() - 1];
        let err = format.decode_from(&mut cursor, Quat::IDENTITY).unwrap_err();
        assert_eq!(
            err,
            WireError::Truncated {
                expected: 18,
                actual: 17
            }
        );
        assert_eq!(cursor.len(), 17);
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let mut bytes = serialize(Vec3::ONE, Quat::IDENTITY, CompressionMode::Much, AxisMask::XYZ);
        bytes.push(0);
        let err = deserialize(&bytes, CompressionMode::Much, AxisMask::XYZ, Quat::IDENTITY)
            .unwrap_err();
        assert_eq!(err, WireError::TrailingBytes { extra: 1 });
    }

    #[test]
    fn euler_conversion_round_trips() {
        let euler = Vec3::new(10.0, 200.0, 300.0);
        let back = euler_degrees(quat_from_euler_degrees(euler));
        assert_euler_close(back, euler, 0.01);
    }
}
