//! Lossy scalar compression used by the rotation wire format.
//!
//! All functions are pure affine maps between a float range and an integer
//! range. Inputs outside `[min, max]` are clamped before quantization.

/// Full turn in degrees; the range every Euler angle is packed into.
pub const DEGREES: f32 = 360.0;

const PACKED_AXIS_MAX: u16 = 0x1F;
const PACKED_AXIS_BITS: u16 = 5;

#[inline]
fn normalized(value: f32, min: f32, max: f32) -> f32 {
    let range = max - min;
    if range > 0.0 {
        ((value - min) / range).clamp(0.0, 1.0)
    } else {
        0.0
    }
}

#[inline]
fn quantize(value: f32, min: f32, max: f32, steps: f32) -> f32 {
    (normalized(value, min, max) * steps).round()
}

#[inline]
fn dequantize(value: f32, steps: f32, min: f32, max: f32) -> f32 {
    if max > min {
        min + value / steps * (max - min)
    } else {
        min
    }
}

pub fn encode_u8(value: f32, min: f32, max: f32) -> u8 {
    quantize(value, min, max, u8::MAX as f32) as u8
}

pub fn decode_u8(value: u8, min: f32, max: f32) -> f32 {
    dequantize(value as f32, u8::MAX as f32, min, max)
}

pub fn encode_u16(value: f32, min: f32, max: f32) -> u16 {
    quantize(value, min, max, u16::MAX as f32) as u16
}

pub fn decode_u16(value: u16, min: f32, max: f32) -> f32 {
    dequantize(value as f32, u16::MAX as f32, min, max)
}

/// Packs three angles in degrees into 15 bits: `x` in bits 0-4, `y` in 5-9,
/// `z` in 10-14. Only meaningful when all three axes are synchronized.
pub fn pack_angles(x: f32, y: f32, z: f32) -> u16 {
    let steps = PACKED_AXIS_MAX as f32;
    let lower = quantize(x, 0.0, DEGREES, steps) as u16;
    let middle = quantize(y, 0.0, DEGREES, steps) as u16;
    let upper = quantize(z, 0.0, DEGREES, steps) as u16;
    (upper << (PACKED_AXIS_BITS * 2)) | (middle << PACKED_AXIS_BITS) | lower
}

pub fn unpack_angles(packed: u16) -> [f32; 3] {
    let steps = PACKED_AXIS_MAX as f32;
    let lower = packed & PACKED_AXIS_MAX;
    let middle = (packed >> PACKED_AXIS_BITS) & PACKED_AXIS_MAX;
    let upper = (packed >> (PACKED_AXIS_BITS * 2)) & PACKED_AXIS_MAX;
    [
        dequantize(lower as f32, steps, 0.0, DEGREES),
        dequantize(middle as f32, steps, 0.0, DEGREES),
        dequantize(upper as f32, steps, 0.0, DEGREES),
    ]
}

/// Wraps any angle in degrees into `[0, 360)`.
pub fn wrap_degrees(angle: f32) -> f32 {
    let wrapped = angle.rem_euclid(DEGREES);
    // rem_euclid can round up to exactly 360 for tiny negative inputs
    if wrapped >= DEGREES { 0.0 } else { wrapped }
}

/// Smallest absolute difference between two angles in degrees.
pub fn angle_distance(a: f32, b: f32) -> f32 {
    let diff = wrap_degrees(a - b);
    diff.min(DEGREES - diff)
}
