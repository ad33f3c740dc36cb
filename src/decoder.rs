// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-field-gateway project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Register decoding
//!
//! Pure conversions from raw 16-bit Modbus register words to typed values.
//! Multi-register values are big-endian: the first word holds the most
//! significant half.

/// Combine two big-endian registers into a 32-bit unsigned integer.
pub fn decode_u32(words: [u16; 2]) -> u32 {
    ((words[0] as u32) << 16) | words[1] as u32
}

/// Reinterpret two big-endian registers as an IEEE-754 binary32.
///
/// Every bit pattern is accepted; NaN and infinities decode as such.
pub fn decode_float32(words: [u16; 2]) -> f32 {
    f32::from_bits(decode_u32(words))
}

/// Split a float into the two big-endian registers a device would expose.
pub fn encode_float32(value: f32) -> [u16; 2] {
    let bits = value.to_bits();
    [(bits >> 16) as u16, (bits & 0xFFFF) as u16]
}

/// Split a 32-bit integer into two big-endian registers.
pub fn encode_u32(value: u32) -> [u16; 2] {
    [(value >> 16) as u16, (value & 0xFFFF) as u16]
}

/// Fixed-point register: raw value divided by `scale` (100 for centivolts, 10 for deci-degrees).
pub fn decode_scaled_int(word: u16, scale: f64) -> f64 {
    word as f64 / scale
}

/// Flag register: any non-zero value is `true`.
pub fn decode_bool(word: u16) -> bool {
    word != 0
}

/// Round to two decimals, the precision published for measured quantities.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
