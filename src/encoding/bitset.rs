// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! MSB-first bit accumulator.
//!
//! Encoding appends each field's bits to the back; decoding pops fields off
//! the back in reverse declaration order. Bit 0 is the first bit on the wire
//! (the high bit of the first byte).

use std::fmt;

/// Growable sequence of bits, most significant (first transmitted) first.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Bitset {
    bits: Vec<bool>,
}

impl Bitset {
    /// Create an empty bitset.
    pub fn new() -> Self {
        Self { bits: Vec::new() }
    }

    /// Create `len` zero bits.
    pub fn zeros(len: usize) -> Self {
        Self {
            bits: vec![false; len],
        }
    }

    /// Low `width` bits of `value`, most significant first.
    ///
    /// Bits of `value` above `width` are dropped.
    pub fn from_u64(value: u64, width: usize) -> Self {
        let bits = (0..width)
            .rev()
            .map(|i| i < 64 && (value >> i) & 1 == 1)
            .collect();
        Self { bits }
    }

    /// All bits of `bytes`, MSB-first.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let bits = bytes
            .iter()
            .flat_map(|b| (0..8).rev().map(move |i| (b >> i) & 1 == 1))
            .collect();
        Self { bits }
    }

    /// Exactly `len` bits read from `bytes`: zero-filled when short,
    /// truncated when long.
    pub fn from_bytes_len(bytes: &[u8], len: usize) -> Self {
        let mut set = Self::from_bytes(bytes);
        set.bits.resize(len, false);
        set
    }

    /// Number of bits.
    pub fn len(&self) -> usize {
        self.bits.len()
    }

    /// Check if there are no bits.
    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    /// Check if every bit is zero.
    pub fn is_zero(&self) -> bool {
        self.bits.iter().all(|b| !b)
    }

    /// Bit at `index` (0 = first on the wire).
    pub fn get(&self, index: usize) -> Option<bool> {
        self.bits.get(index).copied()
    }

    /// Append one bit.
    pub fn push(&mut self, bit: bool) {
        self.bits.push(bit);
    }

    /// Append all bits of `other`.
    pub fn append(&mut self, other: &Bitset) {
        self.bits.extend_from_slice(&other.bits);
    }

    /// Remove and return the last `n` bits.
    ///
    /// When fewer than `n` bits remain, the result is left-padded with zeros.
    pub fn take_back(&mut self, n: usize) -> Bitset {
        let available = n.min(self.bits.len());
        let split = self.bits.len() - available;
        let tail = self.bits.split_off(split);
        let mut bits = vec![false; n - available];
        bits.extend(tail);
        Bitset { bits }
    }

    /// Remove and return the first `n` bits, zero-filled when short.
    pub fn take_front(&mut self, n: usize) -> Bitset {
        let available = n.min(self.bits.len());
        let mut bits: Vec<bool> = self.bits.drain(..available).collect();
        bits.resize(n, false);
        Bitset { bits }
    }

    /// Interpret the bits as an unsigned integer.
    ///
    /// Only the last 64 bits are significant.
    pub fn to_u64(&self) -> u64 {
        let start = self.bits.len().saturating_sub(64);
        self.bits[start..]
            .iter()
            .fold(0u64, |acc, &b| (acc << 1) | u64::from(b))
    }

    /// Pack into bytes, MSB-first, zero-padding the final byte.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = vec![0u8; self.bits.len().div_ceil(8)];
        for (i, &bit) in self.bits.iter().enumerate() {
            if bit {
                out[i / 8] |= 1 << (7 - (i % 8));
            }
        }
        out
    }
}

impl fmt::Debug for Bitset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bitset({self})")
    }
}

impl fmt::Display for Bitset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &b in &self.bits {
            f.write_str(if b { "1" } else { "0" })?;
        }
        Ok(())
    }
}

/// Number of bits needed to distinguish `states` states: `ceil(log2(states))`.
pub fn ceil_log2(states: u128) -> usize {
    if states <= 1 {
        return 0;
    }
    (128 - (states - 1).leading_zeros()) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_u64_msb_first() {
        let b = Bitset::from_u64(0b101, 4);
        assert_eq!(b.to_string(), "0101");
        assert_eq!(b.to_u64(), 5);
    }

    #[test]
    fn test_from_u64_masks_high_bits() {
        let b = Bitset::from_u64(0xFF, 4);
        assert_eq!(b.to_u64(), 0xF);
    }

    #[test]
    fn test_append_then_take_back() {
        let mut acc = Bitset::new();
        acc.append(&Bitset::from_u64(3, 2));
        acc.append(&Bitset::from_u64(5, 3));
        assert_eq!(acc.take_back(3).to_u64(), 5);
        assert_eq!(acc.take_back(2).to_u64(), 3);
        assert!(acc.is_empty());
    }

    #[test]
    fn test_take_back_short_pads() {
        let mut acc = Bitset::from_u64(1, 1);
        let out = acc.take_back(4);
        assert_eq!(out.len(), 4);
        assert_eq!(out.to_u64(), 1);
    }

    #[test]
    fn test_take_front() {
        let mut acc = Bitset::from_bytes(&[0xA5]);
        assert_eq!(acc.take_front(4).to_u64(), 0xA);
        assert_eq!(acc.to_u64(), 0x5);
    }

    #[test]
    fn test_to_bytes_pads_tail() {
        let b = Bitset::from_u64(0b111, 3);
        assert_eq!(b.to_bytes(), vec![0b1110_0000]);
        assert_eq!(Bitset::zeros(9).to_bytes(), vec![0, 0]);
    }

    #[test]
    fn test_from_bytes_len() {
        let b = Bitset::from_bytes_len(&[0xFF], 12);
        assert_eq!(b.to_string(), "111111110000");
        let b = Bitset::from_bytes_len(&[0xFF, 0xFF], 4);
        assert_eq!(b.len(), 4);
    }

    #[test]
    fn test_ceil_log2() {
        assert_eq!(ceil_log2(0), 0);
        assert_eq!(ceil_log2(1), 0);
        assert_eq!(ceil_log2(2), 1);
        assert_eq!(ceil_log2(3), 2);
        assert_eq!(ceil_log2(4), 2);
        assert_eq!(ceil_log2(102), 7);
        assert_eq!(ceil_log2(1002), 10);
        assert_eq!(ceil_log2(42), 6);
    }
}
