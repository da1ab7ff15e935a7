// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Implements an append-only, bit-granular buffer and its read cursor.
//!
//! Bits are packed most-significant-first into bytes. Completed bytes live in a
//! dense `Vec<u8>`; the trailing bits that do not yet fill a byte are kept apart
//! so that [`BitStream::pop_back`] can reopen a completed byte.

use bytemuck::Pod;
use std::fs;
use std::io;
use std::path::Path;

const BITS_PER_BYTE: u8 = 8;

#[inline]
fn mask(bit: u8) -> u8 {
    0x80 >> bit
}

/// A growable sequence of bits.
///
/// `size_in_bits() == 8 * size_in_bytes() + <bits in the incomplete byte>`.
/// Unused bits of the incomplete byte are always zero, so two streams holding
/// the same bits compare equal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BitStream {
    bytes: Vec<u8>,
    partial: u8,
    partial_len: u8,
}

impl BitStream {
    /// Creates a new, empty stream.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a single bit.
    pub fn push_bit(&mut self, bit: bool) {
        if bit {
            self.partial |= mask(self.partial_len);
        }
        self.partial_len += 1;

        if self.partial_len == BITS_PER_BYTE {
            self.bytes.push(self.partial);
            self.partial = 0;
            self.partial_len = 0;
        }
    }

    /// Appends the eight bits of `byte`, most significant first.
    pub fn push_byte(&mut self, byte: u8) {
        if self.partial_len == 0 {
            self.bytes.push(byte);
            return;
        }
        for i in 0..BITS_PER_BYTE {
            self.push_bit(byte & mask(i) != 0);
        }
    }

    /// Appends every byte of `bytes` in order.
    pub fn push_bytes(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.push_byte(byte);
        }
    }

    /// Appends the raw in-memory representation of a plain-old-data value.
    pub fn push_pod<T: Pod>(&mut self, value: &T) {
        self.push_bytes(bytemuck::bytes_of(value));
    }

    /// Appends a length-prefixed byte string.
    ///
    /// Layout: one flag bit (`1` when the length fits in a `u8`), then the
    /// length as a `u8` or a little-endian `u64`, then the raw bytes. No
    /// terminator is used because payloads may contain any byte value.
    pub fn push_string(&mut self, bytes: &[u8]) {
        match u8::try_from(bytes.len()) {
            Ok(short) => {
                self.push_bit(true);
                self.push_byte(short);
            }
            Err(_) => {
                self.push_bit(false);
                self.push_bytes(&(bytes.len() as u64).to_le_bytes());
            }
        }
        self.push_bytes(bytes);
    }

    /// Removes the most recently pushed bit.
    ///
    /// # Panics
    /// Panics if the stream is empty.
    pub fn pop_back(&mut self) {
        if self.partial_len == 0 {
            let last = self
                .bytes
                .pop()
                .unwrap_or_else(|| panic!("pop_back on an empty BitStream"));
            self.partial = last;
            self.partial_len = BITS_PER_BYTE;
        }
        self.partial_len -= 1;
        self.partial &= !mask(self.partial_len);
    }

    /// Removes every bit.
    pub fn clear(&mut self) {
        self.bytes.clear();
        self.partial = 0;
        self.partial_len = 0;
    }

    /// Returns the number of complete bytes.
    pub fn size_in_bytes(&self) -> usize {
        self.bytes.len()
    }

    /// Returns the total number of bits.
    pub fn size_in_bits(&self) -> usize {
        self.bytes.len() * BITS_PER_BYTE as usize + self.partial_len as usize
    }

    /// Returns `true` if the stream holds no bits.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty() && self.partial_len == 0
    }

    /// Returns the bit at `index`, or `None` past the end.
    pub fn get(&self, index: usize) -> Option<bool> {
        let byte_idx = index / BITS_PER_BYTE as usize;
        let bit_idx = (index % BITS_PER_BYTE as usize) as u8;
        self.bit_at(byte_idx, bit_idx)
    }

    /// Returns a cursor positioned on the first bit.
    pub fn reader(&self) -> BitReader<'_> {
        BitReader {
            stream: self,
            byte: 0,
            bit: 0,
        }
    }

    #[inline]
    fn bit_at(&self, byte: usize, bit: u8) -> Option<bool> {
        if byte < self.bytes.len() {
            Some(self.bytes[byte] & mask(bit) != 0)
        } else if byte == self.bytes.len() && bit < self.partial_len {
            Some(self.partial & mask(bit) != 0)
        } else {
            None
        }
    }

    /// Encodes the stream in its on-disk layout: the number of bits in the
    /// incomplete byte, that byte if the number is non-zero, then all complete
    /// bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.bytes.len() + 2);
        out.push(self.partial_len);
        if self.partial_len > 0 {
            out.push(self.partial);
        }
        out.extend_from_slice(&self.bytes);
        out
    }

    /// Decodes the on-disk layout produced by [`BitStream::to_bytes`].
    ///
    /// An empty input yields an empty stream.
    pub fn from_bytes(data: &[u8]) -> io::Result<Self> {
        let Some((&partial_len, rest)) = data.split_first() else {
            return Ok(Self::new());
        };

        if partial_len >= BITS_PER_BYTE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("trailing bit count {partial_len} is not below {BITS_PER_BYTE}"),
            ));
        }

        let (partial, bytes) = if partial_len > 0 {
            let (&partial, bytes) = rest.split_first().ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "trailing bit count is set but the partial byte is missing",
                )
            })?;
            // Keep the unused bits zeroed.
            let keep = !(0xFFu8 >> partial_len);
            (partial & keep, bytes)
        } else {
            (0, rest)
        };

        Ok(Self {
            bytes: bytes.to_vec(),
            partial,
            partial_len,
        })
    }

    /// Writes the stream to a binary file.
    pub fn serialize(&self, path: impl AsRef<Path>) -> io::Result<()> {
        fs::write(path, self.to_bytes())
    }

    /// Reads a stream from a binary file written by [`BitStream::serialize`].
    pub fn deserialize(path: impl AsRef<Path>) -> io::Result<Self> {
        Self::from_bytes(&fs::read(path)?)
    }
}

/// A read cursor over a [`BitStream`].
///
/// Reads past the end are a schema bug on the caller's side and panic. The
/// [`Iterator`] impl is the non-panicking way to walk the raw bits.
#[derive(Debug, Clone, Copy)]
pub struct BitReader<'a> {
    stream: &'a BitStream,
    byte: usize,
    bit: u8,
}

impl<'a> BitReader<'a> {
    /// Returns the stream this cursor reads from.
    pub fn stream(&self) -> &'a BitStream {
        self.stream
    }

    /// Returns the cursor position in bits from the start of the stream.
    pub fn bit_position(&self) -> usize {
        self.byte * BITS_PER_BYTE as usize + self.bit as usize
    }

    /// Returns the number of bits left to read.
    pub fn remaining(&self) -> usize {
        self.stream.size_in_bits().saturating_sub(self.bit_position())
    }

    #[inline]
    fn advance(&mut self) {
        self.bit += 1;
        if self.bit == BITS_PER_BYTE {
            self.bit = 0;
            self.byte += 1;
        }
    }

    /// Reads one bit and advances.
    ///
    /// # Panics
    /// Panics if the cursor is at the end of the stream.
    pub fn read_bit(&mut self) -> bool {
        let bit = self.stream.bit_at(self.byte, self.bit).unwrap_or_else(|| {
            panic!(
                "BitReader read past the end of the stream (position {} of {})",
                self.bit_position(),
                self.stream.size_in_bits()
            )
        });
        self.advance();
        bit
    }

    /// Reads eight bits as one byte, whatever the cursor's alignment.
    pub fn read_byte(&mut self) -> u8 {
        if self.bit == 0 && self.byte < self.stream.bytes.len() {
            let byte = self.stream.bytes[self.byte];
            self.byte += 1;
            return byte;
        }
        let mut byte = 0u8;
        for i in 0..BITS_PER_BYTE {
            if self.read_bit() {
                byte |= mask(i);
            }
        }
        byte
    }

    /// Reads `count` bytes.
    pub fn extract_bytes(&mut self, count: usize) -> Vec<u8> {
        (0..count).map(|_| self.read_byte()).collect()
    }

    /// Reads `size_of::<T>()` bytes and reinterprets them as a `T`.
    pub fn extract_pod<T: Pod>(&mut self) -> T {
        let bytes = self.extract_bytes(std::mem::size_of::<T>());
        bytemuck::pod_read_unaligned(&bytes)
    }

    /// Reads a byte string written by [`BitStream::push_string`].
    pub fn extract_string(&mut self) -> Vec<u8> {
        let fits_in_byte = self.read_bit();
        let len = if fits_in_byte {
            self.read_byte() as usize
        } else {
            let raw: [u8; 8] = self.extract_pod();
            u64::from_le_bytes(raw) as usize
        };
        self.extract_bytes(len)
    }
}

impl Iterator for BitReader<'_> {
    type Item = bool;

    fn next(&mut self) -> Option<bool> {
        let bit = self.stream.bit_at(self.byte, self.bit)?;
        self.advance();
        Some(bit)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.remaining();
        (remaining, Some(remaining))
    }
}
