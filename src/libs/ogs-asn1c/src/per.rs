//! PER (Packed Encoding Rules) encoding/decoding
//!
//! Aligned PER (APER) subset used by the NGAP envelope: constrained whole
//! numbers (including the length-prefixed form for ranges above 64K),
//! length determinants, ENUMERATED, CHOICE indices, OCTET STRING and open
//! types. Based on ITU-T X.691.

use bitvec::prelude::*;
use bytes::Bytes;
use thiserror::Error;

/// PER codec errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PerError {
    #[error("Buffer underflow: need {needed} bits, have {available}")]
    BufferUnderflow { needed: usize, available: usize },
    #[error("Invalid constraint: value {value} not in range {min}..={max}")]
    ConstraintViolation { value: i64, min: i64, max: i64 },
    #[error("Invalid choice index: {index} (max {max})")]
    InvalidChoiceIndex { index: usize, max: usize },
    #[error("Invalid length: {length}")]
    InvalidLength { length: usize },
    #[error("Unsupported extension")]
    UnsupportedExtension,
    #[error("Decode error: {0}")]
    DecodeError(String),
}

pub type PerResult<T> = Result<T, PerError>;

/// Largest length determinant handled without fragmentation (X.691 11.9.3.8).
pub const MAX_UNFRAGMENTED_LENGTH: usize = 16383;

/// Constraint definition for constrained integers
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Constraint {
    pub min: i64,
    pub max: i64,
    pub extensible: bool,
}

impl Constraint {
    pub const fn new(min: i64, max: i64) -> Self {
        Self { min, max, extensible: false }
    }

    pub const fn extensible(min: i64, max: i64) -> Self {
        Self { min, max, extensible: true }
    }

    /// Calculate the range of the constraint
    pub fn range(&self) -> u64 {
        if self.max >= self.min {
            (self.max - self.min) as u64 + 1
        } else {
            0
        }
    }

    /// Calculate bits needed to encode values in this range
    pub fn bits_needed(&self) -> usize {
        let range = self.range();
        if range <= 1 {
            0
        } else {
            64 - (range - 1).leading_zeros() as usize
        }
    }

    /// Octets needed for the largest offset (`range - 1`), at least one.
    ///
    /// Drives the length-prefixed form used when the range exceeds 64K.
    pub fn octets_needed(&self) -> usize {
        octets_for(self.range().saturating_sub(1))
    }
}

fn octets_for(value: u64) -> usize {
    let bits = 64 - value.leading_zeros() as usize;
    bits.div_ceil(8).max(1)
}

/// APER (Aligned PER) Encoder
pub struct AperEncoder {
    buffer: BitVec<u8, Msb0>,
}

impl AperEncoder {
    pub fn new() -> Self {
        Self {
            buffer: BitVec::new(),
        }
    }

    /// Get the encoded bytes, zero-padded to a whole octet
    pub fn into_bytes(mut self) -> Bytes {
        self.align();
        Bytes::from(self.buffer.into_vec())
    }

    /// Get current bit position
    pub fn bit_position(&self) -> usize {
        self.buffer.len()
    }

    /// Align to octet boundary
    pub fn align(&mut self) {
        let remainder = self.buffer.len() % 8;
        if remainder != 0 {
            let padding = 8 - remainder;
            self.buffer.resize(self.buffer.len() + padding, false);
        }
    }

    /// Write a single bit
    pub fn write_bit(&mut self, bit: bool) {
        self.buffer.push(bit);
    }

    /// Write multiple bits from a value (MSB first)
    pub fn write_bits(&mut self, value: u64, num_bits: usize) {
        for i in (0..num_bits).rev() {
            self.buffer.push((value >> i) & 1 == 1);
        }
    }

    /// Write raw bytes
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        if self.buffer.len() % 8 == 0 {
            self.buffer.extend_from_raw_slice(bytes);
        } else {
            for byte in bytes {
                self.write_bits(*byte as u64, 8);
            }
        }
    }

    /// Encode constrained whole number (X.691 Section 12.2)
    pub fn encode_constrained_whole_number(
        &mut self,
        value: i64,
        constraint: &Constraint,
    ) -> PerResult<()> {
        if value < constraint.min || value > constraint.max {
            return Err(PerError::ConstraintViolation {
                value,
                min: constraint.min,
                max: constraint.max,
            });
        }

        let range = constraint.range();
        let offset = (value - constraint.min) as u64;

        if range == 1 {
            return Ok(());
        }

        if range <= 255 {
            self.write_bits(offset, constraint.bits_needed());
        } else if range == 256 {
            self.align();
            self.write_bits(offset, 8);
        } else if range <= 65536 {
            self.align();
            self.write_bits(offset, 16);
        } else {
            // Length-prefixed octets: the octet count (1..=max) is itself a
            // constrained number, followed by the aligned minimal octets.
            let max_octets = constraint.octets_needed();
            let octets = octets_for(offset);
            let len_constraint = Constraint::new(1, max_octets as i64);
            self.encode_constrained_whole_number(octets as i64, &len_constraint)?;
            self.align();
            self.write_bits(offset, octets * 8);
        }

        Ok(())
    }

    /// Encode length determinant (X.691 Section 11.9)
    pub fn encode_length_determinant(&mut self, length: usize) -> PerResult<()> {
        self.align();
        if length <= 127 {
            self.write_bits(length as u64, 8);
        } else if length <= MAX_UNFRAGMENTED_LENGTH {
            self.write_bits(0x8000 | length as u64, 16);
        } else {
            return Err(PerError::InvalidLength { length });
        }
        Ok(())
    }

    /// Encode constrained length determinant
    pub fn encode_constrained_length(
        &mut self,
        length: usize,
        min: usize,
        max: usize,
    ) -> PerResult<()> {
        let constraint = Constraint::new(min as i64, max as i64);
        self.encode_constrained_whole_number(length as i64, &constraint)
    }

    /// Encode ENUMERATED (X.691 Section 14), root values only
    pub fn encode_enumerated(&mut self, value: i64, constraint: &Constraint) -> PerResult<()> {
        if constraint.extensible {
            self.write_bit(false);
        }
        self.encode_constrained_whole_number(value, constraint)
    }

    /// Encode CHOICE index (X.691 Section 23), root alternatives only
    pub fn encode_choice_index(
        &mut self,
        index: usize,
        num_alternatives: usize,
        extensible: bool,
    ) -> PerResult<()> {
        if index >= num_alternatives {
            return Err(PerError::InvalidChoiceIndex {
                index,
                max: num_alternatives.saturating_sub(1),
            });
        }
        if extensible {
            self.write_bit(false);
        }
        let constraint = Constraint::new(0, (num_alternatives - 1) as i64);
        self.encode_constrained_whole_number(index as i64, &constraint)
    }

    /// Encode unconstrained OCTET STRING (X.691 Section 17)
    pub fn encode_octet_string(&mut self, data: &[u8]) -> PerResult<()> {
        self.encode_length_determinant(data.len())?;
        self.write_bytes(data);
        Ok(())
    }

    /// Encode an open type (X.691 Section 11.2): the inner encoding
    /// wrapped as an unconstrained octet string.
    pub fn encode_open_type(&mut self, inner: &[u8]) -> PerResult<()> {
        self.encode_octet_string(inner)
    }
}

impl Default for AperEncoder {
    fn default() -> Self {
        Self::new()
    }
}

/// APER (Aligned PER) Decoder
///
/// Reads directly from the borrowed input; octet-aligned payloads
/// (open types, octet strings) are returned as sub-slices of it.
pub struct AperDecoder<'a> {
    bytes: &'a [u8],
    data: &'a BitSlice<u8, Msb0>,
    position: usize,
}

impl<'a> AperDecoder<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            data: BitSlice::from_slice(bytes),
            position: 0,
        }
    }

    /// Get current bit position
    pub fn bit_position(&self) -> usize {
        self.position
    }

    /// Get remaining bits
    pub fn remaining_bits(&self) -> usize {
        self.data.len().saturating_sub(self.position)
    }

    /// Align to octet boundary
    pub fn align(&mut self) {
        let remainder = self.position % 8;
        if remainder != 0 {
            self.position += 8 - remainder;
        }
    }

    /// Read a single bit
    pub fn read_bit(&mut self) -> PerResult<bool> {
        if self.position >= self.data.len() {
            return Err(PerError::BufferUnderflow {
                needed: 1,
                available: 0,
            });
        }
        let bit = self.data[self.position];
        self.position += 1;
        Ok(bit)
    }

    /// Read multiple bits as a value (MSB first)
    pub fn read_bits(&mut self, num_bits: usize) -> PerResult<u64> {
        if num_bits > 64 {
            return Err(PerError::DecodeError(format!(
                "cannot read {} bits into u64",
                num_bits
            )));
        }
        if num_bits == 0 {
            return Ok(0);
        }
        let available = self.remaining_bits();
        if num_bits > available {
            return Err(PerError::BufferUnderflow {
                needed: num_bits,
                available,
            });
        }

        let value = self.data[self.position..self.position + num_bits].load_be::<u64>();
        self.position += num_bits;
        Ok(value)
    }

    /// Borrow `num_bytes` octets from the input. The cursor must be aligned.
    pub fn read_slice(&mut self, num_bytes: usize) -> PerResult<&'a [u8]> {
        if self.position % 8 != 0 {
            return Err(PerError::DecodeError(
                "octet read at unaligned position".to_string(),
            ));
        }
        let start = self.position / 8;
        let end = start.checked_add(num_bytes).filter(|end| *end <= self.bytes.len());
        match end {
            Some(end) => {
                self.position = end * 8;
                Ok(&self.bytes[start..end])
            }
            None => Err(PerError::BufferUnderflow {
                needed: num_bytes.saturating_mul(8),
                available: self.remaining_bits(),
            }),
        }
    }

    /// Decode constrained whole number (X.691 Section 12.2)
    pub fn decode_constrained_whole_number(&mut self, constraint: &Constraint) -> PerResult<i64> {
        let range = constraint.range();

        if range == 1 {
            return Ok(constraint.min);
        }

        let offset = if range <= 255 {
            self.read_bits(constraint.bits_needed())?
        } else if range == 256 {
            self.align();
            self.read_bits(8)?
        } else if range <= 65536 {
            self.align();
            self.read_bits(16)?
        } else {
            let max_octets = constraint.octets_needed();
            let len_constraint = Constraint::new(1, max_octets as i64);
            let octets = self.decode_constrained_whole_number(&len_constraint)? as usize;
            self.align();
            self.read_bits(octets * 8)?
        };

        let value = constraint.min.saturating_add(offset as i64);
        if offset >= range || value > constraint.max {
            return Err(PerError::ConstraintViolation {
                value,
                min: constraint.min,
                max: constraint.max,
            });
        }
        Ok(value)
    }

    /// Decode length determinant (X.691 Section 11.9)
    pub fn decode_length_determinant(&mut self) -> PerResult<usize> {
        self.align();
        let first_byte = self.read_bits(8)? as u8;

        if first_byte & 0x80 == 0 {
            Ok(first_byte as usize)
        } else if first_byte & 0x40 == 0 {
            let second_byte = self.read_bits(8)? as u8;
            Ok((((first_byte & 0x3F) as usize) << 8) | (second_byte as usize))
        } else {
            // Fragmented form (11xxxxxx) never occurs in an NGAP envelope.
            Err(PerError::InvalidLength {
                length: ((first_byte & 0x3F) as usize) * 16384,
            })
        }
    }

    /// Decode constrained length determinant
    pub fn decode_constrained_length(&mut self, min: usize, max: usize) -> PerResult<usize> {
        let constraint = Constraint::new(min as i64, max as i64);
        self.decode_constrained_whole_number(&constraint)
            .map(|v| v as usize)
    }

    /// Decode ENUMERATED (X.691 Section 14)
    pub fn decode_enumerated(&mut self, constraint: &Constraint) -> PerResult<i64> {
        if constraint.extensible && self.read_bit()? {
            return Err(PerError::UnsupportedExtension);
        }
        self.decode_constrained_whole_number(constraint)
    }

    /// Decode CHOICE index (X.691 Section 23)
    pub fn decode_choice_index(
        &mut self,
        num_alternatives: usize,
        extensible: bool,
    ) -> PerResult<usize> {
        if extensible && self.read_bit()? {
            return Err(PerError::UnsupportedExtension);
        }
        let constraint = Constraint::new(0, num_alternatives.saturating_sub(1) as i64);
        self.decode_constrained_whole_number(&constraint)
            .map(|v| v as usize)
    }

    /// Decode unconstrained OCTET STRING (X.691 Section 17) without copying
    pub fn decode_octet_string(&mut self) -> PerResult<&'a [u8]> {
        let len = self.decode_length_determinant()?;
        self.read_slice(len)
    }

    /// Decode an open type, returning the borrowed inner encoding
    pub fn decode_open_type(&mut self) -> PerResult<&'a [u8]> {
        self.decode_octet_string()
    }
}

/// Trait for types that can be encoded with APER
pub trait AperEncode {
    fn encode_aper(&self, encoder: &mut AperEncoder) -> PerResult<()>;
}

/// Trait for types that can be decoded with APER
pub trait AperDecode: Sized {
    fn decode_aper(decoder: &mut AperDecoder) -> PerResult<Self>;
}
