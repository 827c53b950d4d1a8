//! Printable-text payload writer.
//!
//! Every output symbol carries 6 bits and is biased by +63, so the payload
//! only contains the characters `?` through `~`. Bytes that would corrupt the
//! surrounding markup (NUL, CR, `&`, `<`, `>`) are remapped on the way out.
//!
//! Three integer encodings are supported:
//! - varint: 5 data bits per symbol, `0x20` marks a continuation
//! - fixed 30-bit: exactly 5 symbols, low bits first
//! - fixed 36-bit: exactly 6 symbols, low bits first

use crate::utils::error::EncodeError;
use std::fmt::Debug;

const BIAS: u8 = 63;
const SYMBOL_BITS: u32 = 6;
const VARINT_DATA_MASK: u64 = 0x1F;
const VARINT_CONTINUATION: u64 = 0x20;

pub const FIXED30_BITS: u32 = 30;
pub const FIXED36_BITS: u32 = 36;

/// Width in symbols of a reserved length field
pub const LENGTH_FIELD_SYMBOLS: usize = (FIXED30_BITS / SYMBOL_BITS) as usize;

/// Substitute for bytes that must not appear in the payload text.
pub fn escape_byte(byte: u8) -> u8 {
    match byte {
        0 => b'!',
        b'\r' => b'#',
        b'&' => b'$',
        b'<' => b'%',
        b'>' => b'*',
        other => other,
    }
}

/// Position of a length field to be filled in later
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "a reserved length must be patched"]
pub struct LengthSlot {
    pos: usize,
}

/// Append-only buffer of payload symbols
#[derive(Debug, Clone, Default)]
pub struct PayloadWriter {
    buf: Vec<u8>,
}

impl PayloadWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of symbols written so far
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_string(self) -> String {
        // every symbol is ASCII
        self.buf.into_iter().map(char::from).collect()
    }

    fn put_symbol(&mut self, value: u64) {
        debug_assert!(value < 1 << SYMBOL_BITS);
        self.buf.push(escape_byte(value as u8 + BIAS));
    }

    /// Write a non-negative integer as a varint.
    ///
    /// # Errors
    /// * `EncodeError::NegativeValue` - `value` is below zero
    pub fn write_var<V>(&mut self, value: V) -> Result<(), EncodeError>
    where
        V: TryInto<u64> + Copy + Debug,
    {
        let mut v: u64 = value
            .try_into()
            .map_err(|_| EncodeError::NegativeValue(format!("{:?}", value)))?;
        while v > VARINT_DATA_MASK {
            self.put_symbol((v & VARINT_DATA_MASK) | VARINT_CONTINUATION);
            v >>= 5;
        }
        self.put_symbol(v);
        Ok(())
    }

    /// Write `value` as exactly 5 symbols.
    ///
    /// # Errors
    /// * `EncodeError::Overflow` - `value` needs more than 30 bits
    pub fn write_fixed30(&mut self, value: u64) -> Result<(), EncodeError> {
        self.write_fixed(value, FIXED30_BITS)
    }

    /// Write `value` as exactly 6 symbols.
    ///
    /// # Errors
    /// * `EncodeError::Overflow` - `value` needs more than 36 bits
    pub fn write_fixed36(&mut self, value: u64) -> Result<(), EncodeError> {
        self.write_fixed(value, FIXED36_BITS)
    }

    fn write_fixed(&mut self, value: u64, bits: u32) -> Result<(), EncodeError> {
        if value >> bits != 0 {
            return Err(EncodeError::Overflow { value, bits });
        }
        let mut v = value;
        for _ in 0..bits / SYMBOL_BITS {
            self.put_symbol(v & 0x3F);
            v >>= SYMBOL_BITS;
        }
        Ok(())
    }

    /// Reserve a 30-bit length field at the current position.
    pub fn reserve_length(&mut self) -> LengthSlot {
        let pos = self.buf.len();
        self.buf.extend_from_slice(&[escape_byte(BIAS); LENGTH_FIELD_SYMBOLS]);
        LengthSlot { pos }
    }

    /// Overwrite a reserved field with the number of symbols written after it.
    ///
    /// # Errors
    /// * `EncodeError::Overflow` - the body is longer than a 30-bit length
    pub fn patch_length(&mut self, slot: LengthSlot) -> Result<(), EncodeError> {
        let body_start = slot.pos + LENGTH_FIELD_SYMBOLS;
        let length = (self.buf.len() - body_start) as u64;
        if length >> FIXED30_BITS != 0 {
            return Err(EncodeError::Overflow {
                value: length,
                bits: FIXED30_BITS,
            });
        }

        let mut v = length;
        for byte in &mut self.buf[slot.pos..body_start] {
            *byte = escape_byte((v & 0x3F) as u8 + BIAS);
            v >>= SYMBOL_BITS;
        }
        Ok(())
    }
}

/// Pack two sub-fields into one word as `hi << lo_bits | lo`.
///
/// # Errors
/// * `EncodeError::Overflow` - `lo` needs more than `lo_bits` bits, or the
///   packed word does not fit into 36 bits
pub fn pack_fields(hi: u64, lo: u64, lo_bits: u32) -> Result<u64, EncodeError> {
    if lo >> lo_bits != 0 {
        return Err(EncodeError::Overflow {
            value: lo,
            bits: lo_bits,
        });
    }
    let hi_bits = FIXED36_BITS - lo_bits;
    if hi >> hi_bits != 0 {
        return Err(EncodeError::Overflow {
            value: hi,
            bits: hi_bits,
        });
    }
    Ok(hi << lo_bits | lo)
}


#[cfg(test)]
mod tests {
    use super::decode::Reader;
    use super::*;
    use proptest::prelude::*;

    const BOUNDARIES: &[u64] = &[
        0,
        1,
        0x1F,
        0x20,
        0x3F,
        0x40,
        0x3FF,
        0x400,
        (1 << 18) - 1,
        1 << 18,
        (1 << 30) - 1,
        1 << 30,
        (1 << 36) - 1,
    ];

    #[test]
    fn test_varint_layout() {
        let mut out = PayloadWriter::new();
        out.write_var(0u32).unwrap();
        out.write_var(31u32).unwrap();
        out.write_var(32u32).unwrap();

        // 0 -> '?', 31 -> '^', 32 -> [0|0x20, 1] -> '_' '@'
        assert_eq!(out.as_bytes(), b"?^_@");
    }

    #[test]
    fn test_boundaries_round_trip() {
        for &value in BOUNDARIES {
            let mut out = PayloadWriter::new();
            out.write_var(value).unwrap();
            out.write_fixed36(value).unwrap();
            let fits30 = value < 1 << 30;
            if fits30 {
                out.write_fixed30(value).unwrap();
            } else {
                assert_eq!(
                    out.write_fixed30(value),
                    Err(EncodeError::Overflow { value, bits: 30 })
                );
            }

            let bytes = out.as_bytes().to_vec();
            let mut reader = Reader::new(&bytes);
            assert_eq!(reader.var(), value);
            assert_eq!(reader.fixed36(), value);
            if fits30 {
                assert_eq!(reader.fixed30(), value);
            }
            assert!(reader.at_end());
        }
    }

    #[test]
    fn test_rejects_negative_and_oversized() {
        let mut out = PayloadWriter::new();
        assert!(matches!(out.write_var(-1i64), Err(EncodeError::NegativeValue(_))));
        assert!(matches!(out.write_var(i32::MIN), Err(EncodeError::NegativeValue(_))));
        assert_eq!(
            out.write_fixed36(1 << 36),
            Err(EncodeError::Overflow {
                value: 1 << 36,
                bits: 36
            })
        );
        assert!(out.is_empty());
    }

    #[test]
    fn test_symbols_stay_printable() {
        let mut out = PayloadWriter::new();
        for value in 0..64u64 {
            out.write_fixed30(value).unwrap();
        }
        for &byte in out.as_bytes() {
            assert!((b'?'..=b'~').contains(&byte));
            assert!(!matches!(byte, 0 | b'\r' | b'&' | b'<' | b'>'));
        }
    }

    #[test]
    fn test_escape_byte() {
        let specials = [0u8, b'\r', b'&', b'<', b'>'];
        let substitutes: Vec<u8> = specials.iter().map(|&b| escape_byte(b)).collect();
        assert_eq!(substitutes, b"!#$%*".to_vec());
        for byte in 63u8..=126 {
            assert_eq!(escape_byte(byte), byte);
        }
    }

    #[test]
    fn test_patch_length() {
        let mut out = PayloadWriter::new();
        out.write_var(7u32).unwrap();
        let slot = out.reserve_length();
        for value in 0..100u32 {
            out.write_var(value).unwrap();
        }
        out.patch_length(slot).unwrap();

        let bytes = out.as_bytes().to_vec();
        let mut reader = Reader::new(&bytes);
        assert_eq!(reader.var(), 7);
        let length = reader.fixed30() as usize;
        assert_eq!(length, bytes.len() - reader.pos);
        for value in 0..100 {
            assert_eq!(reader.var(), value);
        }
    }

    #[test]
    fn test_pack_fields() {
        assert_eq!(pack_fields(3, 5, 18).unwrap(), 3 << 18 | 5);
        assert_eq!(
            pack_fields(1, 1 << 18, 18),
            Err(EncodeError::Overflow {
                value: 1 << 18,
                bits: 18
            })
        );
        assert!(pack_fields(1 << 18, 0, 18).is_err());
        assert_eq!(pack_fields(u32::MAX as u64, 5, 4).unwrap(), (u32::MAX as u64) << 4 | 5);
    }

    proptest! {
        #[test]
        fn proptest_round_trip(value in 0u64..(1 << 36)) {
            let mut out = PayloadWriter::new();
            out.write_var(value).unwrap();
            out.write_fixed36(value).unwrap();
            let fixed30 = out.write_fixed30(value);
            prop_assert_eq!(fixed30.is_ok(), value < 1 << 30);

            let bytes = out.as_bytes().to_vec();
            let mut reader = Reader::new(&bytes);
            prop_assert_eq!(reader.var(), value);
            prop_assert_eq!(reader.fixed36(), value);
            if value < 1 << 30 {
                prop_assert_eq!(reader.fixed30(), value);
            }
            prop_assert!(reader.at_end());
        }

        #[test]
        fn proptest_negative_fails(value in i64::MIN..0) {
            let mut out = PayloadWriter::new();
            prop_assert!(out.write_var(value).is_err());
        }
    }
}
