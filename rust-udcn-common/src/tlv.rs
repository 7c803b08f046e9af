//! NDN-TLV v0.3 encoding and decoding primitives.
//!
//! Both the TLV-TYPE and TLV-LENGTH fields use the same variable-width
//! number encoding, so this module provides one codec for both.

use crate::error::Error;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Top-level and nested TLV type numbers used by the wire codec.
pub const TLV_NAME: u64 = 0x07;
pub const TLV_GENERIC_COMPONENT: u64 = 0x08;
pub const TLV_SEGMENT_COMPONENT: u64 = 0x32; // 50
pub const TLV_VERSION_COMPONENT: u64 = 0x36; // 54

pub const TLV_INTEREST: u64 = 0x05;
pub const TLV_NONCE: u64 = 0x0A;
pub const TLV_INTEREST_LIFETIME: u64 = 0x0C;
pub const TLV_CAN_BE_PREFIX: u64 = 0x21; // 33
pub const TLV_MUST_BE_FRESH: u64 = 0x12; // 18

pub const TLV_DATA: u64 = 0x06;
pub const TLV_META_INFO: u64 = 0x14; // 20
pub const TLV_CONTENT_TYPE: u64 = 0x18; // 24
pub const TLV_FRESHNESS_PERIOD: u64 = 0x19; // 25
pub const TLV_FINAL_BLOCK_ID: u64 = 0x1A; // 26
pub const TLV_CONTENT: u64 = 0x15; // 21
pub const TLV_SIGNATURE_INFO: u64 = 0x16; // 22
pub const TLV_SIGNATURE_VALUE: u64 = 0x17; // 23
pub const TLV_SIGNATURE_TYPE: u64 = 0x1B; // 27

pub const TLV_LP_PACKET: u64 = 0x64; // 100
pub const TLV_LP_FRAGMENT: u64 = 0x50; // 80
pub const TLV_LP_PIT_TOKEN: u64 = 0x62; // 98
pub const TLV_LP_NACK: u64 = 0x320; // 800
pub const TLV_LP_NACK_REASON: u64 = 0x321; // 801
pub const TLV_LP_CONGESTION_MARK: u64 = 0x103; // 259

/// Encodes a TLV-TYPE or TLV-LENGTH variable-width number.
///
/// `value < 253` uses one byte; `value <= 0xFFFF` uses a 253 marker plus two
/// bytes; `value <= 0xFFFF_FFFF` uses a 254 marker plus four bytes;
/// otherwise a 255 marker plus eight bytes.
pub fn encode_var_number(value: u64, buf: &mut BytesMut) {
    if value < 253 {
        buf.put_u8(value as u8);
    } else if value <= u16::MAX as u64 {
        buf.put_u8(253);
        buf.put_u16(value as u16);
    } else if value <= u32::MAX as u64 {
        buf.put_u8(254);
        buf.put_u32(value as u32);
    } else {
        buf.put_u8(255);
        buf.put_u64(value);
    }
}

/// Number of bytes `encode_var_number` would write for `value`.
pub fn var_number_size(value: u64) -> usize {
    if value < 253 {
        1
    } else if value <= u16::MAX as u64 {
        3
    } else if value <= u32::MAX as u64 {
        5
    } else {
        9
    }
}

/// Decodes a TLV-TYPE or TLV-LENGTH variable-width number.
pub fn decode_var_number(buf: &mut impl Buf) -> Result<u64, Error> {
    if !buf.has_remaining() {
        return Err(Error::Tlv("buffer underflow decoding TLV number".into()));
    }
    match buf.get_u8() {
        marker @ 0..=252 => Ok(marker as u64),
        253 => {
            if buf.remaining() < 2 {
                return Err(Error::Tlv("buffer underflow decoding 16-bit TLV number".into()));
            }
            Ok(buf.get_u16() as u64)
        }
        254 => {
            if buf.remaining() < 4 {
                return Err(Error::Tlv("buffer underflow decoding 32-bit TLV number".into()));
            }
            Ok(buf.get_u32() as u64)
        }
        255 => {
            if buf.remaining() < 8 {
                return Err(Error::Tlv("buffer underflow decoding 64-bit TLV number".into()));
            }
            Ok(buf.get_u64())
        }
    }
}

/// A generic TLV element: type, length (implicit in `value.len()`), value.
#[derive(Debug, Clone, PartialEq)]
pub struct TlvElement {
    pub tlv_type: u64,
    pub value: Bytes,
}

impl TlvElement {
    pub fn new(tlv_type: u64, value: impl Into<Bytes>) -> Self {
        Self {
            tlv_type,
            value: value.into(),
        }
    }

    /// Total encoded length (type + length + value).
    pub fn len(&self) -> usize {
        var_number_size(self.tlv_type) + var_number_size(self.value.len() as u64) + self.value.len()
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        encode_var_number(self.tlv_type, buf);
        encode_var_number(self.value.len() as u64, buf);
        buf.extend_from_slice(&self.value);
    }

    pub fn decode(buf: &mut impl Buf) -> Result<Self, Error> {
        let tlv_type = decode_var_number(buf)?;
        let length = decode_var_number(buf)? as usize;

        if buf.remaining() < length {
            return Err(Error::Tlv(format!(
                "TLV value requires {} bytes but only {} remain",
                length,
                buf.remaining()
            )));
        }

        let mut value = BytesMut::with_capacity(length);
        value.put(buf.take(length));
        Ok(Self {
            tlv_type,
            value: value.freeze(),
        })
    }

    /// Reads the value as a NonNegativeInteger per NDN-TLV encoding.
    pub fn as_nonneg_integer(&self) -> Result<u64, Error> {
        decode_nonneg_integer(&self.value)
    }
}

/// Encodes `value` as an NDN-TLV NonNegativeInteger: the minimal standard
/// width (1, 2, 4 or 8 bytes) big-endian.
pub fn encode_nonneg_integer(tlv_type: u64, value: u64) -> TlvElement {
    let mut buf = BytesMut::new();
    if value <= u8::MAX as u64 {
        buf.put_u8(value as u8);
    } else if value <= u16::MAX as u64 {
        buf.put_u16(value as u16);
    } else if value <= u32::MAX as u64 {
        buf.put_u32(value as u32);
    } else {
        buf.put_u64(value);
    }
    TlvElement::new(tlv_type, buf.freeze())
}

/// Encodes `segment` as a Segment component wrapped in `container_type`,
/// the shape both the Data `MetaInfo` and the file-metadata block use for
/// `FinalBlockId` (a container TLV holding exactly one name component).
pub fn encode_final_block_id(container_type: u64, segment: u64) -> TlvElement {
    let mut inner = BytesMut::new();
    encode_nonneg_integer(TLV_SEGMENT_COMPONENT, segment).encode(&mut inner);
    TlvElement::new(container_type, inner.freeze())
}

/// Decodes a `FinalBlockId`-shaped TLV back to the wrapped segment number.
pub fn decode_final_block_id(el: &TlvElement) -> Result<u64, Error> {
    let mut buf = el.value.clone();
    let inner = TlvElement::decode(&mut buf)?;
    inner.as_nonneg_integer()
}

pub fn decode_nonneg_integer(value: &Bytes) -> Result<u64, Error> {
    match value.len() {
        1 => Ok(value[0] as u64),
        2 => Ok(u16::from_be_bytes([value[0], value[1]]) as u64),
        4 => Ok(u32::from_be_bytes(value[..4].try_into().unwrap()) as u64),
        8 => Ok(u64::from_be_bytes(value[..8].try_into().unwrap())),
        n => Err(Error::Tlv(format!(
            "invalid NonNegativeInteger width: {n} bytes"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn var_number_roundtrip() {
        for value in [0u64, 1, 252, 253, 300, 65535, 65536, 1 << 32, u64::MAX] {
            let mut buf = BytesMut::new();
            encode_var_number(value, &mut buf);
            assert_eq!(buf.len(), var_number_size(value));
            let mut frozen = buf.freeze();
            assert_eq!(decode_var_number(&mut frozen).unwrap(), value);
        }
    }

    #[test]
    fn element_roundtrip() {
        let el = TlvElement::new(TLV_GENERIC_COMPONENT, Bytes::from_static(b"hello"));
        let mut buf = BytesMut::new();
        el.encode(&mut buf);
        assert_eq!(buf.len(), el.len());
        let mut frozen = buf.freeze();
        let decoded = TlvElement::decode(&mut frozen).unwrap();
        assert_eq!(decoded, el);
    }

    #[test]
    fn nonneg_integer_minimal_width() {
        let el = encode_nonneg_integer(0xF502, 13000);
        assert_eq!(el.value.len(), 2);
        assert_eq!(el.as_nonneg_integer().unwrap(), 13000);

        let el = encode_nonneg_integer(0xF50C, 2_000_000_000);
        assert_eq!(el.value.len(), 4);
        assert_eq!(el.as_nonneg_integer().unwrap(), 2_000_000_000);
    }

    #[test]
    fn truncated_buffer_errors() {
        let mut buf = BytesMut::new();
        buf.put_u8(TLV_GENERIC_COMPONENT as u8);
        buf.put_u8(5); // claims 5 bytes of value, provides none
        let mut frozen = buf.freeze();
        assert!(TlvElement::decode(&mut frozen).is_err());
    }
}
