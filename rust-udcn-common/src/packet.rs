//! Interest, Data and link-layer (Lp) packet types and their TLV codecs.

use crate::error::Error;
use crate::name::Name;
use crate::tlv::{self, TlvElement};
use bytes::{Buf, Bytes, BytesMut};

/// MetaInfo ContentType field. `Blob` is ordinary payload; `Nack` marks an
/// application-level failure response (e.g. ENOENT) carried in a Data packet
/// rather than at the link layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Blob,
    Nack,
    Other(u64),
}

impl ContentType {
    fn to_code(self) -> u64 {
        match self {
            Self::Blob => 0,
            Self::Nack => 3,
            Self::Other(n) => n,
        }
    }

    fn from_code(code: u64) -> Self {
        match code {
            0 => Self::Blob,
            3 => Self::Nack,
            n => Self::Other(n),
        }
    }
}

/// An Interest packet.
#[derive(Debug, Clone, PartialEq)]
pub struct Interest {
    pub name: Name,
    pub can_be_prefix: bool,
    pub must_be_fresh: bool,
    pub nonce: u32,
    pub lifetime_ms: u64,
}

impl Interest {
    pub fn new(name: Name, lifetime_ms: u64) -> Self {
        Self {
            name,
            can_be_prefix: false,
            must_be_fresh: false,
            nonce: 0,
            lifetime_ms,
        }
    }

    pub fn with_nonce(mut self, nonce: u32) -> Self {
        self.nonce = nonce;
        self
    }

    pub fn can_be_prefix(mut self, v: bool) -> Self {
        self.can_be_prefix = v;
        self
    }

    pub fn must_be_fresh(mut self, v: bool) -> Self {
        self.must_be_fresh = v;
        self
    }

    pub fn to_wire(&self) -> Bytes {
        let mut body = BytesMut::new();
        self.name.to_tlv().encode(&mut body);
        if self.can_be_prefix {
            TlvElement::new(tlv::TLV_CAN_BE_PREFIX, Bytes::new()).encode(&mut body);
        }
        if self.must_be_fresh {
            TlvElement::new(tlv::TLV_MUST_BE_FRESH, Bytes::new()).encode(&mut body);
        }
        tlv::encode_nonneg_integer(tlv::TLV_NONCE, self.nonce as u64).encode(&mut body);
        tlv::encode_nonneg_integer(tlv::TLV_INTEREST_LIFETIME, self.lifetime_ms).encode(&mut body);

        let mut out = BytesMut::new();
        TlvElement::new(tlv::TLV_INTEREST, body.freeze()).encode(&mut out);
        out.freeze()
    }

    pub fn from_wire(bytes: &[u8]) -> Result<Self, Error> {
        let mut buf = Bytes::copy_from_slice(bytes);
        let top = TlvElement::decode(&mut buf)?;
        if top.tlv_type != tlv::TLV_INTEREST {
            return Err(Error::Protocol(format!(
                "expected Interest TLV type {}, got {}",
                tlv::TLV_INTEREST,
                top.tlv_type
            )));
        }

        let mut body = top.value;
        let name_el = TlvElement::decode(&mut body)?;
        let name = Name::from_tlv(&name_el)?;

        let mut can_be_prefix = false;
        let mut must_be_fresh = false;
        let mut nonce = 0u32;
        let mut lifetime_ms = 4000u64;

        while body.has_remaining() {
            let el = TlvElement::decode(&mut body)?;
            match el.tlv_type {
                t if t == tlv::TLV_CAN_BE_PREFIX => can_be_prefix = true,
                t if t == tlv::TLV_MUST_BE_FRESH => must_be_fresh = true,
                t if t == tlv::TLV_NONCE => nonce = el.as_nonneg_integer()? as u32,
                t if t == tlv::TLV_INTEREST_LIFETIME => lifetime_ms = el.as_nonneg_integer()?,
                _ => {}
            }
        }

        Ok(Self {
            name,
            can_be_prefix,
            must_be_fresh,
            nonce,
            lifetime_ms,
        })
    }
}

/// A Data packet's MetaInfo.
#[derive(Debug, Clone, PartialEq)]
pub struct MetaInfo {
    pub content_type: ContentType,
    pub freshness_period_ms: u64,
    pub final_block_id: Option<u64>,
}

impl Default for MetaInfo {
    fn default() -> Self {
        Self {
            content_type: ContentType::Blob,
            freshness_period_ms: 0,
            final_block_id: None,
        }
    }
}

/// A Data packet. `signature` is the raw SignatureValue bytes (empty when
/// signing is disabled, 32 bytes of SHA-256 digest otherwise).
#[derive(Debug, Clone, PartialEq)]
pub struct Data {
    pub name: Name,
    pub meta: MetaInfo,
    pub content: Bytes,
    pub signature_type: u64,
    pub signature: Bytes,
}

/// SignatureInfo SignatureType values used by the producer.
pub const SIGNATURE_TYPE_DIGEST_SHA256: u64 = 0;
pub const SIGNATURE_TYPE_NONE: u64 = 200;

impl Data {
    pub fn new(name: Name, content: Bytes) -> Self {
        Self {
            name,
            meta: MetaInfo::default(),
            content,
            signature_type: SIGNATURE_TYPE_NONE,
            signature: Bytes::new(),
        }
    }

    pub fn to_wire(&self) -> Bytes {
        let mut body = BytesMut::new();
        self.name.to_tlv().encode(&mut body);

        let mut meta_body = BytesMut::new();
        tlv::encode_nonneg_integer(tlv::TLV_CONTENT_TYPE, self.meta.content_type.to_code())
            .encode(&mut meta_body);
        tlv::encode_nonneg_integer(tlv::TLV_FRESHNESS_PERIOD, self.meta.freshness_period_ms)
            .encode(&mut meta_body);
        if let Some(final_block) = self.meta.final_block_id {
            tlv::encode_final_block_id(tlv::TLV_FINAL_BLOCK_ID, final_block).encode(&mut meta_body);
        }
        TlvElement::new(tlv::TLV_META_INFO, meta_body.freeze()).encode(&mut body);

        TlvElement::new(tlv::TLV_CONTENT, self.content.clone()).encode(&mut body);

        let mut sig_info_body = BytesMut::new();
        tlv::encode_nonneg_integer(tlv::TLV_SIGNATURE_TYPE, self.signature_type)
            .encode(&mut sig_info_body);
        TlvElement::new(tlv::TLV_SIGNATURE_INFO, sig_info_body.freeze()).encode(&mut body);
        TlvElement::new(tlv::TLV_SIGNATURE_VALUE, self.signature.clone()).encode(&mut body);

        let mut out = BytesMut::new();
        TlvElement::new(tlv::TLV_DATA, body.freeze()).encode(&mut out);
        out.freeze()
    }

    pub fn from_wire(bytes: &[u8]) -> Result<Self, Error> {
        let mut buf = Bytes::copy_from_slice(bytes);
        let top = TlvElement::decode(&mut buf)?;
        if top.tlv_type != tlv::TLV_DATA {
            return Err(Error::Protocol(format!(
                "expected Data TLV type {}, got {}",
                tlv::TLV_DATA,
                top.tlv_type
            )));
        }

        let mut body = top.value;
        let name_el = TlvElement::decode(&mut body)?;
        let name = Name::from_tlv(&name_el)?;

        let mut meta = MetaInfo::default();
        let mut content = Bytes::new();
        let mut signature_type = SIGNATURE_TYPE_NONE;
        let mut signature = Bytes::new();

        while body.has_remaining() {
            let el = TlvElement::decode(&mut body)?;
            match el.tlv_type {
                t if t == tlv::TLV_META_INFO => meta = decode_meta_info(&el)?,
                t if t == tlv::TLV_CONTENT => content = el.value,
                t if t == tlv::TLV_SIGNATURE_INFO => {
                    let mut inner = el.value;
                    while inner.has_remaining() {
                        let inner_el = TlvElement::decode(&mut inner)?;
                        if inner_el.tlv_type == tlv::TLV_SIGNATURE_TYPE {
                            signature_type = inner_el.as_nonneg_integer()?;
                        }
                    }
                }
                t if t == tlv::TLV_SIGNATURE_VALUE => signature = el.value,
                _ => {}
            }
        }

        Ok(Self {
            name,
            meta,
            content,
            signature_type,
            signature,
        })
    }
}

fn decode_meta_info(el: &TlvElement) -> Result<MetaInfo, Error> {
    let mut meta = MetaInfo::default();
    let mut buf = el.value.clone();
    while buf.has_remaining() {
        let inner = TlvElement::decode(&mut buf)?;
        match inner.tlv_type {
            t if t == tlv::TLV_CONTENT_TYPE => {
                meta.content_type = ContentType::from_code(inner.as_nonneg_integer()?)
            }
            t if t == tlv::TLV_FRESHNESS_PERIOD => {
                meta.freshness_period_ms = inner.as_nonneg_integer()?
            }
            t if t == tlv::TLV_FINAL_BLOCK_ID => {
                meta.final_block_id = Some(tlv::decode_final_block_id(&inner)?);
            }
            _ => {}
        }
    }
    Ok(meta)
}

/// Nack reason carried in an LpPacket, mirroring the forwarding-plane reason
/// codes rather than an application-level Data Nack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NackReason {
    None,
    Congestion,
    Duplicate,
    NoRoute,
    Other(u8),
}

impl NackReason {
    fn to_code(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Congestion => 50,
            Self::Duplicate => 100,
            Self::NoRoute => 150,
            Self::Other(n) => n,
        }
    }

    fn from_code(code: u8) -> Self {
        match code {
            0 => Self::None,
            50 => Self::Congestion,
            100 => Self::Duplicate,
            150 => Self::NoRoute,
            n => Self::Other(n),
        }
    }
}

/// The link-layer (Lp) envelope: a fragment payload plus out-of-band fields
/// (PIT token, congestion mark, Nack reason) that don't belong on the wire
/// format of the Interest/Data itself.
#[derive(Debug, Clone, PartialEq)]
pub struct LpPacket {
    pub pit_token: Option<[u8; 8]>,
    pub congestion_mark: bool,
    pub nack_reason: Option<NackReason>,
    pub fragment: Bytes,
}

impl LpPacket {
    pub fn for_fragment(fragment: Bytes) -> Self {
        Self {
            pit_token: None,
            congestion_mark: false,
            nack_reason: None,
            fragment,
        }
    }

    pub fn with_pit_token(mut self, token: [u8; 8]) -> Self {
        self.pit_token = Some(token);
        self
    }

    pub fn with_congestion_mark(mut self, marked: bool) -> Self {
        self.congestion_mark = marked;
        self
    }

    pub fn with_nack_reason(mut self, reason: NackReason) -> Self {
        self.nack_reason = Some(reason);
        self
    }

    pub fn to_wire(&self) -> Bytes {
        let mut body = BytesMut::new();
        if let Some(token) = self.pit_token {
            TlvElement::new(tlv::TLV_LP_PIT_TOKEN, Bytes::copy_from_slice(&token)).encode(&mut body);
        }
        if let Some(reason) = self.nack_reason {
            let mut nack_body = BytesMut::new();
            tlv::encode_nonneg_integer(tlv::TLV_LP_NACK_REASON, reason.to_code() as u64)
                .encode(&mut nack_body);
            TlvElement::new(tlv::TLV_LP_NACK, nack_body.freeze()).encode(&mut body);
        }
        if self.congestion_mark {
            TlvElement::new(tlv::TLV_LP_CONGESTION_MARK, Bytes::from_static(&[1])).encode(&mut body);
        }
        TlvElement::new(tlv::TLV_LP_FRAGMENT, self.fragment.clone()).encode(&mut body);

        let mut out = BytesMut::new();
        TlvElement::new(tlv::TLV_LP_PACKET, body.freeze()).encode(&mut out);
        out.freeze()
    }

    pub fn from_wire(bytes: &[u8]) -> Result<Self, Error> {
        let mut buf = Bytes::copy_from_slice(bytes);
        let top = TlvElement::decode(&mut buf)?;
        if top.tlv_type != tlv::TLV_LP_PACKET {
            return Err(Error::Protocol(format!(
                "expected LpPacket TLV type {}, got {}",
                tlv::TLV_LP_PACKET,
                top.tlv_type
            )));
        }

        let mut body = top.value;
        let mut pit_token = None;
        let mut congestion_mark = false;
        let mut nack_reason = None;
        let mut fragment = Bytes::new();

        while body.has_remaining() {
            let el = TlvElement::decode(&mut body)?;
            match el.tlv_type {
                t if t == tlv::TLV_LP_PIT_TOKEN => {
                    if el.value.len() != 8 {
                        return Err(Error::Protocol("PIT token must be 8 bytes".into()));
                    }
                    let mut token = [0u8; 8];
                    token.copy_from_slice(&el.value);
                    pit_token = Some(token);
                }
                t if t == tlv::TLV_LP_NACK => {
                    let mut inner = el.value;
                    let mut reason = NackReason::None;
                    while inner.has_remaining() {
                        let inner_el = TlvElement::decode(&mut inner)?;
                        if inner_el.tlv_type == tlv::TLV_LP_NACK_REASON {
                            reason = NackReason::from_code(inner_el.as_nonneg_integer()? as u8);
                        }
                    }
                    nack_reason = Some(reason);
                }
                t if t == tlv::TLV_LP_CONGESTION_MARK => congestion_mark = true,
                t if t == tlv::TLV_LP_FRAGMENT => fragment = el.value,
                _ => {}
            }
        }

        Ok(Self {
            pit_token,
            congestion_mark,
            nack_reason,
            fragment,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::name::Name;

    #[test]
    fn interest_roundtrip() {
        let interest = Interest::new(Name::from_path("/ndn/ft/dataset.bin"), 4000)
            .can_be_prefix(true)
            .must_be_fresh(true)
            .with_nonce(0xdeadbeef);
        let wire = interest.to_wire();
        let decoded = Interest::from_wire(&wire).unwrap();
        assert_eq!(decoded, interest);
    }

    #[test]
    fn data_roundtrip_with_final_block() {
        let mut data = Data::new(Name::from_path("/ndn/ft/dataset.bin"), Bytes::from_static(b"payload"));
        data.meta.final_block_id = Some(41);
        data.meta.freshness_period_ms = 2;
        data.signature_type = SIGNATURE_TYPE_DIGEST_SHA256;
        data.signature = Bytes::from(vec![0u8; 32]);

        let wire = data.to_wire();
        let decoded = Data::from_wire(&wire).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn data_nack_content_type() {
        let mut data = Data::new(Name::from_path("/ndn/ft/missing.bin"), Bytes::new());
        data.meta.content_type = ContentType::Nack;
        let wire = data.to_wire();
        let decoded = Data::from_wire(&wire).unwrap();
        assert_eq!(decoded.meta.content_type, ContentType::Nack);
    }

    #[test]
    fn lp_packet_roundtrip_with_nack() {
        let lp = LpPacket::for_fragment(Bytes::from_static(b"frag"))
            .with_pit_token([1, 2, 3, 4, 5, 6, 7, 8])
            .with_congestion_mark(true)
            .with_nack_reason(NackReason::Duplicate);
        let wire = lp.to_wire();
        let decoded = LpPacket::from_wire(&wire).unwrap();
        assert_eq!(decoded, lp);
    }
}
