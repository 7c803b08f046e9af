//! NDN names: an ordered sequence of typed, length-prefixed components.

use crate::error::Error;
use crate::tlv::{self, TlvElement};
use bytes::{Buf, Bytes, BytesMut};
use std::fmt;

/// TLV type 32 (`0x20`), the "keyword" component NDNc uses for the literal
/// `metadata` and `ls` discovery markers.
pub const TLV_KEYWORD_COMPONENT: u64 = 0x20;

/// Maximum size of an NDN packet (RFC 8609).
pub const MAX_NDN_PACKET_SIZE: usize = 8800;

/// A single name component. `Generic` carries caller bytes; `Version` and
/// `Segment` carry the two NonNegativeInteger component kinds the core
/// cares about; `Keyword` is the `32=...` marker component; `Other` is a
/// decode fallback for any component kind this crate doesn't interpret.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NameComponent {
    Generic(Bytes),
    Version(u64),
    Segment(u64),
    Keyword(Bytes),
    Other { tlv_type: u64, value: Bytes },
}

impl NameComponent {
    pub fn generic(bytes: impl Into<Bytes>) -> Self {
        Self::Generic(bytes.into())
    }

    pub fn keyword(s: &str) -> Self {
        Self::Keyword(Bytes::copy_from_slice(s.as_bytes()))
    }

    pub fn as_segment(&self) -> Option<u64> {
        match self {
            Self::Segment(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_version(&self) -> Option<u64> {
        match self {
            Self::Version(n) => Some(*n),
            _ => None,
        }
    }

    pub fn is_metadata_marker(&self) -> bool {
        matches!(self, Self::Keyword(b) if b.as_ref() == b"metadata")
    }

    pub fn is_ls_marker(&self) -> bool {
        matches!(self, Self::Keyword(b) if b.as_ref() == b"ls")
    }

    fn to_tlv(&self) -> TlvElement {
        match self {
            Self::Generic(b) => TlvElement::new(tlv::TLV_GENERIC_COMPONENT, b.clone()),
            Self::Version(n) => tlv::encode_nonneg_integer(tlv::TLV_VERSION_COMPONENT, *n),
            Self::Segment(n) => tlv::encode_nonneg_integer(tlv::TLV_SEGMENT_COMPONENT, *n),
            Self::Keyword(b) => TlvElement::new(TLV_KEYWORD_COMPONENT, b.clone()),
            Self::Other { tlv_type, value } => TlvElement::new(*tlv_type, value.clone()),
        }
    }

    fn from_tlv(el: TlvElement) -> Result<Self, Error> {
        Ok(match el.tlv_type {
            t if t == tlv::TLV_GENERIC_COMPONENT => Self::Generic(el.value),
            t if t == tlv::TLV_VERSION_COMPONENT => Self::Version(el.as_nonneg_integer()?),
            t if t == tlv::TLV_SEGMENT_COMPONENT => Self::Segment(el.as_nonneg_integer()?),
            t if t == TLV_KEYWORD_COMPONENT => Self::Keyword(el.value),
            tlv_type => Self::Other {
                tlv_type,
                value: el.value,
            },
        })
    }
}

impl fmt::Display for NameComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Generic(b) => write_component_bytes(f, b),
            Self::Version(n) => write!(f, "v={n}"),
            Self::Segment(n) => write!(f, "seg={n}"),
            Self::Keyword(b) => {
                write!(f, "32=")?;
                write_component_bytes(f, b)
            }
            Self::Other { tlv_type, value } => {
                write!(f, "{tlv_type}=")?;
                write_component_bytes(f, value)
            }
        }
    }
}

fn write_component_bytes(f: &mut fmt::Formatter<'_>, b: &Bytes) -> fmt::Result {
    if b.iter().all(|&c| c.is_ascii_graphic() || c == b' ') {
        write!(f, "{}", String::from_utf8_lossy(b))
    } else {
        for &c in b.iter() {
            write!(f, "{c:02x}")?;
        }
        Ok(())
    }
}

/// An ordered sequence of name components.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Name {
    components: Vec<NameComponent>,
}

impl Name {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a name from a `/`-separated path of plain generic components.
    /// Does not understand `32=...`/`seg=...` marker syntax; use `push` for
    /// anything but plain path segments.
    pub fn from_path(path: &str) -> Self {
        let components = path
            .split('/')
            .filter(|c| !c.is_empty())
            .map(|c| NameComponent::generic(c.as_bytes().to_vec()))
            .collect();
        Self { components }
    }

    pub fn push(mut self, component: NameComponent) -> Self {
        self.components.push(component);
        self
    }

    pub fn push_mut(&mut self, component: NameComponent) -> &mut Self {
        self.components.push(component);
        self
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn components(&self) -> &[NameComponent] {
        &self.components
    }

    pub fn get(&self, index: usize) -> Option<&NameComponent> {
        self.components.get(index)
    }

    /// The last component, if any.
    pub fn last(&self) -> Option<&NameComponent> {
        self.components.last()
    }

    /// The name without its last `n` components.
    pub fn prefix_drop_last(&self, n: usize) -> Self {
        let keep = self.components.len().saturating_sub(n);
        Self {
            components: self.components[..keep].to_vec(),
        }
    }

    /// The components from `start` onward, reassembled as a new name.
    pub fn sub_name(&self, start: usize) -> Self {
        Self {
            components: self.components.get(start..).unwrap_or(&[]).to_vec(),
        }
    }

    pub fn is_prefix_of(&self, other: &Self) -> bool {
        self.components.len() <= other.components.len()
            && self
                .components
                .iter()
                .zip(other.components.iter())
                .all(|(a, b)| a == b)
    }

    pub fn to_tlv(&self) -> TlvElement {
        let mut buf = BytesMut::new();
        for c in &self.components {
            c.to_tlv().encode(&mut buf);
        }
        TlvElement::new(tlv::TLV_NAME, buf.freeze())
    }

    pub fn from_tlv(el: &TlvElement) -> Result<Self, Error> {
        if el.tlv_type != tlv::TLV_NAME {
            return Err(Error::Protocol(format!(
                "expected Name TLV type {}, got {}",
                tlv::TLV_NAME,
                el.tlv_type
            )));
        }
        let mut components = Vec::new();
        let mut buf = el.value.clone();
        while buf.has_remaining() {
            let el = TlvElement::decode(&mut buf)?;
            components.push(NameComponent::from_tlv(el)?);
        }
        Ok(Self { components })
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.components.is_empty() {
            return write!(f, "/");
        }
        for c in &self.components {
            write!(f, "/{c}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_roundtrip() {
        let name = Name::from_path("/ndn/ft/dataset.bin");
        assert_eq!(name.len(), 3);
        assert_eq!(name.to_string(), "/ndn/ft/dataset.bin");
    }

    #[test]
    fn prefix_of() {
        let a = Name::from_path("/ndn/ft");
        let b = Name::from_path("/ndn/ft/dataset.bin");
        assert!(a.is_prefix_of(&b));
        assert!(!b.is_prefix_of(&a));
    }

    #[test]
    fn tlv_roundtrip_with_version_and_segment() {
        let name = Name::from_path("/ndn/ft/dataset.bin")
            .push(NameComponent::Version(2_000_000_000))
            .push(NameComponent::Segment(2));

        let tlv = name.to_tlv();
        let decoded = Name::from_tlv(&tlv).unwrap();
        assert_eq!(decoded, name);
        assert_eq!(decoded.last().unwrap().as_segment(), Some(2));
    }

    #[test]
    fn metadata_marker() {
        let name = Name::from_path("/ndn/ft/dataset.bin").push(NameComponent::keyword("metadata"));
        assert!(name.last().unwrap().is_metadata_marker());
        assert_eq!(name.to_string(), "/ndn/ft/dataset.bin/32=metadata");
    }
}
