//! File metadata: the Content payload of an RDR metadata-discovery response.
//!
//! Mirrors NDNc's `FileMetadata` TLV schema: a versioned name, the segment
//! size and final block used to fetch content, and a `statx`-style set of
//! timestamps plus the POSIX mode bits. `Mode` and `Mtime` are always
//! present; the others are optional and only encoded when the caller
//! actually has them.

use crate::error::Error;
use crate::name::Name;
use crate::tlv::{self, TlvElement};
use bytes::{Buf, Bytes, BytesMut};

pub const TLV_SEGMENT_SIZE: u64 = 0xF500;
pub const TLV_SIZE: u64 = 0xF502;
pub const TLV_MODE: u64 = 0xF504;
pub const TLV_ATIME: u64 = 0xF506;
pub const TLV_BTIME: u64 = 0xF508;
pub const TLV_CTIME: u64 = 0xF50A;
pub const TLV_MTIME: u64 = 0xF50C;

/// A `statx`-derived nanoseconds-since-epoch timestamp.
pub type Timestamp = u64;

/// Metadata describing a file, as served from the RDR `32=metadata` response
/// and consumed by the client before fetching segments.
#[derive(Debug, Clone, PartialEq)]
pub struct FileMetadata {
    pub versioned_name: Name,
    pub segment_size: u64,
    pub size: u64,
    pub mode: u32,
    pub atime: Option<Timestamp>,
    pub btime: Option<Timestamp>,
    pub ctime: Option<Timestamp>,
    pub mtime: Timestamp,
    pub final_block_id: u64,
}

impl FileMetadata {
    /// Builds metadata for a regular file of `size` bytes, deriving
    /// `final_block_id` as `ceil(size / segment_size)` (zero-size files
    /// still have exactly one, empty, segment).
    pub fn new(versioned_name: Name, segment_size: u64, size: u64, mode: u32, mtime: Timestamp) -> Self {
        let final_block_id = if segment_size == 0 {
            0
        } else {
            size.div_ceil(segment_size)
        };
        Self {
            versioned_name,
            segment_size,
            size,
            mode,
            atime: None,
            btime: None,
            ctime: None,
            mtime,
            final_block_id,
        }
    }

    pub fn is_dir(&self) -> bool {
        // POSIX S_IFDIR
        self.mode & 0o170000 == 0o040000
    }

    pub fn encode(&self) -> Bytes {
        let mut body = BytesMut::new();
        self.versioned_name.to_tlv().encode(&mut body);

        tlv::encode_final_block_id(tlv::TLV_FINAL_BLOCK_ID, self.final_block_id).encode(&mut body);
        tlv::encode_nonneg_integer(TLV_SEGMENT_SIZE, self.segment_size).encode(&mut body);
        tlv::encode_nonneg_integer(TLV_SIZE, self.size).encode(&mut body);
        tlv::encode_nonneg_integer(TLV_MODE, self.mode as u64).encode(&mut body);
        if let Some(atime) = self.atime {
            tlv::encode_nonneg_integer(TLV_ATIME, atime).encode(&mut body);
        }
        if let Some(btime) = self.btime {
            tlv::encode_nonneg_integer(TLV_BTIME, btime).encode(&mut body);
        }
        if let Some(ctime) = self.ctime {
            tlv::encode_nonneg_integer(TLV_CTIME, ctime).encode(&mut body);
        }
        tlv::encode_nonneg_integer(TLV_MTIME, self.mtime).encode(&mut body);

        body.freeze()
    }

    /// Decodes metadata from the bytes of a Data Content field. `Mode` and
    /// `Mtime` are required; their absence is a protocol error. The optional
    /// timestamps default to 0 when absent, matching NDNc's decode path.
    pub fn decode(bytes: &Bytes) -> Result<Self, Error> {
        let mut buf = bytes.clone();

        let name_el = TlvElement::decode(&mut buf)?;
        let versioned_name = Name::from_tlv(&name_el)?;

        let mut final_block_id = None;
        let mut segment_size = None;
        let mut size = None;
        let mut mode = None;
        let mut atime = None;
        let mut btime = None;
        let mut ctime = None;
        let mut mtime = None;

        while buf.has_remaining() {
            let el = TlvElement::decode(&mut buf)?;
            match el.tlv_type {
                t if t == tlv::TLV_FINAL_BLOCK_ID => {
                    final_block_id = Some(tlv::decode_final_block_id(&el)?)
                }
                t if t == TLV_SEGMENT_SIZE => segment_size = Some(el.as_nonneg_integer()?),
                t if t == TLV_SIZE => size = Some(el.as_nonneg_integer()?),
                t if t == TLV_MODE => mode = Some(el.as_nonneg_integer()? as u32),
                t if t == TLV_ATIME => atime = Some(el.as_nonneg_integer()?),
                t if t == TLV_BTIME => btime = Some(el.as_nonneg_integer()?),
                t if t == TLV_CTIME => ctime = Some(el.as_nonneg_integer()?),
                t if t == TLV_MTIME => mtime = Some(el.as_nonneg_integer()?),
                _ => {}
            }
        }

        let size = size.ok_or_else(|| Error::Protocol("file metadata missing Size".into()))?;
        let segment_size =
            segment_size.ok_or_else(|| Error::Protocol("file metadata missing SegmentSize".into()))?;
        let mode = mode.ok_or_else(|| Error::Protocol("file metadata missing Mode".into()))?;
        let mtime = mtime.ok_or_else(|| Error::Protocol("file metadata missing Mtime".into()))?;

        // A present FinalBlockId is authoritative (it may not agree with a
        // naive size/segment_size division, e.g. directory listings); only
        // derive the ceiling when the producer didn't send one.
        let final_block_id = final_block_id.unwrap_or_else(|| {
            if segment_size == 0 {
                0
            } else {
                size.div_ceil(segment_size)
            }
        });

        Ok(Self {
            versioned_name,
            segment_size,
            size,
            mode,
            atime,
            btime,
            ctime,
            mtime,
            final_block_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::name::NameComponent;

    fn name() -> Name {
        Name::from_path("/ndn/ft/dataset.bin").push(NameComponent::Version(1_700_000_000_000_000_000))
    }

    #[test]
    fn encode_decode_roundtrip_required_only() {
        let meta = FileMetadata::new(name(), 8000, 13_500, 0o100644, 1_700_000_000_000_000_000);
        let encoded = meta.encode();
        let decoded = FileMetadata::decode(&encoded).unwrap();
        assert_eq!(decoded, meta);
        assert_eq!(decoded.final_block_id, 2);
    }

    #[test]
    fn encode_decode_roundtrip_with_optional_fields() {
        let mut meta = FileMetadata::new(name(), 8000, 0, 0o100644, 42);
        meta.atime = Some(1);
        meta.btime = Some(2);
        meta.ctime = Some(3);
        let encoded = meta.encode();
        let decoded = FileMetadata::decode(&encoded).unwrap();
        assert_eq!(decoded, meta);
        assert_eq!(decoded.final_block_id, 0);
    }

    #[test]
    fn decode_prefers_explicit_final_block_id_over_recomputed_value() {
        // A directory listing's FinalBlockId has no relation to size/segment_size
        // (size here is the directory inode's st_size, not the listing length),
        // so an explicit FinalBlockId on the wire must win over the ceiling.
        let mut meta = FileMetadata::new(name(), 8000, 4096, 0o040755, 1);
        meta.final_block_id = 3;
        let decoded = FileMetadata::decode(&meta.encode()).unwrap();
        assert_eq!(decoded.final_block_id, 3);
    }

    #[test]
    fn decode_derives_final_block_id_when_absent() {
        // Hand-build a Content body with no FinalBlockId TLV at all.
        let mut body = BytesMut::new();
        name().to_tlv().encode(&mut body);
        tlv::encode_nonneg_integer(TLV_SEGMENT_SIZE, 8000).encode(&mut body);
        tlv::encode_nonneg_integer(TLV_SIZE, 13_500).encode(&mut body);
        tlv::encode_nonneg_integer(TLV_MODE, 0o100644).encode(&mut body);
        tlv::encode_nonneg_integer(TLV_MTIME, 1).encode(&mut body);
        let decoded = FileMetadata::decode(&body.freeze()).unwrap();
        assert_eq!(decoded.final_block_id, 2);
    }

    #[test]
    fn decode_missing_required_field_errors() {
        // Hand-build a Content body missing Size.
        let mut body = BytesMut::new();
        name().to_tlv().encode(&mut body);
        tlv::encode_nonneg_integer(TLV_SEGMENT_SIZE, 8000).encode(&mut body);
        tlv::encode_nonneg_integer(TLV_MODE, 0o100644).encode(&mut body);
        tlv::encode_nonneg_integer(TLV_MTIME, 1).encode(&mut body);
        assert!(FileMetadata::decode(&body.freeze()).is_err());
    }

    #[test]
    fn is_dir_detects_directory_mode() {
        let meta = FileMetadata::new(name(), 8000, 0, 0o040755, 1);
        assert!(meta.is_dir());
        let meta = FileMetadata::new(name(), 8000, 0, 0o100644, 1);
        assert!(!meta.is_dir());
    }
}
