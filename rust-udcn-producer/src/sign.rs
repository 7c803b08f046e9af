//! Data signing (spec §4.3): SHA-256 digest by default, or a fixed
//! zero-length signature for benchmarking when disabled at startup.
//! Mirrors `ft-server.cpp`'s `signatureInfo_.setSignatureType(...)` applied
//! once after every other field of the Data is set.

use bytes::Bytes;
use rust_udcn_common::packet::{Data, SIGNATURE_TYPE_DIGEST_SHA256, SIGNATURE_TYPE_NONE};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigningMode {
    Sha256Digest,
    Disabled,
}

impl SigningMode {
    pub fn from_disable_flag(disable_signing: bool) -> Self {
        if disable_signing {
            Self::Disabled
        } else {
            Self::Sha256Digest
        }
    }

    /// Signs `data` in place. Must run last: the digest is computed over the
    /// wire encoding with `signature_type` already set and `signature` still
    /// empty, so the signed region never includes the eventual SignatureValue.
    pub fn sign(self, data: &mut Data) {
        match self {
            Self::Sha256Digest => {
                data.signature_type = SIGNATURE_TYPE_DIGEST_SHA256;
                data.signature = Bytes::new();
                let digest = Sha256::digest(data.to_wire());
                data.signature = Bytes::copy_from_slice(&digest);
            }
            Self::Disabled => {
                data.signature_type = SIGNATURE_TYPE_NONE;
                data.signature = Bytes::new();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_udcn_common::name::Name;

    #[test]
    fn sha256_mode_produces_a_32_byte_digest() {
        let mut data = Data::new(Name::from_path("/ndn/ft/dataset.bin"), Bytes::from_static(b"hello"));
        SigningMode::Sha256Digest.sign(&mut data);
        assert_eq!(data.signature_type, SIGNATURE_TYPE_DIGEST_SHA256);
        assert_eq!(data.signature.len(), 32);
    }

    #[test]
    fn disabled_mode_produces_no_signature() {
        let mut data = Data::new(Name::from_path("/ndn/ft/dataset.bin"), Bytes::from_static(b"hello"));
        SigningMode::Disabled.sign(&mut data);
        assert_eq!(data.signature_type, SIGNATURE_TYPE_NONE);
        assert!(data.signature.is_empty());
    }

    #[test]
    fn same_content_different_names_sign_differently() {
        let mut a = Data::new(Name::from_path("/ndn/ft/a.bin"), Bytes::from_static(b"hello"));
        let mut b = Data::new(Name::from_path("/ndn/ft/b.bin"), Bytes::from_static(b"hello"));
        SigningMode::Sha256Digest.sign(&mut a);
        SigningMode::Sha256Digest.sign(&mut b);
        assert_ne!(a.signature, b.signature);
    }
}
