//! Link-layer fragmentation and reassembly.
//!
//! A wire-encoded Interest or Data that exceeds the face's MTU is split into
//! multiple [`rust_udcn_common::packet::LpPacket`] fragments before being
//! handed to the transport, and reassembled on the other side before the
//! inner packet is decoded.

use bytes::{Bytes, BytesMut};
use log::trace;
use rust_udcn_common::error::Error;
use std::collections::VecDeque;

/// Splits `packet` into chunks of at most `fragment_size` bytes.
pub fn fragment_packet(packet: &[u8], fragment_size: usize) -> Vec<Bytes> {
    let mut fragments = Vec::new();
    let mut offset = 0;

    while offset < packet.len() {
        let end = std::cmp::min(offset + fragment_size, packet.len());
        fragments.push(Bytes::copy_from_slice(&packet[offset..end]));
        offset = end;
    }

    if fragments.is_empty() {
        fragments.push(Bytes::new());
    }

    trace!(
        "fragmented {} byte packet into {} fragments of up to {} bytes",
        packet.len(),
        fragments.len(),
        fragment_size
    );

    fragments
}

/// Reassembles fragments collected in arrival order into the original
/// packet. An empty `fragments` queue is a caller bug, not a valid empty
/// packet (the empty-packet case still yields one empty fragment from
/// `fragment_packet`).
pub fn assemble_fragments(fragments: VecDeque<Bytes>) -> Result<Bytes, Error> {
    if fragments.is_empty() {
        return Err(Error::Protocol("no fragments to assemble".into()));
    }

    let total_size: usize = fragments.iter().map(|f| f.len()).sum();
    let mut buffer = BytesMut::with_capacity(total_size);
    for fragment in fragments {
        buffer.extend_from_slice(&fragment);
    }

    trace!("assembled {} bytes from fragments", buffer.len());
    Ok(buffer.freeze())
}

pub fn needs_fragmentation(packet_size: usize, mtu: usize) -> bool {
    packet_size > mtu
}

pub fn calculate_fragment_count(packet_size: usize, fragment_size: usize) -> usize {
    packet_size.div_ceil(fragment_size).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fragmentation_and_reassembly_roundtrip() {
        let packet = vec![7u8; 10_000];
        let fragments = fragment_packet(&packet, 1000);
        assert_eq!(fragments.len(), 10);

        let reassembled = assemble_fragments(fragments.into()).unwrap();
        assert_eq!(reassembled, Bytes::from(packet));
    }

    #[test]
    fn needs_fragmentation_checks_mtu() {
        assert!(needs_fragmentation(1500, 1200));
        assert!(!needs_fragmentation(1000, 1200));
    }

    #[test]
    fn calculate_fragment_count_rounds_up() {
        assert_eq!(calculate_fragment_count(1000, 1000), 1);
        assert_eq!(calculate_fragment_count(1001, 1000), 2);
        assert_eq!(calculate_fragment_count(2500, 1000), 3);
    }

    #[test]
    fn empty_fragment_queue_errors() {
        assert!(assemble_fragments(VecDeque::new()).is_err());
    }
}
