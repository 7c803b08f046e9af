//! The Face reactor: turns a [`Transport`] of raw frames into decoded
//! Interest/Data/Nack events, and fragments outgoing packets that exceed the
//! face's MTU.
//!
//! Unlike the QUIC-stream face this crate's ancestor used, an abstract
//! [`Transport`] only guarantees ordered, whole-frame delivery — it has no
//! stream framing to lean on for reassembly. So a multi-fragment message is
//! marked with a one-byte flag plus a 2-byte sequence and 2-byte total
//! prepended to each fragment's payload; unfragmented messages (the common
//! case) pay only the one flag byte.

use crate::control::ControlClient;
use crate::fragmentation::{calculate_fragment_count, fragment_packet};
use crate::transport::Transport;
use bytes::{Buf, Bytes, BytesMut};
use crossbeam_channel::{Receiver, Sender};
use log::{debug, trace, warn};
use rust_udcn_common::error::Error;
use rust_udcn_common::packet::{Data, Interest, LpPacket, NackReason};
use rust_udcn_common::tlv::{TLV_DATA, TLV_INTEREST};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

const UNFRAGMENTED: u8 = 0;
const FRAGMENTED: u8 = 1;

/// A decoded, reassembled inbound packet, still tagged with the PIT token
/// and congestion/Nack side-channel fields the link layer carried for it.
#[derive(Debug, Clone)]
pub enum FaceEvent {
    Interest {
        interest: Interest,
        pit_token: Option<[u8; 8]>,
    },
    Data {
        data: Data,
        pit_token: Option<[u8; 8]>,
        congestion_mark: bool,
    },
    Nack {
        reason: NackReason,
        pit_token: Option<[u8; 8]>,
    },
    Disconnected,
}

/// Key identifying a fragmented message's fragments while they're still
/// being collected: the PIT token if present, else a round-robin counter
/// local to the sender (good enough since a face serializes its own sends).
type ReassemblyKey = [u8; 8];

struct PartialMessage {
    total: u16,
    chunks: HashMap<u16, Bytes>,
}

/// A Face reactor over a concrete [`Transport`]. Spawns one background
/// thread that polls the transport and publishes decoded events; all
/// `send_*` methods may be called concurrently from other threads.
pub struct Face<T: Transport> {
    transport: Arc<T>,
    mtu: usize,
    events_tx: Sender<FaceEvent>,
    events_rx: Receiver<FaceEvent>,
    shutdown: Arc<AtomicBool>,
    reactor: Option<JoinHandle<()>>,
}

impl<T: Transport + 'static> Face<T> {
    pub fn new(transport: T, mtu: usize) -> Self {
        let transport = Arc::new(transport);
        let (events_tx, events_rx) = crossbeam_channel::bounded(4096);
        let shutdown = Arc::new(AtomicBool::new(false));

        let reactor = {
            let transport = Arc::clone(&transport);
            let events_tx = events_tx.clone();
            let shutdown = Arc::clone(&shutdown);
            std::thread::Builder::new()
                .name("udcn-face-reactor".into())
                .spawn(move || reactor_loop(transport, events_tx, shutdown))
                .expect("failed to spawn face reactor thread")
        };

        Self {
            transport,
            mtu,
            events_tx,
            events_rx,
            shutdown,
            reactor: Some(reactor),
        }
    }

    /// The channel on which decoded inbound events arrive. Callers poll this
    /// from their own worker thread (the pipeline's single worker, or a
    /// producer dispatch thread).
    pub fn events(&self) -> &Receiver<FaceEvent> {
        &self.events_rx
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    /// Announces `prefix` to the forwarder: creates this face (with `id` and
    /// `dataroom`) and installs `prefix` with it as the next hop (spec
    /// §4.4). Called once at startup, before any Interests are expected.
    pub fn advertise(&self, control: &mut ControlClient, id: i64, dataroom: i64, prefix: &str) -> Result<(), Error> {
        control.create_face(id, dataroom)?;
        control.insert_fib_entry(prefix)?;
        Ok(())
    }

    pub fn send_interest(&self, interest: &Interest, pit_token: [u8; 8]) -> Result<(), Error> {
        self.send_wire(interest.to_wire(), Some(pit_token), false, None)
    }

    pub fn send_interest_batch(
        &self,
        interests: &[(Interest, [u8; 8])],
    ) -> Result<usize, Error> {
        let mut sent = 0;
        for (interest, token) in interests {
            self.send_interest(interest, *token)?;
            sent += 1;
        }
        Ok(sent)
    }

    pub fn send_data(
        &self,
        data: &Data,
        pit_token: Option<[u8; 8]>,
        congestion_mark: bool,
    ) -> Result<(), Error> {
        self.send_wire(data.to_wire(), pit_token, congestion_mark, None)
    }

    pub fn send_nack(&self, reason: NackReason, pit_token: [u8; 8]) -> Result<(), Error> {
        self.send_wire(Bytes::new(), Some(pit_token), false, Some(reason))
    }

    fn send_wire(
        &self,
        payload: Bytes,
        pit_token: Option<[u8; 8]>,
        congestion_mark: bool,
        nack_reason: Option<NackReason>,
    ) -> Result<(), Error> {
        if payload.len() <= self.mtu {
            let mut lp = LpPacket::for_fragment(prefix_unfragmented(&payload));
            if let Some(token) = pit_token {
                lp = lp.with_pit_token(token);
            }
            if congestion_mark {
                lp = lp.with_congestion_mark(true);
            }
            if let Some(reason) = nack_reason {
                lp = lp.with_nack_reason(reason);
            }
            return self.transport.send(lp.to_wire());
        }

        let fragment_size = self.mtu.saturating_sub(5).max(1);
        let total = calculate_fragment_count(payload.len(), fragment_size);
        if total > u16::MAX as usize {
            return Err(Error::Protocol("packet too large to fragment".into()));
        }

        for (seq, chunk) in fragment_packet(&payload, fragment_size).into_iter().enumerate() {
            let mut lp = LpPacket::for_fragment(prefix_fragment(seq as u16, total as u16, &chunk));
            if let Some(token) = pit_token {
                lp = lp.with_pit_token(token);
            }
            if congestion_mark {
                lp = lp.with_congestion_mark(true);
            }
            if let Some(reason) = nack_reason {
                lp = lp.with_nack_reason(reason);
            }
            self.transport.send(lp.to_wire())?;
        }
        Ok(())
    }
}

impl<T: Transport> Drop for Face<T> {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(handle) = self.reactor.take() {
            let _ = handle.join();
        }
    }
}

fn prefix_unfragmented(payload: &Bytes) -> Bytes {
    let mut buf = BytesMut::with_capacity(1 + payload.len());
    buf.extend_from_slice(&[UNFRAGMENTED]);
    buf.extend_from_slice(payload);
    buf.freeze()
}

fn prefix_fragment(seq: u16, total: u16, chunk: &Bytes) -> Bytes {
    let mut buf = BytesMut::with_capacity(5 + chunk.len());
    buf.extend_from_slice(&[FRAGMENTED]);
    buf.extend_from_slice(&seq.to_be_bytes());
    buf.extend_from_slice(&total.to_be_bytes());
    buf.extend_from_slice(chunk);
    buf.freeze()
}

fn reactor_loop<T: Transport>(transport: Arc<T>, events_tx: Sender<FaceEvent>, shutdown: Arc<AtomicBool>) {
    let mut pending: HashMap<ReassemblyKey, PartialMessage> = HashMap::new();
    let mut anonymous_key_counter: u64 = 0;

    while !shutdown.load(Ordering::Relaxed) {
        match transport.try_recv() {
            Ok(Some(frame)) => {
                if let Err(e) = handle_frame(
                    &frame,
                    &events_tx,
                    &mut pending,
                    &mut anonymous_key_counter,
                ) {
                    warn!("dropping malformed inbound frame: {e}");
                }
            }
            Ok(None) => std::thread::sleep(Duration::from_micros(200)),
            Err(e) => {
                debug!("transport error in face reactor, shutting down: {e}");
                let _ = events_tx.send(FaceEvent::Disconnected);
                return;
            }
        }
    }
}

fn handle_frame(
    frame: &Bytes,
    events_tx: &Sender<FaceEvent>,
    pending: &mut HashMap<ReassemblyKey, PartialMessage>,
    anonymous_key_counter: &mut u64,
) -> Result<(), Error> {
    let lp = LpPacket::from_wire(frame)?;

    if let Some(reason) = lp.nack_reason {
        let _ = events_tx.send(FaceEvent::Nack {
            reason,
            pit_token: lp.pit_token,
        });
        return Ok(());
    }

    let mut fragment = lp.fragment.clone();
    if fragment.is_empty() {
        return Err(Error::Protocol("empty Lp fragment".into()));
    }
    let flag = fragment.get_u8();

    let payload = match flag {
        UNFRAGMENTED => fragment,
        FRAGMENTED => {
            if fragment.remaining() < 4 {
                return Err(Error::Protocol("truncated fragment header".into()));
            }
            let seq = fragment.get_u16();
            let total = fragment.get_u16();
            let key = lp.pit_token.unwrap_or_else(|| {
                *anonymous_key_counter += 1;
                let mut k = [0u8; 8];
                k[..8].copy_from_slice(&anonymous_key_counter.to_be_bytes());
                k
            });

            let entry = pending.entry(key).or_insert_with(|| PartialMessage {
                total,
                chunks: HashMap::new(),
            });
            entry.chunks.insert(seq, fragment);

            if entry.chunks.len() < entry.total as usize {
                trace!(
                    "buffered fragment {}/{} for reassembly key {:?}",
                    entry.chunks.len(),
                    entry.total,
                    key
                );
                return Ok(());
            }

            let message = pending.remove(&key).expect("just inserted");
            let mut ordered = std::collections::VecDeque::with_capacity(message.total as usize);
            for seq in 0..message.total {
                ordered.push_back(
                    message
                        .chunks
                        .get(&seq)
                        .cloned()
                        .ok_or_else(|| Error::Protocol("missing fragment in reassembly".into()))?,
                );
            }
            crate::fragmentation::assemble_fragments(ordered)?
        }
        other => return Err(Error::Protocol(format!("unknown fragment flag {other}"))),
    };

    if payload.is_empty() {
        return Err(Error::Protocol("empty reassembled payload".into()));
    }

    match payload[0] as u64 {
        TLV_INTEREST => {
            let interest = Interest::from_wire(&payload)?;
            let _ = events_tx.send(FaceEvent::Interest {
                interest,
                pit_token: lp.pit_token,
            });
        }
        TLV_DATA => {
            let data = Data::from_wire(&payload)?;
            let _ = events_tx.send(FaceEvent::Data {
                data,
                pit_token: lp.pit_token,
                congestion_mark: lp.congestion_mark,
            });
        }
        other => return Err(Error::Protocol(format!("unknown top-level TLV type {other}"))),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::in_process_pair;
    use rust_udcn_common::name::Name;

    #[test]
    fn send_and_receive_small_interest() {
        let (a, b) = in_process_pair(16);
        let face_a = Face::new(a, 1200);
        let face_b = Face::new(b, 1200);

        let interest = Interest::new(Name::from_path("/ndn/ft/dataset.bin"), 4000).with_nonce(1);
        face_a.send_interest(&interest, [1; 8]).unwrap();

        let event = face_b.events().recv_timeout(Duration::from_secs(1)).unwrap();
        match event {
            FaceEvent::Interest { interest: got, pit_token } => {
                assert_eq!(got, interest);
                assert_eq!(pit_token, Some([1; 8]));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn send_and_receive_fragmented_data() {
        let (a, b) = in_process_pair(64);
        let face_a = Face::new(a, 64);
        let face_b = Face::new(b, 64);

        let data = Data::new(
            Name::from_path("/ndn/ft/dataset.bin"),
            Bytes::from(vec![9u8; 2000]),
        );
        face_a.send_data(&data, Some([2; 8]), false).unwrap();

        let event = face_b.events().recv_timeout(Duration::from_secs(2)).unwrap();
        match event {
            FaceEvent::Data { data: got, pit_token, .. } => {
                assert_eq!(got, data);
                assert_eq!(pit_token, Some([2; 8]));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn nack_is_delivered_without_payload() {
        let (a, b) = in_process_pair(16);
        let face_a = Face::new(a, 1200);
        let face_b = Face::new(b, 1200);

        face_a.send_nack(NackReason::Duplicate, [3; 8]).unwrap();
        let event = face_b.events().recv_timeout(Duration::from_secs(1)).unwrap();
        match event {
            FaceEvent::Nack { reason, pit_token } => {
                assert_eq!(reason, NackReason::Duplicate);
                assert_eq!(pit_token, Some([3; 8]));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
