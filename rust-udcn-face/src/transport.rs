//! The `Transport` trait: the one seam between a [`crate::face::Face`] and
//! whatever actually moves bytes between processes.
//!
//! The real transport for this stack is a shared-memory ring (memif) shared
//! with an NDN forwarder; that binding lives outside this crate's scope and
//! is the extension point this trait exists for. [`InProcessTransport`] is
//! the in-memory stand-in used by tests and by the consumer/producer
//! integration tests in `rust-udcn-pipeline` and `rust-udcn-producer`.

use bytes::Bytes;
use crossbeam_channel::{Receiver, Sender, TrySendError};
use rust_udcn_common::error::Error;

/// Sends and receives whole link-layer frames. Implementations must be
/// non-blocking: `try_recv` returns `Ok(None)` rather than parking when
/// nothing is available, since the Face reactor thread polls it in a loop
/// alongside PIT housekeeping.
pub trait Transport: Send + Sync {
    fn send(&self, frame: Bytes) -> Result<(), Error>;

    /// Sends as many of `frames` as the transport will currently accept,
    /// returning the count actually sent. A partial send is not an error;
    /// the caller re-queues what didn't go out.
    fn send_batch(&self, frames: &[Bytes]) -> Result<usize, Error> {
        let mut sent = 0;
        for frame in frames {
            match self.send(frame.clone()) {
                Ok(()) => sent += 1,
                Err(_) if sent > 0 => break,
                Err(e) => return Err(e),
            }
        }
        Ok(sent)
    }

    fn try_recv(&self) -> Result<Option<Bytes>, Error>;

    fn is_connected(&self) -> bool;
}

/// An in-process, channel-backed transport. Two instances created via
/// [`in_process_pair`] are cross-wired so frames sent on one are received on
/// the other, modeling a face's two directions without any real I/O.
pub struct InProcessTransport {
    outbound: Sender<Bytes>,
    inbound: Receiver<Bytes>,
}

/// Creates a connected pair of in-process transports: frames sent on `a`
/// arrive on `b` and vice versa.
pub fn in_process_pair(capacity: usize) -> (InProcessTransport, InProcessTransport) {
    let (tx_a, rx_a) = crossbeam_channel::bounded(capacity);
    let (tx_b, rx_b) = crossbeam_channel::bounded(capacity);
    (
        InProcessTransport {
            outbound: tx_a,
            inbound: rx_b,
        },
        InProcessTransport {
            outbound: tx_b,
            inbound: rx_a,
        },
    )
}

impl Transport for InProcessTransport {
    fn send(&self, frame: Bytes) -> Result<(), Error> {
        match self.outbound.try_send(frame) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(Error::Transport("in-process channel full".into())),
            Err(TrySendError::Disconnected(_)) => {
                Err(Error::Transport("in-process channel disconnected".into()))
            }
        }
    }

    fn try_recv(&self) -> Result<Option<Bytes>, Error> {
        match self.inbound.try_recv() {
            Ok(frame) => Ok(Some(frame)),
            Err(crossbeam_channel::TryRecvError::Empty) => Ok(None),
            Err(crossbeam_channel::TryRecvError::Disconnected) => {
                Err(Error::Transport("in-process channel disconnected".into()))
            }
        }
    }

    fn is_connected(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_is_cross_wired() {
        let (a, b) = in_process_pair(8);
        a.send(Bytes::from_static(b"hello")).unwrap();
        assert_eq!(b.try_recv().unwrap(), Some(Bytes::from_static(b"hello")));
        assert_eq!(a.try_recv().unwrap(), None);

        b.send(Bytes::from_static(b"world")).unwrap();
        assert_eq!(a.try_recv().unwrap(), Some(Bytes::from_static(b"world")));
    }
}
