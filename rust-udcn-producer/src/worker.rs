//! The worker pool (spec §4.3, §5): a single shared Interest work queue
//! drained by `N` threads, each independently classifying, reading and
//! signing a response before handing it back to the Face. Grounded on
//! `xrdndndpdk-producer.c`'s multi-core dispatch loop, adapted to a
//! `crossbeam-channel` work queue instead of a per-lcore DPDK RX ring.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use log::{debug, trace, warn};
use rust_udcn_common::metrics::ProducerMetrics;
use rust_udcn_common::name::Name;
use rust_udcn_face::{Face, FaceEvent, Transport};

use crate::cache::FileHandleCache;
use crate::config::ProducerOptions;
use crate::dispatch::{build_response, is_nack};
use crate::sign::SigningMode;

struct WorkItem {
    name: Name,
    pit_token: Option<[u8; 8]>,
}

/// Owns the file-handle cache, the worker threads, and the listener thread
/// that drains inbound Interests off a [`Face`] and fans them out to the
/// work queue. Dropping it stops every thread and joins them.
pub struct ProducerDispatcher {
    closed: Arc<AtomicBool>,
    metrics: Arc<ProducerMetrics>,
    listener: Option<JoinHandle<()>>,
    workers: Vec<JoinHandle<()>>,
    // Keeps the cache's own evictor thread alive for the dispatcher's
    // lifetime; never read directly.
    _cache: Arc<FileHandleCache>,
}

impl ProducerDispatcher {
    pub fn new<T: Transport + 'static>(face: Arc<Face<T>>, options: ProducerOptions) -> Self {
        let options = options.normalized();
        let metrics = Arc::new(ProducerMetrics::new());
        let cache = Arc::new(FileHandleCache::new(
            options.gc_period,
            options.gc_lifetime,
            Arc::clone(&metrics),
        ));
        let signing = SigningMode::from_disable_flag(options.disable_signing);
        let closed = Arc::new(AtomicBool::new(false));

        let (work_tx, work_rx) = crossbeam_channel::unbounded::<WorkItem>();

        let listener = {
            let face = Arc::clone(&face);
            let closed = Arc::clone(&closed);
            let metrics = Arc::clone(&metrics);
            let work_tx = work_tx.clone();
            std::thread::Builder::new()
                .name("udcn-producer-listener".into())
                .spawn(move || listener_loop(face, work_tx, closed, metrics))
                .expect("failed to spawn producer listener thread")
        };

        let nthreads = options.nthreads.max(1) as usize;
        let mut workers = Vec::with_capacity(nthreads);
        for idx in 0..nthreads {
            let face = Arc::clone(&face);
            let cache = Arc::clone(&cache);
            let options = options.clone();
            let closed = Arc::clone(&closed);
            let metrics = Arc::clone(&metrics);
            let work_rx = work_rx.clone();
            let handle = std::thread::Builder::new()
                .name(format!("udcn-producer-worker-{idx}"))
                .spawn(move || worker_loop(face, cache, options, signing, work_rx, closed, metrics))
                .expect("failed to spawn producer worker thread");
            workers.push(handle);
        }

        Self {
            closed,
            metrics,
            listener: Some(listener),
            workers,
            _cache: cache,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Relaxed)
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn metrics(&self) -> Arc<ProducerMetrics> {
        Arc::clone(&self.metrics)
    }
}

impl Drop for ProducerDispatcher {
    fn drop(&mut self) {
        self.close();
        if let Some(handle) = self.listener.take() {
            let _ = handle.join();
        }
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

/// Drains Interest events off the Face and republishes them on the shared
/// work queue; any other event is either irrelevant to the producer side or
/// (Disconnected) a signal to close.
fn listener_loop<T: Transport + 'static>(
    face: Arc<Face<T>>,
    work_tx: Sender<WorkItem>,
    closed: Arc<AtomicBool>,
    metrics: Arc<ProducerMetrics>,
) {
    while !closed.load(Ordering::Relaxed) {
        match face.events().recv_timeout(Duration::from_millis(200)) {
            Ok(FaceEvent::Interest { interest, pit_token }) => {
                metrics.interests_received.increment();
                metrics.worker_queue_depth.increment();
                if work_tx
                    .send(WorkItem {
                        name: interest.name,
                        pit_token,
                    })
                    .is_err()
                {
                    break;
                }
            }
            Ok(FaceEvent::Disconnected) => {
                debug!("face disconnected, stopping producer dispatcher");
                closed.store(true, Ordering::SeqCst);
                break;
            }
            Ok(_) => {}
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                closed.store(true, Ordering::SeqCst);
                break;
            }
        }
    }
}

/// Each worker blocks on the shared work queue (spec §5: "the producer
/// workers block on the work queue"), builds and signs one response per
/// Interest, and sends it back through the (concurrency-safe) Face.
fn worker_loop<T: Transport + 'static>(
    face: Arc<Face<T>>,
    cache: Arc<FileHandleCache>,
    options: ProducerOptions,
    signing: SigningMode,
    work_rx: Receiver<WorkItem>,
    closed: Arc<AtomicBool>,
    metrics: Arc<ProducerMetrics>,
) {
    while !closed.load(Ordering::Relaxed) {
        let item = match work_rx.recv_timeout(Duration::from_millis(200)) {
            Ok(item) => item,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };
        metrics.worker_queue_depth.decrement();

        let is_metadata = rust_udcn_common::naming::is_rdr_discovery_name(&item.name);
        let mut data = build_response(&item.name, &options, &cache);
        signing.sign(&mut data);

        if is_nack(&data) {
            metrics.nacks_sent.increment();
        } else if is_metadata {
            metrics.metadata_responses.increment();
        } else {
            metrics.content_responses.increment();
        }
        metrics.bytes_sent.add(data.content.len() as u64);

        if let Err(e) = face.send_data(&data, item.pit_token, false) {
            warn!("failed to send Data response: {e}");
        } else {
            trace!("sent response for {}", item.name);
        }
    }
}
