//! The pipeline core (spec §4.1): admission, the single-thread transmit
//! loop, response routing, timeout handling, and window control. Models
//! NDNc's `PipelineInterests`/`PipelineInterestsFixed`/`PipelineInterestsAimd`
//! as one generic worker parameterized by a [`WindowControl`] chosen at
//! construction.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, TryRecvError};
use log::{debug, trace, warn};
use rust_udcn_common::error::Error;
use rust_udcn_common::metrics::PipelineMetrics;
use rust_udcn_common::packet::{Data, Interest, NackReason};
use rust_udcn_face::{Face, FaceEvent, Transport};

use crate::pit::{PendingInterest, PendingInterestTable, MAX_RETRIES};
use crate::window::{AimdWindow, CongestionWindow, FixedWindow, WindowControl};

/// What a pending request resolves to. The pipeline delivers exactly one of
/// these for each Interest submitted via `push`/`push_bulk`. `Failed` is the
/// "null sentinel": the only way the pipeline reports a per-request failure
/// (spec §3, §7 — the façade surfaces this as an ECONNABORTED-style error).
#[derive(Debug, Clone)]
pub enum Delivery {
    Data(Data),
    Failed,
}

/// Maximum Interests pulled from the request queue into one transmit batch
/// (spec §4.1 step 4: `min(cwnd - pit.len(), 64)`).
const MAX_BATCH: usize = 64;

struct ConsumerQueue {
    tx: Sender<Delivery>,
    rx: Receiver<Delivery>,
}

struct QueuedInterest {
    consumer_id: u64,
    interest: Interest,
    delivery: Sender<Delivery>,
}

/// A congestion-controlled Interest pipeline bound to one [`Face`].
///
/// Owns no consumer state beyond the registration map; the PIT and FIFO
/// timeout order live exclusively on the worker thread spawned in `new`
/// (spec §5: "one pipeline worker owns the PIT").
pub struct Pipeline<T: Transport + 'static> {
    face: Arc<Face<T>>,
    consumers: Arc<Mutex<HashMap<u64, Arc<ConsumerQueue>>>>,
    next_consumer_id: AtomicU64,
    request_tx: Sender<QueuedInterest>,
    closed: Arc<AtomicBool>,
    metrics: Arc<PipelineMetrics>,
    worker: Option<JoinHandle<()>>,
}

impl<T: Transport + 'static> Pipeline<T> {
    /// Builds a pipeline with a fixed, immutable congestion window.
    pub fn new_fixed(face: Arc<Face<T>>, cwnd: usize) -> Self {
        Self::spawn(face, WindowControl::Fixed(FixedWindow::new(cwnd)))
    }

    /// Builds a pipeline with an AIMD congestion window seeded at the given
    /// slow-start threshold.
    pub fn new_aimd(face: Arc<Face<T>>, initial_ssthresh: usize) -> Self {
        Self::spawn(face, WindowControl::Aimd(AimdWindow::new(initial_ssthresh)))
    }

    fn spawn(face: Arc<Face<T>>, window: WindowControl) -> Self {
        let (request_tx, request_rx) = crossbeam_channel::unbounded();
        let closed = Arc::new(AtomicBool::new(false));
        let metrics = Arc::new(PipelineMetrics::new());
        metrics.window_size.set(window.cwnd() as u64);

        let worker = {
            let face = Arc::clone(&face);
            let window = Arc::new(window);
            let closed = Arc::clone(&closed);
            let metrics = Arc::clone(&metrics);
            std::thread::Builder::new()
                .name("udcn-pipeline-worker".into())
                .spawn(move || transmit_loop(face, window, request_rx, closed, metrics))
                .expect("failed to spawn pipeline worker thread")
        };

        Self {
            face,
            consumers: Arc::new(Mutex::new(HashMap::new())),
            next_consumer_id: AtomicU64::new(1),
            request_tx,
            closed,
            metrics,
            worker: Some(worker),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.face.is_connected()
    }

    /// Registers a new consumer and returns its id.
    pub fn register(&self) -> u64 {
        let id = self.next_consumer_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = crossbeam_channel::unbounded();
        self.consumers
            .lock()
            .unwrap()
            .insert(id, Arc::new(ConsumerQueue { tx, rx }));
        id
    }

    pub fn unregister(&self, consumer_id: u64) {
        self.consumers.lock().unwrap().remove(&consumer_id);
    }

    /// Enqueues one Interest for transmission. Never blocks on window
    /// fullness; admission is entirely the worker thread's concern.
    pub fn push(&self, consumer_id: u64, interest: Interest) -> Result<(), Error> {
        if self.closed.load(Ordering::Relaxed) {
            return Err(Error::FlowControl("pipeline is closed".into()));
        }
        let queue = self.consumer_queue(consumer_id)?;
        self.request_tx
            .send(QueuedInterest {
                consumer_id,
                interest,
                delivery: queue.tx.clone(),
            })
            .map_err(|_| Error::Transport("pipeline worker is gone".into()))
    }

    pub fn push_bulk(&self, consumer_id: u64, interests: Vec<Interest>) -> Result<(), Error> {
        for interest in interests {
            self.push(consumer_id, interest)?;
        }
        Ok(())
    }

    /// Non-blocking take from `consumer_id`'s delivery queue.
    pub fn pop(&self, consumer_id: u64) -> Result<Option<Delivery>, Error> {
        let queue = self.consumer_queue(consumer_id)?;
        match queue.rx.try_recv() {
            Ok(item) => Ok(Some(item)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Ok(None),
        }
    }

    pub fn pop_bulk(&self, consumer_id: u64, max: usize) -> Result<Vec<Delivery>, Error> {
        let queue = self.consumer_queue(consumer_id)?;
        let mut items = Vec::with_capacity(max.min(MAX_BATCH));
        for _ in 0..max {
            match queue.rx.try_recv() {
                Ok(item) => items.push(item),
                Err(_) => break,
            }
        }
        Ok(items)
    }

    fn consumer_queue(&self, consumer_id: u64) -> Result<Arc<ConsumerQueue>, Error> {
        self.consumers
            .lock()
            .unwrap()
            .get(&consumer_id)
            .cloned()
            .ok_or_else(|| Error::Protocol(format!("consumer {consumer_id} is not registered")))
    }

    /// Idempotent. Prevents further admission; the worker thread stops
    /// transmitting new Interests and exits on its next iteration.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Relaxed)
    }

    pub fn counters(&self) -> PipelineMetrics {
        (*self.metrics).clone()
    }
}

impl<T: Transport + 'static> Drop for Pipeline<T> {
    fn drop(&mut self) {
        self.close();
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }
}

fn transmit_loop<T: Transport + 'static>(
    face: Arc<Face<T>>,
    window: Arc<WindowControl>,
    request_rx: Receiver<QueuedInterest>,
    closed: Arc<AtomicBool>,
    metrics: Arc<PipelineMetrics>,
) {
    let mut pit = PendingInterestTable::new();

    loop {
        if closed.load(Ordering::Relaxed) {
            break;
        }

        let mut did_work = drain_face_events(&face, &mut pit, &window, &metrics, &closed);
        if closed.load(Ordering::Relaxed) {
            break;
        }

        let expired = pit.drain_expired();
        did_work |= !expired.is_empty();
        for token in expired {
            handle_timeout(token, &mut pit, &face, &window, &metrics, &closed);
            if closed.load(Ordering::Relaxed) {
                break;
            }
        }
        if closed.load(Ordering::Relaxed) {
            break;
        }

        let cwnd = window.cwnd();
        metrics.window_size.set(cwnd as u64);
        metrics.pit_size.set(pit.len() as u64);

        if pit.len() < cwnd {
            let capacity = (cwnd - pit.len()).min(MAX_BATCH);
            let mut batch = Vec::with_capacity(capacity);
            for _ in 0..capacity {
                match request_rx.try_recv() {
                    Ok(queued) => batch.push(queued),
                    Err(_) => break,
                }
            }
            did_work |= !batch.is_empty();
            for queued in batch {
                let mut entry = PendingInterest::new(queued.consumer_id, queued.interest, queued.delivery);
                match face.send_interest(&entry.interest, entry.token.to_be_bytes()) {
                    Ok(()) => {
                        entry.mark_expressed();
                        metrics.interests_sent.increment();
                        metrics.pit_inserts.increment();
                        pit.insert_expressed(entry);
                    }
                    Err(e) => {
                        warn!("transport send failed, closing pipeline: {e}");
                        let _ = entry.delivery.send(Delivery::Failed);
                        fatal_close(&mut pit, &closed);
                        break;
                    }
                }
            }
        }

        if !did_work {
            std::thread::sleep(Duration::from_micros(200));
        }
    }

    drain_all(&mut pit);
}

/// Drains every currently-buffered Face event. Returns whether anything was
/// processed, so the caller can skip its idle sleep.
fn drain_face_events<T: Transport + 'static>(
    face: &Arc<Face<T>>,
    pit: &mut PendingInterestTable,
    window: &Arc<WindowControl>,
    metrics: &Arc<PipelineMetrics>,
    closed: &Arc<AtomicBool>,
) -> bool {
    let mut did_work = false;
    loop {
        match face.events().try_recv() {
            Ok(FaceEvent::Data { data, pit_token, congestion_mark }) => {
                did_work = true;
                handle_data(data, pit_token, congestion_mark, pit, window, metrics);
            }
            Ok(FaceEvent::Nack { reason, pit_token }) => {
                did_work = true;
                handle_nack(reason, pit_token, pit, face, metrics, closed);
                if closed.load(Ordering::Relaxed) {
                    break;
                }
            }
            Ok(FaceEvent::Interest { .. }) => {
                // This pipeline only consumes responses; inbound Interests
                // belong to the producer dispatcher, not the consumer side.
                did_work = true;
            }
            Ok(FaceEvent::Disconnected) => {
                debug!("face disconnected, closing pipeline");
                fatal_close(pit, closed);
                did_work = true;
                break;
            }
            Err(TryRecvError::Empty) => break,
            Err(TryRecvError::Disconnected) => {
                fatal_close(pit, closed);
                did_work = true;
                break;
            }
        }
    }
    did_work
}

fn handle_data(
    data: Data,
    pit_token: Option<[u8; 8]>,
    congestion_mark: bool,
    pit: &mut PendingInterestTable,
    window: &Arc<WindowControl>,
    metrics: &Arc<PipelineMetrics>,
) {
    let Some(token_bytes) = pit_token else {
        metrics.pit_misses.increment();
        return;
    };
    let token = u64::from_be_bytes(token_bytes);

    match pit.remove(token) {
        None => {
            metrics.pit_misses.increment();
        }
        Some(entry) => {
            metrics.pit_hits.increment();
            metrics.data_received.increment();
            metrics.bytes_received.add(data.content.len() as u64);
            let delay_us = entry.age().as_micros().min(u64::MAX as u128) as u64;
            metrics.round_trip_time.histogram().observe(delay_us);

            let _ = entry.delivery.send(Delivery::Data(data));
            window.on_data(congestion_mark);
        }
    }
}

fn handle_nack<T: Transport + 'static>(
    reason: NackReason,
    pit_token: Option<[u8; 8]>,
    pit: &mut PendingInterestTable,
    face: &Arc<Face<T>>,
    metrics: &Arc<PipelineMetrics>,
    closed: &Arc<AtomicBool>,
) {
    let Some(token_bytes) = pit_token else {
        metrics.pit_misses.increment();
        return;
    };
    let token = u64::from_be_bytes(token_bytes);
    metrics.nacks_received.increment();

    match reason {
        NackReason::None => {
            // Ignored: the entry stays pending and is retried on timeout if
            // no Data ever arrives.
        }
        NackReason::Duplicate => match pit.remove(token) {
            None => metrics.pit_misses.increment(),
            Some(mut entry) => {
                entry.refresh();
                retransmit_or_close(entry, pit, face, metrics, closed);
            }
        },
        _ => {
            metrics.nacks_unexpected.increment();
            if let Some(entry) = pit.remove(token) {
                let _ = entry.delivery.send(Delivery::Failed);
            } else {
                metrics.pit_misses.increment();
            }
        }
    }
}

fn handle_timeout<T: Transport + 'static>(
    token: u64,
    pit: &mut PendingInterestTable,
    face: &Arc<Face<T>>,
    window: &Arc<WindowControl>,
    metrics: &Arc<PipelineMetrics>,
    closed: &Arc<AtomicBool>,
) {
    let Some(mut entry) = pit.remove(token) else {
        return;
    };
    metrics.interests_timed_out.increment();
    metrics.pit_expirations.increment();
    window.on_timeout();

    entry.retries += 1;
    if entry.retries >= MAX_RETRIES {
        trace!("PIT entry for consumer {} abandoned after {} retries", entry.consumer_id, entry.retries);
        let _ = entry.delivery.send(Delivery::Failed);
        return;
    }

    entry.refresh();
    retransmit_or_close(entry, pit, face, metrics, closed);
}

fn retransmit_or_close<T: Transport + 'static>(
    mut entry: PendingInterest,
    pit: &mut PendingInterestTable,
    face: &Arc<Face<T>>,
    metrics: &Arc<PipelineMetrics>,
    closed: &Arc<AtomicBool>,
) {
    match face.send_interest(&entry.interest, entry.token.to_be_bytes()) {
        Ok(()) => {
            entry.mark_expressed();
            metrics.interests_retransmitted.increment();
            pit.reinsert(entry);
        }
        Err(e) => {
            warn!("retransmit failed, closing pipeline: {e}");
            let _ = entry.delivery.send(Delivery::Failed);
            fatal_close(pit, closed);
        }
    }
}

/// Marks the pipeline closed and flushes every currently in-flight PIT entry
/// with a null sentinel, since no further retries or responses will ever
/// arrive for them.
fn fatal_close(pit: &mut PendingInterestTable, closed: &Arc<AtomicBool>) {
    closed.store(true, Ordering::SeqCst);
    drain_all(pit);
}

fn drain_all(pit: &mut PendingInterestTable) {
    for token in pit.tokens() {
        if let Some(entry) = pit.remove(token) {
            let _ = entry.delivery.send(Delivery::Failed);
        }
    }
}
