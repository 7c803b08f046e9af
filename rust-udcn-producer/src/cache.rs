//! File-handle cache (spec §4.3): keyed by absolute path, read-write lock
//! guarded, with a background evictor that closes handles idle longer than
//! `gc_lifetime`. Grounded on the XRootD NDN plugin's `FileHandler`
//! (`xrdndn-producer/xrdndn-file-handler.hh`), which tracks one
//! `boost::posix_time::ptime` access time per open file for the same
//! garbage collector to consult.

use std::collections::HashMap;
use std::fs::File;
use std::io;
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use bytes::Bytes;
use rust_udcn_common::metrics::ProducerMetrics;

struct CachedHandle {
    file: File,
    last_access: Mutex<Instant>,
}

impl CachedHandle {
    fn new(file: File) -> Self {
        Self {
            file,
            last_access: Mutex::new(Instant::now()),
        }
    }

    fn touch(&self) {
        *self.last_access.lock().unwrap() = Instant::now();
    }

    fn idle_for(&self) -> Duration {
        self.last_access.lock().unwrap().elapsed()
    }

    /// `pread(segment_index * segment_size, segment_size)`: reads exactly
    /// `segment_size` bytes unless the file ends first, in which case the
    /// buffer is truncated to the bytes actually read (the last segment).
    fn read_segment(&self, segment: u64, segment_size: u64) -> io::Result<Bytes> {
        let offset = segment * segment_size;
        let mut buf = vec![0u8; segment_size as usize];
        let mut total = 0usize;
        loop {
            match self.file.read_at(&mut buf[total..], offset + total as u64) {
                Ok(0) => break,
                Ok(n) => {
                    total += n;
                    if total >= buf.len() {
                        break;
                    }
                }
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        buf.truncate(total);
        Ok(Bytes::from(buf))
    }
}

type HandleMap = Arc<RwLock<HashMap<PathBuf, Arc<CachedHandle>>>>;

/// Caches open file descriptors by absolute path so repeated segment reads
/// of the same file don't pay an `open()` each time. Open-on-miss is
/// atomic from the caller's perspective: a double-checked read lock then
/// write lock means only one thread ever opens a given path.
pub struct FileHandleCache {
    handles: HandleMap,
    metrics: Arc<ProducerMetrics>,
    shutdown: Arc<AtomicBool>,
    evictor: Option<JoinHandle<()>>,
}

impl FileHandleCache {
    pub fn new(gc_period: Duration, gc_lifetime: Duration, metrics: Arc<ProducerMetrics>) -> Self {
        let handles: HandleMap = Arc::new(RwLock::new(HashMap::new()));
        let shutdown = Arc::new(AtomicBool::new(false));

        let evictor = {
            let handles = Arc::clone(&handles);
            let shutdown = Arc::clone(&shutdown);
            let metrics = Arc::clone(&metrics);
            Some(
                std::thread::Builder::new()
                    .name("udcn-producer-gc".into())
                    .spawn(move || evictor_loop(handles, shutdown, metrics, gc_period, gc_lifetime))
                    .expect("failed to spawn file-handle cache evictor thread"),
            )
        };

        Self {
            handles,
            metrics,
            shutdown,
            evictor,
        }
    }

    pub fn read_segment(&self, path: &Path, segment: u64, segment_size: u64) -> io::Result<Bytes> {
        let handle = self.get_or_open(path)?;
        handle.touch();
        handle.read_segment(segment, segment_size)
    }

    fn get_or_open(&self, path: &Path) -> io::Result<Arc<CachedHandle>> {
        if let Some(handle) = self.handles.read().unwrap().get(path) {
            self.metrics.handle_cache_hits.increment();
            return Ok(Arc::clone(handle));
        }

        let mut handles = self.handles.write().unwrap();
        if let Some(handle) = handles.get(path) {
            self.metrics.handle_cache_hits.increment();
            return Ok(Arc::clone(handle));
        }

        self.metrics.handle_cache_misses.increment();
        let file = File::open(path)?;
        let handle = Arc::new(CachedHandle::new(file));
        handles.insert(path.to_path_buf(), Arc::clone(&handle));
        self.metrics.handle_cache_size.set(handles.len() as u64);
        Ok(handle)
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.handles.read().unwrap().len()
    }
}

impl Drop for FileHandleCache {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(handle) = self.evictor.take() {
            let _ = handle.join();
        }
    }
}

fn evictor_loop(
    handles: HandleMap,
    shutdown: Arc<AtomicBool>,
    metrics: Arc<ProducerMetrics>,
    gc_period: Duration,
    gc_lifetime: Duration,
) {
    while !shutdown.load(Ordering::Relaxed) {
        sleep_in_slices(gc_period, &shutdown);
        if shutdown.load(Ordering::Relaxed) {
            return;
        }

        let mut handles = handles.write().unwrap();
        let before = handles.len();
        handles.retain(|_, handle| handle.idle_for() < gc_lifetime);
        let evicted = before - handles.len();
        if evicted > 0 {
            metrics.handle_cache_evictions.add(evicted as u64);
        }
        metrics.handle_cache_size.set(handles.len() as u64);
    }
}

/// Sleeps up to `total`, waking in short slices so `shutdown` is observed
/// promptly instead of blocking for a full `gc_period`.
fn sleep_in_slices(total: Duration, shutdown: &AtomicBool) {
    let slice = Duration::from_millis(20);
    let mut slept = Duration::ZERO;
    while slept < total {
        if shutdown.load(Ordering::Relaxed) {
            return;
        }
        let step = slice.min(total - slept);
        std::thread::sleep(step);
        slept += step;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_udcn_common::metrics::ProducerMetrics;
    use std::io::Write;

    #[test]
    fn read_segment_returns_full_and_truncated_final_segment() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dataset.bin");
        let mut file = File::create(&path).unwrap();
        file.write_all(&vec![b'x'; 1000]).unwrap();
        drop(file);

        let metrics = Arc::new(ProducerMetrics::new());
        let cache = FileHandleCache::new(Duration::from_secs(256), Duration::from_secs(60), metrics);

        let first = cache.read_segment(&path, 0, 600).unwrap();
        assert_eq!(first.len(), 600);
        let last = cache.read_segment(&path, 1, 600).unwrap();
        assert_eq!(last.len(), 400);

        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn evictor_removes_idle_handles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dataset.bin");
        File::create(&path).unwrap();

        let metrics = Arc::new(ProducerMetrics::new());
        let cache = FileHandleCache::new(Duration::from_millis(50), Duration::from_millis(30), Arc::clone(&metrics));
        cache.read_segment(&path, 0, 16).unwrap();
        assert_eq!(cache.len(), 1);

        std::thread::sleep(Duration::from_millis(250));
        assert_eq!(cache.len(), 0);
        assert!(metrics.handle_cache_evictions.value() >= 1);
    }

    #[test]
    fn missing_file_surfaces_io_error() {
        let metrics = Arc::new(ProducerMetrics::new());
        let cache = FileHandleCache::new(Duration::from_secs(256), Duration::from_secs(60), metrics);
        let err = cache.read_segment(Path::new("/nonexistent/dataset.bin"), 0, 16).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
