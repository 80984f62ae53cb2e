use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Retrieve,
    Store,
}

/// State of one in-flight transfer.
///
/// Owned by the orchestrator invocation; the session's reader task holds a
/// clone through the in-flight command slot so ABOR can request cancellation
/// and STAT can report progress while the copy loop runs. Cancellation is
/// cooperative: the flag is polled once per unit.
pub struct TransferState {
    direction: Direction,
    expected: Option<u64>,
    bytes: AtomicU64,
    records: AtomicU64,
    current_rate: AtomicU64,
    abort: AtomicBool,
}

impl TransferState {
    pub fn new(direction: Direction, expected: Option<u64>) -> Self {
        Self {
            direction,
            expected,
            bytes: AtomicU64::new(0),
            records: AtomicU64::new(0),
            current_rate: AtomicU64::new(0),
            abort: AtomicBool::new(false),
        }
    }

    pub fn add_bytes(&self, n: u64) {
        self.bytes.fetch_add(n, Ordering::Relaxed);
    }

    pub fn bytes(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed)
    }

    pub fn add_record(&self) {
        self.records.fetch_add(1, Ordering::Relaxed);
    }

    pub fn records(&self) -> u64 {
        self.records.load(Ordering::Relaxed)
    }

    pub fn set_current_rate(&self, bytes_per_sec: f64) {
        self.current_rate
            .store(bytes_per_sec as u64, Ordering::Relaxed);
    }

    pub fn current_rate(&self) -> u64 {
        self.current_rate.load(Ordering::Relaxed)
    }

    pub fn request_abort(&self) {
        self.abort.store(true, Ordering::SeqCst);
    }

    pub fn abort_requested(&self) -> bool {
        self.abort.load(Ordering::SeqCst)
    }

    /// Progress line for a mid-transfer STAT query.
    pub fn progress_line(&self) -> String {
        let verb = match self.direction {
            Direction::Retrieve => "sent",
            Direction::Store => "received",
        };
        let rate_kib = self.current_rate() / 1024;
        match self.expected {
            Some(total) => format!(
                "213 Transfer in progress: {} of {} bytes {} ({} KiB/s).\r\n",
                self.bytes(),
                total,
                verb,
                rate_kib
            ),
            None => format!(
                "213 Transfer in progress: {} bytes {} ({} KiB/s).\r\n",
                self.bytes(),
                verb,
                rate_kib
            ),
        }
    }
}

/// Session-wide slot holding the state of the transfer currently in flight,
/// if any. The executor attaches a state before the copy loop starts and
/// clears it afterwards; the reader task consults it to service ABOR and
/// STAT without queueing behind the transfer.
#[derive(Clone, Default)]
pub struct TransferSlot {
    inner: Arc<Mutex<Option<Arc<TransferState>>>>,
}

impl TransferSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&self, state: Arc<TransferState>) {
        *self.inner.lock().expect("transfer slot poisoned") = Some(state);
    }

    pub fn clear(&self) {
        *self.inner.lock().expect("transfer slot poisoned") = None;
    }

    pub fn current(&self) -> Option<Arc<TransferState>> {
        self.inner.lock().expect("transfer slot poisoned").clone()
    }
}
