use std::sync::atomic::{AtomicU64, Ordering};

#[cfg(feature = "emitter")]
use std::sync::Mutex;

#[cfg(feature = "emitter")]
use event_emitter_rs::EventEmitter;
use serde::{Deserialize, Serialize};

/// Event name [`EmitterProgress`] emits under.
pub const PROGRESS_EVENT: &str = "upsert.progress";

/// Snapshot of a run's progress.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub completed: u64,
    /// Unknown for streamed input.
    pub total: Option<u64>,
}

/// Advanced once per finished item, from any worker.
pub trait Progress: Send + Sync {
    /// Called once before the first item when the input size is known.
    fn set_total(&self, _total: u64) {}

    fn increment(&self);
}

/// Lock-free counter.
#[derive(Debug, Default)]
pub struct CounterProgress {
    completed: AtomicU64,
    // 0 means unknown
    total: AtomicU64,
}

impl CounterProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> ProgressUpdate {
        let total = self.total.load(Ordering::Acquire);
        ProgressUpdate {
            completed: self.completed.load(Ordering::Acquire),
            total: (total > 0).then_some(total),
        }
    }
}

impl Progress for CounterProgress {
    fn set_total(&self, total: u64) {
        self.total.store(total, Ordering::Release);
    }

    fn increment(&self) {
        self.completed.fetch_add(1, Ordering::AcqRel);
    }
}

/// Emits a [`ProgressUpdate`] on an `EventEmitter` after every item so
/// in-process listeners can render progress.
#[cfg(feature = "emitter")]
pub struct EmitterProgress {
    emitter: Mutex<EventEmitter>,
    counter: CounterProgress,
}

#[cfg(feature = "emitter")]
impl EmitterProgress {
    pub fn new(emitter: EventEmitter) -> Self {
        EmitterProgress {
            emitter: Mutex::new(emitter),
            counter: CounterProgress::new(),
        }
    }

    pub fn snapshot(&self) -> ProgressUpdate {
        self.counter.snapshot()
    }
}

#[cfg(feature = "emitter")]
impl Progress for EmitterProgress {
    fn set_total(&self, total: u64) {
        self.counter.set_total(total);
    }

    fn increment(&self) {
        self.counter.increment();
        let update = self.counter.snapshot();
        if let Ok(mut emitter) = self.emitter.lock() {
            emitter.emit(PROGRESS_EVENT, update);
        }
    }
}
