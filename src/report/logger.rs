use std::fmt;
use std::sync::{Arc, Mutex};

use crate::error::UpsertError;
use crate::node::Uid;

/// Something that happened to one item of a run.
#[derive(Debug)]
pub enum UpsertEvent<'a> {
    Started { identifier: &'a str },
    /// The cache already held a UID; nothing was sent to the store.
    Cached { identifier: &'a str, uid: &'a Uid },
    Committed { identifier: &'a str, uid: &'a Uid },
    /// The store aborted attempt `attempt` on a conflict; the item is retried.
    Conflict { identifier: &'a str, attempt: usize },
    Failed { identifier: &'a str, error: &'a UpsertError },
    /// Dequeued after cancellation and dropped unprocessed.
    Skipped { identifier: &'a str },
}

impl fmt::Display for UpsertEvent<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpsertEvent::Started { identifier } => write!(f, "[UPSERT] started {}", identifier),
            UpsertEvent::Cached { identifier, uid } => {
                write!(f, "[UPSERT] cached {} {}", identifier, uid)
            }
            UpsertEvent::Committed { identifier, uid } => write!(
                f,
                "[UPSERT] committed {} {} ({})",
                identifier,
                uid,
                if uid.is_new() { "new" } else { "existing" }
            ),
            UpsertEvent::Conflict {
                identifier,
                attempt,
            } => write!(f, "[UPSERT] conflict {} attempt {}", identifier, attempt),
            UpsertEvent::Failed { identifier, error } => {
                write!(f, "[UPSERT] failed {}: {}", identifier, error)
            }
            UpsertEvent::Skipped { identifier } => write!(f, "[UPSERT] skipped {}", identifier),
        }
    }
}

/// Receives item events from the workers. Called concurrently.
pub trait Logger: Send + Sync {
    fn log(&self, event: &UpsertEvent<'_>);
}

/// Default logger: forwards events to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log(&self, event: &UpsertEvent<'_>) {
        match event {
            UpsertEvent::Started { identifier } => {
                tracing::trace!(identifier = %identifier, "upsert started");
            }
            UpsertEvent::Cached { identifier, uid } => {
                tracing::debug!(identifier = %identifier, uid = %uid, "uid cache hit");
            }
            UpsertEvent::Committed { identifier, uid } => {
                tracing::debug!(
                    identifier = %identifier,
                    uid = %uid,
                    new = uid.is_new(),
                    "node committed"
                );
            }
            UpsertEvent::Conflict {
                identifier,
                attempt,
            } => {
                tracing::info!(identifier = %identifier, attempt, "transaction aborted, retrying");
            }
            UpsertEvent::Failed { identifier, error } => {
                tracing::error!(identifier = %identifier, error = %error, "upsert failed");
            }
            UpsertEvent::Skipped { identifier } => {
                tracing::warn!(identifier = %identifier, "skipped after cancellation");
            }
        }
    }
}

/// Drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NilLogger;

impl Logger for NilLogger {
    fn log(&self, _event: &UpsertEvent<'_>) {}
}

/// Collects formatted events into a shared buffer.
#[derive(Clone, Default)]
pub struct BufferLogger {
    buffer: Arc<Mutex<Vec<String>>>,
}

impl BufferLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_buffer(buffer: Arc<Mutex<Vec<String>>>) -> Self {
        BufferLogger { buffer }
    }

    /// Lines logged so far. Empty if the buffer lock was poisoned.
    pub fn lines(&self) -> Vec<String> {
        self.buffer
            .lock()
            .map(|lines| lines.clone())
            .unwrap_or_default()
    }
}

impl Logger for BufferLogger {
    fn log(&self, event: &UpsertEvent<'_>) {
        if let Ok(mut buffer) = self.buffer.lock() {
            buffer.push(event.to_string());
        }
    }
}
