//! Logging and progress collaborators handed to the worker pool.
//!
//! - `Logger` receives one [`UpsertEvent`] per item state change.
//!   [`TracingLogger`] (the default) forwards to `tracing`, [`BufferLogger`]
//!   keeps lines for tests, [`NilLogger`] drops everything.
//! - `Progress` is advanced once per finished item. [`CounterProgress`] is a
//!   plain atomic counter; `EmitterProgress` (requires the `emitter`
//!   feature) emits updates on an in-process event emitter.

mod logger;
mod progress;

pub use logger::{BufferLogger, Logger, NilLogger, TracingLogger, UpsertEvent};
#[cfg(feature = "emitter")]
pub use progress::EmitterProgress;
pub use progress::{CounterProgress, Progress, ProgressUpdate, PROGRESS_EVENT};
