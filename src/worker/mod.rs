//! Worker pool that drives nodes through lookup, mutation and commit.
//!
//! A run owns a bounded queue shared by N named threads behind a
//! `Mutex<Receiver>`. Each worker pulls one node at a time and:
//!
//! 1. returns the cached UID if the identifier was already resolved,
//! 2. otherwise opens a fresh transaction, looks the node up by its unique
//!    duples, encodes the mutation against the match (or a new blank node),
//!    mutates and commits,
//! 3. retries with a new transaction when the store aborts on a conflict,
//! 4. sends one [`ItemOutcome`] back and advances progress.
//!
//! Cancellation is cooperative: a cancelled run keeps draining its queue and
//! reports the remaining nodes as skipped, so the producer never blocks.

mod cancel;
mod item;
mod pool;

pub use cancel::CancelToken;
pub use item::{upsert_item, ItemOutcome, WorkerPackage};
pub use pool::{launch_workers, BatchReport, WorkerPool};
