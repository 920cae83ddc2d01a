//! Background job queue for icon upload/delete work.
//!
//! ## Design
//!
//! - Enqueue is non-blocking: a job is durably recorded and the caller's
//!   request completes without waiting for execution.
//! - A single worker thread claims jobs in FIFO order and dispatches on the
//!   typed task payload.
//! - Failures are retried with a fixed backoff up to a bounded attempt
//!   count, then the job is marked exhausted and kept in the store.
//! - Unknown/unparseable task payloads are logged and discarded, not
//!   retried.
//!
//! ## Components
//!
//! - `Job` / `JobTask`: job record and its tagged task payload
//! - `JobStore`: durable queue substrate (in-memory stand-in provided)
//! - `IconQueue`: enqueue client injected into the service layer
//! - `JobWorker`: the polling worker thread

pub mod queue;
pub mod store;
pub mod types;
pub mod worker;

pub use queue::IconQueue;
pub use store::{InMemoryJobStore, JobStats, JobStore, JobStoreError};
pub use types::{Job, JobAttemptRecord, JobId, JobStatus, JobTask, RetryPolicy};
pub use worker::{JobWorker, WorkerConfig, WorkerHandle};
