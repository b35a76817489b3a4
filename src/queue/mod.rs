pub mod memory;
pub mod sqs;

pub use memory::InMemoryMessageQueue;
pub use sqs::SqsMessageQueue;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;

/// One leased entry returned by `read`, matching spec.md §4.B's tuple shape.
#[derive(Debug, Clone)]
pub struct QueueMessage {
    pub msg_id: String,
    pub read_count: u32,
    pub enqueued_at: DateTime<Utc>,
    pub visible_at: DateTime<Utc>,
    pub payload: String,
}

/// Duck-typed contract for a date-partitioned, leased-delivery message queue
/// (spec.md §4.B). Grounded on the pack's `fc-queue` crate, which implements
/// this exact shape ("mimics SQS FIFO semantics") over `sqlx`; the production
/// implementation here goes one step further and talks to SQS directly.
#[async_trait]
pub trait MessageQueue: Send + Sync {
    /// Idempotent: creating an existing queue is a no-op success.
    async fn create(&self, name: &str) -> Result<()>;

    /// Idempotent: dropping a non-existent queue is a no-op success.
    async fn drop_queue(&self, name: &str) -> Result<()>;

    /// Appends one entry, returning a stable id usable with `archive`.
    async fn send(&self, name: &str, payload: &str) -> Result<String>;

    /// Reads up to `qty` entries, leasing each for `vt` seconds. May return
    /// fewer than `qty`, including zero, if none are available within a
    /// short bounded wait.
    async fn read(&self, name: &str, vt_secs: u32, qty: u32) -> Result<Vec<QueueMessage>>;

    /// Permanently removes the entry. Idempotent on already-archived ids.
    async fn archive(&self, name: &str, msg_id: &str) -> Result<()>;
}
