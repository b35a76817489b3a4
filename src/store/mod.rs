pub mod memory;
pub mod postgres;

pub use memory::InMemoryLeadStore;
pub use postgres::PostgresLeadStore;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::future::Future;
use uuid::Uuid;

use crate::error::Result;
use crate::models::Lead;

/// A patch applied to a lead inside `update_in_transaction`. Mirrors the
/// fields spec.md §4.E says an advance touches; `None` leaves a field
/// untouched.
#[derive(Debug, Clone, Default)]
pub struct LeadPatch {
    pub message_count: Option<i32>,
    pub last_sent_at: Option<DateTime<Utc>>,
    pub next_scheduled_for: Option<Option<NaiveDate>>,
    pub status: Option<String>,
}

/// What the caller's transaction callback decided to do, having seen the
/// locked lead row. `Apply` and `NoOp` both commit; `Abort` rolls back so the
/// entry is left for redelivery (spec.md §4.E step 4: "If the transaction
/// fails or the send effect throws: do not archive").
pub enum Advance {
    /// Nothing changes; commits an empty transaction (spec.md §4.E cases
    /// "already processed" / "out of order").
    NoOp,
    /// The expected-case advance, already vetted by the caller (e.g. the
    /// send effect succeeded) — apply this patch and commit.
    Apply(LeadPatch),
    /// The caller's side effect failed (or it otherwise declines to
    /// proceed); roll back without committing.
    Abort(String),
}

/// The result of `update_in_transaction`, letting callers distinguish "lead
/// absent" from "committed, no change" from "committed, changed" from
/// "rolled back".
pub enum AdvanceOutcome {
    LeadMissing,
    Committed(Lead),
    Aborted(String),
}

/// Duck-typed contract for the durable per-lead store (spec.md §4.A). Any
/// implementation satisfying these operations is substitutable — this is
/// what lets the scheduler and worker run against an in-memory double in
/// tests and a real Postgres-backed store in production.
#[async_trait]
pub trait LeadStore: Send + Sync {
    /// Creates the lead row. Fails with `HyperdripError::DuplicateKey` if
    /// `email` or `phone` collides with an existing row.
    async fn create(&self, lead: Lead) -> Result<Uuid>;

    async fn get(&self, id: Uuid) -> Result<Option<Lead>>;

    /// Opens a transaction, locks the lead row, hands the locked snapshot to
    /// `f`, and commits or rolls back based on what `f` returns. `f` is
    /// async and is awaited *while the row lock is held* — this is what lets
    /// the worker perform its external send effect before the counter
    /// advance commits, exactly as spec.md §4.E's step-by-step ordering
    /// requires (send, then update, then commit, then archive).
    async fn update_in_transaction<F, Fut>(&self, id: Uuid, f: F) -> Result<AdvanceOutcome>
    where
        F: FnOnce(Lead) -> Fut + Send,
        Fut: Future<Output = Advance> + Send;

    /// Applies a simple patch with no side effect to decide first — used by
    /// the scheduler to stamp `status`/`next_scheduled_for` after admission.
    async fn apply_patch(&self, id: Uuid, patch: LeadPatch) -> Result<AdvanceOutcome> {
        self.update_in_transaction(id, move |_lead| async move { Advance::Apply(patch) })
            .await
    }

    /// Count of leads whose `last_sent_at` falls within the civil day `day`
    /// (UTC), i.e. `used(D)` from spec.md §4.C.
    async fn count_sent_on(&self, day: NaiveDate) -> Result<i64>;
}
