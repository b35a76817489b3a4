use chrono::NaiveDate;
use uuid::Uuid;

/// The closed set of error kinds the core distinguishes. Variants map
/// directly onto the recovery policy each is handled with at the call site —
/// see the module docs on `scheduler` and `worker` for who catches what.
#[derive(Debug, thiserror::Error)]
pub enum HyperdripError {
    #[error("lead with this email or phone already exists")]
    DuplicateKey,

    #[error("queue operation failed (transient): {0}")]
    TransientQueueError(String),

    #[error("store operation failed (transient): {0}")]
    TransientStoreError(String),

    #[error("counter mismatch for lead {lead_id}: expected message {expected}, entry carries {actual}")]
    LogicError {
        lead_id: Uuid,
        expected: i32,
        actual: i32,
    },

    #[error("overflow horizon exhausted scanning from {preferred}, clamped to {assigned}")]
    CapacityOverflow {
        preferred: NaiveDate,
        assigned: NaiveDate,
    },

    #[error("operation cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, HyperdripError>;
