pub mod lead;
pub mod queue_entry;

pub use lead::{Lead, LeadStatus};
pub use queue_entry::QueueEntryPayload;
