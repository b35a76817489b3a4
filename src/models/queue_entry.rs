use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The JSON-compatible body of a single scheduled message, as carried inside
/// a day-queue entry (spec.md §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueEntryPayload {
    #[serde(rename = "leadId")]
    pub lead_id: Uuid,
    pub email: String,
    #[serde(rename = "messageNumber")]
    pub message_number: i32,
    #[serde(rename = "scheduledDate")]
    pub scheduled_date: NaiveDate,
}

/// Derives the bijective queue name for a calendar date: `drip-messages-YYYY-MM-DD`,
/// optionally `test-`-prefixed under test mode (spec.md §6).
pub fn queue_name_for(date: NaiveDate, test_mode: bool) -> String {
    let base = format!("drip-messages-{}", date.format("%Y-%m-%d"));
    if test_mode {
        format!("test-{base}")
    } else {
        base
    }
}
