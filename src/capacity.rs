use chrono::NaiveDate;

use crate::error::Result;
use crate::store::LeadStore;

/// Answers "how many sends have been attributed to day D so far?" by
/// consulting the lead store (spec.md §4.C). Grounded on the teacher's
/// `CampaignScheduler::get_available_inboxes`, which checks `sent_today <
/// daily_limit` against a per-inbox cap — the same "count today's
/// completions against a cap" shape, here moved to a day-wide cap.
///
/// Deliberately counts only *completed* sends (`last_sent_at`), not queued
/// entries — the soft-cap tradeoff spec.md §4.C documents and §9 resolves as
/// a kept design decision, not an open one.
pub struct CapacityOracle<'a, S: LeadStore> {
    store: &'a S,
    daily_max: i32,
}

impl<'a, S: LeadStore> CapacityOracle<'a, S> {
    pub fn new(store: &'a S, daily_max: i32) -> Self {
        Self { store, daily_max }
    }

    pub async fn used(&self, day: NaiveDate) -> Result<i64> {
        self.store.count_sent_on(day).await
    }

    pub async fn has_capacity(&self, day: NaiveDate) -> Result<bool> {
        Ok(self.used(day).await? < self.daily_max as i64)
    }
}
