use chrono::{NaiveDate, Utc};
use uuid::Uuid;

use crate::capacity::CapacityOracle;
use crate::error::{HyperdripError, Result};
use crate::models::lead::{CreateLeadRequest, Lead, LeadStatus};
use crate::models::queue_entry::{queue_name_for, QueueEntryPayload};
use crate::queue::MessageQueue;
use crate::store::{Advance, LeadPatch, LeadStore};

/// Computes which day each of a lead's `max_messages` gets assigned to under
/// a global per-day capacity budget, materializes those assignments as
/// durable queue entries, and records the lead.
///
/// Grounded on the teacher's `CampaignScheduler::schedule_campaign_sends`:
/// fetch candidates, iterate them in order, enqueue one job per item,
/// log-and-continue on a per-item failure rather than aborting the batch.
/// Here the per-item "destination" the scheduler picks is a calendar day
/// instead of a round-robin inbox.
pub struct Scheduler<'a, S: LeadStore, Q: MessageQueue> {
    store: &'a S,
    queue: &'a Q,
    daily_max: i32,
    overflow_horizon_days: i64,
    test_mode: bool,
}

impl<'a, S: LeadStore, Q: MessageQueue> Scheduler<'a, S, Q> {
    pub fn new(store: &'a S, queue: &'a Q, daily_max: i32, overflow_horizon_days: i64, test_mode: bool) -> Self {
        Self {
            store,
            queue,
            daily_max,
            overflow_horizon_days,
            test_mode,
        }
    }

    /// Admits a validated lead draft: creates the lead row, then schedules
    /// its `max_messages` messages across day-queues. Returns the created
    /// lead id even if scheduling some messages failed partway through
    /// (spec.md §4.D: "the lead row is still durably created and returned to
    /// the admission caller").
    pub async fn admit(&self, request: CreateLeadRequest) -> Result<Uuid> {
        if request.max_messages < 1 {
            return Err(HyperdripError::LogicError {
                lead_id: Uuid::nil(),
                expected: 1,
                actual: request.max_messages,
            });
        }

        let now = Utc::now();
        let lead = Lead::draft(
            Uuid::new_v4(),
            request.email.clone(),
            request.phone,
            request.name,
            request.notes,
            request.max_messages,
            now,
        );
        let lead_id = self.store.create(lead).await?;

        self.schedule_messages(lead_id, &request.email, request.max_messages, now.date_naive())
            .await;

        // today == the date of the first message. A worker may have already
        // raced ahead and advanced (or even completed) this lead by the time
        // this runs — read the lead's current state inside the transaction
        // and only stamp status/next_scheduled_for if no advance has
        // happened yet, so a concurrent worker's COMPLETED transition is
        // never clobbered back to ACTIVE (spec.md §5, invariant 3).
        let today = now.date_naive();
        let _ = self
            .store
            .update_in_transaction(lead_id, move |lead| async move {
                if lead.message_count > 0 {
                    Advance::NoOp
                } else {
                    Advance::Apply(LeadPatch {
                        status: Some(LeadStatus::Active.as_str().to_string()),
                        next_scheduled_for: Some(Some(today)),
                        ..Default::default()
                    })
                }
            })
            .await;

        Ok(lead_id)
    }

    /// Runs the assignment algorithm of spec.md §4.D for `m ∈ 1..=max_messages`.
    /// Failures are logged and skipped — partial scheduling is tolerated, the
    /// lead row persists regardless (spec.md §4.D, §7).
    async fn schedule_messages(&self, lead_id: Uuid, email: &str, max_messages: i32, today: NaiveDate) {
        for m in 1..=max_messages {
            let preferred = today + chrono::Duration::days((m - 1) as i64);

            let day = match self.pick_day(preferred).await {
                Ok(day) => day,
                Err(e) => {
                    tracing::warn!(lead_id = %lead_id, message_number = m, error = %e, "capacity lookup failed, skipping message");
                    continue;
                }
            };

            let queue_name = queue_name_for(day, self.test_mode);
            if let Err(e) = self.queue.create(&queue_name).await {
                tracing::warn!(lead_id = %lead_id, queue = %queue_name, error = %e, "failed to ensure day-queue exists, skipping message");
                continue;
            }

            let payload = QueueEntryPayload {
                lead_id,
                email: email.to_string(),
                message_number: m,
                scheduled_date: day,
            };
            let body = match serde_json::to_string(&payload) {
                Ok(body) => body,
                Err(e) => {
                    tracing::warn!(lead_id = %lead_id, message_number = m, error = %e, "failed to serialize queue payload, skipping message");
                    continue;
                }
            };

            if let Err(e) = self.queue.send(&queue_name, &body).await {
                tracing::warn!(lead_id = %lead_id, message_number = m, queue = %queue_name, error = %e, "failed to enqueue message");
            }
        }
    }

    /// Scans forward from `preferred` for up to `overflow_horizon_days`,
    /// returning the first day with spare capacity. Clamps to the last day
    /// of the horizon on exhaustion (spec.md §4.D step 2, §7
    /// `CapacityOverflow`).
    async fn pick_day(&self, preferred: NaiveDate) -> Result<NaiveDate> {
        let oracle = CapacityOracle::new(self.store, self.daily_max);

        for offset in 0..self.overflow_horizon_days {
            let candidate = preferred + chrono::Duration::days(offset);
            if oracle.has_capacity(candidate).await? {
                return Ok(candidate);
            }
        }

        let assigned = preferred + chrono::Duration::days(self.overflow_horizon_days - 1);
        let overflow = HyperdripError::CapacityOverflow { preferred, assigned };
        tracing::warn!(error = %overflow, "overflow horizon exhausted, degrading to last day of horizon");
        Ok(assigned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::InMemoryMessageQueue;
    use crate::store::InMemoryLeadStore;

    fn today() -> NaiveDate {
        Utc::now().date_naive()
    }

    #[tokio::test]
    async fn happy_path_schedules_n_messages_on_consecutive_days() {
        let store = InMemoryLeadStore::new();
        let queue = InMemoryMessageQueue::new();
        let scheduler = Scheduler::new(&store, &queue, 100, 30, true);

        let lead_id = scheduler
            .admit(CreateLeadRequest {
                email: "a@example.com".into(),
                phone: "5551234567".into(),
                name: "Ada".into(),
                notes: None,
                max_messages: 5,
            })
            .await
            .unwrap();

        let lead = store.get(lead_id).await.unwrap().unwrap();
        assert_eq!(lead.max_messages, 5);
        assert_eq!(lead.message_count, 0);
        assert_eq!(lead.status, "active");

        for m in 0..5 {
            let day = today() + chrono::Duration::days(m);
            let name = queue_name_for(day, true);
            let msgs = queue.read(&name, 30, 10).await.unwrap();
            assert_eq!(msgs.len(), 1, "day offset {m}");
            let payload: QueueEntryPayload = serde_json::from_str(&msgs[0].payload).unwrap();
            assert_eq!(payload.message_number, (m + 1) as i32);
            assert_eq!(payload.scheduled_date, day);
        }
    }

    #[tokio::test]
    async fn overflow_pushes_past_a_full_day() {
        let store = InMemoryLeadStore::new();
        let queue = InMemoryMessageQueue::new();

        // Two leads already sent today exhausts a cap of 2.
        for i in 0..2 {
            let lead = Lead::draft(
                Uuid::new_v4(),
                format!("prior{i}@example.com"),
                format!("555000000{i}"),
                "Prior".into(),
                None,
                1,
                Utc::now(),
            );
            let id = store.create(lead).await.unwrap();
            store
                .apply_patch(
                    id,
                    LeadPatch {
                        last_sent_at: Some(Utc::now()),
                        ..Default::default()
                    },
                )
                .await
                .unwrap();
        }

        let scheduler = Scheduler::new(&store, &queue, 2, 30, true);
        scheduler
            .admit(CreateLeadRequest {
                email: "overflow@example.com".into(),
                phone: "5559999999".into(),
                name: "Overflow".into(),
                notes: None,
                max_messages: 1,
            })
            .await
            .unwrap();

        let tomorrow = today() + chrono::Duration::days(1);
        let msgs = queue.read(&queue_name_for(tomorrow, true), 30, 10).await.unwrap();
        assert_eq!(msgs.len(), 1);
        let payload: QueueEntryPayload = serde_json::from_str(&msgs[0].payload).unwrap();
        assert_eq!(payload.scheduled_date, tomorrow);

        let todays = queue.read(&queue_name_for(today(), true), 30, 10).await.unwrap();
        assert!(todays.is_empty());
    }

    #[tokio::test]
    async fn duplicate_natural_key_is_rejected() {
        let store = InMemoryLeadStore::new();
        let queue = InMemoryMessageQueue::new();
        let scheduler = Scheduler::new(&store, &queue, 100, 30, true);

        scheduler
            .admit(CreateLeadRequest {
                email: "dup@example.com".into(),
                phone: "5551112222".into(),
                name: "First".into(),
                notes: None,
                max_messages: 1,
            })
            .await
            .unwrap();

        let err = scheduler
            .admit(CreateLeadRequest {
                email: "dup@example.com".into(),
                phone: "5553334444".into(),
                name: "Second".into(),
                notes: None,
                max_messages: 1,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, HyperdripError::DuplicateKey));
    }
}
