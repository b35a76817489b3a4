use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use std::future::Future;

use super::{Advance, AdvanceOutcome, LeadStore};
use crate::error::{HyperdripError, Result};
use crate::models::Lead;

/// In-memory `LeadStore` for tests — the duck-typed double spec.md §9 calls
/// out explicitly ("an in-memory queue/store pair for tests").
#[derive(Default)]
pub struct InMemoryLeadStore {
    leads: Mutex<HashMap<Uuid, Lead>>,
}

impl InMemoryLeadStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LeadStore for InMemoryLeadStore {
    async fn create(&self, lead: Lead) -> Result<Uuid> {
        let mut leads = self.leads.lock().await;
        if leads
            .values()
            .any(|l| l.email == lead.email || l.phone == lead.phone)
        {
            return Err(HyperdripError::DuplicateKey);
        }
        let id = lead.id;
        leads.insert(id, lead);
        Ok(id)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Lead>> {
        Ok(self.leads.lock().await.get(&id).cloned())
    }

    async fn update_in_transaction<F, Fut>(&self, id: Uuid, f: F) -> Result<AdvanceOutcome>
    where
        F: FnOnce(Lead) -> Fut + Send,
        Fut: Future<Output = Advance> + Send,
    {
        // A single mutex hold stands in for row-level locking: the whole
        // load-decide(await the effect)-write sequence is atomic with
        // respect to other callers, the same guarantee `SELECT ... FOR
        // UPDATE` gives the Postgres-backed store. `f` is awaited with the
        // lock held, so the caller's side effect runs before any other
        // caller can observe or race this lead's row.
        let mut leads = self.leads.lock().await;
        let Some(lead) = leads.get(&id).cloned() else {
            return Ok(AdvanceOutcome::LeadMissing);
        };

        match f(lead.clone()).await {
            Advance::NoOp => Ok(AdvanceOutcome::Committed(lead)),
            Advance::Abort(reason) => Ok(AdvanceOutcome::Aborted(reason)),
            Advance::Apply(patch) => {
                let updated = Lead {
                    message_count: patch.message_count.unwrap_or(lead.message_count),
                    last_sent_at: patch.last_sent_at.or(lead.last_sent_at),
                    next_scheduled_for: patch
                        .next_scheduled_for
                        .unwrap_or(lead.next_scheduled_for),
                    status: patch.status.unwrap_or(lead.status.clone()),
                    ..lead
                };
                leads.insert(id, updated.clone());
                Ok(AdvanceOutcome::Committed(updated))
            }
        }
    }

    async fn count_sent_on(&self, day: NaiveDate) -> Result<i64> {
        let leads = self.leads.lock().await;
        Ok(leads
            .values()
            .filter(|l| {
                l.last_sent_at
                    .map(|t| t.date_naive() == day)
                    .unwrap_or(false)
            })
            .count() as i64)
    }
}
