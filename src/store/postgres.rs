use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{PgPool, Row};
use std::future::Future;
use std::sync::Arc;
use uuid::Uuid;

use super::{Advance, AdvanceOutcome, LeadStore};
use crate::error::{HyperdripError, Result};
use crate::models::Lead;

/// `LeadStore` backed by Postgres via `sqlx`, in the teacher's
/// `Arc<PgPool>`-holding-service style (`CampaignScheduler`, `JobQueue`).
pub struct PostgresLeadStore {
    pool: Arc<PgPool>,
}

impl PostgresLeadStore {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LeadStore for PostgresLeadStore {
    async fn create(&self, lead: Lead) -> Result<Uuid> {
        let result = sqlx::query(
            r#"
            INSERT INTO leads (
                id, email, phone, name, notes, max_messages, message_count,
                last_sent_at, next_scheduled_for, status, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(lead.id)
        .bind(&lead.email)
        .bind(&lead.phone)
        .bind(&lead.name)
        .bind(&lead.notes)
        .bind(lead.max_messages)
        .bind(lead.message_count)
        .bind(lead.last_sent_at)
        .bind(lead.next_scheduled_for)
        .bind(&lead.status)
        .bind(lead.created_at)
        .execute(self.pool.as_ref())
        .await;

        match result {
            Ok(_) => Ok(lead.id),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(HyperdripError::DuplicateKey)
            }
            Err(e) => Err(HyperdripError::TransientStoreError(e.to_string())),
        }
    }

    async fn get(&self, id: Uuid) -> Result<Option<Lead>> {
        sqlx::query_as::<_, Lead>("SELECT * FROM leads WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool.as_ref())
            .await
            .map_err(|e| HyperdripError::TransientStoreError(e.to_string()))
    }

    async fn update_in_transaction<F, Fut>(&self, id: Uuid, f: F) -> Result<AdvanceOutcome>
    where
        F: FnOnce(Lead) -> Fut + Send,
        Fut: Future<Output = Advance> + Send,
    {
        let mut txn = self
            .pool
            .begin()
            .await
            .map_err(|e| HyperdripError::TransientStoreError(e.to_string()))?;

        // Row-level lock: a concurrent transaction on the same lead blocks
        // here until this one commits or rolls back, rather than skipping
        // the row (unlike the teacher's `FOR UPDATE SKIP LOCKED` job claim —
        // the worker needs the second transaction to observe the advanced
        // counter, not bypass it).
        let lead = sqlx::query_as::<_, Lead>("SELECT * FROM leads WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *txn)
            .await
            .map_err(|e| HyperdripError::TransientStoreError(e.to_string()))?;

        let Some(lead) = lead else {
            txn.rollback()
                .await
                .map_err(|e| HyperdripError::TransientStoreError(e.to_string()))?;
            return Ok(AdvanceOutcome::LeadMissing);
        };

        // `f` is awaited with the row lock held and the transaction still
        // open — this is where the caller's external send effect runs, so
        // it executes before the counter advance commits (spec.md §4.E:
        // perform the effect, then update, then commit).
        let advance = f(lead.clone()).await;

        match advance {
            Advance::NoOp => {
                txn.commit()
                    .await
                    .map_err(|e| HyperdripError::TransientStoreError(e.to_string()))?;
                Ok(AdvanceOutcome::Committed(lead))
            }
            Advance::Abort(reason) => {
                txn.rollback()
                    .await
                    .map_err(|e| HyperdripError::TransientStoreError(e.to_string()))?;
                Ok(AdvanceOutcome::Aborted(reason))
            }
            Advance::Apply(patch) => {
                let message_count = patch.message_count.unwrap_or(lead.message_count);
                let last_sent_at = patch.last_sent_at.or(lead.last_sent_at);
                let next_scheduled_for = patch
                    .next_scheduled_for
                    .unwrap_or(lead.next_scheduled_for);
                let status = patch.status.clone().unwrap_or_else(|| lead.status.clone());

                sqlx::query(
                    r#"
                    UPDATE leads
                    SET message_count = $2, last_sent_at = $3, next_scheduled_for = $4, status = $5
                    WHERE id = $1
                    "#,
                )
                .bind(id)
                .bind(message_count)
                .bind(last_sent_at)
                .bind(next_scheduled_for)
                .bind(&status)
                .execute(&mut *txn)
                .await
                .map_err(|e| HyperdripError::TransientStoreError(e.to_string()))?;

                txn.commit()
                    .await
                    .map_err(|e| HyperdripError::TransientStoreError(e.to_string()))?;

                Ok(AdvanceOutcome::Committed(Lead {
                    message_count,
                    last_sent_at,
                    next_scheduled_for,
                    status,
                    ..lead
                }))
            }
        }
    }

    async fn count_sent_on(&self, day: NaiveDate) -> Result<i64> {
        let start = day.and_hms_opt(0, 0, 0).unwrap().and_utc();
        let end = start + chrono::Duration::days(1);

        let row = sqlx::query(
            "SELECT COUNT(*) AS count FROM leads WHERE last_sent_at >= $1 AND last_sent_at < $2",
        )
        .bind(start)
        .bind(end)
        .fetch_one(self.pool.as_ref())
        .await
        .map_err(|e| HyperdripError::TransientStoreError(e.to_string()))?;

        Ok(row.get::<i64, _>("count"))
    }
}
