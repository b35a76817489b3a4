use std::time::Duration as StdDuration;

use chrono::Utc;

use crate::models::queue_entry::queue_name_for;
use crate::queue::MessageQueue;

/// Drops day-queues older than a retention horizon at worker startup
/// (spec.md §4.F). Grounded on the teacher's `bin/worker.rs`, which runs
/// periodic upkeep (auto-pause health checks, daily-counter resets) inline
/// in the worker process rather than as a separate service; here the sweep
/// runs once at startup instead of on an iteration counter, per spec.md.
pub struct QueueJanitor<'a, Q: MessageQueue> {
    queue: &'a Q,
    retention_days: i64,
    test_mode: bool,
}

impl<'a, Q: MessageQueue> QueueJanitor<'a, Q> {
    pub fn new(queue: &'a Q, retention_days: i64, test_mode: bool) -> Self {
        Self {
            queue,
            retention_days,
            test_mode,
        }
    }

    /// Drops every day-queue older than `today - retention_days`, bounded by
    /// `timeout`. Both the live and test-prefixed name for each day are
    /// dropped regardless of `test_mode`, since a prior run may have left
    /// either variant behind. Individual drop failures and the overall
    /// timeout are both ignored — the janitor is best-effort and idempotent,
    /// never a precondition for the worker to start (spec.md §4.F, §5).
    pub async fn sweep(&self, timeout: StdDuration) {
        let sweep = self.sweep_inner();
        if tokio::time::timeout(timeout, sweep).await.is_err() {
            tracing::warn!("janitor sweep timed out, proceeding with worker startup");
        }
    }

    async fn sweep_inner(&self) {
        let today = Utc::now().date_naive();

        // Walk backward starting at the retention boundary itself (today -
        // retention_days, inclusive); there is no lower bound on how far
        // queues might exist, so this only covers a bounded lookback window
        // rather than scanning indefinitely.
        for offset in 0..(self.retention_days * 4).max(self.retention_days) {
            let day = today - chrono::Duration::days(self.retention_days + offset);

            for name in [queue_name_for(day, false), queue_name_for(day, true)] {
                if let Err(e) = self.queue.drop_queue(&name).await {
                    tracing::debug!(queue = %name, error = %e, "janitor drop failed, ignoring");
                }
            }
        }

        // test_mode only changes which variant we log as "ours"; both are
        // always dropped above since a previous run's mode may differ.
        let _ = self.test_mode;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::InMemoryMessageQueue;

    #[tokio::test]
    async fn sweep_drops_queues_older_than_retention() {
        let queue = InMemoryMessageQueue::new();
        let today = Utc::now().date_naive();

        let old_day = today - chrono::Duration::days(10);
        let recent_day = today - chrono::Duration::days(3);

        let old_name = queue_name_for(old_day, true);
        let recent_name = queue_name_for(recent_day, true);
        queue.create(&old_name).await.unwrap();
        queue.create(&recent_name).await.unwrap();
        queue.send(&old_name, "stale").await.unwrap();
        queue.send(&recent_name, "fresh").await.unwrap();

        let janitor = QueueJanitor::new(&queue, 7, true);
        janitor.sweep(StdDuration::from_secs(1)).await;

        assert!(queue.read(&old_name, 30, 10).await.unwrap().is_empty());
        assert_eq!(queue.read(&recent_name, 30, 10).await.unwrap().len(), 1);
    }
}
