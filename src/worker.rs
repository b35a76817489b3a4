use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::watch;
use uuid::Uuid;

use crate::error::Result;
use crate::models::lead::LeadStatus;
use crate::models::queue_entry::{queue_name_for, QueueEntryPayload};
use crate::queue::{MessageQueue, QueueMessage};
use crate::store::{Advance, AdvanceOutcome, LeadPatch, LeadStore};

/// A pluggable side effect for "send message `message_number` to `email`"
/// (spec.md §1: "an opaque side effect that either succeeds or fails").
/// Modeled as an `async_trait` the same way `LeadStore`/`MessageQueue` are,
/// so a real deployment substitutes an SMTP/SMS transport (e.g. the
/// teacher's `lettre`-based `EmailSender`) without touching `Worker`.
#[async_trait]
pub trait MessageTransport: Send + Sync {
    async fn send(&self, email: &str, message_number: i32) -> std::result::Result<(), String>;
}

/// Default transport: logs the send and always succeeds. This is the
/// "canonical implementation" spec.md §1 describes the transport as.
pub struct LoggingTransport;

#[async_trait]
impl MessageTransport for LoggingTransport {
    async fn send(&self, email: &str, message_number: i32) -> std::result::Result<(), String> {
        tracing::info!(%email, message_number, "sent message");
        Ok(())
    }
}

/// The drain-path service: polls today's day-queue, advances each lead's
/// monotonic counter under a per-lead transaction, and archives queue
/// entries only after the state advance commits.
///
/// Grounded on the teacher's `JobWorker::run` / `bin/worker.rs`'s iteration
/// loop (claim batch → process each → mark completed/failed → sleep),
/// generalized from the teacher's retry-count-driven job status machine to
/// the counter-based case analysis spec.md §4.E requires.
pub struct Worker<S: LeadStore, Q: MessageQueue> {
    store: Arc<S>,
    queue: Arc<Q>,
    transport: Arc<dyn MessageTransport>,
    test_mode: bool,
    vt_secs: u32,
    poll_interval: StdDuration,
    message_delay: StdDuration,
    running: AtomicBool,
}

impl<S: LeadStore, Q: MessageQueue> Worker<S, Q> {
    pub fn new(
        store: Arc<S>,
        queue: Arc<Q>,
        transport: Arc<dyn MessageTransport>,
        test_mode: bool,
        vt_secs: u32,
        poll_interval: StdDuration,
        message_delay: StdDuration,
    ) -> Self {
        Self {
            store,
            queue,
            transport,
            test_mode,
            vt_secs,
            poll_interval,
            message_delay,
            running: AtomicBool::new(false),
        }
    }

    /// Runs the poll loop until `stop_rx` observes a shutdown signal.
    /// Concurrent `run` invocations are rejected: `start while starting` is a
    /// no-op, matching the "single worker struct, reject concurrent start"
    /// design note in spec.md §9.
    pub async fn run(&self, mut stop_rx: watch::Receiver<bool>) {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::warn!("worker already running, ignoring duplicate start");
            return;
        }

        let mut current_day = Utc::now().date_naive();
        let today_name = queue_name_for(current_day, self.test_mode);
        if let Err(e) = self.queue.create(&today_name).await {
            tracing::warn!(error = %e, queue = %today_name, "failed to ensure today's queue exists at startup");
        }
        tracing::info!(queue = %today_name, "worker started");

        loop {
            if *stop_rx.borrow() {
                break;
            }

            let day = Utc::now().date_naive();
            let today_name = queue_name_for(day, self.test_mode);
            if day != current_day {
                current_day = day;
                if let Err(e) = self.queue.create(&today_name).await {
                    tracing::warn!(error = %e, queue = %today_name, "failed to ensure today's queue exists after day rollover");
                }
            }
            let batch = match self.queue.read(&today_name, self.vt_secs, 1).await {
                Ok(batch) => batch,
                Err(e) => {
                    tracing::warn!(error = %e, "read failed, retrying next poll");
                    Vec::new()
                }
            };

            if batch.is_empty() {
                if wait_or_stop(self.poll_interval, &mut stop_rx).await {
                    break;
                }
                continue;
            }

            for entry in batch {
                if *stop_rx.borrow() {
                    break;
                }
                self.process_entry(&today_name, entry).await;
                if wait_or_stop(self.message_delay, &mut stop_rx).await {
                    break;
                }
            }
        }

        self.running.store(false, Ordering::SeqCst);
        tracing::info!("worker stopped");
    }

    /// Processes a single leased queue entry per spec.md §4.E's case
    /// analysis. Archives only after a commit; on any transient failure
    /// neither commits nor archives, relying on the entry's visibility lease
    /// to expire and redeliver it.
    async fn process_entry(&self, queue_name: &str, entry: QueueMessage) {
        let payload: QueueEntryPayload = match serde_json::from_str(&entry.payload) {
            Ok(p) => p,
            Err(e) => {
                // Malformed payload can never be processed; archive it so it
                // does not loop forever, same treatment as an orphaned lead.
                tracing::error!(error = %e, msg_id = %entry.msg_id, "unparseable queue payload, archiving");
                let _ = self.queue.archive(queue_name, &entry.msg_id).await;
                return;
            }
        };

        match self.advance(&payload).await {
            Ok(Archived::Yes) => {
                if let Err(e) = self.queue.archive(queue_name, &entry.msg_id).await {
                    tracing::warn!(error = %e, lead_id = %payload.lead_id, "archive failed, entry will be redelivered");
                }
            }
            Ok(Archived::No) => {
                // Transient store failure: do not archive. Visibility
                // timeout will redeliver (spec.md §4.E step 4, §7).
                tracing::warn!(lead_id = %payload.lead_id, "advance failed transiently, leaving entry for redelivery");
            }
            Err(e) => {
                tracing::warn!(lead_id = %payload.lead_id, error = %e, "advance failed transiently, leaving entry for redelivery");
            }
        }
    }

    /// Runs the three-way case analysis of spec.md §4.E step 3 and returns
    /// whether the entry should be archived.
    ///
    /// The send effect runs *inside* the closure passed to
    /// `update_in_transaction` — while the per-lead row lock is held and
    /// before the patch commits — so a crash between send and commit only
    /// ever produces a harmless duplicate send on redelivery, never a commit
    /// whose send never happened (spec.md §4.E: perform the effect, update
    /// the lead, commit, then archive).
    async fn advance(&self, payload: &QueueEntryPayload) -> Result<Archived> {
        let m = payload.message_number;
        let transport = self.transport.clone();
        let email = payload.email.clone();

        let outcome = self
            .store
            .update_in_transaction(payload.lead_id, move |lead| {
                let transport = transport.clone();
                let email = email.clone();
                async move {
                    let c = lead.message_count;
                    if c >= m {
                        // Already processed: redundant retry or duplicate enqueue.
                        return Advance::NoOp;
                    }
                    if c < m - 1 {
                        // Out of order: a later message arrived before its
                        // predecessor. The worker never synthesizes the
                        // missing tail (spec.md §4.E case 3).
                        return Advance::NoOp;
                    }

                    // c == m - 1, the expected case.
                    if let Err(e) = transport.send(&email, m).await {
                        return Advance::Abort(e);
                    }

                    let new_count = c + 1;
                    let status = if new_count == lead.max_messages {
                        LeadStatus::Completed
                    } else {
                        LeadStatus::Active
                    };
                    let next_scheduled_for = if new_count == lead.max_messages {
                        None
                    } else {
                        Some(Utc::now().date_naive() + chrono::Duration::days(1))
                    };
                    Advance::Apply(LeadPatch {
                        message_count: Some(new_count),
                        last_sent_at: Some(Utc::now()),
                        next_scheduled_for: Some(next_scheduled_for),
                        status: Some(status.as_str().to_string()),
                    })
                }
            })
            .await?;

        match outcome {
            // Lead absent: orphaned entry, archive without effect
            // (spec.md §4.E step 2).
            AdvanceOutcome::LeadMissing => Ok(Archived::Yes),
            // Committed, whether a no-op (redundant/out-of-order) or an
            // applied advance — either way the send already happened (or
            // was correctly skipped) before this commit, so the entry is
            // done.
            AdvanceOutcome::Committed(_) => Ok(Archived::Yes),
            // The send effect failed; the transaction rolled back, so the
            // counter did not move. Leave the entry for redelivery
            // (spec.md §4.E step 4, §7).
            AdvanceOutcome::Aborted(reason) => {
                tracing::warn!(lead_id = %payload.lead_id, error = %reason, "send effect failed, leaving entry for redelivery");
                Ok(Archived::No)
            }
        }
    }
}

enum Archived {
    Yes,
    No,
}

/// Sleeps for `dur` unless `stop_rx` flips to `true` first. Returns whether
/// a stop was observed.
async fn wait_or_stop(dur: StdDuration, stop_rx: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(dur) => false,
        _ = stop_rx.changed() => *stop_rx.borrow(),
    }
}

/// Per-process cooperative shutdown signal: `stop()` sets it, `run` observes
/// it between poll iterations and between per-entry processing.
pub struct WorkerHandle {
    stop_tx: watch::Sender<bool>,
}

impl WorkerHandle {
    pub fn new() -> (Self, watch::Receiver<bool>) {
        let (tx, rx) = watch::channel(false);
        (Self { stop_tx: tx }, rx)
    }

    /// Idempotent: stopping an already-stopped worker is a no-op.
    pub fn stop(&self) {
        let _ = self.stop_tx.send(true);
    }
}
