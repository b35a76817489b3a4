use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use hyperdrip::models::lead::Lead;
use hyperdrip::models::queue_entry::{queue_name_for, QueueEntryPayload};
use hyperdrip::queue::{InMemoryMessageQueue, MessageQueue};
use hyperdrip::store::{InMemoryLeadStore, LeadStore};
use hyperdrip::worker::{LoggingTransport, Worker, WorkerHandle};
use uuid::Uuid;

async fn run_worker_briefly(
    worker: Arc<Worker<InMemoryLeadStore, InMemoryMessageQueue>>,
    duration: Duration,
) {
    let (handle, stop_rx) = WorkerHandle::new();
    let run_handle = tokio::spawn({
        let worker = worker.clone();
        async move { worker.run(stop_rx).await }
    });
    tokio::time::sleep(duration).await;
    handle.stop();
    run_handle.await.unwrap();
}

/// A duplicate enqueue of the same message number is archived without a
/// second side effect or a second counter advance (spec.md §4.E, "already
/// processed" case), exercised here end to end through the real poll loop
/// rather than by calling the private `advance` method directly.
#[tokio::test]
async fn duplicate_enqueue_of_the_same_message_advances_once() {
    let store = Arc::new(InMemoryLeadStore::new());
    let queue = Arc::new(InMemoryMessageQueue::new());

    let lead = Lead::draft(
        Uuid::new_v4(),
        "dup-msg@example.com".into(),
        "5551230000".into(),
        "Dup".into(),
        None,
        2,
        Utc::now(),
    );
    let lead_id = store.create(lead).await.unwrap();

    let today = Utc::now().date_naive();
    let queue_name = queue_name_for(today, true);
    queue.create(&queue_name).await.unwrap();

    let payload = QueueEntryPayload {
        lead_id,
        email: "dup-msg@example.com".into(),
        message_number: 1,
        scheduled_date: today,
    };
    let body = serde_json::to_string(&payload).unwrap();
    queue.send(&queue_name, &body).await.unwrap();
    queue.send(&queue_name, &body).await.unwrap();

    let worker = Arc::new(Worker::new(
        store.clone(),
        queue.clone(),
        Arc::new(LoggingTransport),
        true,
        30,
        Duration::from_millis(5),
        Duration::from_millis(1),
    ));
    run_worker_briefly(worker, Duration::from_millis(60)).await;

    let remaining = queue.read(&queue_name, 30, 10).await.unwrap();
    assert!(remaining.is_empty(), "both entries should be archived");

    let lead = store.get(lead_id).await.unwrap().unwrap();
    assert_eq!(lead.message_count, 1, "the counter must advance exactly once");
    assert_eq!(lead.status, "active");
}

/// An unparseable queue entry is archived immediately rather than looping
/// forever, and does not disturb the lead it happens to reference.
#[tokio::test]
async fn malformed_payload_is_archived_without_panicking() {
    let store = Arc::new(InMemoryLeadStore::new());
    let queue = Arc::new(InMemoryMessageQueue::new());

    let today = Utc::now().date_naive();
    let queue_name = queue_name_for(today, true);
    queue.create(&queue_name).await.unwrap();
    queue.send(&queue_name, "not valid json").await.unwrap();

    let worker = Arc::new(Worker::new(
        store,
        queue.clone(),
        Arc::new(LoggingTransport),
        true,
        30,
        Duration::from_millis(5),
        Duration::from_millis(1),
    ));
    run_worker_briefly(worker, Duration::from_millis(40)).await;

    let remaining = queue.read(&queue_name, 30, 10).await.unwrap();
    assert!(remaining.is_empty(), "malformed entry should be archived, not retried forever");
}
