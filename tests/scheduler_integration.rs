use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use hyperdrip::models::lead::CreateLeadRequest;
use hyperdrip::models::queue_entry::queue_name_for;
use hyperdrip::queue::InMemoryMessageQueue;
use hyperdrip::scheduler::Scheduler;
use hyperdrip::store::InMemoryLeadStore;
use hyperdrip::worker::{LoggingTransport, Worker, WorkerHandle};

/// Admits a lead whose single message lands in today's queue, runs the
/// worker until it has drained that entry, then stops it — exercising
/// admission (§4.D) and the drain path (§4.E) end to end against the
/// in-memory doubles.
#[tokio::test]
async fn admitted_single_message_lead_is_drained_and_completed() {
    let store = Arc::new(InMemoryLeadStore::new());
    let queue = Arc::new(InMemoryMessageQueue::new());

    let lead_id = {
        let scheduler = Scheduler::new(store.as_ref(), queue.as_ref(), 100, 30, true);
        scheduler
            .admit(CreateLeadRequest {
                email: "drain@example.com".into(),
                phone: "5557654321".into(),
                name: "Drain".into(),
                notes: None,
                max_messages: 1,
            })
            .await
            .unwrap()
    };

    let worker = Arc::new(Worker::new(
        store.clone(),
        queue.clone(),
        Arc::new(LoggingTransport),
        true,
        30,
        Duration::from_millis(5),
        Duration::from_millis(1),
    ));
    let (handle, stop_rx) = WorkerHandle::new();

    let run_handle = tokio::spawn({
        let worker = worker.clone();
        async move { worker.run(stop_rx).await }
    });

    // Give the worker a few poll cycles to pick up and drain the one entry,
    // then signal it to stop and wait for it to unwind.
    tokio::time::sleep(Duration::from_millis(50)).await;
    handle.stop();
    run_handle.await.unwrap();

    let today_name = queue_name_for(Utc::now().date_naive(), true);
    let remaining = queue.read(&today_name, 30, 10).await.unwrap();
    assert!(remaining.is_empty(), "today's queue should be drained");

    let lead = store.get(lead_id).await.unwrap().unwrap();
    assert_eq!(lead.message_count, 1);
    assert_eq!(lead.status, "completed");
    assert!(lead.next_scheduled_for.is_none());
}

/// A lead whose admission would overflow the daily cap still gets a durable
/// lead row and its messages, just pushed to a later day (spec.md §4.D).
#[tokio::test]
async fn capacity_constrained_admission_still_creates_the_lead() {
    let store = Arc::new(InMemoryLeadStore::new());
    let queue = Arc::new(InMemoryMessageQueue::new());
    let scheduler = Scheduler::new(store.as_ref(), queue.as_ref(), 1, 5, true);

    let lead_id = scheduler
        .admit(CreateLeadRequest {
            email: "capped@example.com".into(),
            phone: "5550001111".into(),
            name: "Capped".into(),
            notes: None,
            max_messages: 2,
        })
        .await
        .unwrap();

    let lead = store.get(lead_id).await.unwrap().unwrap();
    assert_eq!(lead.status, "active");
    assert_eq!(lead.max_messages, 2);
}
