use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{MessageQueue, QueueMessage};
use crate::error::Result;

#[derive(Debug, Clone)]
struct Entry {
    msg_id: String,
    payload: String,
    read_count: u32,
    enqueued_at: chrono::DateTime<Utc>,
    visible_at: chrono::DateTime<Utc>,
}

/// In-memory `MessageQueue` for tests, modeled on the visibility-timeout
/// watermark technique in the pack's `fc-queue::SqliteQueue` (a `visible_at`
/// column gating whether `read` can see a row).
#[derive(Default)]
pub struct InMemoryMessageQueue {
    queues: Mutex<HashMap<String, Vec<Entry>>>,
}

impl InMemoryMessageQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageQueue for InMemoryMessageQueue {
    async fn create(&self, name: &str) -> Result<()> {
        self.queues
            .lock()
            .await
            .entry(name.to_string())
            .or_insert_with(Vec::new);
        Ok(())
    }

    async fn drop_queue(&self, name: &str) -> Result<()> {
        self.queues.lock().await.remove(name);
        Ok(())
    }

    async fn send(&self, name: &str, payload: &str) -> Result<String> {
        let msg_id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let mut queues = self.queues.lock().await;
        queues.entry(name.to_string()).or_insert_with(Vec::new).push(Entry {
            msg_id: msg_id.clone(),
            payload: payload.to_string(),
            read_count: 0,
            enqueued_at: now,
            visible_at: now,
        });
        Ok(msg_id)
    }

    async fn read(&self, name: &str, vt_secs: u32, qty: u32) -> Result<Vec<QueueMessage>> {
        let now = Utc::now();
        let mut queues = self.queues.lock().await;
        let Some(entries) = queues.get_mut(name) else {
            return Ok(Vec::new());
        };

        let mut out = Vec::new();
        for entry in entries.iter_mut() {
            if out.len() as u32 >= qty {
                break;
            }
            if entry.visible_at > now {
                continue;
            }
            entry.read_count += 1;
            entry.visible_at = now + chrono::Duration::seconds(vt_secs as i64);
            out.push(QueueMessage {
                msg_id: entry.msg_id.clone(),
                read_count: entry.read_count,
                enqueued_at: entry.enqueued_at,
                visible_at: entry.visible_at,
                payload: entry.payload.clone(),
            });
        }
        Ok(out)
    }

    async fn archive(&self, name: &str, msg_id: &str) -> Result<()> {
        let mut queues = self.queues.lock().await;
        if let Some(entries) = queues.get_mut(name) {
            entries.retain(|e| e.msg_id != msg_id);
        }
        Ok(())
    }
}
