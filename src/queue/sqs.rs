use async_trait::async_trait;
use aws_sdk_sqs::types::MessageSystemAttributeName;
use aws_sdk_sqs::Client;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;

use super::{MessageQueue, QueueMessage};
use crate::error::{HyperdripError, Result};

/// Production `MessageQueue`, backed by AWS SQS. Grounded in the pack's
/// `flowcatalyst` workspace, which depends on `aws-sdk-sqs`/`aws-config`
/// directly for its production queue backend — spec.md's named,
/// date-partitioned, visibility-timeout, archive-as-delete contract is SQS's
/// contract.
///
/// SQS addresses queues by URL, not name, so this caches the name→URL
/// mapping resolved by `create`/`get_queue_url` for the lifetime of the
/// process.
pub struct SqsMessageQueue {
    client: Client,
    queue_urls: Mutex<HashMap<String, String>>,
}

impl SqsMessageQueue {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            queue_urls: Mutex::new(HashMap::new()),
        }
    }

    pub async fn from_env() -> Self {
        let config = aws_config::load_from_env().await;
        Self::new(Client::new(&config))
    }

    async fn resolve_url(&self, name: &str) -> Result<String> {
        if let Some(url) = self.queue_urls.lock().await.get(name) {
            return Ok(url.clone());
        }

        let resolved = self
            .client
            .get_queue_url()
            .queue_name(name)
            .send()
            .await
            .map_err(|e| HyperdripError::TransientQueueError(e.to_string()))?
            .queue_url
            .ok_or_else(|| HyperdripError::TransientQueueError("queue url missing in response".into()))?;

        self.queue_urls
            .lock()
            .await
            .insert(name.to_string(), resolved.clone());
        Ok(resolved)
    }
}

#[async_trait]
impl MessageQueue for SqsMessageQueue {
    async fn create(&self, name: &str) -> Result<()> {
        // create_queue on an already-existing queue (same attributes) is a
        // no-op success per the SQS API contract, matching spec.md's
        // idempotence requirement directly.
        let output = self
            .client
            .create_queue()
            .queue_name(name)
            .send()
            .await
            .map_err(|e| HyperdripError::TransientQueueError(e.to_string()))?;

        if let Some(url) = output.queue_url {
            self.queue_urls.lock().await.insert(name.to_string(), url);
        }
        Ok(())
    }

    async fn drop_queue(&self, name: &str) -> Result<()> {
        let url = match self.resolve_url(name).await {
            Ok(url) => url,
            // Unresolvable name is equivalent to "already gone" for an
            // idempotent drop.
            Err(_) => return Ok(()),
        };

        match self.client.delete_queue().queue_url(&url).send().await {
            Ok(_) => {
                self.queue_urls.lock().await.remove(name);
                Ok(())
            }
            Err(e) => {
                if e.as_service_error()
                    .map(|se| se.is_queue_does_not_exist())
                    .unwrap_or(false)
                {
                    self.queue_urls.lock().await.remove(name);
                    Ok(())
                } else {
                    Err(HyperdripError::TransientQueueError(e.to_string()))
                }
            }
        }
    }

    async fn send(&self, name: &str, payload: &str) -> Result<String> {
        let url = self.resolve_url(name).await?;
        let output = self
            .client
            .send_message()
            .queue_url(url)
            .message_body(payload)
            .send()
            .await
            .map_err(|e| HyperdripError::TransientQueueError(e.to_string()))?;

        output
            .message_id
            .ok_or_else(|| HyperdripError::TransientQueueError("no message id returned".into()))
    }

    async fn read(&self, name: &str, vt_secs: u32, qty: u32) -> Result<Vec<QueueMessage>> {
        let url = self.resolve_url(name).await?;
        let output = self
            .client
            .receive_message()
            .queue_url(url)
            .max_number_of_messages(qty.min(10) as i32)
            .visibility_timeout(vt_secs as i32)
            .wait_time_seconds(1)
            .message_system_attribute_names(MessageSystemAttributeName::ApproximateReceiveCount)
            .message_system_attribute_names(MessageSystemAttributeName::SentTimestamp)
            .send()
            .await
            .map_err(|e| HyperdripError::TransientQueueError(e.to_string()))?;

        let now = Utc::now();
        let mut out = Vec::new();
        for msg in output.messages.unwrap_or_default() {
            // The receipt handle, not the SendMessage-time message id, is
            // what `archive` (DeleteMessage) needs — this is what travels as
            // `msg_id` for entries obtained through `read`.
            let Some(receipt_handle) = msg.receipt_handle else {
                continue;
            };
            let attrs = msg.attributes.unwrap_or_default();
            let read_count = attrs
                .get(&MessageSystemAttributeName::ApproximateReceiveCount)
                .and_then(|v| v.parse().ok())
                .unwrap_or(1);
            let enqueued_at = attrs
                .get(&MessageSystemAttributeName::SentTimestamp)
                .and_then(|v| v.parse::<i64>().ok())
                .and_then(|ms| DateTime::from_timestamp_millis(ms))
                .unwrap_or(now);

            out.push(QueueMessage {
                msg_id: receipt_handle,
                read_count,
                enqueued_at,
                visible_at: now + chrono::Duration::seconds(vt_secs as i64),
                payload: msg.body.unwrap_or_default(),
            });
        }
        Ok(out)
    }

    async fn archive(&self, name: &str, msg_id: &str) -> Result<()> {
        let url = self.resolve_url(name).await?;
        self.client
            .delete_message()
            .queue_url(url)
            .receipt_handle(msg_id)
            .send()
            .await
            // DeleteMessage on an already-deleted or expired receipt handle
            // is itself idempotent-success in SQS; any real failure here is
            // transient (network, throttling) and should not crash the
            // caller's per-entry processing.
            .map(|_| ())
            .map_err(|e| HyperdripError::TransientQueueError(e.to_string()))
    }
}
