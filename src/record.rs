use crate::error::IngestError;
use crate::event::{BlobChangePayload, NotificationEvent};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// One row in the event table, addressed by `(partition_key, row_key)`.
///
/// Records are written once and never updated.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct StoredRecord {
    pub partition_key: String,
    pub row_key: String,
    pub topic: String,
    pub subject: String,
    pub event_type: String,
    pub event_time: Option<DateTime<Utc>>,
    #[serde(rename = "CustomerHexId")]
    pub customer_id: String,
    pub api: String,
    pub client_request_id: Option<String>,
    pub request_id: Option<String>,
    pub etag: String,
    pub content_type: Option<String>,
    pub content_length: u64,
    pub blob_type: String,
    pub url: String,
}

impl StoredRecord {
    /// Maps an event and its parsed payload onto a record.
    ///
    /// # Errors
    /// * Returns `MalformedPayload` if either key cannot be derived from the event
    pub fn new(event: &NotificationEvent, payload: BlobChangePayload) -> Result<Self, IngestError> {
        Ok(StoredRecord {
            partition_key: event.partition_key()?.to_string(),
            row_key: event.row_key()?.to_string(),
            topic: event.topic.clone(),
            subject: event.subject.clone(),
            event_type: event.event_type.clone(),
            event_time: event.event_time,
            // TODO: resolve the customer id from the storage account name once a lookup exists
            customer_id: event.topic.clone(),
            api: payload.api,
            client_request_id: payload.client_request_id,
            request_id: None,
            etag: payload.etag,
            content_type: payload.content_type,
            content_length: payload.content_length,
            blob_type: payload.blob_type,
            url: payload.url,
        })
    }
}
