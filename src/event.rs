//! Inbound blob change notifications.

use crate::error::IngestError;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

/// A single blob change notification as delivered by the event broker.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationEvent {
    pub id: String,
    pub topic: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub event_type: String,
    #[serde(default)]
    pub event_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub data_version: Option<String>,
    #[serde(default)]
    pub metadata_version: Option<String>,
}

/// Storage specific metadata carried in the `data` field of a [`NotificationEvent`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobChangePayload {
    pub api: String,
    #[serde(default)]
    pub client_request_id: Option<String>,
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(rename = "eTag", alias = "etag")]
    pub etag: String,
    #[serde(default)]
    pub content_type: Option<String>,
    pub content_length: u64,
    pub blob_type: String,
    pub url: String,
    #[serde(default)]
    pub sequencer: Option<String>,
    #[serde(default)]
    pub storage_diagnostics: Option<Value>,
}

impl NotificationEvent {
    pub fn from_value(value: Value) -> Result<Self, IngestError> {
        Ok(serde_json::from_value(value)?)
    }

    /// Parses the opaque `data` blob.
    pub fn payload(&self) -> Result<BlobChangePayload, IngestError> {
        BlobChangePayload::deserialize(&self.data).map_err(|e| {
            IngestError::MalformedPayload(format!("event {} has unexpected data: {e}", self.id))
        })
    }

    /// The storage account name, i.e. the last `/` delimited segment of the topic.
    ///
    /// # Errors
    /// * Returns `MalformedPayload` if that segment is empty
    pub fn partition_key(&self) -> Result<&str, IngestError> {
        match self.topic.rsplit('/').next() {
            Some(account) if !account.is_empty() => Ok(account),
            _ => Err(IngestError::MalformedPayload(format!(
                "no storage account name in topic: '{}'",
                self.topic
            ))),
        }
    }

    pub fn row_key(&self) -> Result<&str, IngestError> {
        if self.id.is_empty() {
            Err(IngestError::MalformedPayload(format!(
                "empty event id for topic: '{}'",
                self.topic
            )))
        } else {
            Ok(&self.id)
        }
    }
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use anyhow::Result;
    use serde_json::json;

    pub(crate) const TEST_EVENT: &str = r#"{"topic":"/subscriptions/00000000-0000-0000-0000-000000000000/resourceGroups/rg/providers/Microsoft.Storage/storageAccounts/my-account","subject":"/blobServices/default/containers/uploads/blobs/HappyFace.jpg","eventType":"Microsoft.Storage.BlobCreated","eventTime":"2017-06-26T18:41:00.9584103Z","id":"831e1650-001e-001b-66ab-eeb76e069631","data":{"api":"PutBlockList","clientRequestId":"6d79dbfb-0e37-4fc4-981f-442c9ca65760","requestId":"831e1650-001e-001b-66ab-eeb76e000000","eTag":"0x8D4BCC2E4835CD0","contentType":"image/jpeg","contentLength":524288,"blobType":"BlockBlob","url":"https://my-account.blob.core.windows.net/uploads/HappyFace.jpg","sequencer":"00000000000004420000000000028963","storageDiagnostics":{"batchId":"b68529f3-68cd-4744-baa4-3c0498ec19f0"}},"dataVersion":"","metadataVersion":"1"}"#;

    #[test]
    fn test_deserialize() -> Result<()> {
        let event: NotificationEvent = serde_json::from_str(TEST_EVENT)?;

        assert_eq!("831e1650-001e-001b-66ab-eeb76e069631", event.id);
        assert_eq!("Microsoft.Storage.BlobCreated", event.event_type);
        assert!(event.event_time.is_some());
        assert_eq!(Some("1"), event.metadata_version.as_deref());

        let payload = event.payload()?;
        assert_eq!("PutBlockList", payload.api);
        assert_eq!("0x8D4BCC2E4835CD0", payload.etag);
        assert_eq!(524288, payload.content_length);
        assert_eq!(Some("image/jpeg"), payload.content_type.as_deref());
        assert_eq!(
            "https://my-account.blob.core.windows.net/uploads/HappyFace.jpg",
            payload.url
        );

        Ok(())
    }

    #[test]
    fn test_minimal_event() -> Result<()> {
        let event = NotificationEvent::from_value(json!({
            "topic": "/subscriptions/x/storageAccounts/acct1",
            "id": "evt-42",
            "data": {
                "api": "PutBlob",
                "contentLength": 1024,
                "etag": "0x1",
                "blobType": "BlockBlob",
                "url": "https://acct1.blob.core/c/f"
            }
        }))?;

        assert_eq!("", event.subject);
        assert!(event.event_time.is_none());

        let payload = event.payload()?;
        assert_eq!("0x1", payload.etag);
        assert_eq!(1024, payload.content_length);
        assert!(payload.client_request_id.is_none());

        Ok(())
    }

    #[test]
    fn test_payload_missing_field() -> Result<()> {
        let event = NotificationEvent::from_value(json!({
            "topic": "/storageAccounts/acct1",
            "id": "evt-1",
            "data": {"api": "PutBlob", "contentLength": 1, "eTag": "0x1", "blobType": "BlockBlob"}
        }))?;

        let res = event.payload();
        assert!(res.is_err());
        if let Err(e) = res {
            assert_eq!("MalformedPayload", e.kind());
            assert!(e.to_string().contains("url"));
        }

        Ok(())
    }

    #[test]
    fn test_payload_wrong_type() -> Result<()> {
        let event = NotificationEvent::from_value(json!({
            "topic": "/storageAccounts/acct1",
            "id": "evt-1",
            "data": {
                "api": "PutBlob",
                "contentLength": "big",
                "eTag": "0x1",
                "blobType": "BlockBlob",
                "url": "https://acct1.blob.core/c/f"
            }
        }))?;

        assert!(event.payload().is_err());

        Ok(())
    }

    #[test]
    fn test_payload_absent() -> Result<()> {
        let event = NotificationEvent::from_value(json!({"topic": "/a/acct1", "id": "evt-1"}))?;

        assert!(event.payload().is_err());

        Ok(())
    }

    #[test]
    fn test_event_missing_id() {
        let res = NotificationEvent::from_value(json!({"topic": "/a/acct1", "data": {}}));

        assert!(res.is_err());
        if let Err(e) = res {
            assert!(e.to_string().contains("id"));
        }
    }

    #[test]
    fn test_partition_key() -> Result<()> {
        let event: NotificationEvent = serde_json::from_str(TEST_EVENT)?;
        assert_eq!("my-account", event.partition_key()?);

        let event = NotificationEvent::from_value(json!({"topic": "acct1", "id": "evt-1"}))?;
        assert_eq!("acct1", event.partition_key()?);

        Ok(())
    }

    #[test]
    fn test_partition_key_trailing_slash() -> Result<()> {
        let event =
            NotificationEvent::from_value(json!({"topic": "/storageAccounts/", "id": "evt-1"}))?;

        let res = event.partition_key();
        assert!(res.is_err());
        if let Err(e) = res {
            assert!(e.to_string().contains("no storage account name"));
        }

        Ok(())
    }

    #[test]
    fn test_row_key_empty() -> Result<()> {
        let event = NotificationEvent::from_value(json!({"topic": "/a/acct1", "id": ""}))?;

        assert!(event.row_key().is_err());

        Ok(())
    }
}
