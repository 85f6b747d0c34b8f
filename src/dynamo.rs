//! DynamoDB backed [`TableStore`].

use crate::config::ConnectionDescriptor;
use crate::error::IngestError;
use crate::record::StoredRecord;
use crate::store::TableStore;
use aws_config::ConfigLoader;
use aws_sdk_dynamodb::Client;
use aws_sdk_dynamodb::client::Waiters;
use aws_sdk_dynamodb::config::Region;
use aws_sdk_dynamodb::error::{DisplayErrorContext, SdkError};
use aws_sdk_dynamodb::operation::create_table::CreateTableError;
use aws_sdk_dynamodb::operation::describe_table::DescribeTableError;
use aws_sdk_dynamodb::operation::put_item::PutItemError;
use aws_sdk_dynamodb::types::{
    AttributeDefinition, AttributeValue, BillingMode, KeySchemaElement, KeyType,
    ScalarAttributeType, TableStatus,
};
use log::{debug, info};
use std::collections::HashMap;
use std::error::Error;
use std::time::Duration;

const PARTITION_KEY: &str = "PartitionKey";
const ROW_KEY: &str = "RowKey";

const TABLE_ACTIVE_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct DynamoStore {
    client: Client,
}

impl DynamoStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub async fn connect(descriptor: &ConnectionDescriptor) -> Self {
        debug!("Connecting to DynamoDB: {descriptor:?}");

        let mut loader = ConfigLoader::default().region(Region::new(descriptor.region.clone()));
        if let Some(endpoint_url) = &descriptor.endpoint_url {
            loader = loader.endpoint_url(endpoint_url);
        }

        Self::new(Client::new(&loader.load().await))
    }

    /// `None` if the table does not exist.
    async fn table_status(&self, table: &str) -> Result<Option<TableStatus>, IngestError> {
        match self.client.describe_table().table_name(table).send().await {
            Ok(output) => Ok(Some(
                output
                    .table()
                    .and_then(|t| t.table_status())
                    .cloned()
                    .unwrap_or_else(|| TableStatus::from("UNKNOWN")),
            )),
            Err(SdkError::ServiceError(e))
                if matches!(e.err(), DescribeTableError::ResourceNotFoundException(_)) =>
            {
                Ok(None)
            }
            Err(e) => Err(unavailable("DescribeTable", table, e)),
        }
    }

    async fn wait_until_active(&self, table: &str) -> Result<(), IngestError> {
        self.client
            .wait_until_table_exists()
            .table_name(table)
            .wait(TABLE_ACTIVE_TIMEOUT)
            .await
            .map_err(|e| unavailable("DescribeTable", table, e))?;

        Ok(())
    }

    async fn create_table(&self, table: &str) -> Result<bool, IngestError> {
        let key_schema = vec![
            key_schema_element(PARTITION_KEY, KeyType::Hash)?,
            key_schema_element(ROW_KEY, KeyType::Range)?,
        ];
        let attribute_definitions = vec![
            string_attribute(PARTITION_KEY)?,
            string_attribute(ROW_KEY)?,
        ];

        let created = match self
            .client
            .create_table()
            .table_name(table)
            .set_key_schema(Some(key_schema))
            .set_attribute_definitions(Some(attribute_definitions))
            .billing_mode(BillingMode::PayPerRequest)
            .send()
            .await
        {
            Ok(_) => true,
            Err(SdkError::ServiceError(e))
                if matches!(e.err(), CreateTableError::ResourceInUseException(_)) =>
            {
                debug!("Table created concurrently: {table}");
                false
            }
            Err(e) => return Err(unavailable("CreateTable", table, e)),
        };

        self.wait_until_active(table).await?;

        Ok(created)
    }
}

impl TableStore for DynamoStore {
    async fn create_table_if_not_exists(&self, table: &str) -> Result<bool, IngestError> {
        match self.table_status(table).await? {
            Some(TableStatus::Active) => {
                debug!("Table already exists: {table}");
                return Ok(false);
            }
            Some(status) => {
                debug!("Table {table} is {status:?}, waiting until active");
                self.wait_until_active(table).await?;
                return Ok(false);
            }
            None => {}
        }

        let created = self.create_table(table).await?;
        if created {
            info!("Created table: {table}");
        }

        Ok(created)
    }

    async fn insert(&self, table: &str, record: &StoredRecord) -> Result<(), IngestError> {
        debug!(
            "Put Item: {table} <-- {}:{}",
            record.partition_key, record.row_key
        );

        self.client
            .put_item()
            .table_name(table)
            .set_item(Some(record_to_item(record)))
            .condition_expression(format!("attribute_not_exists({PARTITION_KEY})"))
            .send()
            .await
            .map_err(|e| map_put_item_error(e, table, record))?;

        Ok(())
    }
}

fn key_schema_element(name: &str, key_type: KeyType) -> Result<KeySchemaElement, IngestError> {
    KeySchemaElement::builder()
        .attribute_name(name)
        .key_type(key_type)
        .build()
        .map_err(|e| IngestError::BackendUnavailable(e.to_string()))
}

fn string_attribute(name: &str) -> Result<AttributeDefinition, IngestError> {
    AttributeDefinition::builder()
        .attribute_name(name)
        .attribute_type(ScalarAttributeType::S)
        .build()
        .map_err(|e| IngestError::BackendUnavailable(e.to_string()))
}

fn unavailable<E: Error>(operation: &str, table: &str, e: E) -> IngestError {
    IngestError::BackendUnavailable(format!(
        "{operation} failed for {table}: {}",
        DisplayErrorContext(e)
    ))
}

fn map_put_item_error<R>(
    err: SdkError<PutItemError, R>,
    table: &str,
    record: &StoredRecord,
) -> IngestError
where
    R: std::fmt::Debug + Send + Sync + 'static,
{
    match err {
        SdkError::ServiceError(e) => classify_put_item_error(
            e.into_err(),
            &format!("{table} <-- {}:{}", record.partition_key, record.row_key),
        ),
        err => unavailable("PutItem", table, err),
    }
}

/// Throttling, server faults and a table that is not (yet) there mean the backend
/// is unavailable. Any other service error is the backend declining this write.
fn classify_put_item_error(err: PutItemError, key: &str) -> IngestError {
    match err {
        PutItemError::ConditionalCheckFailedException(_) => {
            IngestError::InsertRejected(format!("record already exists: {key}"))
        }
        PutItemError::ResourceNotFoundException(_)
        | PutItemError::ProvisionedThroughputExceededException(_)
        | PutItemError::RequestLimitExceeded(_)
        | PutItemError::InternalServerError(_) => IngestError::BackendUnavailable(format!(
            "PutItem failed for {key}: {}",
            DisplayErrorContext(err)
        )),
        err => IngestError::InsertRejected(format!(
            "PutItem failed for {key}: {}",
            DisplayErrorContext(err)
        )),
    }
}

fn string_or_null(value: Option<&str>) -> AttributeValue {
    match value {
        Some(s) => AttributeValue::S(s.to_string()),
        None => AttributeValue::Null(true),
    }
}

/// Converts a record into a DynamoDB item.
pub fn record_to_item(record: &StoredRecord) -> HashMap<String, AttributeValue> {
    let event_time = record.event_time.map(|t| t.to_rfc3339());

    HashMap::from([
        (
            PARTITION_KEY.to_string(),
            AttributeValue::S(record.partition_key.clone()),
        ),
        (ROW_KEY.to_string(), AttributeValue::S(record.row_key.clone())),
        ("Topic".to_string(), AttributeValue::S(record.topic.clone())),
        ("Subject".to_string(), AttributeValue::S(record.subject.clone())),
        (
            "EventType".to_string(),
            AttributeValue::S(record.event_type.clone()),
        ),
        ("EventTime".to_string(), string_or_null(event_time.as_deref())),
        (
            "CustomerHexId".to_string(),
            AttributeValue::S(record.customer_id.clone()),
        ),
        ("Api".to_string(), AttributeValue::S(record.api.clone())),
        (
            "ClientRequestId".to_string(),
            string_or_null(record.client_request_id.as_deref()),
        ),
        (
            "RequestId".to_string(),
            string_or_null(record.request_id.as_deref()),
        ),
        ("Etag".to_string(), AttributeValue::S(record.etag.clone())),
        (
            "ContentType".to_string(),
            string_or_null(record.content_type.as_deref()),
        ),
        (
            "ContentLength".to_string(),
            AttributeValue::N(record.content_length.to_string()),
        ),
        ("BlobType".to_string(), AttributeValue::S(record.blob_type.clone())),
        ("Url".to_string(), AttributeValue::S(record.url.clone())),
    ])
}
