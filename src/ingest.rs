use crate::config::Config;
use crate::dynamo::DynamoStore;
use crate::error::IngestError;
use crate::event::NotificationEvent;
use crate::record::StoredRecord;
use crate::store::TableStore;
use log::{debug, error, info};
use std::sync::atomic::{AtomicBool, Ordering};

/// Stores notification events as rows in a single table.
///
/// Once the table is known to exist the ingestor stops asking the store about it.
#[derive(Debug)]
pub struct Ingestor<S> {
    store: S,
    table_name: String,
    table_ready: AtomicBool,
}

impl Ingestor<DynamoStore> {
    /// Builds an ingestor against DynamoDB.
    ///
    /// # Errors
    /// * Returns `ConfigurationMissing` before any client is built if the connection
    ///   descriptor is absent or unusable
    pub async fn connect(config: &Config) -> Result<Self, IngestError> {
        let descriptor = config.connection_descriptor()?;
        let store = DynamoStore::connect(&descriptor).await;

        Ok(Ingestor::new(store, config.table_name.clone()))
    }
}

impl<S> Ingestor<S>
where
    S: TableStore + Sync,
{
    pub fn new(store: S, table_name: impl Into<String>) -> Self {
        Ingestor {
            store,
            table_name: table_name.into(),
            table_ready: AtomicBool::new(false),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Makes sure the target table exists. Safe to call any number of times.
    pub async fn ensure_table(&self) -> Result<(), IngestError> {
        if self.table_ready.load(Ordering::Acquire) {
            return Ok(());
        }

        if self
            .store
            .create_table_if_not_exists(&self.table_name)
            .await?
        {
            info!("Created table: {}", self.table_name);
        }
        self.table_ready.store(true, Ordering::Release);

        Ok(())
    }

    /// Writes one record for `event`.
    ///
    /// The payload is parsed before the store is touched, so a malformed event never
    /// reaches the backend. The insert is attempted exactly once.
    pub async fn ingest(&self, event: &NotificationEvent) -> Result<(), IngestError> {
        debug!("Event: {event:?}");

        let payload = event.payload()?;
        let record = StoredRecord::new(event, payload)?;

        self.ensure_table().await?;
        self.store.insert(&self.table_name, &record).await?;

        info!(
            "Stored event {} as {}:{} in {}",
            event.id, record.partition_key, record.row_key, self.table_name
        );

        Ok(())
    }

    /// Like [`Ingestor::ingest`], but reports only whether the event was stored.
    pub async fn ingest_or_log(&self, event: &NotificationEvent) -> bool {
        match self.ingest(event).await {
            Ok(()) => true,
            Err(e) => {
                error!("Failed to store event {} ({}): {e}", event.id, e.kind());
                false
            }
        }
    }
}
