//! The table store seam and an in-memory implementation of it.

use crate::error::IngestError;
use crate::record::StoredRecord;
use log::debug;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A key-value table store that holds [`StoredRecord`]s.
pub trait TableStore {
    /// Creates `table` unless it already exists. Returns `true` if this call created it.
    fn create_table_if_not_exists(
        &self,
        table: &str,
    ) -> impl Future<Output = Result<bool, IngestError>> + Send;

    /// Inserts `record`; an existing record under the same keys is never overwritten.
    fn insert(
        &self,
        table: &str,
        record: &StoredRecord,
    ) -> impl Future<Output = Result<(), IngestError>> + Send;
}

type Rows = HashMap<(String, String), StoredRecord>;

/// Keeps tables in process memory. Used for dry runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<HashMap<String, Rows>>,
    tables_created: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, table: &str, partition_key: &str, row_key: &str) -> Option<StoredRecord> {
        let tables = self.tables.lock().ok()?;
        tables
            .get(table)?
            .get(&(partition_key.to_string(), row_key.to_string()))
            .cloned()
    }

    pub fn len(&self, table: &str) -> usize {
        self.tables
            .lock()
            .map(|t| t.get(table).map_or(0, HashMap::len))
            .unwrap_or(0)
    }

    /// Number of tables actually created, not counting calls that found one in place.
    pub fn tables_created(&self) -> usize {
        self.tables_created.load(Ordering::SeqCst)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Rows>>, IngestError> {
        self.tables
            .lock()
            .map_err(|e| IngestError::BackendUnavailable(format!("memory store poisoned: {e}")))
    }
}

impl TableStore for MemoryStore {
    async fn create_table_if_not_exists(&self, table: &str) -> Result<bool, IngestError> {
        let mut tables = self.lock()?;
        if tables.contains_key(table) {
            debug!("Table already exists: {table}");
            return Ok(false);
        }

        tables.insert(table.to_string(), HashMap::new());
        self.tables_created.fetch_add(1, Ordering::SeqCst);

        Ok(true)
    }

    async fn insert(&self, table: &str, record: &StoredRecord) -> Result<(), IngestError> {
        let mut tables = self.lock()?;
        let rows = tables
            .get_mut(table)
            .ok_or_else(|| IngestError::InsertRejected(format!("table not found: {table}")))?;

        let key = (record.partition_key.clone(), record.row_key.clone());
        if rows.contains_key(&key) {
            return Err(IngestError::InsertRejected(format!(
                "record already exists: {}:{}",
                key.0, key.1
            )));
        }

        rows.insert(key, record.clone());

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::event::NotificationEvent;
    use crate::event::test::TEST_EVENT;
    use anyhow::Result;

    fn test_record() -> Result<StoredRecord> {
        let event: NotificationEvent = serde_json::from_str(TEST_EVENT)?;
        Ok(StoredRecord::new(&event, event.payload()?)?)
    }

    #[tokio::test]
    async fn test_create_table_idempotent() -> Result<()> {
        let store = MemoryStore::new();

        assert!(store.create_table_if_not_exists("events").await?);
        assert!(!store.create_table_if_not_exists("events").await?);
        assert_eq!(1, store.tables_created());

        Ok(())
    }

    #[tokio::test]
    async fn test_insert_and_get() -> Result<()> {
        let store = MemoryStore::new();
        let record = test_record()?;

        store.create_table_if_not_exists("events").await?;
        store.insert("events", &record).await?;

        let stored = store.get("events", &record.partition_key, &record.row_key);
        assert_eq!(Some(record), stored);
        assert_eq!(1, store.len("events"));

        Ok(())
    }

    #[tokio::test]
    async fn test_insert_duplicate() -> Result<()> {
        let store = MemoryStore::new();
        let record = test_record()?;

        store.create_table_if_not_exists("events").await?;
        store.insert("events", &record).await?;

        let res = store.insert("events", &record).await;
        assert!(res.is_err());
        if let Err(e) = res {
            assert_eq!("InsertRejected", e.kind());
            assert!(e.to_string().contains("already exists"));
        }
        assert_eq!(1, store.len("events"));

        Ok(())
    }

    #[tokio::test]
    async fn test_insert_no_table() -> Result<()> {
        let store = MemoryStore::new();

        let res = store.insert("events", &test_record()?).await;
        assert!(res.is_err());
        if let Err(e) = res {
            assert!(e.to_string().contains("table not found"));
        }

        Ok(())
    }
}
