//! blobtable library for recording blob change notifications in a table store.
//!
//! Each notification event is mapped onto one flat record, keyed by the storage
//! account the event came from and the event id, and inserted into a table that is
//! created on first use.

use anyhow::Result;
use log::LevelFilter;
use std::borrow::Cow;

pub mod config;
pub mod dynamo;
pub mod error;
pub mod event;
pub mod ingest;
pub mod record;
pub mod store;

pub use config::{Config, ConnectionDescriptor};
pub use dynamo::DynamoStore;
pub use error::IngestError;
pub use event::{BlobChangePayload, NotificationEvent};
pub use ingest::Ingestor;
pub use record::StoredRecord;
pub use store::{MemoryStore, TableStore};

pub const APP_NAME: &str = "blobtable";

/// Sets up logging to stdout.
///
/// Everything logs at `Warn`; this crate and `calling_module` log at `Info`, or
/// `Debug` when `verbose` is set.
///
/// # Errors
/// * Returns error if a logger has already been installed
pub fn set_up_logger<T>(calling_module: T, verbose: bool) -> Result<()>
where
    T: Into<Cow<'static, str>>,
{
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{}][{}][{}] {}",
                chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ"),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(LevelFilter::Warn)
        .level_for(APP_NAME, level)
        .level_for(calling_module, level)
        .chain(std::io::stdout())
        .apply()?;

    Ok(())
}
