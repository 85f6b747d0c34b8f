//! Runtime configuration, read from the environment by the binaries and passed
//! into the ingestor explicitly.

use crate::error::IngestError;
use std::env;
use std::str::FromStr;

pub const CONNECTION_ENV_VAR: &str = "BLOBTABLE_CONNECTION";
pub const TABLE_ENV_VAR: &str = "BLOBTABLE_TABLE";
pub const DEFAULT_TABLE_NAME: &str = "BlobEvents";

#[derive(Debug, Clone)]
pub struct Config {
    /// Raw connection descriptor, e.g. `Region=us-west-2;EndpointUrl=http://localhost:8000`.
    pub connection: Option<String>,
    pub table_name: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            connection: None,
            table_name: DEFAULT_TABLE_NAME.to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_settings(env::var(CONNECTION_ENV_VAR).ok(), env::var(TABLE_ENV_VAR).ok())
    }

    /// Blank settings count as unset.
    pub fn from_settings(connection: Option<String>, table_name: Option<String>) -> Self {
        let non_blank = |s: String| {
            let s = s.trim().to_string();
            (!s.is_empty()).then_some(s)
        };

        Config {
            connection: connection.and_then(non_blank),
            table_name: table_name
                .and_then(non_blank)
                .unwrap_or_else(|| DEFAULT_TABLE_NAME.to_string()),
        }
    }

    /// Parses the connection descriptor.
    ///
    /// # Errors
    /// * Returns `ConfigurationMissing` if no descriptor is configured or it cannot be parsed
    pub fn connection_descriptor(&self) -> Result<ConnectionDescriptor, IngestError> {
        self.connection
            .as_deref()
            .ok_or_else(|| {
                IngestError::ConfigurationMissing(format!(
                    "{CONNECTION_ENV_VAR} is not set for table storage"
                ))
            })?
            .parse()
    }
}

/// Where the table store lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionDescriptor {
    pub region: String,
    pub endpoint_url: Option<String>,
}

impl FromStr for ConnectionDescriptor {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut region = None;
        let mut endpoint_url = None;

        for pair in s.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').ok_or_else(|| {
                IngestError::ConfigurationMissing(format!("expected Key=Value, found: '{pair}'"))
            })?;
            let value = value.trim();

            match key.trim().to_ascii_lowercase().as_str() {
                "region" if !value.is_empty() => region = Some(value.to_string()),
                "endpointurl" if !value.is_empty() => endpoint_url = Some(value.to_string()),
                _ => log::debug!("Ignoring connection setting: {}", key.trim()),
            }
        }

        let region = region.ok_or_else(|| {
            IngestError::ConfigurationMissing("Region not found in connection descriptor".into())
        })?;

        Ok(ConnectionDescriptor {
            region,
            endpoint_url,
        })
    }
}
