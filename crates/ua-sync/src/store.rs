//! Interface to the browser's persistent key-value store

use async_trait::async_trait;
use serde_json::{Map, Value};
use ua_core::config::{ConfigSnapshot, CONFIG_KEYS};

/// Storage area the configuration lives in.
pub const LOCAL_AREA: &str = "local";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("Storage call failed: {0}")]
    Host(String),
    #[error("Could not encode {key}: {reason}")]
    Encode { key: String, reason: String },
}

/// A change notification from the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageChange {
    pub changed_keys: Vec<String>,
    pub area: String,
}

impl StorageChange {
    pub fn new<I, K>(area: &str, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        Self {
            changed_keys: keys.into_iter().map(Into::into).collect(),
            area: area.to_string(),
        }
    }

    /// Change in the local area.
    pub fn local<I, K>(keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        Self::new(LOCAL_AREA, keys)
    }

    pub fn touches(&self, key: &str) -> bool {
        self.changed_keys.iter().any(|k| k == key)
    }
}

/// Async key-value store. Change notifications are delivered by the host
/// and fed to the coordinator separately.
#[async_trait(?Send)]
pub trait ConfigStore {
    /// Values for the requested keys; absent keys are simply missing.
    async fn get(&self, keys: &[&str]) -> Result<Map<String, Value>, StoreError>;

    /// Merge `values` into the store.
    async fn set(&self, values: Map<String, Value>) -> Result<(), StoreError>;
}

/// Read every key rule computation needs.
pub async fn load_snapshot<S: ConfigStore + ?Sized>(store: &S) -> Result<ConfigSnapshot, StoreError> {
    let values = store.get(&CONFIG_KEYS).await?;
    Ok(ConfigSnapshot::from_map(&values))
}
