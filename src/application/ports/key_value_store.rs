use crate::shared::error::StoreError;
use async_trait::async_trait;

/// Durable string-keyed record store. Callers serialize/deserialize JSON and
/// are responsible for catching write failures; durability is best effort and
/// the system stays correct (memory-only) when persistence is unavailable.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}
