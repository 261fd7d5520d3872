use std::marker::PhantomData;
use std::sync::Arc;

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Map, Value};

use super::store::{Filter, RecordStore, StoreError, Table};

/// Typed access to one logical table of the record store
pub struct Repository<T> {
    table: Table,
    store: Arc<dyn RecordStore>,
    _phantom: PhantomData<T>,
}

impl<T> Repository<T>
where
    T: Serialize + DeserializeOwned + Send,
{
    pub fn new(table: Table, store: Arc<dyn RecordStore>) -> Self {
        Self {
            table,
            store,
            _phantom: PhantomData,
        }
    }

    pub async fn select_one(&self, id: &str) -> Result<Option<T>, StoreError> {
        self.store
            .get(self.table, id)
            .await?
            .map(|value| self.decode(id, value))
            .transpose()
    }

    pub async fn select_any(&self, filter: &Filter) -> Result<Vec<T>, StoreError> {
        self.store
            .query(self.table, filter)
            .await?
            .into_iter()
            .map(|value| self.decode("<query>", value))
            .collect()
    }

    pub async fn insert(&self, id: &str, record: &T) -> Result<(), StoreError> {
        let value = self.encode(id, record)?;
        self.store.put(self.table, id, value).await
    }

    /// Merge the given fields, always stamping `updated_at`.
    /// Returns the merged record or `None` when `id` is absent.
    pub async fn patch(&self, id: &str, mut fields: Map<String, Value>) -> Result<Option<T>, StoreError> {
        fields.insert("updated_at".to_string(), json!(Utc::now()));
        self.store
            .patch(self.table, id, fields)
            .await?
            .map(|value| self.decode(id, value))
            .transpose()
    }

    /// Overwrite `id` only if its `guard_field` still equals `expected`
    pub async fn replace_if(&self, id: &str, guard_field: &str, expected: Value, record: &T) -> Result<bool, StoreError> {
        let value = self.encode(id, record)?;
        self.store
            .replace_if(self.table, id, guard_field, &expected, value)
            .await
    }

    pub async fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.store.delete(self.table, id).await
    }

    fn decode(&self, id: &str, value: Value) -> Result<T, StoreError> {
        serde_json::from_value(value).map_err(|e| StoreError::InvalidRecord {
            table: self.table,
            id: id.to_string(),
            reason: e.to_string(),
        })
    }

    fn encode(&self, id: &str, record: &T) -> Result<Value, StoreError> {
        serde_json::to_value(record).map_err(|e| StoreError::InvalidRecord {
            table: self.table,
            id: id.to_string(),
            reason: e.to_string(),
        })
    }
}
