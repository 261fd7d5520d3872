use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::RwLock;

use super::store::{Filter, RecordStore, StoreError, Table};

/// In-process record store used for development and tests
#[derive(Clone, Default)]
pub struct MemoryRecordStore {
    tables: Arc<RwLock<HashMap<Table, HashMap<String, Value>>>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records currently held in `table`
    pub async fn len(&self, table: Table) -> usize {
        self.tables.read().await.get(&table).map_or(0, HashMap::len)
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn get(&self, table: Table, id: &str) -> Result<Option<Value>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.get(&table).and_then(|rows| rows.get(id)).cloned())
    }

    async fn query(&self, table: Table, filter: &Filter) -> Result<Vec<Value>, StoreError> {
        filter.validate()?;
        let mut records: Vec<Value> = {
            let tables = self.tables.read().await;
            tables
                .get(&table)
                .map(|rows| rows.values().filter(|r| filter.matches(r)).cloned().collect())
                .unwrap_or_default()
        };
        filter.apply_window(&mut records);
        Ok(records)
    }

    async fn put(&self, table: Table, id: &str, record: Value) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        tables.entry(table).or_default().insert(id.to_string(), record);
        Ok(())
    }

    async fn patch(&self, table: Table, id: &str, fields: Map<String, Value>) -> Result<Option<Value>, StoreError> {
        let mut tables = self.tables.write().await;
        let Some(existing) = tables.get_mut(&table).and_then(|rows| rows.get_mut(id)) else {
            return Ok(None);
        };
        let Value::Object(map) = &mut *existing else {
            return Err(StoreError::InvalidRecord {
                table,
                id: id.to_string(),
                reason: "stored record is not an object".to_string(),
            });
        };
        map.extend(fields);
        Ok(Some(existing.clone()))
    }

    async fn replace_if(
        &self,
        table: Table,
        id: &str,
        guard_field: &str,
        expected: &Value,
        record: Value,
    ) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        let Some(existing) = tables.get_mut(&table).and_then(|rows| rows.get_mut(id)) else {
            return Ok(false);
        };
        let unset = Value::from(0);
        if existing.get(guard_field).unwrap_or(&unset) != expected {
            return Ok(false);
        }
        *existing = record;
        Ok(true)
    }

    async fn delete(&self, table: Table, id: &str) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if let Some(rows) = tables.get_mut(&table) {
            rows.remove(id);
        }
        Ok(())
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
