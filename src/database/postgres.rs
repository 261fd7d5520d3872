use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::postgres::{PgArguments, PgPoolOptions};
use sqlx::{Arguments, PgPool, Row};
use tracing::info;

use super::store::{validate_field_name, Filter, RecordStore, StoreError, Table};

const CREATE_RECORDS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS records (
        collection TEXT NOT NULL,
        id TEXT NOT NULL,
        data JSONB NOT NULL,
        PRIMARY KEY (collection, id)
    )
"#;

const CREATE_OWNER_INDEX: &str = r#"
    CREATE INDEX IF NOT EXISTS records_owner_idx
    ON records (collection, (data->>'user_id'))
"#;

/// Record store on PostgreSQL: every logical table lives in one JSONB
/// `records` table keyed by `(collection, id)`.
#[derive(Clone)]
pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    /// Connect and make sure the backing table exists
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        if database_url.is_empty() {
            return Err(StoreError::Unavailable("DATABASE_URL is not set".to_string()));
        }
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        let store = Self::from_pool(pool);
        store.migrate().await?;
        info!("Connected record store (max_connections={})", max_connections);
        Ok(store)
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::query(CREATE_RECORDS_TABLE).execute(&self.pool).await?;
        sqlx::query(CREATE_OWNER_INDEX).execute(&self.pool).await?;
        Ok(())
    }
}

/// Build the SELECT for a filter. Field names are validated before they are
/// interpolated; values are always bound.
fn build_select(table: Table, filter: &Filter) -> Result<(String, PgArguments), StoreError> {
    filter.validate()?;

    let mut args = PgArguments::default();
    let mut sql = String::from("SELECT data FROM records WHERE collection = $1");
    args.add(table.as_str());

    for (i, (field, value)) in filter.where_eq.iter().enumerate() {
        sql.push_str(&format!(" AND data->'{}' = ${}", field, i + 2));
        args.add(sqlx::types::Json(value.clone()));
    }

    if let Some(order) = &filter.order {
        let key = match &order.fallback {
            Some(fallback) => format!("COALESCE(data->>'{}', data->>'{}')", order.field, fallback),
            None => format!("(data->>'{}')", order.field),
        };
        sql.push_str(&format!(" ORDER BY {}::timestamptz {}", key, order.sort.to_sql()));
    }
    if let Some(limit) = filter.limit {
        sql.push_str(&format!(" LIMIT {}", limit));
    }
    if filter.offset > 0 {
        sql.push_str(&format!(" OFFSET {}", filter.offset));
    }

    Ok((sql, args))
}

/// Rows that predate the guard field compare as `0`
fn build_guarded_replace(guard_field: &str) -> Result<String, StoreError> {
    validate_field_name(guard_field)?;
    Ok(format!(
        "UPDATE records SET data = $3 WHERE collection = $1 AND id = $2 \
         AND COALESCE(data->'{}', '0'::jsonb) = $4",
        guard_field
    ))
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn get(&self, table: Table, id: &str) -> Result<Option<Value>, StoreError> {
        let row = sqlx::query("SELECT data FROM records WHERE collection = $1 AND id = $2")
            .bind(table.as_str())
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.try_get::<Value, _>("data")).transpose()?)
    }

    async fn query(&self, table: Table, filter: &Filter) -> Result<Vec<Value>, StoreError> {
        let (sql, args) = build_select(table, filter)?;
        let rows = sqlx::query_with(&sql, args).fetch_all(&self.pool).await?;
        rows.iter()
            .map(|r| r.try_get::<Value, _>("data").map_err(StoreError::from))
            .collect()
    }

    async fn put(&self, table: Table, id: &str, record: Value) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO records (collection, id, data) VALUES ($1, $2, $3)
             ON CONFLICT (collection, id) DO UPDATE SET data = EXCLUDED.data",
        )
        .bind(table.as_str())
        .bind(id)
        .bind(sqlx::types::Json(record))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn patch(&self, table: Table, id: &str, fields: Map<String, Value>) -> Result<Option<Value>, StoreError> {
        let row = sqlx::query(
            "UPDATE records SET data = data || $3 WHERE collection = $1 AND id = $2 RETURNING data",
        )
        .bind(table.as_str())
        .bind(id)
        .bind(sqlx::types::Json(Value::Object(fields)))
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| r.try_get::<Value, _>("data")).transpose()?)
    }

    async fn replace_if(
        &self,
        table: Table,
        id: &str,
        guard_field: &str,
        expected: &Value,
        record: Value,
    ) -> Result<bool, StoreError> {
        let sql = build_guarded_replace(guard_field)?;
        let result = sqlx::query(&sql)
            .bind(table.as_str())
            .bind(id)
            .bind(sqlx::types::Json(record))
            .bind(sqlx::types::Json(expected.clone()))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn delete(&self, table: Table, id: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM records WHERE collection = $1 AND id = $2")
            .bind(table.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
