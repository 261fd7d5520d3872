use std::cmp::Ordering;
use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors surfaced by record store backends
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Record store unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid field name: {0}")]
    InvalidField(String),

    #[error("Invalid record {table}/{id}: {reason}")]
    InvalidRecord {
        table: Table,
        id: String,
        reason: String,
    },

    #[error("Record store backend error: {0}")]
    Backend(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Logical tables held by the record store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Users,
    Applications,
    Documents,
}

impl Table {
    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Users => "users",
            Table::Applications => "applications",
            Table::Documents => "documents",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn to_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// Ordering on a timestamp field of the stored record. Records without
/// `field` are ordered by `fallback` instead, when one is given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterOrder {
    pub field: String,
    pub fallback: Option<String>,
    pub sort: SortDirection,
}

impl FilterOrder {
    fn key<'a>(&self, record: &'a Value) -> Option<&'a Value> {
        record
            .get(&self.field)
            .filter(|v| !v.is_null())
            .or_else(|| self.fallback.as_ref().and_then(|f| record.get(f)))
    }
}

/// Equality filter with optional ordering and pagination
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    pub where_eq: Vec<(String, Value)>,
    pub order: Option<FilterOrder>,
    pub limit: Option<usize>,
    pub offset: usize,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn where_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.where_eq.push((field.into(), value.into()));
        self
    }

    pub fn order_desc(mut self, field: impl Into<String>) -> Self {
        self.order = Some(FilterOrder { field: field.into(), fallback: None, sort: SortDirection::Desc });
        self
    }

    pub fn order_asc(mut self, field: impl Into<String>) -> Self {
        self.order = Some(FilterOrder { field: field.into(), fallback: None, sort: SortDirection::Asc });
        self
    }

    /// Field to order by when a record lacks the primary order field
    pub fn order_fallback(mut self, field: impl Into<String>) -> Self {
        if let Some(order) = self.order.as_mut() {
            order.fallback = Some(field.into());
        }
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Reject field names that could not be safely addressed by a backend
    pub fn validate(&self) -> Result<(), StoreError> {
        let fields = self
            .where_eq
            .iter()
            .map(|(field, _)| field.as_str())
            .chain(self.order.iter().flat_map(|o| std::iter::once(o.field.as_str()).chain(o.fallback.as_deref())));
        for field in fields {
            validate_field_name(field)?;
        }
        Ok(())
    }

    /// Whether a record satisfies every equality condition
    pub fn matches(&self, record: &Value) -> bool {
        self.where_eq
            .iter()
            .all(|(field, expected)| record.get(field) == Some(expected))
    }

    /// Sort, skip and truncate an already-filtered result set in place
    pub fn apply_window(&self, records: &mut Vec<Value>) {
        if let Some(order) = &self.order {
            records.sort_by(|a, b| {
                let ord = compare_field(order.key(a), order.key(b));
                match order.sort {
                    SortDirection::Asc => ord,
                    SortDirection::Desc => ord.reverse(),
                }
            });
        }
        let skip = self.offset.min(records.len());
        records.drain(..skip);
        if let Some(limit) = self.limit {
            records.truncate(limit);
        }
    }
}

pub fn validate_field_name(field: &str) -> Result<(), StoreError> {
    let valid = !field.is_empty()
        && field.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !field.starts_with(|c: char| c.is_ascii_digit());
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidField(field.to_string()))
    }
}

// RFC 3339 strings with differing fractional precision do not sort lexically
fn compare_field(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn as_time(v: Option<&Value>) -> Option<DateTime<Utc>> {
        v.and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|t| t.with_timezone(&Utc))
    }
    match (as_time(a), as_time(b)) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => {
            let x = a.map(Value::to_string).unwrap_or_default();
            let y = b.map(Value::to_string).unwrap_or_default();
            x.cmp(&y)
        }
    }
}

/// Thin facade over the document database.
///
/// Records are JSON objects addressed by `(table, id)`. Each call is an
/// independent remote operation; no multi-record transaction is implied.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fetch one record, `None` when absent
    async fn get(&self, table: Table, id: &str) -> Result<Option<Value>, StoreError>;

    /// Records matching `filter`, ordered and windowed as requested
    async fn query(&self, table: Table, filter: &Filter) -> Result<Vec<Value>, StoreError>;

    /// Full overwrite (insert when absent)
    async fn put(&self, table: Table, id: &str, record: Value) -> Result<(), StoreError>;

    /// Merge `fields` into an existing record and return the result,
    /// `None` when the record does not exist
    async fn patch(&self, table: Table, id: &str, fields: Map<String, Value>) -> Result<Option<Value>, StoreError>;

    /// Full overwrite only if `guard_field` still holds `expected`.
    /// A record without `guard_field` holds `0`, the value rows written
    /// before the guard existed start from.
    /// Returns false when the record is absent or the guard no longer matches.
    async fn replace_if(
        &self,
        table: Table,
        id: &str,
        guard_field: &str,
        expected: &Value,
        record: Value,
    ) -> Result<bool, StoreError>;

    /// Remove a record; absent records are not an error
    async fn delete(&self, table: Table, id: &str) -> Result<(), StoreError>;

    /// Cheap connectivity probe used by `/health`
    async fn health_check(&self) -> Result<(), StoreError>;
}
