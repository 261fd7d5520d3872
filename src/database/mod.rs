pub mod memory;
pub mod models;
pub mod postgres;
pub mod repository;
pub mod store;

pub use memory::MemoryRecordStore;
pub use postgres::PgRecordStore;
pub use repository::Repository;
pub use store::{Filter, RecordStore, StoreError, Table};
