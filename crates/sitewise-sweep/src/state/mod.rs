//! Persistent key/value records
//!
//! Remembers removed hierarchy associations and finished run summaries so a
//! rerun can skip work already done.

mod db;
mod store;

pub use db::{DbPool, default_db_path, open_db, setup_schema};
pub use store::{MemoryRecordStore, RecordStore, SqliteRecordStore};
