//! Durable memory backends for the MacroSage advisor.
//!
//! `SqliteStore` is the production backend; `InMemoryStore` mirrors the
//! `MemoryStore` trait for tests that don't want a database on disk.

pub mod in_memory;
pub mod sqlite;

pub use in_memory::InMemoryStore;
pub use sqlite::SqliteStore;
