//! In-memory document storage backend for mockbase.
//!
//! This crate provides a thread-safe, in-memory implementation of the `StoreBackend` trait.
//! It uses async-aware read-write locks for concurrent access and is meant for tests that
//! need a fast local stand-in for a networked object database.
//!
//! # Features
//!
//! - **Thread-safe access** - Concurrent reads and writes using async-aware RwLock
//! - **Full query support** - Comparison, set, pattern, sub-query and relation operators
//! - **Include expansion** - Pointer hydration along dotted paths
//! - **Configurable limits** - Page sizes and sub-query depth via [`InMemoryStoreBuilder`]
//!
//! # Quick Start
//!
//! ```ignore
//! use mockbase::{prelude::*, memory::InMemoryStore};
//! use bson::doc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let backend = InMemoryStore::builder().build().await?;
//!     let store = DocumentStore::new(backend);
//!
//!     store.create("Item", doc! { "price": 30 }, &HookContext::master()).await?;
//!
//!     Ok(())
//! }
//! ```

mod evaluator;
mod include;
pub mod store;

pub use store::{InMemoryStore, InMemoryStoreBuilder, InMemoryStoreConfig};
