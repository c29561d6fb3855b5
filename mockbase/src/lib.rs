//! Main mockbase crate: an in-memory, schema-less object store that behaves like a hosted
//! object-database API, for fast local tests.
//!
//! This crate is the primary entry point. It re-exports the core types from
//! `mockbase-core` and the in-memory backend from `mockbase-memory`.
//!
//! # Features
//!
//! - **Wire-compatible values** - Pointers, relations and dates in the API's tagged form
//! - **Atomic update operators** - `Increment`, `Add`, `AddUnique`, `Remove`, `Delete` and relation edits
//! - **Rich queries** - Comparison, set, pattern, sub-query and relation operators
//! - **Include expansion** - Hydrate pointer chains along dotted paths
//! - **Lifecycle hooks** - Before/after save and delete callbacks, plus cloud functions
//!
//! # Quick Start
//!
//! ```ignore
//! use mockbase::{prelude::*, memory::InMemoryStore};
//! use bson::doc;
//!
//! #[tokio::main]
//! async fn main() -> DocumentStoreResult<()> {
//!     let store = DocumentStore::new(InMemoryStore::builder().build().await?);
//!     let master = HookContext::master();
//!
//!     let brand = store.create("Brand", doc! { "name": "Acme" }, &master).await?;
//!     let brand_id = brand.get_str("objectId").unwrap();
//!
//!     store
//!         .create(
//!             "Item",
//!             doc! {
//!                 "price": 30,
//!                 "brand": Pointer::new("Brand", brand_id).to_bson(),
//!                 "tags": { "__op": "AddUnique", "objects": ["red", "red"] },
//!             },
//!             &master,
//!         )
//!         .await?;
//!
//!     let items = store
//!         .find(
//!             "Item",
//!             &Query::builder()
//!                 .filter(Filter::greater_than("price", 20))
//!                 .include("brand")
//!                 .build(),
//!         )
//!         .await?
//!         .into_results();
//!
//!     println!("Found items: {:?}", items);
//!
//!     Ok(())
//! }
//! ```
//!
//! # Hooks
//!
//! A before-save hook may reject a write, leaving the store untouched:
//!
//! ```ignore
//! store
//!     .on("Item", HookStage::BeforeSave, hook_fn(|request| async move {
//!         match request.object.contains_key("price") {
//!             true => Ok(None),
//!             false => Err("price is required".to_string()),
//!         }
//!     }))
//!     .await;
//!
//! let err = store.create("Item", doc! {}, &master).await.unwrap_err();
//! assert_eq!(err.to_string(), "price is required");
//! ```
//!
//! # Backends
//!
//! - [`memory`] - The in-memory backend

pub mod prelude;

pub use mockbase_core::{
    backend, collection, document, equality, error, hook, include, operation, query, store, value,
};

// Re-export BSON types for convenience
pub use bson;

/// In-memory storage backend implementations.
pub mod memory {
    pub use mockbase_memory::{InMemoryStore, InMemoryStoreBuilder, InMemoryStoreConfig};
}
