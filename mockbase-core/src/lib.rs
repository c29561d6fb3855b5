//! An in-memory stand-in for a networked object database, for fast local tests.
//!
//! This crate is the core of the mockbase project and provides:
//!
//! - **Value model** ([`value`]) - Tagged pointers, relations and dates in their wire form
//! - **Value equality** ([`equality`]) - Representation-independent comparison of values
//! - **Update operators** ([`operation`]) - Atomic field transforms such as `Increment` and `AddUnique`
//! - **Query compilation** ([`query`]) - Where-clauses compiled into a closed expression tree
//! - **Include paths** ([`include`]) - Dotted pointer paths to hydrate in results
//! - **Lifecycle hooks** ([`hook`]) - Before/after callbacks and cloud functions
//! - **Store backend abstraction** ([`backend`]) - Traits for implementing storage backends
//! - **Document store** ([`store`]) - The write pipeline tying the above together
//! - **Collections** ([`collection`]) - Handles scoped to one collection
//! - **Typed records** ([`document`]) - Serde structs bound to a collection
//! - **Error handling** ([`error`]) - Error kinds surfaced to callers
//!
//! # Example
//!
//! ```ignore
//! use mockbase_core::{hook::HookContext, store::DocumentStore};
//! use bson::doc;
//!
//! let store = DocumentStore::new(backend);
//! let item = store
//!     .create("Item", doc! { "price": 30, "views": { "__op": "Increment", "amount": 1 } }, &HookContext::master())
//!     .await?;
//! ```

pub mod backend;
pub mod collection;
pub mod document;
pub mod equality;
pub mod error;
pub mod hook;
pub mod include;
pub mod operation;
pub mod query;
pub mod store;
pub mod value;
