//! Convenient re-exports of commonly used types from mockbase.
//!
//! ```ignore
//! use mockbase::prelude::*;
//! ```

pub use mockbase_core::{
    backend::{StoreBackend, StoreBackendBuilder},
    collection::{Collection, TypedCollection},
    document::{DocumentExt, Record, RecordExt},
    error::{DocumentStoreError, DocumentStoreResult, ErrorKind},
    hook::{Hook, HookContext, HookOutcome, HookRequest, HookStage, hook_fn},
    include::IncludePath,
    operation::Operation,
    query::{Expr, FieldOp, Filter, Query, QueryBuilder, QueryVisitor},
    store::{DocumentStore, FindResponse, ResetScope},
    value::{Pointer, Relation},
};
