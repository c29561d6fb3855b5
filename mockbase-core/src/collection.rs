//! Collection handles.
//!
//! - [`Collection`] - a named collection of schema-less documents
//! - [`TypedCollection`] - the collection of a [`Record`] type
//!
//! Both borrow the [`DocumentStore`] they came from, so every write through them runs the
//! store's hook pipeline.
//!
//! # Example
//!
//! ```ignore
//! let items = store.collection("Item");
//! let item = items.create(doc! { "price": 30 }, &HookContext::master()).await?;
//! let found = items
//!     .find(&Query::builder().filter(Filter::greater_than("price", 20)).build())
//!     .await?;
//! ```

use bson::Document;
use std::marker::PhantomData;

use crate::{
    backend::StoreBackend,
    document::{Record, RecordExt},
    error::DocumentStoreResult,
    hook::HookContext,
    query::Query,
    store::{DocumentStore, FindResponse},
};

#[derive(Debug)]
pub struct Collection<'a, B: StoreBackend> {
    name: String,
    store: &'a DocumentStore<B>,
}

impl<'a, B: StoreBackend> Collection<'a, B> {
    pub(crate) fn new(name: String, store: &'a DocumentStore<B>) -> Self {
        Self { name, store }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn create(&self, payload: Document, context: &HookContext) -> DocumentStoreResult<Document> {
        self.store
            .create(&self.name, payload, context)
            .await
    }

    pub async fn update(
        &self,
        object_id: &str,
        payload: Document,
        context: &HookContext,
    ) -> DocumentStoreResult<Document> {
        self.store
            .update(&self.name, object_id, payload, context)
            .await
    }

    pub async fn delete(&self, object_id: &str, context: &HookContext) -> DocumentStoreResult<()> {
        self.store
            .delete(&self.name, object_id, context)
            .await
    }

    pub async fn get(&self, object_id: &str) -> DocumentStoreResult<Option<Document>> {
        self.store.get(&self.name, object_id).await
    }

    pub async fn find(&self, query: &Query) -> DocumentStoreResult<FindResponse> {
        self.store.find(&self.name, query).await
    }

    pub async fn count(&self, query: &Query) -> DocumentStoreResult<usize> {
        self.store.count(&self.name, query).await
    }
}

#[derive(Debug)]
pub struct TypedCollection<'a, B: StoreBackend, R: Record> {
    inner: Collection<'a, B>,
    _marker: PhantomData<R>,
}

impl<'a, B: StoreBackend, R: Record> TypedCollection<'a, B, R> {
    pub(crate) fn new(store: &'a DocumentStore<B>) -> Self {
        Self {
            inner: Collection::new(R::class_name().to_string(), store),
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    /// Creates a document from `record` and reads it back, reserved fields included.
    pub async fn create(&self, record: &R, context: &HookContext) -> DocumentStoreResult<R> {
        let created = self
            .inner
            .create(record.to_document()?, context)
            .await?;

        R::from_document(created)
    }

    pub async fn get(&self, object_id: &str) -> DocumentStoreResult<Option<R>> {
        self.inner
            .get(object_id)
            .await?
            .map(R::from_document)
            .transpose()
    }

    /// Returns the matching records. The query's `count` flag is ignored.
    pub async fn find(&self, query: &Query) -> DocumentStoreResult<Vec<R>> {
        let query = Query { count: false, ..query.clone() };

        self.inner
            .find(&query)
            .await?
            .into_results()
            .into_iter()
            .map(R::from_document)
            .collect()
    }

    pub async fn delete(&self, object_id: &str, context: &HookContext) -> DocumentStoreResult<()> {
        self.inner.delete(object_id, context).await
    }
}
