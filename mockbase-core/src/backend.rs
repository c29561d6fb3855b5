//! Storage backend abstraction for the document store.
//!
//! # Overview
//!
//! The [`StoreBackend`] trait is the storage half of the store: it keeps documents per
//! collection, keyed by `objectId`, and answers compiled queries. Everything above storage
//! (update operators, timestamps, lifecycle hooks) lives in
//! [`DocumentStore`](crate::store::DocumentStore), so a backend only ever sees finished
//! documents.
//!
//! Implementations are required to be thread-safe (`Send + Sync`) and to hand out deep
//! copies: a document returned by a backend must never alias stored state.
//!
//! # Examples
//!
//! ```ignore
//! use mockbase::backend::StoreBackend;
//! use bson::doc;
//!
//! let backend = InMemoryStore::new();
//!
//! backend.insert_document("Item", "abc", doc! { "objectId": "abc", "price": 30 }).await?;
//! let item = backend.get_document("Item", "abc").await?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use async_trait::async_trait;
use bson::Document;
use std::fmt::Debug;

use crate::{error::DocumentStoreResult, query::Query};

/// Abstract interface for document storage backends.
///
/// # Error Handling
///
/// Query methods return [`DocumentStoreError::InvalidQuery`](crate::error::DocumentStoreError)
/// for where-clauses that fail to compile. Writes never partially apply.
#[async_trait]
pub trait StoreBackend: Send + Sync + Debug {
    /// Inserts a new document.
    ///
    /// Returns [`DocumentAlreadyExists`](crate::error::DocumentStoreError::DocumentAlreadyExists)
    /// if the collection already holds `object_id`. The collection is created on first insert.
    async fn insert_document(
        &self,
        collection: &str,
        object_id: &str,
        document: Document,
    ) -> DocumentStoreResult<()>;

    /// Stores `document` under `object_id`, replacing whatever was there.
    async fn replace_document(
        &self,
        collection: &str,
        object_id: &str,
        document: Document,
    ) -> DocumentStoreResult<()>;

    /// Removes a document, returning it if it existed.
    async fn delete_document(
        &self,
        collection: &str,
        object_id: &str,
    ) -> DocumentStoreResult<Option<Document>>;

    /// Retrieves a copy of a single document.
    async fn get_document(
        &self,
        collection: &str,
        object_id: &str,
    ) -> DocumentStoreResult<Option<Document>>;

    /// Returns the page of matching documents with include paths hydrated.
    ///
    /// Documents come back in insertion order, skipped and limited according to the query.
    /// The query's `count` flag is ignored here; see [`StoreBackend::count_documents`].
    async fn query_documents(
        &self,
        collection: &str,
        query: &Query,
    ) -> DocumentStoreResult<Vec<Document>>;

    /// Counts every document matching the where-clause, ignoring pagination.
    async fn count_documents(&self, collection: &str, query: &Query) -> DocumentStoreResult<usize>;

    /// Lists the names of all collections holding at least one write.
    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>>;

    /// Discards every document in every collection.
    async fn clear(&self) -> DocumentStoreResult<()>;

    /// Cleanly shuts down the backend, releasing all resources.
    ///
    /// The default implementation is a no-op.
    async fn shutdown(self) -> DocumentStoreResult<()>
    where
        Self: Sized,
    {
        Ok(())
    }
}

#[async_trait]
impl<B> StoreBackend for &B
where
    B: StoreBackend,
{
    async fn insert_document(
        &self,
        collection: &str,
        object_id: &str,
        document: Document,
    ) -> DocumentStoreResult<()> {
        (*self)
            .insert_document(collection, object_id, document)
            .await
    }

    async fn replace_document(
        &self,
        collection: &str,
        object_id: &str,
        document: Document,
    ) -> DocumentStoreResult<()> {
        (*self)
            .replace_document(collection, object_id, document)
            .await
    }

    async fn delete_document(
        &self,
        collection: &str,
        object_id: &str,
    ) -> DocumentStoreResult<Option<Document>> {
        (*self)
            .delete_document(collection, object_id)
            .await
    }

    async fn get_document(
        &self,
        collection: &str,
        object_id: &str,
    ) -> DocumentStoreResult<Option<Document>> {
        (*self)
            .get_document(collection, object_id)
            .await
    }

    async fn query_documents(
        &self,
        collection: &str,
        query: &Query,
    ) -> DocumentStoreResult<Vec<Document>> {
        (*self)
            .query_documents(collection, query)
            .await
    }

    async fn count_documents(&self, collection: &str, query: &Query) -> DocumentStoreResult<usize> {
        (*self)
            .count_documents(collection, query)
            .await
    }

    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>> {
        (*self).list_collections().await
    }

    async fn clear(&self) -> DocumentStoreResult<()> {
        (*self).clear().await
    }
}

/// Factory for backends that need asynchronous setup.
#[async_trait]
pub trait StoreBackendBuilder {
    type Backend: StoreBackend;

    async fn build(self) -> DocumentStoreResult<Self::Backend>;
}
