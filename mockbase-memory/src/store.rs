//! In-memory storage implementation for document stores.
//!
//! Documents live in an arena of collections, each an insertion-ordered map from
//! `objectId` to document, behind an async-aware read-write lock.

use async_trait::async_trait;
use bson::Document;
use indexmap::IndexMap;
use mea::rwlock::RwLock;
use std::{collections::HashMap, sync::Arc};
use tracing::debug;

use mockbase_core::{
    backend::{StoreBackend, StoreBackendBuilder},
    error::{DocumentStoreError, DocumentStoreResult},
    query::{DEFAULT_LIMIT, DEFAULT_MAX_DEPTH, Expr, HARD_LIMIT, Query},
};

use crate::{evaluator::DocumentEvaluator, include::include_path};

pub(crate) type CollectionMap = IndexMap<String, Document>;
pub(crate) type StoreMap = HashMap<String, CollectionMap>;

/// Tunables of an [`InMemoryStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InMemoryStoreConfig {
    /// Page size when a query names no limit.
    pub default_limit: usize,
    /// Largest page a query may request.
    pub max_limit: usize,
    /// Deepest `$or`/sub-query nesting accepted in a where-clause.
    pub max_subquery_depth: usize,
}

impl Default for InMemoryStoreConfig {
    fn default() -> Self {
        Self {
            default_limit: DEFAULT_LIMIT,
            max_limit: HARD_LIMIT,
            max_subquery_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// Thread-safe in-memory document storage backend.
///
/// `InMemoryStore` is cloneable and uses an `Arc`-wrapped internal state, so clones share
/// the same data. Every read hands out deep copies.
///
/// Queries scan the whole collection; there are no indexes.
///
/// # Example
///
/// ```ignore
/// use mockbase_memory::InMemoryStore;
/// use mockbase::backend::StoreBackend;
/// use bson::doc;
///
/// let store = InMemoryStore::new();
/// store.insert_document("Item", "a1", doc! { "objectId": "a1", "price": 30 }).await?;
/// assert!(store.get_document("Item", "a1").await?.is_some());
/// ```
#[derive(Default, Clone, Debug)]
pub struct InMemoryStore {
    /// collection name -> (objectId -> document)
    store: Arc<RwLock<StoreMap>>,
    config: InMemoryStoreConfig,
}

impl InMemoryStore {
    /// Creates a new empty in-memory document store with default settings.
    pub fn new() -> Self {
        Self::with_config(InMemoryStoreConfig::default())
    }

    pub fn with_config(config: InMemoryStoreConfig) -> Self {
        Self {
            store: Arc::new(RwLock::new(StoreMap::new())),
            config,
        }
    }

    /// Creates a builder for constructing an `InMemoryStore` with custom options.
    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder::default()
    }

    pub fn config(&self) -> &InMemoryStoreConfig {
        &self.config
    }

    fn compile(&self, query: &Query) -> DocumentStoreResult<Expr> {
        Expr::compile_with_depth(&query.filter, self.config.max_subquery_depth)
    }
}

#[async_trait]
impl StoreBackend for InMemoryStore {
    async fn insert_document(
        &self,
        collection: &str,
        object_id: &str,
        document: Document,
    ) -> DocumentStoreResult<()> {
        let mut store = self.store.write().await;
        let collection_map = store
            .entry(collection.to_string())
            .or_default();

        if collection_map.contains_key(object_id) {
            return Err(DocumentStoreError::DocumentAlreadyExists(
                object_id.to_string(),
                collection.to_string(),
            ));
        }

        debug!(collection, object_id, "inserting document");
        collection_map.insert(object_id.to_string(), document);

        Ok(())
    }

    async fn replace_document(
        &self,
        collection: &str,
        object_id: &str,
        document: Document,
    ) -> DocumentStoreResult<()> {
        let mut store = self.store.write().await;

        debug!(collection, object_id, "replacing document");
        store
            .entry(collection.to_string())
            .or_default()
            .insert(object_id.to_string(), document);

        Ok(())
    }

    async fn delete_document(
        &self,
        collection: &str,
        object_id: &str,
    ) -> DocumentStoreResult<Option<Document>> {
        let mut store = self.store.write().await;

        debug!(collection, object_id, "deleting document");
        Ok(store
            .get_mut(collection)
            .and_then(|collection_map| collection_map.shift_remove(object_id)))
    }

    async fn get_document(
        &self,
        collection: &str,
        object_id: &str,
    ) -> DocumentStoreResult<Option<Document>> {
        let store = self.store.read().await;

        Ok(store
            .get(collection)
            .and_then(|collection_map| collection_map.get(object_id))
            .cloned())
    }

    async fn query_documents(
        &self,
        collection: &str,
        query: &Query,
    ) -> DocumentStoreResult<Vec<Document>> {
        let expr = self.compile(query)?;
        let store = self.store.read().await;
        let matches = DocumentEvaluator::filter_documents(&store, collection, &expr)?;

        let skip = query.skip.unwrap_or(0);
        let limit = query.page_size(self.config.default_limit, self.config.max_limit);

        debug!(collection, matches = matches.len(), skip, limit, "query matched");

        Ok(matches
            .into_iter()
            .skip(skip)
            .take(limit)
            .map(|document| {
                let mut document = document.clone();

                for path in &query.include {
                    include_path(&store, &mut document, path.segments());
                }

                document
            })
            .collect())
    }

    async fn count_documents(&self, collection: &str, query: &Query) -> DocumentStoreResult<usize> {
        let expr = self.compile(query)?;
        let store = self.store.read().await;

        Ok(DocumentEvaluator::filter_documents(&store, collection, &expr)?.len())
    }

    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>> {
        let store = self.store.read().await;

        Ok(store.keys().cloned().collect())
    }

    async fn clear(&self) -> DocumentStoreResult<()> {
        let mut store = self.store.write().await;

        debug!(collections = store.len(), "clearing store");
        store.clear();

        Ok(())
    }
}

/// Builder for constructing [`InMemoryStore`] instances.
///
/// # Example
///
/// ```ignore
/// use mockbase_memory::InMemoryStore;
/// use mockbase::backend::StoreBackendBuilder;
///
/// let store = InMemoryStore::builder()
///     .default_limit(20)
///     .max_subquery_depth(8)
///     .build()
///     .await?;
/// ```
#[derive(Debug, Default)]
pub struct InMemoryStoreBuilder {
    config: InMemoryStoreConfig,
}

impl InMemoryStoreBuilder {
    pub fn default_limit(mut self, default_limit: usize) -> Self {
        self.config.default_limit = default_limit;
        self
    }

    pub fn max_limit(mut self, max_limit: usize) -> Self {
        self.config.max_limit = max_limit;
        self
    }

    pub fn max_subquery_depth(mut self, max_subquery_depth: usize) -> Self {
        self.config.max_subquery_depth = max_subquery_depth;
        self
    }
}

#[async_trait]
impl StoreBackendBuilder for InMemoryStoreBuilder {
    type Backend = InMemoryStore;

    /// Builds a store with the configured limits.
    ///
    /// Fails with [`DocumentStoreError::Backend`] if the default page size exceeds the maximum.
    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        if self.config.default_limit > self.config.max_limit {
            return Err(DocumentStoreError::Backend(format!(
                "default limit {} exceeds max limit {}",
                self.config.default_limit, self.config.max_limit
            )));
        }

        Ok(InMemoryStore::with_config(self.config))
    }
}

#[cfg(test)]
mod tests {
    use bson::doc;
    use mockbase_core::error::ErrorKind;

    use super::*;

    async fn seeded(count: i32) -> InMemoryStore {
        let store = InMemoryStore::new();

        for n in 0..count {
            let id = format!("id{n:03}");
            store
                .insert_document("Item", &id, doc! { "objectId": id.as_str(), "n": n })
                .await
                .unwrap();
        }

        store
    }

    #[tokio::test]
    async fn duplicate_insert_is_rejected() {
        let store = seeded(1).await;
        let err = store
            .insert_document("Item", "id000", doc! {})
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::DocumentAlreadyExists);
    }

    #[tokio::test]
    async fn reads_are_copies() {
        let store = seeded(1).await;

        let mut copy = store.get_document("Item", "id000").await.unwrap().unwrap();
        copy.insert("n", 99);

        let stored = store.get_document("Item", "id000").await.unwrap().unwrap();
        assert_eq!(stored.get_i32("n").unwrap(), 0);
    }

    #[tokio::test]
    async fn pagination_keeps_insertion_order() {
        let store = seeded(5).await;
        let query = Query::builder().skip(1).limit(2).build();

        let page = store.query_documents("Item", &query).await.unwrap();
        let ns: Vec<i32> = page.iter().map(|d| d.get_i32("n").unwrap()).collect();

        assert_eq!(ns, vec![1, 2]);
        assert_eq!(store.count_documents("Item", &query).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn limits_default_and_clamp() {
        let store = InMemoryStore::builder()
            .default_limit(2)
            .max_limit(3)
            .build()
            .await
            .unwrap();

        for n in 0..5 {
            let id = format!("id{n}");
            store.insert_document("Item", &id, doc! { "objectId": id.as_str() }).await.unwrap();
        }

        assert_eq!(store.query_documents("Item", &Query::new()).await.unwrap().len(), 2);
        let greedy = Query::builder().limit(50).build();
        assert_eq!(store.query_documents("Item", &greedy).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn builder_rejects_inconsistent_limits() {
        let err = InMemoryStore::builder()
            .default_limit(10)
            .max_limit(5)
            .build()
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Backend);
    }

    #[tokio::test]
    async fn delete_and_clear() {
        let store = seeded(3).await;

        assert!(store.delete_document("Item", "id001").await.unwrap().is_some());
        assert!(store.delete_document("Item", "id001").await.unwrap().is_none());
        assert_eq!(store.count_documents("Item", &Query::new()).await.unwrap(), 2);

        store.clear().await.unwrap();
        assert!(store.list_collections().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn invalid_filters_surface_as_errors() {
        let store = seeded(1).await;
        let query = Query::builder().filter(doc! { "n": { "$in": 3 } }).build();

        let err = store.query_documents("Item", &query).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidQuery);
    }
}
