//! Main document store interface.
//!
//! [`DocumentStore`] wraps a [`StoreBackend`] with everything that happens around storage:
//! update-operator extraction and application, reserved field bookkeeping, and the
//! lifecycle hook pipeline. Each write runs to completion (committed or rejected) before
//! its future resolves:
//!
//! ```text
//! PENDING -> before-hook -> { COMMITTED -> after-hook | REJECTED }
//! ```
//!
//! A rejected write leaves no trace in the backend.
//!
//! # Example
//!
//! ```ignore
//! use mockbase::{prelude::*, memory::InMemoryStore};
//! use bson::doc;
//!
//! let store = DocumentStore::new(InMemoryStore::new());
//! let item = store
//!     .create("Item", doc! { "price": 30 }, &HookContext::master())
//!     .await?;
//! ```

use bson::{Bson, DateTime, Document};
use mea::rwlock::RwLock;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::{
    backend::StoreBackend,
    collection::{Collection, TypedCollection},
    document::Record,
    error::{DocumentStoreError, DocumentStoreResult},
    hook::{Hook, HookContext, HookRegistry, HookRequest, HookStage},
    operation::{apply_ops, extract_ops},
    query::Query,
    value::{CREATED_AT_KEY, OBJECT_ID_KEY, UPDATED_AT_KEY},
};

/// Result of [`DocumentStore::find`].
#[derive(Debug, Clone, PartialEq)]
pub enum FindResponse {
    /// The requested page of documents.
    Results(Vec<Document>),
    /// The number of matching documents, when the query asked for a count.
    Count(usize),
}

impl FindResponse {
    /// Returns the documents, or an empty list for a count response.
    pub fn into_results(self) -> Vec<Document> {
        match self {
            FindResponse::Results(results) => results,
            FindResponse::Count(_) => Vec::new(),
        }
    }

    pub fn count(&self) -> usize {
        match self {
            FindResponse::Results(results) => results.len(),
            FindResponse::Count(count) => *count,
        }
    }
}

/// What [`DocumentStore::reset`] discards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetScope {
    /// Every document in every collection.
    Data,
    /// Documents, hooks and cloud functions.
    All,
}

#[derive(Debug)]
pub struct DocumentStore<B: StoreBackend> {
    backend: B,
    hooks: RwLock<HookRegistry>,
}

impl<B: StoreBackend> DocumentStore<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            hooks: RwLock::new(HookRegistry::new()),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn collection<'a>(&'a self, name: &str) -> Collection<'a, B> {
        Collection::new(name.to_string(), self)
    }

    pub fn typed_collection<'a, R: Record>(&'a self) -> TypedCollection<'a, B, R> {
        TypedCollection::new(self)
    }

    /// Registers a lifecycle hook, replacing any hook already set for the pair.
    pub async fn on(&self, collection: &str, stage: HookStage, hook: Arc<dyn Hook>) {
        debug!(collection, stage = stage.as_str(), "registering hook");

        self.hooks
            .write()
            .await
            .register(collection, stage, hook);
    }

    /// Defines a cloud function callable through [`DocumentStore::run`].
    pub async fn define(&self, name: &str, function: Arc<dyn Hook>) {
        debug!(function = name, "defining cloud function");

        self.hooks
            .write()
            .await
            .define(name, function);
    }

    /// Creates a document from `payload`.
    ///
    /// Operation payloads are applied as if every field was previously unset. The
    /// before-save hook then sees the resulting document and may replace it. `objectId`,
    /// `createdAt` and `updatedAt` are assigned by the store.
    pub async fn create(
        &self,
        collection: &str,
        payload: Document,
        context: &HookContext,
    ) -> DocumentStoreResult<Document> {
        debug!(collection, "create");

        let mut draft = payload;
        let ops = extract_ops(&mut draft);
        apply_ops(&mut draft, &ops, &Document::new())?;

        let object = self
            .before(collection, HookStage::BeforeSave, context, draft)
            .await?;

        let object_id = Uuid::new_v4().simple().to_string();
        let now = DateTime::now();

        let mut stored = Document::new();
        stored.insert(OBJECT_ID_KEY, object_id.as_str());
        for (key, value) in object {
            if !is_reserved(&key) {
                stored.insert(key, value);
            }
        }
        stored.insert(CREATED_AT_KEY, now);
        stored.insert(UPDATED_AT_KEY, now);

        self.backend
            .insert_document(collection, &object_id, stored.clone())
            .await?;

        self.after(collection, HookStage::AfterSave, context, stored.clone())
            .await;

        Ok(stored)
    }

    /// Updates the document `object_id` with `payload`.
    ///
    /// Plain fields are merged over the stored document, then operation payloads are
    /// applied against the stored values. A missing document is treated as empty and
    /// the update creates it under `object_id`.
    pub async fn update(
        &self,
        collection: &str,
        object_id: &str,
        payload: Document,
        context: &HookContext,
    ) -> DocumentStoreResult<Document> {
        debug!(collection, object_id, "update");

        let prior = self
            .backend
            .get_document(collection, object_id)
            .await?
            .unwrap_or_default();

        let mut data = payload;
        let ops = extract_ops(&mut data);

        let mut object = prior.clone();
        for (key, value) in data {
            if !is_reserved(&key) {
                object.insert(key, value);
            }
        }

        apply_ops(&mut object, &ops, &prior)?;

        let mut object = self
            .before(collection, HookStage::BeforeSave, context, object)
            .await?;

        let now = DateTime::now();
        let created_at = match prior.get(CREATED_AT_KEY) {
            Some(created_at) => created_at.clone(),
            None => Bson::DateTime(now),
        };

        object.insert(OBJECT_ID_KEY, object_id);
        object.insert(CREATED_AT_KEY, created_at);
        object.insert(UPDATED_AT_KEY, now);

        self.backend
            .replace_document(collection, object_id, object.clone())
            .await?;

        self.after(collection, HookStage::AfterSave, context, object.clone())
            .await;

        Ok(object)
    }

    /// Deletes the document `object_id`. Hooks run against `{}` when it does not exist.
    pub async fn delete(
        &self,
        collection: &str,
        object_id: &str,
        context: &HookContext,
    ) -> DocumentStoreResult<()> {
        debug!(collection, object_id, "delete");

        let existing = self
            .backend
            .get_document(collection, object_id)
            .await?
            .unwrap_or_default();

        self.before(collection, HookStage::BeforeDelete, context, existing.clone())
            .await?;

        self.backend
            .delete_document(collection, object_id)
            .await?;

        self.after(collection, HookStage::AfterDelete, context, existing)
            .await;

        Ok(())
    }

    /// Fetches a copy of a single document.
    pub async fn get(&self, collection: &str, object_id: &str) -> DocumentStoreResult<Option<Document>> {
        self.backend
            .get_document(collection, object_id)
            .await
    }

    /// Runs a query: the page of matching documents, or their count if the query asks for one.
    pub async fn find(&self, collection: &str, query: &Query) -> DocumentStoreResult<FindResponse> {
        debug!(collection, filter = %query.filter, count = query.count, "find");

        match query.count {
            true => self
                .backend
                .count_documents(collection, query)
                .await
                .map(FindResponse::Count),
            false => self
                .backend
                .query_documents(collection, query)
                .await
                .map(FindResponse::Results),
        }
    }

    /// Counts the documents matching the query's where-clause.
    pub async fn count(&self, collection: &str, query: &Query) -> DocumentStoreResult<usize> {
        self.backend
            .count_documents(collection, query)
            .await
    }

    /// Invokes a cloud function with `params` as its request object.
    pub async fn run(
        &self,
        name: &str,
        params: Document,
        context: &HookContext,
    ) -> DocumentStoreResult<Option<Document>> {
        debug!(function = name, "run");

        let function = self
            .hooks
            .read()
            .await
            .function(name)
            .ok_or_else(|| DocumentStoreError::Backend(format!("function not found: {name}")))?;

        function
            .call(HookRequest::new(context, params))
            .await
            .map_err(DocumentStoreError::HookRejected)
    }

    pub async fn list_collections(&self) -> DocumentStoreResult<Vec<String>> {
        self.backend.list_collections().await
    }

    /// Discards stored data and, for [`ResetScope::All`], every hook and cloud function.
    pub async fn reset(&self, scope: ResetScope) -> DocumentStoreResult<()> {
        debug!(?scope, "reset");

        let mut hooks = self.hooks.write().await;

        self.backend.clear().await?;

        if scope == ResetScope::All {
            hooks.clear();
        }

        Ok(())
    }

    pub async fn shutdown(self) -> DocumentStoreResult<()> {
        self.backend.shutdown().await?;

        Ok(())
    }

    async fn hook(&self, collection: &str, stage: HookStage) -> Option<Arc<dyn Hook>> {
        self.hooks
            .read()
            .await
            .hook(collection, stage)
    }

    /// Runs the before-hook for `stage`, returning the draft to commit.
    async fn before(
        &self,
        collection: &str,
        stage: HookStage,
        context: &HookContext,
        draft: Document,
    ) -> DocumentStoreResult<Document> {
        let Some(hook) = self.hook(collection, stage).await else {
            return Ok(draft);
        };

        match hook
            .call(HookRequest::new(context, draft.clone()))
            .await
        {
            Ok(Some(replacement)) => Ok(replacement),
            Ok(None) => Ok(draft),
            Err(message) => {
                debug!(collection, stage = stage.as_str(), %message, "hook rejected request");
                Err(DocumentStoreError::HookRejected(message))
            }
        }
    }

    /// Runs the after-hook for `stage`. The write is already committed, so its outcome is dropped.
    async fn after(&self, collection: &str, stage: HookStage, context: &HookContext, object: Document) {
        let Some(hook) = self.hook(collection, stage).await else {
            return;
        };

        if let Err(message) = hook
            .call(HookRequest::new(context, object))
            .await
        {
            debug!(collection, stage = stage.as_str(), %message, "after hook failed");
        }
    }
}

fn is_reserved(key: &str) -> bool {
    matches!(key, OBJECT_ID_KEY | CREATED_AT_KEY | UPDATED_AT_KEY)
}
