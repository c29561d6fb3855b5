//! Lifecycle hooks and cloud functions.
//!
//! A hook is an async callback registered for a `(collection, stage)` pair. Before-hooks
//! may veto a write by returning `Err(message)` or replace the draft document by returning
//! `Ok(Some(document))`. After-hooks run once the write is committed; their outcome cannot
//! undo it.
//!
//! Cloud functions share the [`Hook`] shape: they receive their parameters as the request
//! object and their `Ok` value is the function result.
//!
//! ```ignore
//! use mockbase::hook::{HookStage, hook_fn};
//!
//! store.on("Item", HookStage::BeforeSave, hook_fn(|request| async move {
//!     match request.object.get_i32("price") {
//!         Ok(price) if price < 0 => Err("price must be positive".to_string()),
//!         _ => Ok(None),
//!     }
//! })).await;
//! ```

use async_trait::async_trait;
use bson::Document;
use std::{collections::HashMap, fmt, future::Future, sync::Arc};

/// Point in a write's lifecycle at which a hook runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookStage {
    BeforeSave,
    AfterSave,
    BeforeDelete,
    AfterDelete,
}

impl HookStage {
    /// Name of the stage in the emulated API.
    pub fn as_str(&self) -> &'static str {
        match self {
            HookStage::BeforeSave => "beforeSave",
            HookStage::AfterSave => "afterSave",
            HookStage::BeforeDelete => "beforeDelete",
            HookStage::AfterDelete => "afterDelete",
        }
    }
}

impl fmt::Display for HookStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller identity carried by every write.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HookContext {
    /// The signed-in user, if any.
    pub user: Option<Document>,
    /// Whether the request was made with the master key.
    pub master: bool,
}

impl HookContext {
    /// A context with master-key privileges and no user.
    pub fn master() -> Self {
        Self { user: None, master: true }
    }

    /// A context acting on behalf of `user`.
    pub fn user(user: Document) -> Self {
        Self { user: Some(user), master: false }
    }
}

/// What a hook is invoked with.
#[derive(Debug, Clone, PartialEq)]
pub struct HookRequest {
    pub user: Option<Document>,
    pub master: bool,
    /// The draft (before-hooks), the committed document (after-hooks), or
    /// the parameters (cloud functions).
    pub object: Document,
}

impl HookRequest {
    pub fn new(context: &HookContext, object: Document) -> Self {
        Self {
            user: context.user.clone(),
            master: context.master,
            object,
        }
    }
}

/// Resolution of a hook: `Ok(None)` accepts the draft as is, `Ok(Some(doc))` replaces it,
/// `Err(message)` rejects the request with that message.
pub type HookOutcome = Result<Option<Document>, String>;

#[async_trait]
pub trait Hook: Send + Sync {
    async fn call(&self, request: HookRequest) -> HookOutcome;
}

struct FnHook<F>(F);

#[async_trait]
impl<F, Fut> Hook for FnHook<F>
where
    F: Fn(HookRequest) -> Fut + Send + Sync,
    Fut: Future<Output = HookOutcome> + Send,
{
    async fn call(&self, request: HookRequest) -> HookOutcome {
        (self.0)(request).await
    }
}

/// Adapts an async closure into a shareable [`Hook`].
pub fn hook_fn<F, Fut>(f: F) -> Arc<dyn Hook>
where
    F: Fn(HookRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HookOutcome> + Send + 'static,
{
    Arc::new(FnHook(f))
}

/// Registered hooks and cloud functions of one store.
#[derive(Default)]
pub struct HookRegistry {
    hooks: HashMap<(String, HookStage), Arc<dyn Hook>>,
    functions: HashMap<String, Arc<dyn Hook>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `hook`, replacing any hook already registered for the same pair.
    pub fn register(&mut self, collection: &str, stage: HookStage, hook: Arc<dyn Hook>) {
        self.hooks
            .insert((collection.to_string(), stage), hook);
    }

    pub fn hook(&self, collection: &str, stage: HookStage) -> Option<Arc<dyn Hook>> {
        self.hooks
            .get(&(collection.to_string(), stage))
            .cloned()
    }

    /// Defines a cloud function, replacing any previous definition.
    pub fn define(&mut self, name: &str, function: Arc<dyn Hook>) {
        self.functions
            .insert(name.to_string(), function);
    }

    pub fn function(&self, name: &str) -> Option<Arc<dyn Hook>> {
        self.functions.get(name).cloned()
    }

    pub fn clear(&mut self) {
        self.hooks.clear();
        self.functions.clear();
    }
}

impl fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookRegistry")
            .field("hooks", &self.hooks.keys().collect::<Vec<_>>())
            .field("functions", &self.functions.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use bson::doc;

    use super::*;

    #[tokio::test]
    async fn closure_hooks_see_the_request() {
        let hook = hook_fn(|request: HookRequest| async move {
            match request.master {
                true => Ok(Some(request.object)),
                false => Err("master key required".to_string()),
            }
        });

        let object = doc! { "price": 30 };
        let accepted = hook
            .call(HookRequest::new(&HookContext::master(), object.clone()))
            .await;
        let rejected = hook
            .call(HookRequest::new(&HookContext::default(), object.clone()))
            .await;

        assert_eq!(accepted, Ok(Some(object)));
        assert_eq!(rejected, Err("master key required".to_string()));
    }

    #[test]
    fn registering_twice_replaces_the_hook() {
        let mut registry = HookRegistry::new();
        registry.register("Item", HookStage::BeforeSave, hook_fn(|_| async { Ok(None) }));
        registry.register("Item", HookStage::BeforeSave, hook_fn(|_| async { Err("no".to_string()) }));

        assert_eq!(registry.hooks.len(), 1);
        assert!(registry.hook("Item", HookStage::AfterSave).is_none());

        registry.clear();
        assert!(registry.hook("Item", HookStage::BeforeSave).is_none());
    }
}
