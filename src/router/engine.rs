//! Extension engine seam.
//!
//! The router never executes extension code itself. It resolves owners and
//! invokes handlers through [`ExtensionEngine`]. [`HandlerTable`] is an
//! in-process implementation for embedders whose handlers are plain async
//! closures.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use serde_json::Value;
use tracing::trace;

use crate::error::{Error, Result};
use crate::identifiers::{ContentScriptId, ExtensionId, ViewId};

// ============================================================================
// ExtensionEngine
// ============================================================================

/// Contract the router requires from the extension runtime.
#[async_trait]
pub trait ExtensionEngine: Send + Sync {
    /// Returns the extension that owns a content script.
    fn resolve_owner_of_content_script(
        &self,
        content_script_id: &ContentScriptId,
    ) -> Option<ExtensionId>;

    /// Runs the content script's message handler.
    async fn invoke_content_script_handler(
        &self,
        content_script_id: &ContentScriptId,
        content: Value,
    ) -> Result<Value>;

    /// Runs the message handler of an extension's view controller.
    async fn invoke_view_handler(
        &self,
        extension_id: &ExtensionId,
        view_id: &ViewId,
        content: Value,
    ) -> Result<Value>;
}

// ============================================================================
// HandlerTable
// ============================================================================

/// Async message handler stored in a [`HandlerTable`].
pub type Handler = Arc<dyn Fn(Value) -> BoxFuture<'static, Result<Value>> + Send + Sync>;

/// In-process [`ExtensionEngine`] backed by registered closures.
///
/// # Example
///
/// ```ignore
/// let table = HandlerTable::new();
/// table.on_content_script("cs1", "ext1", |content| async move {
///     Ok(json!({ "echo": content }))
/// });
/// ```
#[derive(Default)]
pub struct HandlerTable {
    /// Content script owners.
    owners: RwLock<FxHashMap<ContentScriptId, ExtensionId>>,
    /// Content script handlers.
    content_scripts: RwLock<FxHashMap<ContentScriptId, Handler>>,
    /// View controller handlers.
    views: RwLock<FxHashMap<(ExtensionId, ViewId), Handler>>,
}

impl fmt::Debug for HandlerTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerTable")
            .field("content_scripts", &self.content_scripts.read().len())
            .field("views", &self.views.read().len())
            .finish_non_exhaustive()
    }
}

impl HandlerTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a content script owned by `extension_id`.
    pub fn on_content_script<F, Fut>(
        &self,
        content_script_id: impl Into<ContentScriptId>,
        extension_id: impl Into<ExtensionId>,
        handler: F,
    ) where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        let content_script_id = content_script_id.into();
        let extension_id = extension_id.into();
        trace!(%content_script_id, %extension_id, "Content script handler registered");

        self.owners
            .write()
            .insert(content_script_id.clone(), extension_id);
        self.content_scripts
            .write()
            .insert(content_script_id, boxed(handler));
    }

    /// Registers the view controller for `(extension_id, view_id)`.
    pub fn on_view<F, Fut>(
        &self,
        extension_id: impl Into<ExtensionId>,
        view_id: impl Into<ViewId>,
        handler: F,
    ) where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        let key = (extension_id.into(), view_id.into());
        trace!(extension_id = %key.0, view_id = %key.1, "View handler registered");
        self.views.write().insert(key, boxed(handler));
    }

    /// Removes a content script and its handler.
    pub fn remove_content_script(&self, content_script_id: &ContentScriptId) {
        self.owners.write().remove(content_script_id);
        self.content_scripts.write().remove(content_script_id);
    }

    /// Removes a view controller.
    pub fn remove_view(&self, extension_id: &ExtensionId, view_id: &ViewId) {
        self.views
            .write()
            .remove(&(extension_id.clone(), view_id.clone()));
    }
}

#[async_trait]
impl ExtensionEngine for HandlerTable {
    fn resolve_owner_of_content_script(
        &self,
        content_script_id: &ContentScriptId,
    ) -> Option<ExtensionId> {
        self.owners.read().get(content_script_id).cloned()
    }

    async fn invoke_content_script_handler(
        &self,
        content_script_id: &ContentScriptId,
        content: Value,
    ) -> Result<Value> {
        let handler = self
            .content_scripts
            .read()
            .get(content_script_id)
            .cloned()
            .ok_or_else(|| {
                Error::handler(format!("No handler for content script {content_script_id}"))
            })?;

        handler(content).await
    }

    async fn invoke_view_handler(
        &self,
        extension_id: &ExtensionId,
        view_id: &ViewId,
        content: Value,
    ) -> Result<Value> {
        let handler = self
            .views
            .read()
            .get(&(extension_id.clone(), view_id.clone()))
            .cloned()
            .ok_or_else(|| {
                Error::handler(format!(
                    "No view controller {view_id} for extension {extension_id}"
                ))
            })?;

        handler(content).await
    }
}

/// Erases a closure into a stored [`Handler`].
fn boxed<F, Fut>(handler: F) -> Handler
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value>> + Send + 'static,
{
    Arc::new(move |content| handler(content).boxed())
}

// ============================================================================
// Tests
// ============================================================================
