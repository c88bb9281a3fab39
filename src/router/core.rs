//! Message router: participant routing and reply delivery.
//!
//! # Routes
//!
//! | from | to | Route | Kind |
//! |------|----|-------|------|
//! | `ContentScript` | `Plugin` | [`Route::ContentScriptToPlugin`] | request |
//! | `UserWebview` | `Plugin` | [`Route::UserWebviewToPlugin`] | request |
//! | `Plugin` | `UserWebview` | [`Route::PluginToUserWebview`] | push |
//!
//! Any other pair is an [`Error::Routing`].
//!
//! Requests are not serialized: each call is tracked only by its own
//! handler future, and replies go out in completion order.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::identifiers::{SurfaceKey, SurfaceType, ViewId};
use crate::protocol::{Message, MessageResponse, Outcome, Participant, PushEnvelope};

use super::engine::ExtensionEngine;
use super::registry::Registry;

// ============================================================================
// Types
// ============================================================================

/// Reply sink registered per surface.
pub type Responder = Arc<dyn Fn(MessageResponse) + Send + Sync>;

/// Push sink registered per surface.
pub type Callback = Arc<dyn Fn(PushEnvelope) + Send + Sync>;

// ============================================================================
// Route
// ============================================================================

/// Supported participant pairings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Content script calling its owning extension.
    ContentScriptToPlugin,
    /// User webview calling its view controller.
    UserWebviewToPlugin,
    /// Extension pushing to a user webview.
    PluginToUserWebview,
}

impl Route {
    /// Determines the route for a `(from, to)` pair.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Routing`] for unsupported pairs.
    pub fn classify(from: Participant, to: Participant) -> Result<Self> {
        match (from, to) {
            (Participant::ContentScript, Participant::Plugin) => Ok(Self::ContentScriptToPlugin),
            (Participant::UserWebview, Participant::Plugin) => Ok(Self::UserWebviewToPlugin),
            (Participant::Plugin, Participant::UserWebview) => Ok(Self::PluginToUserWebview),
            _ => Err(Error::routing(from, to)),
        }
    }

    /// Returns `true` for the push route.
    #[inline]
    #[must_use]
    pub fn is_push(self) -> bool {
        self == Self::PluginToUserWebview
    }
}

// ============================================================================
// Delivery
// ============================================================================

/// What happened to a reply or push at the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Handed to a registered sink.
    Delivered,
    /// No sink registered; logged and dropped.
    Dropped,
}

// ============================================================================
// MessageRouter
// ============================================================================

/// Routes calls to extension handlers and replies back to UI surfaces.
///
/// Constructed once by the composition root and shared as
/// `Arc<MessageRouter>`.
///
/// # Example
///
/// ```ignore
/// let router = Arc::new(MessageRouter::new(Arc::new(engine)));
///
/// router.register_responder(SurfaceType::NoteTextViewer, "note-1", |reply| {
///     println!("reply {}", reply.response_id);
/// });
///
/// router.post_message(message).await?;
/// ```
pub struct MessageRouter {
    /// Extension runtime.
    engine: Arc<dyn ExtensionEngine>,
    /// Reply sinks.
    responders: Registry<Responder>,
    /// Push sinks.
    callbacks: Registry<Callback>,
}

impl fmt::Debug for MessageRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageRouter")
            .field("responders", &self.responders)
            .field("callbacks", &self.callbacks)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// MessageRouter - Constructor
// ============================================================================

impl MessageRouter {
    /// Creates a router over an extension engine.
    #[must_use]
    pub fn new(engine: Arc<dyn ExtensionEngine>) -> Self {
        Self {
            engine,
            responders: Registry::new("responder"),
            callbacks: Registry::new("callback"),
        }
    }

    /// Creates a router builder.
    #[inline]
    #[must_use]
    pub fn builder() -> RouterBuilder {
        RouterBuilder::new()
    }
}

// ============================================================================
// MessageRouter - Dispatch
// ============================================================================

impl MessageRouter {
    /// Routes a message from a boundary listener.
    ///
    /// Requests are answered out-of-band through the responder registry;
    /// pushes go straight to the surface callback.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Routing`] if the participant pair is unsupported.
    /// Handler failures never surface here.
    pub async fn post_message(&self, message: Message) -> Result<()> {
        if Route::classify(message.from, message.to)?.is_push() {
            self.push(message)?;
        } else {
            self.request(message).await?;
        }
        Ok(())
    }

    /// Runs a request through its handler and delivers the reply.
    ///
    /// The reply is sent to the sender's responder and also returned.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Routing`] if the pair is not a request route.
    /// Resolution and handler failures are carried in the reply.
    pub async fn request(&self, mut message: Message) -> Result<MessageResponse> {
        let route = Route::classify(message.from, message.to)?;
        let content = std::mem::take(&mut message.content);

        debug!(
            message_id = %message.id,
            view_id = %message.view_id,
            ?route,
            "Dispatching request"
        );

        let result = match route {
            Route::ContentScriptToPlugin => self.invoke_content_script(&message, content).await,
            Route::UserWebviewToPlugin => self.invoke_view(&message, content).await,
            Route::PluginToUserWebview => return Err(Error::routing(message.from, message.to)),
        };

        if let Err(ref e) = result {
            debug!(message_id = %message.id, error = %e, "Request failed");
        }

        let reply = MessageResponse::new(message.id.clone(), Outcome::from(result));
        self.deliver_reply(&message, reply.clone());
        Ok(reply)
    }

    /// Delivers a push to the target user webview's callback.
    ///
    /// Invoked synchronously; never touches the responder registry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Routing`] if the pair is not the push route.
    pub fn push(&self, message: Message) -> Result<Delivery> {
        if !Route::classify(message.from, message.to)?.is_push() {
            return Err(Error::routing(message.from, message.to));
        }

        let key = SurfaceKey::new(SurfaceType::UserWebview, message.view_id.clone());

        let Some(callback) = self.callbacks.get(&key) else {
            return Ok(dropped(&Error::callback_missing(key, message.id.clone())));
        };

        debug!(message_id = %message.id, %key, "Delivering push");
        callback(PushEnvelope::new(message));
        Ok(Delivery::Delivered)
    }

    /// Sends a reply for `message` to the sender's responder.
    ///
    /// The responder is chosen by the sender role: content scripts answer
    /// through the note viewer, webviews through their own surface.
    pub fn send_response(&self, message: &Message, outcome: Outcome) -> Delivery {
        let reply = MessageResponse::new(message.id.clone(), outcome);
        self.deliver_reply(message, reply)
    }

    /// Looks up the responder and hands it the reply.
    fn deliver_reply(&self, message: &Message, reply: MessageResponse) -> Delivery {
        let Some(key) = responder_key(message.from, &message.view_id) else {
            warn!(
                message_id = %message.id,
                from = %message.from,
                "Sender has no responder surface, reply dropped"
            );
            return Delivery::Dropped;
        };

        let Some(responder) = self.responders.get(&key) else {
            return dropped(&Error::responder_missing(key, reply.response_id));
        };

        debug!(response_id = %reply.response_id, %key, success = reply.is_success(), "Delivering reply");
        responder(reply);
        Delivery::Delivered
    }

    /// Content script route: resolve the owner, then run the handler.
    async fn invoke_content_script(&self, message: &Message, content: Value) -> Result<Value> {
        let content_script_id = message
            .content_script_id
            .as_ref()
            .ok_or_else(|| Error::resolution("Message has no contentScriptId"))?;

        let extension_id = self
            .engine
            .resolve_owner_of_content_script(content_script_id)
            .ok_or_else(|| {
                Error::resolution(format!("No extension owns content script {content_script_id}"))
            })?;

        debug!(%extension_id, %content_script_id, "Invoking content script handler");

        self.engine
            .invoke_content_script_handler(content_script_id, content)
            .await
            .map_err(|e| if e.is_foldable() { e } else { Error::handler(e.to_string()) })
    }

    /// Webview route: every failure is a handler failure.
    async fn invoke_view(&self, message: &Message, content: Value) -> Result<Value> {
        let extension_id = message
            .extension_id
            .as_ref()
            .ok_or_else(|| Error::handler("Message has no extensionId"))?;

        debug!(%extension_id, view_id = %message.view_id, "Invoking view handler");

        self.engine
            .invoke_view_handler(extension_id, &message.view_id, content)
            .await
            .map_err(|e| match e {
                Error::Handler { .. } => e,
                Error::Resolution { message } => Error::handler(message),
                other => Error::handler(other.to_string()),
            })
    }
}

/// Logs a missing-sink drop.
fn dropped(err: &Error) -> Delivery {
    debug_assert!(err.is_delivery_error());
    warn!(error = %err, "No sink registered, payload dropped");
    Delivery::Dropped
}

/// Maps a sender role to the surface that receives its replies.
fn responder_key(from: Participant, view_id: &ViewId) -> Option<SurfaceKey> {
    let surface = match from {
        Participant::ContentScript => SurfaceType::NoteTextViewer,
        Participant::UserWebview => SurfaceType::UserWebview,
        Participant::Plugin => return None,
    };
    Some(SurfaceKey::new(surface, view_id.clone()))
}

// ============================================================================
// MessageRouter - Registries
// ============================================================================

impl MessageRouter {
    /// Registers the reply sink for a surface, replacing any existing one.
    pub fn register_responder<F>(
        &self,
        surface: SurfaceType,
        view_id: impl Into<ViewId>,
        responder: F,
    ) where
        F: Fn(MessageResponse) + Send + Sync + 'static,
    {
        self.responders
            .register(SurfaceKey::new(surface, view_id.into()), Arc::new(responder));
    }

    /// Removes the reply sink for a surface. Idempotent.
    pub fn unregister_responder(&self, surface: SurfaceType, view_id: &ViewId) {
        self.responders
            .unregister(&SurfaceKey::new(surface, view_id.clone()));
    }

    /// Registers the push sink for a surface, replacing any existing one.
    pub fn register_callback<F>(
        &self,
        surface: SurfaceType,
        view_id: impl Into<ViewId>,
        callback: F,
    ) where
        F: Fn(PushEnvelope) + Send + Sync + 'static,
    {
        self.callbacks
            .register(SurfaceKey::new(surface, view_id.into()), Arc::new(callback));
    }

    /// Removes the push sink for a surface. Idempotent.
    pub fn unregister_callback(&self, surface: SurfaceType, view_id: &ViewId) {
        self.callbacks
            .unregister(&SurfaceKey::new(surface, view_id.clone()));
    }

    /// Returns `true` if a reply sink is registered for the surface.
    #[must_use]
    pub fn has_responder(&self, surface: SurfaceType, view_id: &ViewId) -> bool {
        self.responders
            .contains(&SurfaceKey::new(surface, view_id.clone()))
    }

    /// Returns `true` if a push sink is registered for the surface.
    #[must_use]
    pub fn has_callback(&self, surface: SurfaceType, view_id: &ViewId) -> bool {
        self.callbacks
            .contains(&SurfaceKey::new(surface, view_id.clone()))
    }
}

// ============================================================================
// RouterBuilder
// ============================================================================

/// Builder for a [`MessageRouter`].
#[derive(Default)]
pub struct RouterBuilder {
    /// Extension runtime.
    engine: Option<Arc<dyn ExtensionEngine>>,
}

impl fmt::Debug for RouterBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouterBuilder")
            .field("engine", &self.engine.is_some())
            .finish()
    }
}

impl RouterBuilder {
    /// Creates an empty builder.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the extension engine.
    #[inline]
    #[must_use]
    pub fn engine(mut self, engine: impl ExtensionEngine + 'static) -> Self {
        self.engine = Some(Arc::new(engine));
        self
    }

    /// Sets an already shared extension engine.
    #[inline]
    #[must_use]
    pub fn shared_engine(mut self, engine: Arc<dyn ExtensionEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Builds the router.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if no engine was set.
    pub fn build(self) -> Result<MessageRouter> {
        let engine = self.engine.ok_or_else(|| {
            Error::config(
                "Extension engine is required. Use .engine() to set it.\n\
                 Example: MessageRouter::builder().engine(HandlerTable::new())",
            )
        })?;

        Ok(MessageRouter::new(engine))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use parking_lot::Mutex;
    use serde_json::json;
    use tokio::sync::Notify;

    use crate::identifiers::MessageId;
    use crate::router::HandlerTable;

    type Sink<T> = Arc<Mutex<Vec<T>>>;

    fn record_responder(
        router: &MessageRouter,
        surface: SurfaceType,
        view: &str,
    ) -> Sink<MessageResponse> {
        let sink: Sink<MessageResponse> = Arc::default();
        let writer = Arc::clone(&sink);
        router.register_responder(surface, view, move |reply| writer.lock().push(reply));
        sink
    }

    fn ping_table() -> HandlerTable {
        let table = HandlerTable::new();
        table.on_content_script("cs1", "ext1", |content| async move {
            assert_eq!(content, json!({ "op": "ping" }));
            Ok(json!({ "pong": true }))
        });
        table.on_view("ext1", "web-1", |content| async move {
            Ok(json!({ "seen": content }))
        });
        table.on_view("ext1", "web-broken", |_| async { Err(Error::handler("view crashed")) });
        table
    }

    fn router() -> MessageRouter {
        MessageRouter::builder()
            .engine(ping_table())
            .build()
            .expect("router")
    }

    #[test]
    fn test_classify_routes() {
        use Participant::*;

        assert_eq!(Route::classify(ContentScript, Plugin).ok(), Some(Route::ContentScriptToPlugin));
        assert_eq!(Route::classify(UserWebview, Plugin).ok(), Some(Route::UserWebviewToPlugin));
        assert_eq!(Route::classify(Plugin, UserWebview).ok(), Some(Route::PluginToUserWebview));

        for (from, to) in [
            (Plugin, ContentScript),
            (Plugin, Plugin),
            (ContentScript, UserWebview),
            (UserWebview, ContentScript),
            (ContentScript, ContentScript),
            (UserWebview, UserWebview),
        ] {
            assert!(matches!(Route::classify(from, to), Err(Error::Routing { .. })));
        }
    }

    #[test]
    fn test_builder_requires_engine() {
        let err = MessageRouter::builder().build().unwrap_err();
        assert!(err.to_string().contains("engine"));
    }

    #[tokio::test]
    async fn test_content_script_round_trip() {
        let router = router();
        let replies = record_responder(&router, SurfaceType::NoteTextViewer, "note-1");

        let message = Message::content_script_request("cs1", "note-1", json!({ "op": "ping" }));
        let id = message.id.clone();
        router.post_message(message).await.expect("routed");

        let replies = replies.lock();
        assert_eq!(replies.len(), 1);
        assert_eq!(
            serde_json::to_value(&replies[0]).expect("serialize"),
            json!({ "responseId": id.as_str(), "response": { "pong": true }, "error": null })
        );
    }

    #[tokio::test]
    async fn test_webview_reply_goes_to_webview_responder() {
        let router = router();
        let note = record_responder(&router, SurfaceType::NoteTextViewer, "web-1");
        let web = record_responder(&router, SurfaceType::UserWebview, "web-1");

        let reply = router
            .request(Message::webview_request("ext1", "web-1", json!(5)))
            .await
            .expect("routed");

        assert_eq!(reply.response(), Some(&json!({ "seen": 5 })));
        assert!(note.lock().is_empty());
        assert_eq!(web.lock().as_slice(), &[reply]);
    }

    #[tokio::test]
    async fn test_unknown_content_script_is_resolution_error_reply() {
        let router = router();
        let replies = record_responder(&router, SurfaceType::NoteTextViewer, "note-1");

        let reply = router
            .request(Message::content_script_request("cs-unknown", "note-1", Value::Null))
            .await
            .expect("routed");

        let error = reply.error().expect("error set");
        assert!(error.starts_with("Resolution failed"));
        assert!(reply.response().is_none());
        assert_eq!(replies.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_content_script_id_is_resolution_error() {
        let router = router();
        let mut message = Message::content_script_request("cs1", "note-1", Value::Null);
        message.content_script_id = None;

        let reply = router.request(message).await.expect("routed");
        assert!(reply.error().is_some_and(|e| e.starts_with("Resolution failed")));
    }

    #[tokio::test]
    async fn test_webview_failures_are_handler_errors() {
        let router = router();

        let broken = router
            .request(Message::webview_request("ext1", "web-broken", Value::Null))
            .await
            .expect("routed");
        assert_eq!(broken.error(), Some("Handler failed: view crashed"));

        let unknown = router
            .request(Message::webview_request("ext-missing", "web-1", Value::Null))
            .await
            .expect("routed");
        assert!(unknown.error().is_some_and(|e| e.starts_with("Handler failed")));

        let mut anonymous = Message::webview_request("ext1", "web-1", Value::Null);
        anonymous.extension_id = None;
        let reply = router.request(anonymous).await.expect("routed");
        assert!(reply.error().is_some_and(|e| e.starts_with("Handler failed")));
    }

    #[tokio::test]
    async fn test_content_script_errors_keep_or_rewrap_kind() {
        let table = HandlerTable::new();
        table.on_content_script("cs-gone", "ext1", |_| async {
            Err(Error::resolution("note closed"))
        });
        table.on_content_script("cs-io", "ext1", |_| async { Err(Error::ChannelClosed) });
        let router = MessageRouter::builder().engine(table).build().expect("router");

        let kept = router
            .request(Message::content_script_request("cs-gone", "note-1", Value::Null))
            .await
            .expect("routed");
        assert_eq!(kept.error(), Some("Resolution failed: note closed"));

        let rewrapped = router
            .request(Message::content_script_request("cs-io", "note-1", Value::Null))
            .await
            .expect("routed");
        assert_eq!(rewrapped.error(), Some("Handler failed: Channel closed"));
    }

    #[tokio::test]
    async fn test_unsupported_pair_raises_routing_error() {
        let router = router();
        let replies = record_responder(&router, SurfaceType::UserWebview, "web-1");

        let message = Message::new(Participant::Plugin, Participant::ContentScript, "web-1", Value::Null);
        let result = router.post_message(message).await;

        assert!(matches!(result, Err(Error::Routing { .. })));
        assert!(replies.lock().is_empty());
    }

    #[tokio::test]
    async fn test_request_rejects_push_route() {
        let router = router();
        let result = router
            .request(Message::plugin_push("ext1", "web-1", Value::Null))
            .await;
        assert!(matches!(result, Err(Error::Routing { .. })));
    }

    #[tokio::test]
    async fn test_missing_responder_drops_without_error() {
        let router = router();

        let message = Message::content_script_request("cs1", "note-1", json!({ "op": "ping" }));
        let reply = router.request(message.clone()).await.expect("routed");
        assert!(reply.is_success());

        let delivery = router.send_response(&message, Outcome::Response(Value::Null));
        assert_eq!(delivery, Delivery::Dropped);
    }

    #[test]
    fn test_plugin_sender_has_no_responder() {
        let router = router();
        record_responder(&router, SurfaceType::UserWebview, "web-1");

        let message = Message::plugin_push("ext1", "web-1", Value::Null);
        let delivery = router.send_response(&message, Outcome::Response(Value::Null));
        assert_eq!(delivery, Delivery::Dropped);
    }

    #[test]
    fn test_push_invokes_callback_synchronously() {
        let router = router();
        let replies = record_responder(&router, SurfaceType::UserWebview, "web-1");
        let pushes: Sink<PushEnvelope> = Arc::default();
        let writer = Arc::clone(&pushes);
        router.register_callback(SurfaceType::UserWebview, "web-1", move |push| {
            writer.lock().push(push)
        });

        let message = Message::plugin_push("ext1", "web-1", json!({ "tick": 1 }));
        let id = message.id.clone();
        let delivery = router.push(message.clone()).expect("routed");

        assert_eq!(delivery, Delivery::Delivered);
        let pushes = pushes.lock();
        assert_eq!(pushes.len(), 1);
        assert_eq!(pushes[0].response_id, id);
        assert_eq!(pushes[0].message, message);
        assert!(replies.lock().is_empty());
    }

    #[test]
    fn test_push_without_callback_is_dropped() {
        let router = router();
        let delivery = router
            .push(Message::plugin_push("ext1", "web-1", Value::Null))
            .expect("routed");
        assert_eq!(delivery, Delivery::Dropped);
    }

    #[test]
    fn test_push_rejects_request_route() {
        let router = router();
        let result = router.push(Message::webview_request("ext1", "web-1", Value::Null));
        assert!(matches!(result, Err(Error::Routing { .. })));
    }

    #[test]
    fn test_unregister_callback() {
        let router = router();
        let view = ViewId::from("web-1");
        router.register_callback(SurfaceType::UserWebview, view.clone(), |_| {});
        assert!(router.has_callback(SurfaceType::UserWebview, &view));

        router.unregister_callback(SurfaceType::UserWebview, &view);
        router.unregister_callback(SurfaceType::UserWebview, &view);
        assert!(!router.has_callback(SurfaceType::UserWebview, &view));
    }

    #[tokio::test]
    async fn test_reregistered_responder_receives_next_reply() {
        let router = router();
        let view = ViewId::from("note-1");
        let old = record_responder(&router, SurfaceType::NoteTextViewer, "note-1");

        router
            .request(Message::content_script_request("cs1", "note-1", json!({ "op": "ping" })))
            .await
            .expect("routed");

        router.unregister_responder(SurfaceType::NoteTextViewer, &view);
        assert!(!router.has_responder(SurfaceType::NoteTextViewer, &view));
        let new = record_responder(&router, SurfaceType::NoteTextViewer, "note-1");

        router
            .request(Message::content_script_request("cs1", "note-1", json!({ "op": "ping" })))
            .await
            .expect("routed");

        assert_eq!(old.lock().len(), 1);
        assert_eq!(new.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_replies_follow_completion_order() {
        let gate = Arc::new(Notify::new());
        let table = HandlerTable::new();
        let slow_gate = Arc::clone(&gate);
        table.on_view("ext1", "web-1", move |content| {
            let gate = Arc::clone(&slow_gate);
            async move {
                if content["slow"].as_bool().unwrap_or(false) {
                    gate.notified().await;
                }
                Ok(content)
            }
        });

        let router = Arc::new(MessageRouter::builder().engine(table).build().expect("router"));
        let replies = record_responder(&router, SurfaceType::UserWebview, "web-1");

        let slow = Message::webview_request("ext1", "web-1", json!({ "slow": true })).with_id("first");
        let fast = Message::webview_request("ext1", "web-1", json!({ "slow": false })).with_id("second");

        let slow_task = tokio::spawn({
            let router = Arc::clone(&router);
            async move { router.post_message(slow).await }
        });
        tokio::task::yield_now().await;

        router.post_message(fast).await.expect("routed");
        assert_eq!(
            replies.lock().iter().map(|r| r.response_id.clone()).collect::<Vec<_>>(),
            vec![MessageId::from("second")]
        );

        gate.notify_one();
        slow_task.await.expect("join").expect("routed");

        let replies = replies.lock();
        let ids: Vec<_> = replies.iter().map(|r| r.response_id.as_str()).collect();
        assert_eq!(ids, vec!["second", "first"]);
        assert_eq!(replies[1].response(), Some(&json!({ "slow": true })));
    }
}
