//! Host-side listener for one mounted UI surface.
//!
//! Decodes [`GuestReport`]s into router calls and forwards replies and
//! pushes back as [`HostCommand`]s.
//!
//! # Mount Order
//!
//! [`SurfaceHost::unmount`] must complete before a new host for the same
//! [`SurfaceKey`] calls [`SurfaceHost::mount`], otherwise the registries
//! may point at a torn-down surface.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::identifiers::{ExtensionId, SurfaceKey, SurfaceType};
use crate::protocol::{GuestReport, HostCommand, WebviewSignal, decode_report};
use crate::router::MessageRouter;

// ============================================================================
// HostState
// ============================================================================

/// Per-mount surface state.
#[derive(Debug, Default)]
struct HostState {
    /// Guest sent `ready`.
    ready: bool,
    /// Last hash acknowledged by `htmlIsSet`.
    committed_hash: Option<String>,
    /// Paths already injected with `setScripts`.
    scripts: FxHashSet<String>,
    /// Source per `setScript` key.
    keyed_scripts: FxHashMap<String, String>,
}

// ============================================================================
// SurfaceHost
// ============================================================================

/// Host endpoint wiring one surface to the router.
///
/// # Example
///
/// ```ignore
/// let (to_guest, mut guest_rx) = mpsc::unbounded_channel();
/// let host = Arc::new(SurfaceHost::new(
///     SurfaceKey::user_webview("web-1"),
///     Some(ExtensionId::from("ext1")),
///     Arc::clone(&router),
///     to_guest,
/// ));
/// host.mount();
/// tokio::spawn(Arc::clone(&host).run(from_guest_rx));
/// ```
pub struct SurfaceHost {
    /// Registry key of this surface.
    key: SurfaceKey,
    /// Extension owning the surface, stamped on outgoing messages.
    extension_id: Option<ExtensionId>,
    /// Shared router.
    router: Arc<MessageRouter>,
    /// Commands to the guest.
    outbound: mpsc::UnboundedSender<HostCommand>,
    /// Mount state.
    state: Mutex<HostState>,
}

impl fmt::Debug for SurfaceHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SurfaceHost")
            .field("key", &self.key)
            .field("extension_id", &self.extension_id)
            .field("state", &*self.state.lock())
            .finish_non_exhaustive()
    }
}

impl SurfaceHost {
    /// Creates a host for `key`. Call [`mount`](Self::mount) before use.
    #[must_use]
    pub fn new(
        key: SurfaceKey,
        extension_id: Option<ExtensionId>,
        router: Arc<MessageRouter>,
        outbound: mpsc::UnboundedSender<HostCommand>,
    ) -> Self {
        Self {
            key,
            extension_id,
            router,
            outbound,
            state: Mutex::new(HostState::default()),
        }
    }

    /// Returns the surface key.
    #[inline]
    #[must_use]
    pub fn key(&self) -> &SurfaceKey {
        &self.key
    }

    /// Registers the responder that forwards replies to the guest.
    pub fn mount(&self) {
        let outbound = self.outbound.clone();
        let key = self.key.clone();

        self.router
            .register_responder(self.key.surface, self.key.view_id.clone(), move |reply| {
                if outbound.send(HostCommand::Response { message: reply }).is_err() {
                    warn!(%key, "Guest channel closed, reply dropped");
                }
            });

        debug!(key = %self.key, "Surface mounted");
    }

    /// Unregisters the responder and callback and resets mount state.
    pub fn unmount(&self) {
        self.router
            .unregister_responder(self.key.surface, &self.key.view_id);
        self.router
            .unregister_callback(self.key.surface, &self.key.view_id);
        *self.state.lock() = HostState::default();

        debug!(key = %self.key, "Surface unmounted");
    }

    /// Returns `true` once the guest has signalled `ready`.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.state.lock().ready
    }

    /// Returns the last hash acknowledged by the guest.
    #[must_use]
    pub fn committed_html_hash(&self) -> Option<String> {
        self.state.lock().committed_hash.clone()
    }
}

// ============================================================================
// SurfaceHost - Guest Reports
// ============================================================================

impl SurfaceHost {
    /// Handles one report from the guest.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Routing`] if a message declares an unsupported pair.
    pub async fn handle_report(&self, report: GuestReport) -> Result<()> {
        match report {
            GuestReport::Message { message } => {
                let message =
                    message.into_message(self.key.view_id.clone(), self.extension_id.clone());
                self.router.post_message(message).await
            }

            GuestReport::RegisterCallback => {
                self.register_callback();
                Ok(())
            }

            GuestReport::Webview(WebviewSignal::Ready) => {
                self.state.lock().ready = true;
                info!(key = %self.key, "Surface ready");
                Ok(())
            }

            GuestReport::Webview(WebviewSignal::HtmlIsSet { hash }) => {
                debug!(key = %self.key, %hash, "HTML committed");
                self.state.lock().committed_hash = Some(hash);
                Ok(())
            }
        }
    }

    /// Decodes and handles a raw report.
    ///
    /// # Errors
    ///
    /// - [`Error::Json`] if the text is not a valid report
    /// - [`Error::Routing`] if a message declares an unsupported pair
    pub async fn handle_raw(&self, text: &str) -> Result<()> {
        let report = decode_report(text)?;
        self.handle_report(report).await
    }

    /// Event loop: handles reports until the channel closes.
    ///
    /// Message reports run on their own task so slow handlers do not hold
    /// up later calls.
    pub async fn run(self: Arc<Self>, mut inbound: mpsc::UnboundedReceiver<GuestReport>) {
        while let Some(report) = inbound.recv().await {
            if matches!(report, GuestReport::Message { .. }) {
                let host = Arc::clone(&self);
                tokio::spawn(async move {
                    if let Err(e) = host.handle_report(report).await {
                        warn!(key = %host.key, error = %e, "Guest message rejected");
                    }
                });
            } else if let Err(e) = self.handle_report(report).await {
                warn!(key = %self.key, error = %e, "Guest report failed");
            }
        }

        debug!(key = %self.key, "Surface event loop terminated");
    }

    /// Registers the callback that forwards pushes to the guest.
    /// Only user webviews receive pushes; other surfaces are refused.
    fn register_callback(&self) {
        if self.key.surface != SurfaceType::UserWebview {
            warn!(key = %self.key, "Push channel requested by non-webview surface, ignored");
            return;
        }

        let outbound = self.outbound.clone();
        let key = self.key.clone();

        self.router
            .register_callback(self.key.surface, self.key.view_id.clone(), move |push| {
                if outbound.send(HostCommand::PluginMessage { message: push }).is_err() {
                    warn!(%key, "Guest channel closed, push dropped");
                }
            });

        debug!(key = %self.key, "Push callback registered");
    }
}

// ============================================================================
// SurfaceHost - Host Commands
// ============================================================================

impl SurfaceHost {
    /// Replaces rendered content; the guest answers with `htmlIsSet`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ChannelClosed`] if the guest channel is closed.
    pub fn set_html(&self, html: impl Into<String>, hash: impl Into<String>) -> Result<()> {
        self.send(HostCommand::SetHtml {
            html: html.into(),
            hash: hash.into(),
        })
    }

    /// Replaces the script in slot `key`. Unchanged sources are not resent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ChannelClosed`] if the guest channel is closed.
    pub fn set_script(&self, script: impl Into<String>, key: impl Into<String>) -> Result<()> {
        let script = script.into();
        let key = key.into();

        {
            let mut state = self.state.lock();
            if state.keyed_scripts.get(&key) == Some(&script) {
                return Ok(());
            }
            state.keyed_scripts.insert(key.clone(), script.clone());
        }

        self.send(HostCommand::SetScript { script, key })
    }

    /// Injects any paths not already injected. Returns how many were sent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ChannelClosed`] if the guest channel is closed.
    pub fn set_scripts<I, S>(&self, paths: I) -> Result<usize>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let scripts: Vec<String> = {
            let mut state = self.state.lock();
            paths
                .into_iter()
                .map(Into::into)
                .filter(|path| state.scripts.insert(path.clone()))
                .collect()
        };

        if scripts.is_empty() {
            return Ok(0);
        }

        let count = scripts.len();
        self.send(HostCommand::SetScripts { scripts })?;
        Ok(count)
    }

    fn send(&self, command: HostCommand) -> Result<()> {
        self.outbound.send(command).map_err(|_| Error::ChannelClosed)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    use crate::bridge::CorrelationBridge;
    use crate::protocol::Message;
    use crate::router::HandlerTable;

    fn router() -> Arc<MessageRouter> {
        let table = HandlerTable::new();
        table.on_view("ext1", "web-1", |content| async move { Ok(json!({ "echo": content })) });
        table.on_content_script("cs1", "ext1", |_| async { Ok(json!({ "pong": true })) });
        Arc::new(MessageRouter::builder().engine(table).build().expect("router"))
    }

    fn webview_host(
        router: &Arc<MessageRouter>,
    ) -> (SurfaceHost, mpsc::UnboundedReceiver<HostCommand>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let host = SurfaceHost::new(
            SurfaceKey::user_webview("web-1"),
            Some(ExtensionId::from("ext1")),
            Arc::clone(router),
            tx,
        );
        (host, rx)
    }

    #[tokio::test]
    async fn test_mount_registers_responder() {
        let router = router();
        let (host, _rx) = webview_host(&router);
        let view = host.key().view_id.clone();

        host.mount();
        assert!(router.has_responder(SurfaceType::UserWebview, &view));

        host.unmount();
        assert!(!router.has_responder(SurfaceType::UserWebview, &view));
    }

    #[tokio::test]
    async fn test_message_report_round_trip() {
        let router = router();
        let (host, mut rx) = webview_host(&router);
        host.mount();

        host.handle_raw(
            r#"{"target":"postMessageService.message","message":{"from":"userWebview","to":"plugin","id":"7","content":"hi"}}"#,
        )
        .await
        .expect("handled");

        let Some(HostCommand::Response { message }) = rx.recv().await else {
            panic!("expected reply command");
        };
        assert_eq!(message.response_id.as_str(), "7");
        assert_eq!(message.response(), Some(&json!({ "echo": "hi" })));
    }

    #[tokio::test]
    async fn test_register_callback_forwards_pushes() {
        let router = router();
        let (host, mut rx) = webview_host(&router);
        host.mount();

        host.handle_report(GuestReport::RegisterCallback)
            .await
            .expect("handled");

        let push = Message::plugin_push("ext1", "web-1", json!({ "tick": 1 }));
        router.push(push.clone()).expect("routed");

        let Some(HostCommand::PluginMessage { message }) = rx.recv().await else {
            panic!("expected push command");
        };
        assert_eq!(message.response_id, push.id);
        assert_eq!(message.message.content, json!({ "tick": 1 }));

        host.unmount();
        assert!(!router.has_callback(SurfaceType::UserWebview, &host.key().view_id));
    }

    #[tokio::test]
    async fn test_lifecycle_signals_update_state() {
        let router = router();
        let (host, _rx) = webview_host(&router);

        assert!(!host.is_ready());
        host.handle_raw(r#"{"target":"UserWebview","message":"ready"}"#)
            .await
            .expect("handled");
        host.handle_raw(r#"{"target":"UserWebview","message":"htmlIsSet","hash":"h9"}"#)
            .await
            .expect("handled");

        assert!(host.is_ready());
        assert_eq!(host.committed_html_hash().as_deref(), Some("h9"));

        host.unmount();
        assert!(!host.is_ready());
        assert!(host.committed_html_hash().is_none());
    }

    #[tokio::test]
    async fn test_set_scripts_is_idempotent_per_path() {
        let router = router();
        let (host, mut rx) = webview_host(&router);

        assert_eq!(host.set_scripts(["a.js", "b.css"]).expect("sent"), 2);
        assert_eq!(host.set_scripts(["a.js", "c.js"]).expect("sent"), 1);
        assert_eq!(host.set_scripts(["c.js"]).expect("sent"), 0);

        assert_eq!(
            rx.try_recv().expect("command"),
            HostCommand::SetScripts {
                scripts: vec!["a.js".to_string(), "b.css".to_string()]
            }
        );
        assert_eq!(
            rx.try_recv().expect("command"),
            HostCommand::SetScripts {
                scripts: vec!["c.js".to_string()]
            }
        );
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_set_script_replaces_keyed_slot() {
        let router = router();
        let (host, mut rx) = webview_host(&router);

        host.set_script("body{}", "theme").expect("sent");
        host.set_script("body{}", "theme").expect("sent");
        host.set_script("p{}", "theme").expect("sent");
        host.set_html("<p/>", "h1").expect("sent");

        let names: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|command| command.name())
            .collect();
        assert_eq!(names, vec!["setScript", "setScript", "setHtml"]);
    }

    #[tokio::test]
    async fn test_routing_error_surfaces_from_report() {
        let router = router();
        let (host, _rx) = webview_host(&router);

        let result = host
            .handle_raw(
                r#"{"target":"postMessageService.message","message":{"from":"userWebview","to":"contentScript","id":"1"}}"#,
            )
            .await;
        assert!(matches!(result, Err(Error::Routing { .. })));
    }

    #[tokio::test]
    async fn test_note_viewer_refuses_push_channel() {
        let router = router();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let host = SurfaceHost::new(
            SurfaceKey::note_text_viewer("note-1"),
            None,
            Arc::clone(&router),
            tx,
        );
        host.mount();

        host.handle_report(GuestReport::RegisterCallback)
            .await
            .expect("handled");

        let view_id = &host.key().view_id;
        assert!(!router.has_callback(SurfaceType::NoteTextViewer, view_id));
        assert!(!router.has_callback(SurfaceType::UserWebview, view_id));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_bridge_and_host_end_to_end() {
        let router = router();
        let (to_host, from_guest) = mpsc::unbounded_channel();
        let (to_guest, mut guest_rx) = mpsc::unbounded_channel();

        let host = Arc::new(SurfaceHost::new(
            SurfaceKey::note_text_viewer("note-1"),
            None,
            Arc::clone(&router),
            to_guest,
        ));
        host.mount();
        tokio::spawn(Arc::clone(&host).run(from_guest));

        let bridge = CorrelationBridge::content_script(
            crate::BridgeOptions::new().with_content_script("cs1"),
            to_host,
        );
        let guest = bridge.clone();
        tokio::spawn(async move {
            while let Some(command) = guest_rx.recv().await {
                guest.handle_command(command);
            }
        });

        let value = bridge
            .call(json!({ "op": "ping" }))
            .expect("call")
            .await
            .expect("reply");
        assert_eq!(value, json!({ "pong": true }));
        assert_eq!(bridge.pending_count(), 0);
    }
}
