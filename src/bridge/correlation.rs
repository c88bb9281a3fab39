//! Correlation bridge: awaitable calls over one-way boundary events.
//!
//! # Call Lifecycle
//!
//! 1. [`CorrelationBridge::call`] generates a fresh [`MessageId`], stores a
//!    resolver under it and emits a [`GuestReport::Message`]
//! 2. The returned [`PendingCall`] is awaited by the caller
//! 3. [`CorrelationBridge::handle_reply`] matches `responseId`, removes the
//!    entry and settles the call
//!
//! Pushes bypass the pending table and go to the push handler.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, timeout_at};
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::MessageId;
use crate::protocol::{
    GuestMessage, GuestReport, HostCommand, MessageResponse, Participant, PushEnvelope,
    WebviewSignal,
};

use super::options::BridgeOptions;

// ============================================================================
// Types
// ============================================================================

/// Map of outstanding call ids to their resolvers.
type PendingMap = FxHashMap<MessageId, oneshot::Sender<MessageResponse>>;

/// Handler for pushed messages.
pub type PushHandler = Arc<dyn Fn(PushEnvelope) + Send + Sync>;

/// Shared bridge state.
struct BridgeInner {
    /// Sender role stamped on every call.
    from: Participant,
    /// Recipient role stamped on every call.
    to: Participant,
    /// Bridge settings.
    options: BridgeOptions,
    /// Outbound boundary events.
    outbound: mpsc::UnboundedSender<GuestReport>,
    /// Outstanding calls.
    pending: Mutex<PendingMap>,
    /// Receiver for pushes.
    push_handler: Mutex<Option<PushHandler>>,
}

// ============================================================================
// CorrelationBridge
// ============================================================================

/// Guest-side endpoint of one boundary.
///
/// `Clone` shares the same pending table.
///
/// # Example
///
/// ```ignore
/// let (tx, rx) = mpsc::unbounded_channel();
/// let bridge = CorrelationBridge::user_webview(tx);
///
/// let call = bridge.call(json!({ "op": "save" }))?;
/// // forward rx events to the host, feed replies into bridge.handle_reply()
/// let value = call.await?;
/// ```
#[derive(Clone)]
pub struct CorrelationBridge {
    inner: Arc<BridgeInner>,
}

impl fmt::Debug for CorrelationBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CorrelationBridge")
            .field("from", &self.inner.from)
            .field("to", &self.inner.to)
            .field("pending", &self.pending_count())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// CorrelationBridge - Constructors
// ============================================================================

impl CorrelationBridge {
    /// Creates a bridge with default options.
    #[must_use]
    pub fn new(
        from: Participant,
        to: Participant,
        outbound: mpsc::UnboundedSender<GuestReport>,
    ) -> Self {
        Self::with_options(from, to, outbound, BridgeOptions::default())
    }

    /// Creates a bridge with custom options.
    #[must_use]
    pub fn with_options(
        from: Participant,
        to: Participant,
        outbound: mpsc::UnboundedSender<GuestReport>,
        options: BridgeOptions,
    ) -> Self {
        Self {
            inner: Arc::new(BridgeInner {
                from,
                to,
                options,
                outbound,
                pending: Mutex::new(PendingMap::default()),
                push_handler: Mutex::new(None),
            }),
        }
    }

    /// Bridge for a user webview calling its extension.
    #[must_use]
    pub fn user_webview(outbound: mpsc::UnboundedSender<GuestReport>) -> Self {
        Self::new(Participant::UserWebview, Participant::Plugin, outbound)
    }

    /// Bridge for a content script calling its extension.
    #[must_use]
    pub fn content_script(
        options: BridgeOptions,
        outbound: mpsc::UnboundedSender<GuestReport>,
    ) -> Self {
        Self::with_options(Participant::ContentScript, Participant::Plugin, outbound, options)
    }
}

// ============================================================================
// CorrelationBridge - Calls
// ============================================================================

impl CorrelationBridge {
    /// Starts a call and returns immediately.
    ///
    /// The outbound event is emitted before this returns; await the
    /// [`PendingCall`] for the reply.
    ///
    /// # Errors
    ///
    /// - [`Error::TooManyPending`] if the pending limit is reached
    /// - [`Error::ChannelClosed`] if the outbound channel is closed
    pub fn call(&self, content: Value) -> Result<PendingCall> {
        let id = MessageId::generate();
        let (tx, rx) = oneshot::channel();

        {
            let mut pending = self.inner.pending.lock();
            if let Some(max) = self.inner.options.max_pending
                && pending.len() >= max
            {
                warn!(pending = pending.len(), max, "Too many pending calls");
                return Err(Error::too_many_pending(pending.len(), max));
            }
            pending.insert(id.clone(), tx);
        }

        let report = GuestReport::Message {
            message: GuestMessage {
                from: self.inner.from,
                to: self.inner.to,
                id: id.clone(),
                content,
                content_script_id: self.inner.options.content_script_id.clone(),
            },
        };

        if self.inner.outbound.send(report).is_err() {
            self.inner.pending.lock().remove(&id);
            return Err(Error::ChannelClosed);
        }

        trace!(message_id = %id, "Call sent");

        let call_timeout = self.inner.options.call_timeout;
        Ok(PendingCall {
            id,
            rx,
            call_timeout,
            deadline: call_timeout.map(|limit| Instant::now() + limit),
            inner: Arc::clone(&self.inner),
        })
    }

    /// Settles the pending call matching `reply.response_id`.
    ///
    /// Returns `false` if no call was waiting for it.
    pub fn handle_reply(&self, reply: MessageResponse) -> bool {
        let tx = self.inner.pending.lock().remove(&reply.response_id);

        let Some(tx) = tx else {
            warn!(response_id = %reply.response_id, "Reply for unknown call");
            return false;
        };

        let response_id = reply.response_id.clone();
        if tx.send(reply).is_err() {
            debug!(%response_id, "Caller abandoned call before reply");
        } else {
            trace!(%response_id, "Call settled");
        }
        true
    }

    /// Returns the number of outstanding calls.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.inner.pending.lock().len()
    }

    /// Drops every outstanding call; waiters see [`Error::ChannelClosed`].
    pub fn cancel_all(&self) {
        let pending: Vec<_> = self.inner.pending.lock().drain().collect();
        let count = pending.len();
        drop(pending);

        if count > 0 {
            debug!(count, "Cancelled pending calls");
        }
    }
}

// ============================================================================
// CorrelationBridge - Push Channel
// ============================================================================

impl CorrelationBridge {
    /// Sets the handler invoked for every push.
    pub fn set_push_handler<F>(&self, handler: F)
    where
        F: Fn(PushEnvelope) + Send + Sync + 'static,
    {
        *self.inner.push_handler.lock() = Some(Arc::new(handler));
    }

    /// Clears the push handler.
    pub fn clear_push_handler(&self) {
        *self.inner.push_handler.lock() = None;
    }

    /// Invokes the push handler, if any. Returns `false` if none is set.
    pub fn handle_push(&self, envelope: PushEnvelope) -> bool {
        let handler = self.inner.push_handler.lock().clone();

        match handler {
            Some(handler) => {
                handler(envelope);
                true
            }
            None => {
                debug!(response_id = %envelope.response_id, "Push with no handler ignored");
                false
            }
        }
    }

    /// Asks the host to register this surface for pushes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ChannelClosed`] if the outbound channel is closed.
    pub fn request_push_channel(&self) -> Result<()> {
        self.emit(GuestReport::RegisterCallback)
    }
}

// ============================================================================
// CorrelationBridge - Boundary Events
// ============================================================================

impl CorrelationBridge {
    /// Routes an inbound host command.
    ///
    /// Replies and pushes are consumed; other commands are handed back.
    pub fn handle_command(&self, command: HostCommand) -> Option<HostCommand> {
        match command {
            HostCommand::Response { message } => {
                self.handle_reply(message);
                None
            }
            HostCommand::PluginMessage { message } => {
                self.handle_push(message);
                None
            }
            other => Some(other),
        }
    }

    /// Signals that the guest finished its initial setup.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ChannelClosed`] if the outbound channel is closed.
    pub fn signal_ready(&self) -> Result<()> {
        self.emit(GuestReport::Webview(WebviewSignal::Ready))
    }

    /// Acknowledges a committed `setHtml`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ChannelClosed`] if the outbound channel is closed.
    pub fn acknowledge_html(&self, hash: impl Into<String>) -> Result<()> {
        self.emit(GuestReport::Webview(WebviewSignal::HtmlIsSet { hash: hash.into() }))
    }

    fn emit(&self, report: GuestReport) -> Result<()> {
        self.inner
            .outbound
            .send(report)
            .map_err(|_| Error::ChannelClosed)
    }
}

// ============================================================================
// PendingCall
// ============================================================================

/// An outstanding call, settled by its matching reply.
///
/// Await it directly: `bridge.call(content)?.await`. The timeout runs from
/// [`CorrelationBridge::call`], not from the first poll. Dropping the call
/// removes its pending entry.
#[must_use = "a call does nothing useful unless awaited"]
pub struct PendingCall {
    /// Correlation id.
    id: MessageId,
    /// Resolver end.
    rx: oneshot::Receiver<MessageResponse>,
    /// Configured timeout, for error reporting.
    call_timeout: Option<Duration>,
    /// Fixed when the call was made.
    deadline: Option<Instant>,
    /// Owning bridge, for timeout cleanup.
    inner: Arc<BridgeInner>,
}

impl fmt::Debug for PendingCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingCall")
            .field("id", &self.id)
            .field("call_timeout", &self.call_timeout)
            .field("deadline", &self.deadline)
            .finish_non_exhaustive()
    }
}

impl PendingCall {
    /// Returns the correlation id.
    #[inline]
    #[must_use]
    pub fn id(&self) -> &MessageId {
        &self.id
    }

    /// Waits for the reply.
    ///
    /// # Errors
    ///
    /// - [`Error::Remote`] if the reply carries an error
    /// - [`Error::Timeout`] if the configured timeout elapses
    /// - [`Error::ChannelClosed`] if the call was cancelled
    pub async fn wait(mut self) -> Result<Value> {
        let reply = match (self.deadline, self.call_timeout) {
            (Some(deadline), Some(limit)) => match timeout_at(deadline, &mut self.rx).await {
                Ok(reply) => reply?,
                Err(_) => {
                    debug!(message_id = %self.id, "Call timed out");
                    return Err(Error::timeout(self.id.clone(), limit.as_millis() as u64));
                }
            },
            _ => (&mut self.rx).await?,
        };

        reply.into_result()
    }
}

impl Drop for PendingCall {
    fn drop(&mut self) {
        if self.inner.pending.lock().remove(&self.id).is_some() {
            trace!(message_id = %self.id, "Removed unsettled call");
        }
    }
}

impl IntoFuture for PendingCall {
    type Output = Result<Value>;
    type IntoFuture = BoxFuture<'static, Result<Value>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.wait())
    }
}

// ============================================================================
// Tests
// ============================================================================
