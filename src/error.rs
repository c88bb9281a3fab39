//! Error types for plugin RPC.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use plugin_rpc::{Error, Result};
//!
//! async fn example(bridge: &CorrelationBridge) -> Result<()> {
//!     let value = bridge.call(json!({ "op": "ping" }))?.await?;
//!     println!("{value}");
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`] |
//! | Routing | [`Error::Routing`] |
//! | Handler | [`Error::Resolution`], [`Error::Handler`], [`Error::Remote`] |
//! | Delivery | [`Error::ResponderMissing`], [`Error::CallbackMissing`] |
//! | Bridge | [`Error::Timeout`], [`Error::TooManyPending`], [`Error::ChannelClosed`] |
//! | External | [`Error::Json`] |

// ============================================================================
// Imports
// ============================================================================

use std::result::Result as StdResult;

use thiserror::Error;
use tokio::sync::oneshot::error::RecvError;

use crate::identifiers::{MessageId, SurfaceKey};
use crate::protocol::Participant;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when a router or bridge is built from incomplete settings.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    // ========================================================================
    // Routing Errors
    // ========================================================================
    /// No supported path for the declared participant pair.
    ///
    /// Raised directly to the caller of the router, never wrapped into a reply.
    #[error("Unsupported route: {from} -> {to}")]
    Routing {
        /// Declared sender.
        from: Participant,
        /// Declared recipient.
        to: Participant,
    },

    // ========================================================================
    // Handler Errors
    // ========================================================================
    /// An identifier could not be mapped to a live owner.
    #[error("Resolution failed: {message}")]
    Resolution {
        /// Description of what could not be resolved.
        message: String,
    },

    /// The resolved handler rejected or failed.
    #[error("Handler failed: {message}")]
    Handler {
        /// Failure reported by the handler.
        message: String,
    },

    /// The remote side settled a call with an error.
    ///
    /// Returned by a bridge when a reply carries `error`.
    #[error("Remote error: {message}")]
    Remote {
        /// Error text carried by the reply.
        message: String,
    },

    // ========================================================================
    // Delivery Errors
    // ========================================================================
    /// No responder registered for the reply's surface.
    #[error("No responder registered for {key} (reply to {response_id})")]
    ResponderMissing {
        /// Surface the reply was addressed to.
        key: SurfaceKey,
        /// Correlation id of the dropped reply.
        response_id: MessageId,
    },

    /// No callback registered for the push's surface.
    #[error("No callback registered for {key} (push {message_id})")]
    CallbackMissing {
        /// Surface the push was addressed to.
        key: SurfaceKey,
        /// Id of the dropped push message.
        message_id: MessageId,
    },

    // ========================================================================
    // Bridge Errors
    // ========================================================================
    /// Call timed out waiting for its reply.
    #[error("Call {message_id} timed out after {timeout_ms}ms")]
    Timeout {
        /// The call that timed out.
        message_id: MessageId,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// Too many outstanding calls on one bridge.
    #[error("Too many pending calls: {pending}/{max}")]
    TooManyPending {
        /// Calls currently outstanding.
        pending: usize,
        /// Configured limit.
        max: usize,
    },

    /// The other side of a channel went away.
    #[error("Channel closed")]
    ChannelClosed,

    // ========================================================================
    // External Errors
    // ========================================================================
    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<RecvError> for Error {
    fn from(_: RecvError) -> Self {
        Self::ChannelClosed
    }
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a routing error.
    #[inline]
    pub fn routing(from: Participant, to: Participant) -> Self {
        Self::Routing { from, to }
    }

    /// Creates a resolution error.
    #[inline]
    pub fn resolution(message: impl Into<String>) -> Self {
        Self::Resolution {
            message: message.into(),
        }
    }

    /// Creates a handler error.
    #[inline]
    pub fn handler(message: impl Into<String>) -> Self {
        Self::Handler {
            message: message.into(),
        }
    }

    /// Creates a remote error.
    #[inline]
    pub fn remote(message: impl Into<String>) -> Self {
        Self::Remote {
            message: message.into(),
        }
    }

    /// Creates a responder missing error.
    #[inline]
    pub fn responder_missing(key: SurfaceKey, response_id: MessageId) -> Self {
        Self::ResponderMissing { key, response_id }
    }

    /// Creates a callback missing error.
    #[inline]
    pub fn callback_missing(key: SurfaceKey, message_id: MessageId) -> Self {
        Self::CallbackMissing { key, message_id }
    }

    /// Creates a timeout error.
    #[inline]
    pub fn timeout(message_id: MessageId, timeout_ms: u64) -> Self {
        Self::Timeout {
            message_id,
            timeout_ms,
        }
    }

    /// Creates a too many pending error.
    #[inline]
    pub fn too_many_pending(pending: usize, max: usize) -> Self {
        Self::TooManyPending { pending, max }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Returns `true` if a sink was missing at delivery time.
    #[inline]
    #[must_use]
    pub fn is_delivery_error(&self) -> bool {
        matches!(
            self,
            Self::ResponderMissing { .. } | Self::CallbackMissing { .. }
        )
    }

    /// Returns `true` if the router can carry this error inside a reply
    /// as-is. Anything else is rewrapped as [`Error::Handler`] first.
    #[inline]
    #[must_use]
    pub fn is_foldable(&self) -> bool {
        matches!(self, Self::Handler { .. } | Self::Resolution { .. })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::identifiers::{SurfaceType, ViewId};

    #[test]
    fn test_error_display() {
        let err = Error::handler("view crashed");
        assert_eq!(err.to_string(), "Handler failed: view crashed");
    }

    #[test]
    fn test_routing_display() {
        let err = Error::routing(Participant::Plugin, Participant::ContentScript);
        assert_eq!(
            err.to_string(),
            "Unsupported route: plugin -> contentScript"
        );
    }

    #[test]
    fn test_responder_missing_display() {
        let key = SurfaceKey::new(SurfaceType::NoteTextViewer, ViewId::from("v1"));
        let err = Error::responder_missing(key, MessageId::from("m1"));
        assert_eq!(
            err.to_string(),
            "No responder registered for noteTextViewer:v1 (reply to m1)"
        );
    }

    #[test]
    fn test_is_timeout() {
        let timeout_err = Error::timeout(MessageId::from("m1"), 500);
        let other_err = Error::ChannelClosed;

        assert!(timeout_err.is_timeout());
        assert!(!other_err.is_timeout());
    }

    #[test]
    fn test_is_delivery_error() {
        let key = SurfaceKey::new(SurfaceType::UserWebview, ViewId::from("v1"));
        let missing = Error::callback_missing(key, MessageId::from("m1"));

        assert!(missing.is_delivery_error());
        assert!(!Error::resolution("cs1").is_delivery_error());
    }

    #[test]
    fn test_is_foldable() {
        assert!(Error::resolution("no owner").is_foldable());
        assert!(Error::handler("boom").is_foldable());
        assert!(!Error::routing(Participant::Plugin, Participant::Plugin).is_foldable());
        assert!(!Error::ChannelClosed.is_foldable());
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<String>("invalid").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Json(_)));
    }

    #[tokio::test]
    async fn test_from_recv_error() {
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        drop(tx);
        let err: Error = rx.await.unwrap_err().into();
        assert!(matches!(err, Error::ChannelClosed));
    }
}
