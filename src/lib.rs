//! Plugin RPC - request/response correlation and push routing between
//! isolated execution contexts.
//!
//! Content scripts embedded in the note viewer, sandboxed user webviews and
//! extension code running outside the UI process exchange calls and
//! one-way pushes without sharing memory or call stacks.
//!
//! # Architecture
//!
//! - **Guest side**: a [`CorrelationBridge`] turns `call(content)` into a
//!   uniquely identified outbound event and settles the returned future when
//!   the matching reply arrives
//! - **Host side**: a [`SurfaceHost`] decodes guest reports and hands them to
//!   the [`MessageRouter`], which resolves the handler through an
//!   [`ExtensionEngine`] and sends the reply to the responder registered for
//!   the sender's surface
//! - **Push**: extensions call [`MessageRouter::push`] to reach a webview's
//!   registered callback directly
//!
//! Matching relies only on `responseId`; replies arrive in completion order.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use plugin_rpc::{HandlerTable, Message, MessageRouter, Result, SurfaceType};
//! use serde_json::json;
//!
//! # async fn example() -> Result<()> {
//! let table = HandlerTable::new();
//! table.on_content_script("cs1", "ext1", |_| async { Ok(json!({ "pong": true })) });
//!
//! let router = Arc::new(MessageRouter::builder().engine(table).build()?);
//! router.register_responder(SurfaceType::NoteTextViewer, "note-1", |reply| {
//!     println!("{:?}", reply.response());
//! });
//!
//! let message = Message::content_script_request("cs1", "note-1", json!({ "op": "ping" }));
//! router.post_message(message).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`bridge`] | Guest correlation bridge and host surface listener |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`protocol`] | Messages, replies and boundary envelopes |
//! | [`router`] | Message router, registries and engine seam |

// ============================================================================
// Modules
// ============================================================================

/// Boundary bridges.
///
/// - [`CorrelationBridge`] - Guest-side pending call table
/// - [`SurfaceHost`] - Host-side listener for one surface
pub mod bridge;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers.
///
/// Newtype wrappers prevent mixing incompatible IDs at compile time.
pub mod identifiers;

/// Message types crossing execution-context boundaries.
pub mod protocol;

/// Message router.
///
/// Use [`MessageRouter::builder()`] to create a router instance.
pub mod router;

// ============================================================================
// Re-exports
// ============================================================================

// Bridge types
pub use bridge::{BridgeOptions, CorrelationBridge, PendingCall, SurfaceHost};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{ContentScriptId, ExtensionId, MessageId, SurfaceKey, SurfaceType, ViewId};

// Protocol types
pub use protocol::{
    GuestMessage, GuestReport, HostCommand, Message, MessageResponse, Outcome, Participant,
    PushEnvelope, WebviewSignal,
};

// Router types
pub use router::{Delivery, ExtensionEngine, HandlerTable, MessageRouter, Route, RouterBuilder};
