//! Message types crossing execution-context boundaries.
//!
//! # Protocol Overview
//!
//! | Message Type | Direction | Purpose |
//! |--------------|-----------|---------|
//! | `Message` | Surface → Router, Plugin → Router | Request or push |
//! | `MessageResponse` | Router → Surface | Settles one call by `responseId` |
//! | `PushEnvelope` | Router → Surface | Unsolicited plugin message |
//! | `HostCommand` | Host → Guest | Boundary command envelope |
//! | `GuestReport` | Guest → Host | Boundary report envelope |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `envelope` | Host command and guest report envelopes |
//! | `message` | Message, reply and push types |

// ============================================================================
// Submodules
// ============================================================================

/// Boundary envelopes.
pub mod envelope;

/// Message, reply and push types.
pub mod message;

// ============================================================================
// Re-exports
// ============================================================================

pub use envelope::{
    GuestMessage, GuestReport, HostCommand, WebviewSignal, decode_command, decode_report,
    encode_command,
};
pub use message::{Message, MessageResponse, Outcome, Participant, PushEnvelope};
