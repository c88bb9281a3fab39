//! Boundary bridges.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐     GuestReport      ┌──────────────────────┐
//! │  Guest surface       │─────────────────────►│  SurfaceHost         │
//! │                      │                      │                      │
//! │  CorrelationBridge   │     HostCommand      │  → MessageRouter     │
//! │  (pending calls)     │◄─────────────────────│  (responder/callback)│
//! └──────────────────────┘                      └──────────────────────┘
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `correlation` | Guest-side awaitable calls and push channel |
//! | `host` | Host-side listener for one surface |
//! | `options` | Bridge configuration |

// ============================================================================
// Submodules
// ============================================================================

/// Guest-side correlation bridge.
pub mod correlation;

/// Host-side surface listener.
pub mod host;

/// Bridge configuration.
pub mod options;

// ============================================================================
// Re-exports
// ============================================================================

pub use correlation::{CorrelationBridge, PendingCall, PushHandler};
pub use host::SurfaceHost;
pub use options::BridgeOptions;
