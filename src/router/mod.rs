//! Message router and its registries.
//!
//! # Architecture
//!
//! ```text
//!  Surface listener ──► MessageRouter ──► ExtensionEngine
//!                          │    ▲               │
//!                          │    └─── result ────┘
//!                          ├──► responders[(NoteTextViewer | UserWebview, viewId)]
//!                          └──► callbacks[(UserWebview, viewId)]   (push)
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `core` | Routing, dispatch and reply delivery |
//! | `engine` | Extension engine contract and in-process table |
//! | `registry` | Single-slot sink registries |

// ============================================================================
// Submodules
// ============================================================================

/// Routing, dispatch and reply delivery.
pub mod core;

/// Extension engine contract.
pub mod engine;

/// Single-slot sink registries.
pub mod registry;

// ============================================================================
// Re-exports
// ============================================================================

pub use self::core::{Callback, Delivery, MessageRouter, Responder, Route, RouterBuilder};
pub use engine::{ExtensionEngine, Handler, HandlerTable};
pub use registry::Registry;
