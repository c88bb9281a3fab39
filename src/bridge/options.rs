//! Correlation bridge configuration.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use plugin_rpc::BridgeOptions;
//!
//! let options = BridgeOptions::new()
//!     .with_timeout(Duration::from_secs(10))
//!     .with_max_pending(64);
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use crate::identifiers::ContentScriptId;

// ============================================================================
// BridgeOptions
// ============================================================================

/// Settings for a [`CorrelationBridge`](super::CorrelationBridge).
///
/// Defaults: no timeout, no pending limit. A dropped reply then leaves its
/// call pending forever.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BridgeOptions {
    /// Settle calls with [`Error::Timeout`](crate::Error::Timeout) after this long.
    pub call_timeout: Option<Duration>,

    /// Reject new calls once this many are outstanding.
    pub max_pending: Option<usize>,

    /// Tag outgoing calls with this content script id.
    pub content_script_id: Option<ContentScriptId>,
}

// ============================================================================
// Constructors
// ============================================================================

impl BridgeOptions {
    /// Creates options with default settings.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            call_timeout: None,
            max_pending: None,
            content_script_id: None,
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl BridgeOptions {
    /// Sets a per-call timeout.
    #[inline]
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }

    /// Sets the pending call limit.
    #[inline]
    #[must_use]
    pub fn with_max_pending(mut self, max: usize) -> Self {
        self.max_pending = Some(max);
        self
    }

    /// Tags calls as coming from a content script.
    #[inline]
    #[must_use]
    pub fn with_content_script(mut self, content_script_id: impl Into<ContentScriptId>) -> Self {
        self.content_script_id = Some(content_script_id.into());
        self
    }
}

// ============================================================================
// Tests
// ============================================================================
