//! Type-safe identifiers for extensions, views and messages.
//!
//! Newtype wrappers prevent mixing incompatible IDs at compile time.
//! All string identifiers serialize transparently.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`ExtensionId`] | Installed extension (plugin) |
//! | [`ContentScriptId`] | Content script registered by an extension |
//! | [`ViewId`] | Live UI surface instance |
//! | [`MessageId`] | Correlation id of a single call |
//! | [`SurfaceKey`] | Registry key: [`SurfaceType`] + [`ViewId`] |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// String Identifiers
// ============================================================================

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates an identifier from any string-like value.
            #[inline]
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Returns the identifier as a string slice.
            #[inline]
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            #[inline]
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            #[inline]
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id!(
    /// Identifier of an installed extension.
    ExtensionId
);

string_id!(
    /// Identifier of a content script, owned by exactly one extension.
    ContentScriptId
);

string_id!(
    /// Identifier unique among live instances of one [`SurfaceType`].
    ///
    /// May be reused once the previous instance has fully torn down.
    ViewId
);

string_id!(
    /// Correlation id generated by the initiating bridge.
    ///
    /// Echoed back as `responseId` on the reply.
    MessageId
);

impl MessageId {
    /// Generates a fresh random id.
    #[inline]
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

// ============================================================================
// SurfaceType
// ============================================================================

/// Kind of addressable, long-lived UI surface that can hold registry slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SurfaceType {
    /// Note viewer hosting extension content scripts.
    NoteTextViewer,
    /// Sandboxed webview owned by an extension.
    UserWebview,
}

impl SurfaceType {
    /// Returns the wire name.
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NoteTextViewer => "noteTextViewer",
            Self::UserWebview => "userWebview",
        }
    }
}

impl fmt::Display for SurfaceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SurfaceKey
// ============================================================================

/// Composite registry key identifying one concrete UI instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SurfaceKey {
    /// Surface kind.
    pub surface: SurfaceType,
    /// Instance within that kind.
    pub view_id: ViewId,
}

impl SurfaceKey {
    /// Creates a new key.
    #[inline]
    #[must_use]
    pub fn new(surface: SurfaceType, view_id: ViewId) -> Self {
        Self { surface, view_id }
    }

    /// Key for a note viewer instance.
    #[inline]
    #[must_use]
    pub fn note_text_viewer(view_id: impl Into<ViewId>) -> Self {
        Self::new(SurfaceType::NoteTextViewer, view_id.into())
    }

    /// Key for a user webview instance.
    #[inline]
    #[must_use]
    pub fn user_webview(view_id: impl Into<ViewId>) -> Self {
        Self::new(SurfaceType::UserWebview, view_id.into())
    }
}

impl fmt::Display for SurfaceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.surface, self.view_id)
    }
}

// ============================================================================
// Tests
// ============================================================================
