//! Message, reply and push types.
//!
//! A [`Message`] carries an opaque payload between two [`Participant`]s.
//! A [`MessageResponse`] settles one call and a [`PushEnvelope`] carries an
//! unsolicited message to a UI surface.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::identifiers::{ContentScriptId, ExtensionId, MessageId, ViewId};

// ============================================================================
// Participant
// ============================================================================

/// Declared role of one endpoint in a single message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Participant {
    /// Script injected into the note viewer.
    ContentScript,
    /// Extension code running outside the UI process.
    Plugin,
    /// Sandboxed webview owned by an extension.
    UserWebview,
}

impl Participant {
    /// Returns the wire name.
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ContentScript => "contentScript",
            Self::Plugin => "plugin",
            Self::UserWebview => "userWebview",
        }
    }
}

impl fmt::Display for Participant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Message
// ============================================================================

/// A structured message handed to the router.
///
/// # Format
///
/// ```json
/// {
///   "extensionId": "ext1",
///   "contentScriptId": "cs1",
///   "viewId": "view-1",
///   "from": "contentScript",
///   "to": "plugin",
///   "id": "uuid",
///   "content": { ... }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Extension addressed by webview and push messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extension_id: Option<ExtensionId>,

    /// Content script that sent the message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_script_id: Option<ContentScriptId>,

    /// View the message originates from or is pushed to.
    pub view_id: ViewId,

    /// Sender role.
    pub from: Participant,

    /// Recipient role.
    pub to: Participant,

    /// Correlation id, unique among the sending bridge's outstanding calls.
    pub id: MessageId,

    /// Opaque payload.
    #[serde(default)]
    pub content: Value,
}

impl Message {
    /// Creates a message with an auto-generated id.
    #[must_use]
    pub fn new(
        from: Participant,
        to: Participant,
        view_id: impl Into<ViewId>,
        content: Value,
    ) -> Self {
        Self {
            extension_id: None,
            content_script_id: None,
            view_id: view_id.into(),
            from,
            to,
            id: MessageId::generate(),
            content,
        }
    }

    /// Creates a content script to plugin request.
    #[must_use]
    pub fn content_script_request(
        content_script_id: impl Into<ContentScriptId>,
        view_id: impl Into<ViewId>,
        content: Value,
    ) -> Self {
        Self::new(Participant::ContentScript, Participant::Plugin, view_id, content)
            .with_content_script(content_script_id)
    }

    /// Creates a user webview to plugin request.
    #[must_use]
    pub fn webview_request(
        extension_id: impl Into<ExtensionId>,
        view_id: impl Into<ViewId>,
        content: Value,
    ) -> Self {
        Self::new(Participant::UserWebview, Participant::Plugin, view_id, content)
            .with_extension(extension_id)
    }

    /// Creates a plugin to user webview push.
    #[must_use]
    pub fn plugin_push(
        extension_id: impl Into<ExtensionId>,
        view_id: impl Into<ViewId>,
        content: Value,
    ) -> Self {
        Self::new(Participant::Plugin, Participant::UserWebview, view_id, content)
            .with_extension(extension_id)
    }

    /// Sets the extension id.
    #[inline]
    #[must_use]
    pub fn with_extension(mut self, extension_id: impl Into<ExtensionId>) -> Self {
        self.extension_id = Some(extension_id.into());
        self
    }

    /// Sets the content script id.
    #[inline]
    #[must_use]
    pub fn with_content_script(mut self, content_script_id: impl Into<ContentScriptId>) -> Self {
        self.content_script_id = Some(content_script_id.into());
        self
    }

    /// Replaces the generated id.
    #[inline]
    #[must_use]
    pub fn with_id(mut self, id: impl Into<MessageId>) -> Self {
        self.id = id.into();
        self
    }
}

// ============================================================================
// Outcome
// ============================================================================

/// Result of a single call: a value or an error, never both.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Handler succeeded.
    Response(Value),
    /// Handler, resolution or remote failure.
    Error(String),
}

impl From<Result<Value>> for Outcome {
    fn from(result: Result<Value>) -> Self {
        match result {
            Ok(value) => Self::Response(value),
            Err(e) => Self::Error(e.to_string()),
        }
    }
}

// ============================================================================
// MessageResponse
// ============================================================================

/// Reply that settles one call on the bridge side.
///
/// # Format
///
/// Success:
/// ```json
/// { "responseId": "uuid", "response": { ... }, "error": null }
/// ```
///
/// Error:
/// ```json
/// { "responseId": "uuid", "response": null, "error": "Handler failed: ..." }
/// ```
///
/// On decode a non-null `error` wins; an error object contributes its
/// `message` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "WireResponse", into = "WireResponse")]
pub struct MessageResponse {
    /// Id of the message being answered.
    pub response_id: MessageId,
    /// Value or error.
    pub outcome: Outcome,
}

impl MessageResponse {
    /// Creates a reply from an outcome.
    #[inline]
    #[must_use]
    pub fn new(response_id: MessageId, outcome: Outcome) -> Self {
        Self {
            response_id,
            outcome,
        }
    }

    /// Creates a successful reply.
    #[inline]
    #[must_use]
    pub fn success(response_id: MessageId, response: Value) -> Self {
        Self::new(response_id, Outcome::Response(response))
    }

    /// Creates a failed reply.
    #[inline]
    #[must_use]
    pub fn failure(response_id: MessageId, error: impl Into<String>) -> Self {
        Self::new(response_id, Outcome::Error(error.into()))
    }

    /// Returns the response value, if successful.
    #[inline]
    #[must_use]
    pub fn response(&self) -> Option<&Value> {
        match &self.outcome {
            Outcome::Response(value) => Some(value),
            Outcome::Error(_) => None,
        }
    }

    /// Returns the error text, if failed.
    #[inline]
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            Outcome::Response(_) => None,
            Outcome::Error(message) => Some(message),
        }
    }

    /// Returns `true` if this is a successful reply.
    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, Outcome::Response(_))
    }

    /// Extracts the response value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Remote`] if the reply carries an error.
    pub fn into_result(self) -> Result<Value> {
        match self.outcome {
            Outcome::Response(value) => Ok(value),
            Outcome::Error(message) => Err(Error::remote(message)),
        }
    }
}

/// Wire shape of [`MessageResponse`].
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireResponse {
    response_id: MessageId,
    #[serde(default)]
    response: Value,
    #[serde(default)]
    error: Value,
}

impl From<WireResponse> for MessageResponse {
    fn from(wire: WireResponse) -> Self {
        let outcome = match wire.error {
            Value::Null => Outcome::Response(wire.response),
            Value::String(message) => Outcome::Error(message),
            other => Outcome::Error(error_text(&other)),
        };

        Self::new(wire.response_id, outcome)
    }
}

/// Extracts readable text from a structured error value.
fn error_text(error: &Value) -> String {
    error
        .get("message")
        .and_then(Value::as_str)
        .map_or_else(|| error.to_string(), str::to_string)
}

impl From<MessageResponse> for WireResponse {
    fn from(reply: MessageResponse) -> Self {
        let (response, error) = match reply.outcome {
            Outcome::Response(value) => (value, Value::Null),
            Outcome::Error(message) => (Value::Null, Value::String(message)),
        };

        Self {
            response_id: reply.response_id,
            response,
            error,
        }
    }
}

// ============================================================================
// PushEnvelope
// ============================================================================

/// Unsolicited message delivered to a UI surface.
///
/// Shares the reply shape, but `responseId` is informational and is never
/// matched against a pending call.
///
/// # Format
///
/// ```json
/// { "responseId": "uuid", "response": { <Message> }, "error": null }
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushEnvelope {
    /// Id of the pushed message.
    pub response_id: MessageId,

    /// The pushed message itself.
    #[serde(rename = "response")]
    pub message: Message,
}

impl PushEnvelope {
    /// Wraps a message for push delivery.
    #[inline]
    #[must_use]
    pub fn new(message: Message) -> Self {
        Self {
            response_id: message.id.clone(),
            message,
        }
    }
}

impl Serialize for PushEnvelope {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("PushEnvelope", 3)?;
        state.serialize_field("responseId", &self.response_id)?;
        state.serialize_field("response", &self.message)?;
        state.serialize_field("error", &Value::Null)?;
        state.end()
    }
}

// ============================================================================
// Tests
// ============================================================================
