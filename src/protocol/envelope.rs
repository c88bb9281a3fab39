//! Boundary envelopes exchanged with a guest surface.
//!
//! | Envelope | Direction | Purpose |
//! |----------|-----------|---------|
//! | [`HostCommand`] | Host → Guest | Render, inject scripts, deliver replies and pushes |
//! | [`GuestReport`] | Guest → Host | Start a call, request pushes, lifecycle signals |

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::identifiers::{ContentScriptId, ExtensionId, MessageId, ViewId};

use super::{Message, MessageResponse, Participant, PushEnvelope};

// ============================================================================
// Constants
// ============================================================================

/// `target` value of every host command.
pub const WEBVIEW_TARGET: &str = "webview";

// ============================================================================
// HostCommand
// ============================================================================

/// A command from the host to a guest surface.
///
/// # Format
///
/// ```json
/// { "target": "webview", "name": "setHtml", "args": { "html": "...", "hash": "..." } }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", content = "args")]
pub enum HostCommand {
    /// Replace rendered content; the guest acknowledges with `htmlIsSet`.
    #[serde(rename = "setHtml")]
    SetHtml {
        /// Markup to render.
        html: String,
        /// Token echoed back once the render is committed.
        hash: String,
    },

    /// Replace a single keyed script or stylesheet.
    #[serde(rename = "setScript")]
    SetScript {
        /// Script source.
        script: String,
        /// Slot key.
        key: String,
    },

    /// Inject any paths not already present.
    #[serde(rename = "setScripts")]
    SetScripts {
        /// Script or stylesheet paths.
        scripts: Vec<String>,
    },

    /// Deliver a reply to a pending call.
    #[serde(rename = "postMessageService.response")]
    Response {
        /// The reply.
        message: MessageResponse,
    },

    /// Deliver a push.
    #[serde(rename = "postMessageService.plugin_message")]
    PluginMessage {
        /// The pushed message.
        message: PushEnvelope,
    },
}

impl HostCommand {
    /// Returns the command name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::SetHtml { .. } => "setHtml",
            Self::SetScript { .. } => "setScript",
            Self::SetScripts { .. } => "setScripts",
            Self::Response { .. } => "postMessageService.response",
            Self::PluginMessage { .. } => "postMessageService.plugin_message",
        }
    }
}

/// Encodes a host command with its `target` field.
///
/// # Errors
///
/// Returns [`Error::Json`] if serialization fails.
pub fn encode_command(command: &HostCommand) -> Result<String> {
    let mut value = serde_json::to_value(command)?;
    if let Value::Object(ref mut fields) = value {
        fields.insert("target".to_string(), Value::from(WEBVIEW_TARGET));
    }
    Ok(serde_json::to_string(&value)?)
}

/// Decodes a host command, ignoring envelopes for other targets.
///
/// Returns `Ok(None)` when `target` is not `"webview"`.
///
/// # Errors
///
/// Returns [`Error::Json`] if the text is not a valid command.
pub fn decode_command(text: &str) -> Result<Option<HostCommand>> {
    let mut value: Value = serde_json::from_str(text)?;
    let target = value
        .as_object_mut()
        .and_then(|fields| fields.remove("target"));

    if target.as_ref().and_then(Value::as_str) != Some(WEBVIEW_TARGET) {
        return Ok(None);
    }

    Ok(Some(serde_json::from_value(value)?))
}

// ============================================================================
// GuestMessage
// ============================================================================

/// Call payload sent by a guest bridge.
///
/// The host fills in `viewId` and `extensionId` from its own context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuestMessage {
    /// Sender role.
    pub from: Participant,
    /// Recipient role.
    pub to: Participant,
    /// Correlation id.
    pub id: MessageId,
    /// Opaque payload.
    #[serde(default)]
    pub content: Value,
    /// Sending content script, for content script bridges.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_script_id: Option<ContentScriptId>,
}

impl GuestMessage {
    /// Expands into a routable message addressed from a concrete view.
    #[must_use]
    pub fn into_message(self, view_id: ViewId, extension_id: Option<ExtensionId>) -> Message {
        Message {
            extension_id,
            content_script_id: self.content_script_id,
            view_id,
            from: self.from,
            to: self.to,
            id: self.id,
            content: self.content,
        }
    }
}

// ============================================================================
// GuestReport
// ============================================================================

/// A report from a guest surface to the host.
///
/// # Format
///
/// ```json
/// { "target": "postMessageService.message", "message": { "from": "userWebview", ... } }
/// { "target": "postMessageService.registerCallback" }
/// { "target": "UserWebview", "message": "ready" }
/// { "target": "UserWebview", "message": "htmlIsSet", "hash": "..." }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "target")]
pub enum GuestReport {
    /// Start a request.
    #[serde(rename = "postMessageService.message")]
    Message {
        /// The call payload.
        message: GuestMessage,
    },

    /// Ask the host to route pushes to this surface.
    #[serde(rename = "postMessageService.registerCallback")]
    RegisterCallback,

    /// Lifecycle signal from a user webview.
    #[serde(rename = "UserWebview")]
    Webview(WebviewSignal),
}

/// Lifecycle signals carried by [`GuestReport::Webview`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "message")]
pub enum WebviewSignal {
    /// Sent once after initial setup.
    #[serde(rename = "ready")]
    Ready,

    /// Sent after a `setHtml` command is committed.
    #[serde(rename = "htmlIsSet")]
    HtmlIsSet {
        /// Hash from the `setHtml` command.
        hash: String,
    },
}

/// Decodes a guest report.
///
/// # Errors
///
/// Returns [`Error::Json`] if the text is not a valid report.
pub fn decode_report(text: &str) -> Result<GuestReport> {
    serde_json::from_str(text).map_err(Error::from)
}

// ============================================================================
// Tests
// ============================================================================
