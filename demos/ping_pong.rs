//! End-to-end ping over both request routes plus a push.
//!
//! Wires a content script bridge and a user webview bridge to the router
//! through [`SurfaceHost`]s, exactly as a UI shell would on mount.
//!
//! Run with: cargo run --example ping_pong -- --debug

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use plugin_rpc::{
    BridgeOptions, CorrelationBridge, ExtensionId, HandlerTable, Message, MessageRouter,
    SurfaceHost, SurfaceKey,
};
use serde_json::json;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;

// ============================================================================
// Logging
// ============================================================================

fn init_logging() {
    let debug = std::env::args().any(|a| a == "--debug");
    let default = if debug { "plugin_rpc=trace,ping_pong=debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

// ============================================================================
// Wiring
// ============================================================================

/// Mounts a host for `key` and connects a fresh bridge to it.
fn connect(
    router: &Arc<MessageRouter>,
    key: SurfaceKey,
    extension_id: Option<ExtensionId>,
    make_bridge: impl FnOnce(mpsc::UnboundedSender<plugin_rpc::GuestReport>) -> CorrelationBridge,
) -> CorrelationBridge {
    let (to_host, from_guest) = mpsc::unbounded_channel();
    let (to_guest, mut guest_rx) = mpsc::unbounded_channel();

    let host = Arc::new(SurfaceHost::new(key, extension_id, Arc::clone(router), to_guest));
    host.mount();
    tokio::spawn(Arc::clone(&host).run(from_guest));

    let bridge = make_bridge(to_host);
    let guest = bridge.clone();
    tokio::spawn(async move {
        while let Some(command) = guest_rx.recv().await {
            if let Some(other) = guest.handle_command(command) {
                info!(command = other.name(), "Guest render command");
            }
        }
    });

    bridge
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let table = HandlerTable::new();
    table.on_content_script("cs1", "ext1", |content| async move {
        info!(%content, "Content script handler");
        Ok(json!({ "pong": true }))
    });
    table.on_view("ext1", "web-1", |content| async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        Ok(json!({ "saved": content }))
    });

    let router = Arc::new(MessageRouter::builder().engine(table).build()?);

    let note = connect(&router, SurfaceKey::note_text_viewer("note-1"), None, |tx| {
        CorrelationBridge::content_script(BridgeOptions::new().with_content_script("cs1"), tx)
    });

    let webview = connect(
        &router,
        SurfaceKey::user_webview("web-1"),
        Some(ExtensionId::from("ext1")),
        CorrelationBridge::user_webview,
    );
    webview.set_push_handler(|push| info!(content = %push.message.content, "Push received"));
    webview.request_push_channel()?;
    webview.signal_ready()?;

    let pong = note.call(json!({ "op": "ping" }))?.await?;
    info!(%pong, "Content script reply");

    let saved = webview.call(json!({ "doc": 1 }))?.await?;
    info!(%saved, "Webview reply");

    router.push(Message::plugin_push("ext1", "web-1", json!({ "tick": 1 })))?;
    tokio::time::sleep(Duration::from_millis(50)).await;

    Ok(())
}
