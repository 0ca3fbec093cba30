//! CDP message envelopes.
//!
//! Responses are distinguished from events by the presence of an `id`.
//! Messages routed through a flat target session carry a `sessionId`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Command sent to the browser or to an attached target session.
///
/// ```json
/// { "id": 7, "method": "IO.read", "params": { "handle": "3" }, "sessionId": "AB12" }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
	pub id: u64,
	pub method: String,
	#[serde(default)]
	pub params: Value,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub session_id: Option<String>,
}

/// Reply to a [`Request`], correlated by `id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
	pub id: u64,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub result: Option<Value>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error: Option<ResponseError>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub session_id: Option<String>,
}

/// Error object of a failed command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseError {
	pub code: i64,
	pub message: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub data: Option<String>,
}

/// Unsolicited notification from the browser.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
	pub method: String,
	#[serde(default)]
	pub params: Value,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub session_id: Option<String>,
}

/// Any inbound message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Message {
	/// Has an `id` field
	Response(Response),
	/// No `id` field
	Event(Event),
}

pub mod methods {
	pub const TRACING_START: &str = "Tracing.start";
	pub const TRACING_END: &str = "Tracing.end";
	pub const IO_READ: &str = "IO.read";
	pub const IO_CLOSE: &str = "IO.close";
	pub const TARGET_GET_TARGETS: &str = "Target.getTargets";
	pub const TARGET_CREATE_TARGET: &str = "Target.createTarget";
	pub const TARGET_ATTACH: &str = "Target.attachToTarget";
	pub const TARGET_DETACH: &str = "Target.detachFromTarget";
	pub const PAGE_ENABLE: &str = "Page.enable";
	pub const PAGE_NAVIGATE: &str = "Page.navigate";
	pub const RUNTIME_EVALUATE: &str = "Runtime.evaluate";
}

pub mod events {
	pub const TRACING_COMPLETE: &str = "Tracing.tracingComplete";
	pub const TARGET_DETACHED: &str = "Target.detachedFromTarget";
	pub const PAGE_LOAD_EVENT_FIRED: &str = "Page.loadEventFired";
}
