//! Messages exchanged with the profiler page that receives the trace.
//!
//! The receiver announces itself with `is-ready` until the page answers
//! `ready`, then posts the full trace once as `inject-profile`.

use serde::{Deserialize, Serialize};

/// Cross-context message, tagged by its `name` field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "kebab-case")]
pub enum HostMessage {
	/// Receiver probe: "are you listening yet?"
	IsReady,
	/// Page acknowledgement.
	Ready,
	/// The reassembled trace.
	InjectProfile { profile: String },
}

/// One bounded fragment of a payload, in send order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Piece<'a> {
	pub index: usize,
	pub total: usize,
	pub data: &'a str,
}

impl Piece<'_> {
	pub fn is_last(&self) -> bool {
		self.index + 1 == self.total
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn names_follow_page_vocabulary() {
		assert_eq!(serde_json::to_value(HostMessage::IsReady).unwrap(), serde_json::json!({"name": "is-ready"}));
		let inject = HostMessage::InjectProfile { profile: "{}".into() };
		assert_eq!(serde_json::to_value(&inject).unwrap()["name"], "inject-profile");
		let ready: HostMessage = serde_json::from_str(r#"{"name": "ready"}"#).unwrap();
		assert_eq!(ready, HostMessage::Ready);
	}

	#[test]
	fn last_piece() {
		let piece = Piece { index: 2, total: 3, data: "c" };
		assert!(piece.is_last());
		assert!(!Piece { index: 0, total: 3, data: "a" }.is_last());
	}
}
