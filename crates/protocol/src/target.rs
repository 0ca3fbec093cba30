//! `Target` domain shapes.

use serde::{Deserialize, Serialize};

/// URL prefixes of pages the browser refuses to let a debugger attach to.
const PRIVILEGED_PREFIXES: &[&str] = &["chrome://", "chrome-extension://"];

/// One entry of `Target.getTargets` / `/json/list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetInfo {
	#[serde(alias = "id")]
	pub target_id: String,
	#[serde(rename = "type")]
	pub kind: String,
	#[serde(default)]
	pub title: String,
	#[serde(default)]
	pub url: String,
	#[serde(default)]
	pub attached: bool,
}

impl TargetInfo {
	pub fn is_page(&self) -> bool {
		self.kind == "page"
	}

	/// Privileged pages cannot be traced.
	pub fn is_privileged(&self) -> bool {
		is_privileged_url(&self.url)
	}
}

pub fn is_privileged_url(url: &str) -> bool {
	PRIVILEGED_PREFIXES.iter().any(|prefix| url.starts_with(prefix))
}

/// Result of `Target.getTargets`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetInfos {
	#[serde(default)]
	pub target_infos: Vec<TargetInfo>,
}

/// Params of `Target.createTarget`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTarget {
	pub url: String,
}

/// Result of `Target.createTarget`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedTarget {
	pub target_id: String,
}

/// Params of `Target.attachToTarget`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachToTarget {
	pub target_id: String,
	pub flatten: bool,
}

/// Result of `Target.attachToTarget`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachedSession {
	pub session_id: String,
}

/// Params of `Target.detachFromTarget`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetachFromTarget {
	pub session_id: String,
}

/// Params of the `Target.detachedFromTarget` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetachedFromTarget {
	pub session_id: String,
	#[serde(default)]
	pub target_id: Option<String>,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn target_info_accepts_json_list_shape() {
		let json = r#"{"id": "E1", "type": "page", "title": "Example", "url": "https://example.com/"}"#;
		let info: TargetInfo = serde_json::from_str(json).unwrap();
		assert_eq!(info.target_id, "E1");
		assert!(info.is_page());
		assert!(!info.is_privileged());
	}

	#[test]
	fn privileged_urls_are_detected() {
		assert!(is_privileged_url("chrome://settings"));
		assert!(is_privileged_url("chrome-extension://abc/popup.html"));
		assert!(!is_privileged_url("https://chrome.example"));
	}
}
