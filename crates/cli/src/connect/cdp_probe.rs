//! CDP endpoint probing over `/json/version`.

use std::time::Duration;

use pw_trace_protocol::PROTOCOL_VERSION;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{CliError, Result};

/// `/json/version` response subset.
#[derive(Debug, Clone, Deserialize)]
pub struct CdpVersionInfo {
	#[serde(rename = "webSocketDebuggerUrl")]
	pub web_socket_debugger_url: String,
	#[serde(rename = "Browser")]
	pub browser: Option<String>,
	#[serde(rename = "Protocol-Version")]
	pub protocol_version: Option<String>,
}

impl CdpVersionInfo {
	/// Warns when the browser speaks a protocol version other than the one traced against.
	pub fn check_protocol_version(&self) -> bool {
		match self.protocol_version.as_deref() {
			Some(PROTOCOL_VERSION) => true,
			Some(other) => {
				warn!(target = "pw_trace", advertised = other, expected = PROTOCOL_VERSION, "unexpected CDP protocol version");
				false
			}
			None => {
				debug!(target = "pw_trace", "browser did not advertise a protocol version");
				false
			}
		}
	}
}

fn client() -> Result<reqwest::Client> {
	reqwest::Client::builder()
		.timeout(Duration::from_millis(400))
		.build()
		.map_err(|e| CliError::Connect(format!("Failed to create HTTP client: {}", e)))
}

/// Reads `/json/version` below `base` (e.g. `http://127.0.0.1:9222`).
pub async fn fetch_version(base: &str) -> Result<CdpVersionInfo> {
	let url = format!("{}/json/version", base.trim_end_matches('/'));
	let response = client()?
		.get(&url)
		.send()
		.await
		.map_err(|e| CliError::Connect(format!("{}: {}", url, e)))?;
	if !response.status().is_success() {
		return Err(CliError::Connect(format!("{}: unexpected status {}", url, response.status())));
	}
	response
		.json()
		.await
		.map_err(|e| CliError::Connect(format!("Failed to parse CDP response from {}: {}", url, e)))
}

/// Tries the usual loopback spellings of `port`.
pub async fn fetch_cdp_endpoint(port: u16) -> Result<CdpVersionInfo> {
	let mut last_error = "no response".to_string();
	for base in [
		format!("http://127.0.0.1:{}", port),
		format!("http://localhost:{}", port),
		format!("http://[::1]:{}", port),
	] {
		match fetch_version(&base).await {
			Ok(info) => return Ok(info),
			Err(e) => last_error = e.to_string(),
		}
	}
	Err(CliError::Connect(format!("Failed to connect to port {}: {}", port, last_error)))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_version_payload() {
		let info: CdpVersionInfo = serde_json::from_str(
			r#"{
				"Browser": "Chrome/126.0.6478.126",
				"Protocol-Version": "1.3",
				"User-Agent": "Mozilla/5.0",
				"webSocketDebuggerUrl": "ws://127.0.0.1:9222/devtools/browser/abc"
			}"#,
		)
		.unwrap();
		assert_eq!(info.web_socket_debugger_url, "ws://127.0.0.1:9222/devtools/browser/abc");
		assert!(info.check_protocol_version());
	}

	#[test]
	fn other_protocol_version_is_flagged() {
		let info = CdpVersionInfo {
			web_socket_debugger_url: "ws://x".into(),
			browser: None,
			protocol_version: Some("1.2".into()),
		};
		assert!(!info.check_protocol_version());
	}
}
