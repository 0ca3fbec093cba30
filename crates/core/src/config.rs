//! Tunables for recording and handoff.
//!
//! Loaded from a JSON file where every field is optional:
//!
//! ```json
//! {
//!   "categories": ["-*", "devtools.timeline"],
//!   "transfer": { "maxPieceBytes": 524288 },
//!   "host": { "origin": "http://localhost:4242" }
//! }
//! ```

use std::path::Path;
use std::time::Duration;

use pw_trace_protocol::DEFAULT_CATEGORIES;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};

const DEFAULT_COMPLETION_TIMEOUT_MS: u64 = 120_000;

/// Largest piece pushed into the receiving page in one call.
///
/// Script injection accepts oversized arguments and then drops them without
/// an error, so pieces stay well below any size seen to fail. This is a
/// conservative default, not a guaranteed bound.
pub const DEFAULT_MAX_PIECE_BYTES: usize = 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TraceSettings {
	/// Categories passed to `Tracing.start`.
	pub categories: Vec<String>,
	/// `size` of each `IO.read`; the browser picks when unset.
	pub read_chunk_bytes: Option<usize>,
	/// How long to wait for `Tracing.tracingComplete` after `Tracing.end`.
	pub completion_timeout_ms: u64,
	pub transfer: TransferSettings,
	pub host: HostSettings,
}

impl Default for TraceSettings {
	fn default() -> Self {
		Self {
			categories: DEFAULT_CATEGORIES.iter().map(|c| c.to_string()).collect(),
			read_chunk_bytes: None,
			completion_timeout_ms: DEFAULT_COMPLETION_TIMEOUT_MS,
			transfer: TransferSettings::default(),
			host: HostSettings::default(),
		}
	}
}

impl TraceSettings {
	/// Reads settings from `path`. A missing file yields the defaults.
	pub fn load(path: &Path) -> Result<Self> {
		let content = match std::fs::read_to_string(path) {
			Ok(content) => content,
			Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
			Err(err) => return Err(err.into()),
		};
		let settings: Self =
			serde_json::from_str(&content).map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
		settings.validate()?;
		Ok(settings)
	}

	pub fn validate(&self) -> Result<()> {
		if self.categories.is_empty() {
			return Err(Error::Config("at least one trace category is required".into()));
		}
		if self.read_chunk_bytes == Some(0) {
			return Err(Error::Config("readChunkBytes must be positive".into()));
		}
		self.transfer.validate()?;
		self.host.page_url().map(|_| ())
	}

	pub fn completion_timeout(&self) -> Duration {
		Duration::from_millis(self.completion_timeout_ms)
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TransferSettings {
	pub max_piece_bytes: usize,
	/// Pause between consecutive pieces.
	pub piece_delay_ms: u64,
	/// Interval between `is-ready` probes.
	pub ready_poll_interval_ms: u64,
	/// Probes sent before the handshake gives up.
	pub max_ready_probes: u32,
}

impl Default for TransferSettings {
	fn default() -> Self {
		Self {
			max_piece_bytes: DEFAULT_MAX_PIECE_BYTES,
			piece_delay_ms: 50,
			ready_poll_interval_ms: 100,
			max_ready_probes: 600,
		}
	}
}

impl TransferSettings {
	pub fn validate(&self) -> Result<()> {
		if self.max_piece_bytes < 4 {
			// a piece must fit any single UTF-8 scalar
			return Err(Error::Config("transfer.maxPieceBytes must be at least 4".into()));
		}
		if self.ready_poll_interval_ms == 0 || self.max_ready_probes == 0 {
			return Err(Error::Config("handshake interval and probe cap must be positive".into()));
		}
		Ok(())
	}

	pub fn piece_delay(&self) -> Duration {
		Duration::from_millis(self.piece_delay_ms)
	}

	pub fn ready_poll_interval(&self) -> Duration {
		Duration::from_millis(self.ready_poll_interval_ms)
	}
}

/// Where the visualization page lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HostSettings {
	/// Exact origin messages are posted to.
	pub origin: String,
	/// Path of the page that accepts a posted profile.
	pub path: String,
	pub load_timeout_ms: u64,
}

impl Default for HostSettings {
	fn default() -> Self {
		Self {
			origin: "https://profiler.firefox.com".to_string(),
			path: "/from-post-message/".to_string(),
			load_timeout_ms: 30_000,
		}
	}
}

impl HostSettings {
	/// Full page URL, checking that `origin` is a bare origin.
	pub fn page_url(&self) -> Result<Url> {
		let origin = Url::parse(&self.origin).map_err(|e| Error::Config(format!("host.origin {:?}: {}", self.origin, e)))?;
		if !matches!(origin.scheme(), "http" | "https") {
			return Err(Error::Config(format!("host.origin {:?} must be http(s)", self.origin)));
		}
		if origin.origin().ascii_serialization() != self.origin.trim_end_matches('/') {
			return Err(Error::Config(format!("host.origin {:?} must not carry a path or query", self.origin)));
		}
		origin
			.join(&self.path)
			.map_err(|e| Error::Config(format!("host.path {:?}: {}", self.path, e)))
	}

	pub fn load_timeout(&self) -> Duration {
		Duration::from_millis(self.load_timeout_ms)
	}
}
