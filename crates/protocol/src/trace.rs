//! `Tracing` and `IO` domain shapes.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

/// Categories recorded when no override is configured.
///
/// Matches the set the DevTools performance panel and puppeteer record,
/// plus screenshots.
pub const DEFAULT_CATEGORIES: &[&str] = &[
	"-*",
	"devtools.timeline",
	"v8.execute",
	"disabled-by-default-devtools.timeline",
	"disabled-by-default-devtools.timeline.frame",
	"toplevel",
	"blink.console",
	"blink.user_timing",
	"latencyInfo",
	"disabled-by-default-devtools.timeline.stack",
	"disabled-by-default-v8.cpu_profiler",
	"disabled-by-default-devtools.screenshot",
];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceConfig {
	pub included_categories: Vec<String>,
}

/// How the browser hands back recorded data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferMode {
	/// Data is buffered server-side and read through `IO.read`.
	#[default]
	ReturnAsStream,
}

/// Params of `Tracing.start`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TracingStart {
	pub trace_config: TraceConfig,
	pub transfer_mode: TransferMode,
}

impl TracingStart {
	/// Stream-mode start request recording `categories`.
	pub fn streamed<I, S>(categories: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Self {
			trace_config: TraceConfig {
				included_categories: categories.into_iter().map(Into::into).collect(),
			},
			transfer_mode: TransferMode::ReturnAsStream,
		}
	}
}

/// Params of the `Tracing.tracingComplete` event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TracingComplete {
	#[serde(default)]
	pub data_loss_occurred: bool,
	/// Handle of the buffered trace; absent unless the trace was started with `ReturnAsStream`.
	#[serde(default)]
	pub stream: Option<String>,
	#[serde(default)]
	pub trace_format: Option<String>,
	#[serde(default)]
	pub stream_compression: Option<String>,
}

/// Params of `IO.read`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IoRead {
	pub handle: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub size: Option<usize>,
}

/// Result of `IO.read`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IoReadResult {
	#[serde(default)]
	pub base64_encoded: bool,
	#[serde(default)]
	pub data: String,
	#[serde(default)]
	pub eof: bool,
}

impl IoReadResult {
	/// Raw bytes of this chunk, base64-decoding only when the chunk says so.
	pub fn decode(self) -> Result<Vec<u8>, base64::DecodeError> {
		if self.base64_encoded {
			STANDARD.decode(self.data.as_bytes())
		} else {
			Ok(self.data.into_bytes())
		}
	}
}

/// Params of `IO.close`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IoClose {
	pub handle: String,
}
