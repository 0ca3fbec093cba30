//! The debug channel seam.
//!
//! Everything the session needs from the browser goes through
//! [`DebugChannel`]: attach to a target, send commands to it, detach, and
//! observe events. [`CdpChannel`] is the production implementation.

mod cdp;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::broadcast;

pub use cdp::CdpChannel;

use crate::error::Result;
use crate::target::TargetId;

/// Something observed on the channel.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
	/// A protocol event raised by an attached target.
	Protocol { target: TargetId, method: String, params: Value },
	/// The target was detached by someone other than this process.
	Detached { target: TargetId, reason: String },
}

impl ChannelEvent {
	/// Params of `method` raised by `target`, if this is that event.
	pub fn params_of(&self, target: &TargetId, method: &str) -> Option<&Value> {
		match self {
			ChannelEvent::Protocol { target: t, method: m, params } if t == target && m == method => Some(params),
			_ => None,
		}
	}
}

#[async_trait]
pub trait DebugChannel: Send + Sync {
	async fn attach(&self, target: &TargetId) -> Result<()>;

	async fn send_command(&self, target: &TargetId, method: &str, params: Value) -> Result<Value>;

	/// Detaches from `target`. Must not surface as [`ChannelEvent::Detached`].
	async fn detach(&self, target: &TargetId) -> Result<()>;

	/// Events raised after this call.
	fn subscribe(&self) -> broadcast::Receiver<ChannelEvent>;
}
