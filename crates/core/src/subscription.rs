//! One-shot event subscriptions.
//!
//! A [`OneShot`] is registered before the action that triggers the event,
//! resolves on the first matching event and is consumed by doing so. Any
//! later duplicate of that event finds no listener.

use tokio::sync::broadcast;
use tracing::warn;

use crate::channel::{ChannelEvent, DebugChannel};

pub struct OneShot<F> {
	rx: broadcast::Receiver<ChannelEvent>,
	filter: F,
}

impl<F, T> OneShot<F>
where
	F: FnMut(&ChannelEvent) -> Option<T>,
{
	/// Starts listening now; events raised before this call are not seen.
	pub fn subscribe(channel: &dyn DebugChannel, filter: F) -> Self {
		Self {
			rx: channel.subscribe(),
			filter,
		}
	}

	/// Waits for the first event `filter` maps to `Some`.
	///
	/// Returns `None` if the channel closes first.
	pub async fn recv(mut self) -> Option<T> {
		loop {
			match self.rx.recv().await {
				Ok(event) => {
					if let Some(value) = (self.filter)(&event) {
						return Some(value);
					}
				}
				Err(broadcast::error::RecvError::Lagged(skipped)) => {
					warn!(target = "pw_trace.subscription", skipped, "one-shot listener lagged");
				}
				Err(broadcast::error::RecvError::Closed) => return None,
			}
		}
	}
}
