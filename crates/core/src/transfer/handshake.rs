//! The readiness handshake with the visualization host.
//!
//! The host's startup time is unbounded and an early message may reach it
//! before its listener exists, so the receiver keeps announcing `is-ready`
//! on a fixed interval until the host answers `ready`. The first `ready`
//! gets exactly one `inject-profile`; the probe count is capped.

use std::time::Duration;

use async_trait::async_trait;
use pw_trace_protocol::HostMessage;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, trace};

use crate::config::TransferSettings;
use crate::error::TransferError;

/// The page that renders the profile, seen as a message endpoint.
#[async_trait]
pub trait VisualizationHost: Send {
	async fn post(&mut self, message: HostMessage) -> Result<(), TransferError>;

	/// Next message from the host; `None` once it is gone. Must be cancel safe.
	async fn next_message(&mut self) -> Option<HostMessage>;
}

/// In-memory host endpoint; [`ChannelHost::pair`] returns both ends.
#[derive(Debug)]
pub struct ChannelHost {
	outbound: mpsc::UnboundedSender<HostMessage>,
	inbound: mpsc::UnboundedReceiver<HostMessage>,
}

impl ChannelHost {
	pub fn pair() -> (Self, Self) {
		let (a_tx, a_rx) = mpsc::unbounded_channel();
		let (b_tx, b_rx) = mpsc::unbounded_channel();
		(
			Self {
				outbound: a_tx,
				inbound: b_rx,
			},
			Self {
				outbound: b_tx,
				inbound: a_rx,
			},
		)
	}
}

#[async_trait]
impl VisualizationHost for ChannelHost {
	async fn post(&mut self, message: HostMessage) -> Result<(), TransferError> {
		self.outbound.send(message).map_err(|_| TransferError::HostClosed)
	}

	async fn next_message(&mut self) -> Option<HostMessage> {
		self.inbound.recv().await
	}
}

#[derive(Debug, Clone, Copy)]
pub struct Handshake {
	poll_interval: Duration,
	max_probes: u32,
}

enum Step {
	Message(Option<HostMessage>),
	Probe,
}

impl Handshake {
	pub fn new(settings: &TransferSettings) -> Self {
		Self {
			poll_interval: settings.ready_poll_interval(),
			max_probes: settings.max_ready_probes,
		}
	}

	/// Probes `host` until it is ready, then posts `profile`. Returns the number of probes sent.
	pub async fn run(&self, host: &mut dyn VisualizationHost, profile: String) -> Result<u32, TransferError> {
		let mut probes = 0u32;
		let mut ticker = interval_at(Instant::now() + self.poll_interval, self.poll_interval);
		ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

		loop {
			let step = tokio::select! {
				message = host.next_message() => Step::Message(message),
				_ = ticker.tick() => Step::Probe,
			};
			match step {
				Step::Message(Some(HostMessage::Ready)) => {
					debug!(target = "pw_trace.handshake", probes, "host ready");
					host.post(HostMessage::InjectProfile { profile }).await?;
					return Ok(probes);
				}
				Step::Message(Some(other)) => {
					trace!(target = "pw_trace.handshake", message = ?other, "ignoring host message");
				}
				Step::Message(None) => return Err(TransferError::HostClosed),
				Step::Probe => {
					if probes >= self.max_probes {
						return Err(TransferError::HandshakeTimeout { probes });
					}
					host.post(HostMessage::IsReady).await?;
					probes += 1;
				}
			}
		}
	}
}
