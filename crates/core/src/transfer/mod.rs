//! Moving a collected payload into a receiving context.
//!
//! A single large transfer into a page can be accepted and then silently
//! lost, so [`ChunkedTransfer`] never sends a payload whole. It splits the
//! payload into bounded pieces, waits until the receiver can take them, and
//! pushes them strictly in order with a short pause in between. The
//! receiver reassembles and then runs the readiness handshake with the
//! visualization host before posting the profile exactly once.

mod file;
mod handshake;
mod page;
mod receiver;

use std::time::Duration;

use async_trait::async_trait;
use pw_trace_protocol::Piece;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

pub use file::{FileLauncher, FileReceiver};
pub use handshake::{ChannelHost, Handshake, VisualizationHost};
pub use page::{PageLauncher, PageReceiver};
pub use receiver::{Accepted, InProcessReceiver, PieceBuffer};

use crate::config::TransferSettings;
use crate::error::{Result, TransferError};
use crate::payload::Payload;

/// Sender-side state of one delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferHandshake {
	total_pieces: usize,
	next_piece_index: usize,
	ready: bool,
}

impl TransferHandshake {
	pub fn new(total_pieces: usize) -> Self {
		Self {
			total_pieces,
			next_piece_index: 0,
			ready: false,
		}
	}

	/// Records the receiver's confirmation. Only the first call counts.
	pub fn mark_ready(&mut self) -> bool {
		!std::mem::replace(&mut self.ready, true)
	}

	pub fn is_ready(&self) -> bool {
		self.ready
	}

	/// Index of the next piece to send, or `None` before readiness and after the last piece.
	pub fn next_piece(&mut self) -> Option<usize> {
		if !self.ready || self.next_piece_index >= self.total_pieces {
			return None;
		}
		let index = self.next_piece_index;
		self.next_piece_index += 1;
		Some(index)
	}

	pub fn is_complete(&self) -> bool {
		self.ready && self.next_piece_index == self.total_pieces
	}
}

/// A context that receives pieces and reassembles them.
#[async_trait]
pub trait ReceiverContext: Send {
	/// Resolves once the receiver has initialized its buffer.
	async fn wait_ready(&mut self) -> Result<()>;

	async fn push_piece(&mut self, piece: Piece<'_>) -> Result<()>;

	/// Called after the last piece; runs the receiver's own handshake.
	async fn finish(&mut self) -> Result<()>;

	/// Called instead of `finish` when the delivery fails.
	async fn abort(&mut self) {}
}

/// Opens a fresh receiving context for each delivery.
#[async_trait]
pub trait ReceiverLauncher: Send + Sync {
	async fn launch(&self) -> Result<Box<dyn ReceiverContext>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryReport {
	pub pieces: usize,
	pub bytes: usize,
}

pub struct ChunkedTransfer {
	max_piece_bytes: usize,
	piece_delay: Duration,
}

impl ChunkedTransfer {
	pub fn new(settings: &TransferSettings) -> Self {
		Self {
			max_piece_bytes: settings.max_piece_bytes,
			piece_delay: settings.piece_delay(),
		}
	}

	/// Delivers `payload` into `receiver`. A failed piece aborts the whole delivery.
	pub async fn deliver(&self, payload: Payload, receiver: &mut dyn ReceiverContext) -> Result<DeliveryReport> {
		let pieces = payload.pieces(self.max_piece_bytes);
		let total = pieces.len();
		let mut handshake = TransferHandshake::new(total);

		receiver.wait_ready().await?;
		handshake.mark_ready();
		debug!(target = "pw_trace.transfer", total, bytes = payload.len(), "receiver ready");

		while let Some(index) = handshake.next_piece() {
			if index > 0 {
				tokio::time::sleep(self.piece_delay).await;
			}
			let piece = Piece {
				index,
				total,
				data: pieces[index],
			};
			receiver.push_piece(piece).await.map_err(|e| TransferError::Piece {
				index,
				total,
				message: e.to_string(),
			})?;
			debug!(target = "pw_trace.transfer", index, total, "piece sent");
		}

		receiver.finish().await?;
		Ok(DeliveryReport {
			pieces: total,
			bytes: payload.len(),
		})
	}
}

/// Delivers handed-off payloads one at a time, each into a freshly launched receiver.
pub struct DeliveryWorker {
	launcher: Box<dyn ReceiverLauncher>,
	transfer: ChunkedTransfer,
}

impl DeliveryWorker {
	pub fn new(launcher: Box<dyn ReceiverLauncher>, transfer: ChunkedTransfer) -> Self {
		Self { launcher, transfer }
	}

	/// Runs until every sender of `payloads` is gone. Returns the number of successful deliveries.
	pub async fn run(self, mut payloads: mpsc::UnboundedReceiver<Payload>) -> usize {
		let mut delivered = 0;
		while let Some(payload) = payloads.recv().await {
			match self.deliver(payload).await {
				Ok(report) => {
					delivered += 1;
					info!(target = "pw_trace.transfer", pieces = report.pieces, bytes = report.bytes, "trace delivered");
				}
				Err(e) => warn!(target = "pw_trace.transfer", error = %e, "delivery failed"),
			}
		}
		delivered
	}

	pub async fn deliver(&self, payload: Payload) -> Result<DeliveryReport> {
		let mut receiver = self.launcher.launch().await?;
		let result = self.transfer.deliver(payload, receiver.as_mut()).await;
		if result.is_err() {
			receiver.abort().await;
		}
		result
	}
}
