//! Receiver-side reassembly.

use async_trait::async_trait;
use pw_trace_protocol::Piece;
use tracing::debug;

use super::ReceiverContext;
use super::handshake::{Handshake, VisualizationHost};
use crate::error::{Result, TransferError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Accepted {
	Partial { received: usize, total: usize },
	Complete(String),
}

/// Collects pieces in arrival order and joins them once all have arrived.
#[derive(Debug, Default)]
pub struct PieceBuffer {
	total: Option<usize>,
	pieces: Vec<String>,
}

impl PieceBuffer {
	pub fn new() -> Self {
		Self::default()
	}

	/// Pieces buffered so far.
	pub fn pieces(&self) -> &[String] {
		&self.pieces
	}

	pub fn accept(&mut self, piece: Piece<'_>) -> std::result::Result<Accepted, TransferError> {
		let expected = self.pieces.len();
		if piece.index != expected || piece.index >= piece.total {
			return Err(TransferError::OutOfOrder {
				expected,
				got: piece.index,
			});
		}
		let total = *self.total.get_or_insert(piece.total);
		if piece.total != total {
			return Err(TransferError::TotalMismatch {
				expected: total,
				got: piece.total,
			});
		}

		self.pieces.push(piece.data.to_string());
		if self.pieces.len() < total {
			return Ok(Accepted::Partial {
				received: self.pieces.len(),
				total,
			});
		}
		self.total = None;
		Ok(Accepted::Complete(std::mem::take(&mut self.pieces).concat()))
	}
}

/// Reassembles in this process and hands the profile to a [`VisualizationHost`].
pub struct InProcessReceiver<H> {
	buffer: PieceBuffer,
	profile: Option<String>,
	handshake: Handshake,
	host: H,
}

impl<H: VisualizationHost> InProcessReceiver<H> {
	pub fn new(host: H, handshake: Handshake) -> Self {
		Self {
			buffer: PieceBuffer::new(),
			profile: None,
			handshake,
			host,
		}
	}

	pub fn buffer(&self) -> &PieceBuffer {
		&self.buffer
	}
}

#[async_trait]
impl<H: VisualizationHost> ReceiverContext for InProcessReceiver<H> {
	async fn wait_ready(&mut self) -> Result<()> {
		Ok(())
	}

	async fn push_piece(&mut self, piece: Piece<'_>) -> Result<()> {
		match self.buffer.accept(piece)? {
			Accepted::Partial { received, total } => {
				debug!(target = "pw_trace.receiver", received, total, "piece buffered");
			}
			Accepted::Complete(profile) => self.profile = Some(profile),
		}
		Ok(())
	}

	async fn finish(&mut self) -> Result<()> {
		let Some(profile) = self.profile.take() else {
			return Err(TransferError::Incomplete {
				received: self.buffer.pieces().len(),
				total: self.buffer.total.unwrap_or_default(),
			}
			.into());
		};
		let probes = self.handshake.run(&mut self.host, profile).await?;
		debug!(target = "pw_trace.receiver", probes, "profile injected");
		Ok(())
	}
}
