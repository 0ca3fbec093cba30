//! Reads a buffered trace stream back from the browser.

use pw_trace_protocol::{IoClose, IoRead, IoReadResult, methods};
use tracing::{debug, warn};

use crate::channel::DebugChannel;
use crate::error::AssemblyError;
use crate::payload::Payload;
use crate::target::TargetId;

/// Drains one stream handle into a [`Payload`].
///
/// Reads are strictly sequential: the stream cannot seek and chunk order is
/// the only ordering signal.
pub struct StreamAssembler<'a> {
	channel: &'a dyn DebugChannel,
	read_size: Option<usize>,
}

impl<'a> StreamAssembler<'a> {
	pub fn new(channel: &'a dyn DebugChannel) -> Self {
		Self { channel, read_size: None }
	}

	/// Upper bound passed as `size` to each `IO.read`.
	pub fn with_read_size(mut self, read_size: Option<usize>) -> Self {
		self.read_size = read_size;
		self
	}

	/// Reads `handle` until a chunk reports end of stream.
	///
	/// Any failed or malformed read discards everything read so far.
	pub async fn assemble(&self, target: &TargetId, handle: &str) -> Result<Payload, AssemblyError> {
		let result = self.read_all(target, handle).await;
		self.close(target, handle).await;
		result
	}

	async fn read_all(&self, target: &TargetId, handle: &str) -> Result<Payload, AssemblyError> {
		let params = serde_json::to_value(IoRead {
			handle: handle.to_string(),
			size: self.read_size,
		})
		.map_err(AssemblyError::Malformed)?;

		let mut bytes = Vec::new();
		let mut chunk = 0usize;
		loop {
			let reply = self
				.channel
				.send_command(target, methods::IO_READ, params.clone())
				.await
				.map_err(|e| AssemblyError::Read {
					handle: handle.to_string(),
					chunk,
					message: e.to_string(),
				})?;
			let read: IoReadResult = serde_json::from_value(reply).map_err(AssemblyError::Malformed)?;
			let eof = read.eof;
			bytes.extend(read.decode().map_err(|source| AssemblyError::Decode { chunk, source })?);
			chunk += 1;
			if eof {
				break;
			}
		}

		debug!(target = "pw_trace.stream", target_id = %target, handle, chunks = chunk, bytes = bytes.len(), "stream drained");
		Ok(Payload::new(String::from_utf8(bytes)?))
	}

	async fn close(&self, target: &TargetId, handle: &str) {
		let params = match serde_json::to_value(IoClose {
			handle: handle.to_string(),
		}) {
			Ok(params) => params,
			Err(e) => {
				warn!(target = "pw_trace.stream", handle, error = %e, "cannot encode IO.close");
				return;
			}
		};
		if let Err(e) = self.channel.send_command(target, methods::IO_CLOSE, params).await {
			warn!(target = "pw_trace.stream", target_id = %target, handle, error = %e, "failed to close stream");
		}
	}
}
