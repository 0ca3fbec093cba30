//! Error types for session, assembly and transfer failures.

use std::string::FromUtf8Error;

use thiserror::Error;

use crate::target::TargetId;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
	#[error(transparent)]
	Runtime(#[from] pw_trace_runtime::Error),

	#[error("target {0} is not attached")]
	NotAttached(TargetId),

	#[error("unexpected reply to {method}: {source}")]
	Reply {
		method: &'static str,
		#[source]
		source: serde_json::Error,
	},

	#[error(transparent)]
	Assembly(#[from] AssemblyError),

	#[error(transparent)]
	Transfer(#[from] TransferError),

	#[error("invalid settings: {0}")]
	Config(String),

	#[error("timed out waiting for {0}")]
	Timeout(&'static str),

	#[error(transparent)]
	Io(#[from] std::io::Error),

	#[error(transparent)]
	Json(#[from] serde_json::Error),
}

impl Error {
	pub fn reply(method: &'static str) -> impl FnOnce(serde_json::Error) -> Self {
		move |source| Error::Reply { method, source }
	}
}

/// Why a trace stream could not be read back in full.
///
/// Assembly never yields partial data: any of these discards everything read so far.
#[derive(Debug, Error)]
pub enum AssemblyError {
	#[error("read {chunk} of stream {handle} failed: {message}")]
	Read { handle: String, chunk: usize, message: String },

	#[error("malformed IO.read reply: {0}")]
	Malformed(#[source] serde_json::Error),

	#[error("chunk {chunk} is not valid base64: {source}")]
	Decode {
		chunk: usize,
		#[source]
		source: base64::DecodeError,
	},

	#[error("trace is not valid UTF-8: {0}")]
	Encoding(#[from] FromUtf8Error),

	#[error("session ended while the stream was being read")]
	Cancelled,
}

/// Failures of the piece transfer or the readiness handshake.
#[derive(Debug, Error)]
pub enum TransferError {
	#[error("receiver never became ready: {0}")]
	NotReady(String),

	#[error("piece {index}/{total} failed: {message}")]
	Piece { index: usize, total: usize, message: String },

	#[error("piece {got} arrived while expecting {expected}")]
	OutOfOrder { expected: usize, got: usize },

	#[error("piece claims {got} total pieces, transfer started with {expected}")]
	TotalMismatch { expected: usize, got: usize },

	#[error("no ready acknowledgement after {probes} probes")]
	HandshakeTimeout { probes: u32 },

	#[error("visualization host went away")]
	HostClosed,

	#[error("receiver finished before all pieces arrived ({received}/{total})")]
	Incomplete { received: usize, total: usize },
}
