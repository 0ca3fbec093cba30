use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
	#[error("transport error: {0}")]
	Transport(String),

	#[error("connection closed")]
	ConnectionClosed,

	/// The browser answered a command with an error object.
	#[error("protocol error {code}: {message}")]
	Protocol { code: i64, message: String },

	#[error("invalid protocol message: {0}")]
	Json(#[from] serde_json::Error),

	#[error("websocket error: {0}")]
	WebSocket(#[from] Box<tokio_tungstenite::tungstenite::Error>),
}

impl Error {
	/// `true` when the failure means the browser side is gone.
	pub fn is_closed(&self) -> bool {
		matches!(self, Error::ConnectionClosed)
	}
}

impl From<tokio_tungstenite::tungstenite::Error> for Error {
	fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
		Error::WebSocket(Box::new(err))
	}
}
