//! Message transports.
//!
//! A transport is split in two: a [`Transport`] that writes JSON messages and
//! a [`TransportReceiver`] that pumps inbound messages into an unbounded
//! channel until the peer goes away. [`Connection`](crate::Connection) owns
//! both halves through [`TransportParts`].

use std::future::Future;
use std::pin::Pin;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

use crate::error::Result;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Outbound half of a transport.
pub trait Transport: Send {
	fn send(&mut self, message: Value) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Inbound half of a transport. Runs until the peer closes.
pub trait TransportReceiver: Send {
	fn run(self: Box<Self>) -> Pin<Box<dyn Future<Output = Result<()>> + Send>>;
}

/// Both halves plus the channel the receiver feeds.
pub struct TransportParts {
	pub sender: Box<dyn Transport>,
	pub receiver: Box<dyn TransportReceiver>,
	pub message_rx: mpsc::UnboundedReceiver<Value>,
}

/// WebSocket connection to a browser's `webSocketDebuggerUrl`.
pub struct WebSocketTransport {
	sink: SplitSink<WsStream, Message>,
	stream: SplitStream<WsStream>,
	message_tx: mpsc::UnboundedSender<Value>,
}

impl WebSocketTransport {
	/// Connects to `url` and returns the transport with its inbound channel.
	pub async fn connect(url: &str) -> Result<(Self, mpsc::UnboundedReceiver<Value>)> {
		debug!(target = "pw_trace.transport", %url, "connecting");
		let (ws, _response) = tokio_tungstenite::connect_async(url).await?;
		let (sink, stream) = ws.split();
		let (message_tx, message_rx) = mpsc::unbounded_channel();
		Ok((Self { sink, stream, message_tx }, message_rx))
	}

	pub fn into_transport_parts(self, message_rx: mpsc::UnboundedReceiver<Value>) -> TransportParts {
		TransportParts {
			sender: Box::new(WebSocketSender { sink: self.sink }),
			receiver: Box::new(WebSocketReceiver {
				stream: self.stream,
				message_tx: self.message_tx,
			}),
			message_rx,
		}
	}
}

struct WebSocketSender {
	sink: SplitSink<WsStream, Message>,
}

impl Transport for WebSocketSender {
	fn send(&mut self, message: Value) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
		Box::pin(async move {
			let text = serde_json::to_string(&message)?;
			self.sink.send(Message::Text(text.into())).await?;
			Ok(())
		})
	}
}

struct WebSocketReceiver {
	stream: SplitStream<WsStream>,
	message_tx: mpsc::UnboundedSender<Value>,
}

impl TransportReceiver for WebSocketReceiver {
	fn run(mut self: Box<Self>) -> Pin<Box<dyn Future<Output = Result<()>> + Send>> {
		Box::pin(async move {
			while let Some(frame) = self.stream.next().await {
				let value = match frame? {
					Message::Text(text) => serde_json::from_str::<Value>(&text),
					Message::Binary(bytes) => serde_json::from_slice::<Value>(&bytes),
					Message::Close(frame) => {
						debug!(target = "pw_trace.transport", ?frame, "peer closed websocket");
						break;
					}
					_ => continue,
				};

				match value {
					Ok(value) => {
						if self.message_tx.send(value).is_err() {
							break;
						}
					}
					Err(e) => warn!(target = "pw_trace.transport", error = %e, "dropping unparseable frame"),
				}
			}
			Ok(())
		})
	}
}
