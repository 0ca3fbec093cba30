//! Fake transport for unit testing CDP correlation and event fan-out.
//!
//! Provides an in-memory transport for testing the protocol layer without a browser.
//!
//! # Example
//!
//! ```ignore
//! let (parts, controller) = FakeTransportBuilder::new().build();
//! let connection = Arc::new(Connection::new(parts));
//!
//! tokio::spawn({
//!     let conn = Arc::clone(&connection);
//!     async move { conn.run().await }
//! });
//!
//! let fut = connection.send(None, "Target.getTargets", json!({}));
//! controller.inject_response(1, json!({"targetInfos": []}));
//! let result = fut.await?;
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::{Value, json};
use tokio::sync::{Mutex, mpsc};

use crate::error::Result;
use crate::transport::{Transport, TransportParts, TransportReceiver};

/// Builder for creating fake transport instances.
#[derive(Default)]
pub struct FakeTransportBuilder {}

impl FakeTransportBuilder {
	pub fn new() -> Self {
		Self {}
	}

	/// Build the fake transport and return both parts and a controller.
	///
	/// Returns [`TransportParts`] for creating a [`Connection`] and a
	/// [`FakeTransportController`] for injecting responses and inspecting sent messages.
	///
	/// [`Connection`]: crate::Connection
	pub fn build(self) -> (TransportParts, FakeTransportController) {
		let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
		let (message_tx, message_rx) = mpsc::unbounded_channel();
		let sent = Arc::new(Mutex::new(Vec::new()));

		let parts = TransportParts {
			sender: Box::new(FakeTransportSender { sent: Arc::clone(&sent) }),
			receiver: Box::new(FakeTransportReceiver { inbound_rx, message_tx }),
			message_rx,
		};

		(parts, FakeTransportController { inbound_tx, sent })
	}
}

/// Controller for injecting responses/events and inspecting sent messages.
pub struct FakeTransportController {
	inbound_tx: mpsc::UnboundedSender<Value>,
	sent: Arc<Mutex<Vec<Value>>>,
}

impl FakeTransportController {
	/// Inject a raw JSON message as if the browser had sent it.
	pub fn inject(&self, message: Value) {
		let _ = self.inbound_tx.send(message);
	}

	pub fn inject_response(&self, id: u64, result: Value) {
		self.inject(json!({ "id": id, "result": result }));
	}

	pub fn inject_error(&self, id: u64, code: i64, message: &str) {
		self.inject(json!({
			"id": id,
			"error": { "code": code, "message": message }
		}));
	}

	/// Inject an event, optionally scoped to a flat target session.
	pub fn inject_event(&self, session_id: Option<&str>, method: &str, params: Value) {
		let mut event = json!({ "method": method, "params": params });
		if let Some(session_id) = session_id {
			event["sessionId"] = json!(session_id);
		}
		self.inject(event);
	}

	/// Take all sent messages, clearing the buffer.
	pub async fn take_sent(&self) -> Vec<Value> {
		std::mem::take(&mut *self.sent.lock().await)
	}

	/// Simulates the browser going away.
	pub fn close(self) {}
}

struct FakeTransportSender {
	sent: Arc<Mutex<Vec<Value>>>,
}

impl Transport for FakeTransportSender {
	fn send(&mut self, message: Value) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
		let sent = Arc::clone(&self.sent);
		Box::pin(async move {
			sent.lock().await.push(message);
			Ok(())
		})
	}
}

struct FakeTransportReceiver {
	inbound_rx: mpsc::UnboundedReceiver<Value>,
	message_tx: mpsc::UnboundedSender<Value>,
}

impl TransportReceiver for FakeTransportReceiver {
	fn run(mut self: Box<Self>) -> Pin<Box<dyn Future<Output = Result<()>> + Send>> {
		Box::pin(async move {
			while let Some(message) = self.inbound_rx.recv().await {
				if self.message_tx.send(message).is_err() {
					break;
				}
			}
			Ok(())
		})
	}
}
