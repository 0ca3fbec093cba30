//! CDP connection: request/response correlation and event fan-out.
//!
//! # Message Flow
//!
//! 1. Caller invokes [`Connection::send`] with an optional session id, a method and params
//! 2. Connection allocates the next id and parks a oneshot sender under it
//! 3. Request is serialized and written through the transport
//! 4. [`Connection::run`] reads inbound messages
//! 5. Responses complete the parked oneshot; events go to every subscriber
//!
//! When the transport ends, pending requests fail with
//! [`Error::ConnectionClosed`] and event subscribers observe a closed channel.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;
use pw_trace_protocol::{Event, Message, Request, ResponseError};
use serde_json::Value;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, error, trace, warn};

use crate::error::{Error, Result};
use crate::transport::{Transport, TransportParts, TransportReceiver};

const EVENT_BUFFER: usize = 1024;

type Pending = HashMap<u64, oneshot::Sender<Result<Value>>>;

struct Inbound {
	receiver: Box<dyn TransportReceiver>,
	message_rx: mpsc::UnboundedReceiver<Value>,
}

/// Connection to a browser endpoint.
///
/// Shared across tasks behind an `Arc`; any number of commands may be in
/// flight at once.
pub struct Connection {
	last_id: AtomicU64,
	closed: AtomicBool,
	pending: Mutex<Pending>,
	sender: tokio::sync::Mutex<Box<dyn Transport>>,
	inbound: Mutex<Option<Inbound>>,
	events: Mutex<Option<broadcast::Sender<Event>>>,
}

impl Connection {
	pub fn new(parts: TransportParts) -> Self {
		let (events, _) = broadcast::channel(EVENT_BUFFER);
		Self {
			last_id: AtomicU64::new(0),
			closed: AtomicBool::new(false),
			pending: Mutex::new(HashMap::new()),
			sender: tokio::sync::Mutex::new(parts.sender),
			inbound: Mutex::new(Some(Inbound {
				receiver: parts.receiver,
				message_rx: parts.message_rx,
			})),
			events: Mutex::new(Some(events)),
		}
	}

	/// Sends `method` and waits for its reply.
	///
	/// `session_id` routes the command to an attached target; `None` talks to
	/// the browser itself.
	pub async fn send(&self, session_id: Option<&str>, method: &str, params: Value) -> Result<Value> {
		let id = self.last_id.fetch_add(1, Ordering::SeqCst) + 1;
		let (tx, rx) = oneshot::channel();
		self.pending.lock().insert(id, tx);
		if self.closed.load(Ordering::SeqCst) {
			self.pending.lock().remove(&id);
			return Err(Error::ConnectionClosed);
		}

		let request = Request {
			id,
			method: method.to_string(),
			params,
			session_id: session_id.map(str::to_string),
		};
		trace!(target = "pw_trace.cdp", id, method, session = ?session_id, "send");

		let value = serde_json::to_value(&request)?;
		if let Err(e) = self.sender.lock().await.send(value).await {
			self.pending.lock().remove(&id);
			return Err(e);
		}

		rx.await.map_err(|_| Error::ConnectionClosed)?
	}

	/// Subscribes to every event received after this call.
	pub fn subscribe(&self) -> broadcast::Receiver<Event> {
		match self.events.lock().as_ref() {
			Some(tx) => tx.subscribe(),
			None => broadcast::channel(1).1,
		}
	}

	/// Runs the dispatch loop until the transport ends.
	///
	/// Must be called once; later calls return immediately.
	pub async fn run(&self) {
		let Some(Inbound { receiver, mut message_rx }) = self.inbound.lock().take() else {
			warn!(target = "pw_trace.cdp", "connection loop already running");
			return;
		};

		let transport = tokio::spawn(async move {
			if let Err(e) = receiver.run().await {
				error!(target = "pw_trace.cdp", error = %e, "transport failed");
			}
		});

		while let Some(raw) = message_rx.recv().await {
			match serde_json::from_value::<Message>(raw) {
				Ok(message) => self.dispatch(message),
				Err(e) => warn!(target = "pw_trace.cdp", error = %e, "failed to parse message"),
			}
		}

		debug!(target = "pw_trace.cdp", "message loop ended (transport closed)");
		self.shutdown();
		let _ = transport.await;
	}

	fn dispatch(&self, message: Message) {
		match message {
			Message::Response(response) => {
				let Some(callback) = self.pending.lock().remove(&response.id) else {
					warn!(target = "pw_trace.cdp", id = response.id, "reply for unknown request");
					return;
				};
				let result = match response.error {
					Some(err) => Err(protocol_error(err)),
					None => Ok(response.result.unwrap_or(Value::Null)),
				};
				let _ = callback.send(result);
			}
			Message::Event(event) => {
				trace!(target = "pw_trace.cdp", method = %event.method, session = ?event.session_id, "event");
				if let Some(tx) = self.events.lock().as_ref() {
					let _ = tx.send(event);
				}
			}
		}
	}

	fn shutdown(&self) {
		self.closed.store(true, Ordering::SeqCst);
		self.events.lock().take();
		for (_, callback) in self.pending.lock().drain() {
			let _ = callback.send(Err(Error::ConnectionClosed));
		}
	}
}

fn protocol_error(err: ResponseError) -> Error {
	let message = match err.data {
		Some(data) => format!("{} ({})", err.message, data),
		None => err.message,
	};
	Error::Protocol { code: err.code, message }
}
