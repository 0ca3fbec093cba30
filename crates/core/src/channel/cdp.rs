//! [`DebugChannel`] over a CDP browser connection using flat sessions.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use parking_lot::Mutex;
use pw_trace_protocol::{
	AttachToTarget, AttachedSession, CreateTarget, CreatedTarget, DetachFromTarget, DetachedFromTarget, Event, TargetInfo,
	TargetInfos, events, methods,
};
use pw_trace_runtime::Connection;
use serde_json::{Value, json};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::{ChannelEvent, DebugChannel};
use crate::error::{Error, Result};
use crate::target::TargetId;

const EVENT_BUFFER: usize = 256;

/// Browser-level CDP connection with one flat session per attached target.
pub struct CdpChannel {
	connection: Arc<Connection>,
	sessions: Mutex<HashMap<TargetId, String>>,
	/// Sessions this process is detaching; their detach events are not out-of-band.
	self_detached: Mutex<HashSet<String>>,
	events: broadcast::Sender<ChannelEvent>,
}

impl CdpChannel {
	/// Wraps `connection` and starts translating its events.
	///
	/// The connection's run loop must be driven separately.
	pub fn spawn(connection: Arc<Connection>) -> Arc<Self> {
		let (events, _) = broadcast::channel(EVENT_BUFFER);
		let raw = connection.subscribe();
		let channel = Arc::new(Self {
			connection,
			sessions: Mutex::new(HashMap::new()),
			self_detached: Mutex::new(HashSet::new()),
			events,
		});
		tokio::spawn(pump(Arc::downgrade(&channel), raw));
		channel
	}

	/// Sends a command to the browser itself rather than to a target.
	pub async fn browser_command(&self, method: &str, params: Value) -> Result<Value> {
		Ok(self.connection.send(None, method, params).await?)
	}

	pub async fn targets(&self) -> Result<Vec<TargetInfo>> {
		let reply = self.browser_command(methods::TARGET_GET_TARGETS, json!({})).await?;
		let infos: TargetInfos = serde_json::from_value(reply).map_err(Error::reply(methods::TARGET_GET_TARGETS))?;
		Ok(infos.target_infos)
	}

	/// Opens a new page target at `url`.
	pub async fn create_target(&self, url: &str) -> Result<TargetId> {
		let params = serde_json::to_value(CreateTarget { url: url.to_string() })?;
		let reply = self.browser_command(methods::TARGET_CREATE_TARGET, params).await?;
		let created: CreatedTarget =
			serde_json::from_value(reply).map_err(Error::reply(methods::TARGET_CREATE_TARGET))?;
		Ok(TargetId::new(created.target_id))
	}

	pub fn is_attached(&self, target: &TargetId) -> bool {
		self.sessions.lock().contains_key(target)
	}

	fn session_for(&self, target: &TargetId) -> Result<String> {
		self.sessions
			.lock()
			.get(target)
			.cloned()
			.ok_or_else(|| Error::NotAttached(target.clone()))
	}

	fn target_for(&self, session_id: &str) -> Option<TargetId> {
		self.sessions
			.lock()
			.iter()
			.find_map(|(target, sid)| (sid == session_id).then(|| target.clone()))
	}

	fn on_event(&self, event: Event) {
		if event.method == events::TARGET_DETACHED && event.session_id.is_none() {
			self.on_detached(event.params);
			return;
		}

		let Some(session_id) = event.session_id.as_deref() else {
			return;
		};
		let Some(target) = self.target_for(session_id) else {
			return;
		};
		let _ = self.events.send(ChannelEvent::Protocol {
			target,
			method: event.method,
			params: event.params,
		});
	}

	fn on_detached(&self, params: Value) {
		let detached: DetachedFromTarget = match serde_json::from_value(params) {
			Ok(detached) => detached,
			Err(e) => {
				warn!(target = "pw_trace.channel", error = %e, "malformed detach event");
				return;
			}
		};

		if self.self_detached.lock().remove(&detached.session_id) {
			debug!(target = "pw_trace.channel", session = %detached.session_id, "own detach confirmed");
			return;
		}

		let target = {
			let mut sessions = self.sessions.lock();
			let found = sessions
				.iter()
				.find_map(|(target, sid)| (*sid == detached.session_id).then(|| target.clone()));
			if let Some(target) = &found {
				sessions.remove(target);
			}
			found
		};

		if let Some(target) = target {
			info!(target = "pw_trace.channel", target_id = %target, "target detached out of band");
			let _ = self.events.send(ChannelEvent::Detached {
				target,
				reason: "detached by browser".to_string(),
			});
		}
	}

	fn on_connection_closed(&self) {
		self.self_detached.lock().clear();
		let targets: Vec<TargetId> = self.sessions.lock().drain().map(|(target, _)| target).collect();
		for target in targets {
			let _ = self.events.send(ChannelEvent::Detached {
				target,
				reason: "browser connection closed".to_string(),
			});
		}
	}
}

async fn pump(channel: Weak<CdpChannel>, mut raw: broadcast::Receiver<Event>) {
	loop {
		let event = match raw.recv().await {
			Ok(event) => event,
			Err(broadcast::error::RecvError::Lagged(skipped)) => {
				warn!(target = "pw_trace.channel", skipped, "event pump lagged");
				continue;
			}
			Err(broadcast::error::RecvError::Closed) => {
				if let Some(channel) = channel.upgrade() {
					channel.on_connection_closed();
				}
				return;
			}
		};
		let Some(channel) = channel.upgrade() else {
			return;
		};
		channel.on_event(event);
	}
}

#[async_trait]
impl DebugChannel for CdpChannel {
	async fn attach(&self, target: &TargetId) -> Result<()> {
		if self.is_attached(target) {
			return Ok(());
		}
		let params = serde_json::to_value(AttachToTarget {
			target_id: target.to_string(),
			flatten: true,
		})?;
		let reply = self.browser_command(methods::TARGET_ATTACH, params).await?;
		let attached: AttachedSession = serde_json::from_value(reply).map_err(Error::reply(methods::TARGET_ATTACH))?;
		debug!(target = "pw_trace.channel", target_id = %target, session = %attached.session_id, "attached");
		self.sessions.lock().insert(target.clone(), attached.session_id);
		Ok(())
	}

	async fn send_command(&self, target: &TargetId, method: &str, params: Value) -> Result<Value> {
		let session_id = self.session_for(target)?;
		Ok(self.connection.send(Some(&session_id), method, params).await?)
	}

	async fn detach(&self, target: &TargetId) -> Result<()> {
		let Some(session_id) = self.sessions.lock().remove(target) else {
			return Ok(());
		};
		self.self_detached.lock().insert(session_id.clone());

		let params = serde_json::to_value(DetachFromTarget {
			session_id: session_id.clone(),
		})?;
		if let Err(e) = self.browser_command(methods::TARGET_DETACH, params).await {
			self.self_detached.lock().remove(&session_id);
			return Err(e);
		}
		debug!(target = "pw_trace.channel", target_id = %target, "detached");
		Ok(())
	}

	fn subscribe(&self) -> broadcast::Receiver<ChannelEvent> {
		self.events.subscribe()
	}
}
