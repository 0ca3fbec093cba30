//! Delivery into a profiler page opened in the browser.
//!
//! Each piece is evaluated in the page together with the reassembly script
//! in `page_receiver.js`. The last piece starts the page-side handshake,
//! whose outcome is awaited by [`PageReceiver::finish`].

use std::sync::Arc;

use async_trait::async_trait;
use pw_trace_protocol::{Piece, events, methods};
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use super::ReceiverContext;
use super::ReceiverLauncher;
use crate::channel::{CdpChannel, ChannelEvent, DebugChannel};
use crate::config::{HostSettings, TraceSettings};
use crate::error::{Error, Result, TransferError};
use crate::subscription::OneShot;
use crate::target::TargetId;

const PAGE_SCRIPT: &str = include_str!("page_receiver.js");

pub struct PageLauncher {
	channel: Arc<CdpChannel>,
	settings: TraceSettings,
}

impl PageLauncher {
	pub fn new(channel: Arc<CdpChannel>, settings: TraceSettings) -> Self {
		Self { channel, settings }
	}
}

#[async_trait]
impl ReceiverLauncher for PageLauncher {
	async fn launch(&self) -> Result<Box<dyn ReceiverContext>> {
		let target = self.channel.create_target("about:blank").await?;
		self.channel.attach(&target).await?;
		self.channel.send_command(&target, methods::PAGE_ENABLE, json!({})).await?;
		debug!(target = "pw_trace.page", target_id = %target, "receiver page opened");
		Ok(Box::new(PageReceiver {
			channel: self.channel.clone(),
			target,
			host: self.settings.host.clone(),
			poll_interval_ms: self.settings.transfer.ready_poll_interval_ms,
			max_probes: self.settings.transfer.max_ready_probes,
		}))
	}
}

pub struct PageReceiver {
	channel: Arc<CdpChannel>,
	target: TargetId,
	host: HostSettings,
	poll_interval_ms: u64,
	max_probes: u32,
}

impl PageReceiver {
	async fn evaluate(&self, expression: String, await_promise: bool) -> Result<Value> {
		let params = json!({
			"expression": expression,
			"returnByValue": true,
			"awaitPromise": await_promise,
		});
		self.channel.send_command(&self.target, methods::RUNTIME_EVALUATE, params).await
	}

	async fn detach(&self) {
		if let Err(e) = self.channel.detach(&self.target).await {
			debug!(target = "pw_trace.page", target_id = %self.target, error = %e, "detach failed");
		}
	}
}

fn exception_text(details: &Value) -> String {
	details
		.pointer("/exception/description")
		.or_else(|| details.get("text"))
		.and_then(Value::as_str)
		.unwrap_or("script threw")
		.to_string()
}

#[async_trait]
impl ReceiverContext for PageReceiver {
	async fn wait_ready(&mut self) -> Result<()> {
		let url = self.host.page_url()?;
		let loaded = OneShot::subscribe(self.channel.as_ref(), {
			let target = self.target.clone();
			move |event: &ChannelEvent| match event {
				ChannelEvent::Detached { target: t, reason } if *t == target => Some(Err(reason.clone())),
				_ => event.params_of(&target, events::PAGE_LOAD_EVENT_FIRED).map(|_| Ok(())),
			}
		});

		let reply = self
			.channel
			.send_command(&self.target, methods::PAGE_NAVIGATE, json!({ "url": url.as_str() }))
			.await?;
		if let Some(error) = reply.get("errorText").and_then(Value::as_str) {
			return Err(TransferError::NotReady(format!("navigation to {url} failed: {error}")).into());
		}

		match tokio::time::timeout(self.host.load_timeout(), loaded.recv()).await {
			Ok(Some(Ok(()))) => {
				info!(target = "pw_trace.page", %url, "profiler page loaded");
				Ok(())
			}
			Ok(Some(Err(reason))) => Err(TransferError::NotReady(reason).into()),
			Ok(None) => Err(TransferError::NotReady("debug channel closed".to_string()).into()),
			Err(_) => Err(Error::Timeout("profiler page load")),
		}
	}

	async fn push_piece(&mut self, piece: Piece<'_>) -> Result<()> {
		let origin = self.host.page_url()?.origin().ascii_serialization();
		let expression = format!(
			"({})({}, {}, {}, {})",
			PAGE_SCRIPT.trim(),
			serde_json::to_string(&piece)?,
			serde_json::to_string(&origin)?,
			self.poll_interval_ms,
			self.max_probes,
		);
		let reply = self.evaluate(expression, false).await?;
		if let Some(details) = reply.get("exceptionDetails") {
			return Err(TransferError::Piece {
				index: piece.index,
				total: piece.total,
				message: exception_text(details),
			}
			.into());
		}
		if piece.is_last() {
			debug!(target = "pw_trace.page", total = piece.total, "all pieces in page, handshake running");
		}
		Ok(())
	}

	async fn finish(&mut self) -> Result<()> {
		let reply = self.evaluate("window.__pwTraceDelivery".to_string(), true).await;
		self.detach().await;

		let reply = reply?;
		if let Some(details) = reply.get("exceptionDetails") {
			warn!(target = "pw_trace.page", error = %exception_text(details), "page handshake failed");
			return Err(TransferError::HandshakeTimeout {
				probes: self.max_probes,
			}
			.into());
		}
		match reply.pointer("/result/value").and_then(Value::as_str) {
			Some("delivered") => Ok(()),
			_ => Err(TransferError::NotReady("the page never started its handshake".to_string()).into()),
		}
	}

	async fn abort(&mut self) {
		self.detach().await;
	}
}
