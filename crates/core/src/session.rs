//! The tracing session state machine.
//!
//! ```text
//! Idle --start--> Starting --attached+started--> Recording
//! Recording --stop_and_collect--> Stopping --tracingComplete--> Idle, then payload handed off
//! Recording --stop_discard--> Idle
//! any --out-of-band detach--> Idle
//! ```
//!
//! [`SessionController`] is the only writer of the session. Every
//! transition is a check-and-set under a short lock that is never held
//! across an await; the state itself decides which operations are legal.
//! Each session gets an epoch and a cancellation token, so a routine that
//! resumes after its session was reset notices and backs off, and waits in
//! flight are cut short by the reset.

use std::sync::Arc;

use parking_lot::Mutex;
use pw_trace_protocol::{TracingComplete, TracingStart, events, methods};
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::channel::{ChannelEvent, DebugChannel};
use crate::config::TraceSettings;
use crate::error::{AssemblyError, Result};
use crate::payload::Payload;
use crate::presenter::{Indicator, Presenter};
use crate::stream::StreamAssembler;
use crate::subscription::OneShot;
use crate::target::TargetId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
	Idle,
	Starting,
	Recording,
	Stopping,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
	pub state: SessionState,
	pub target: Option<TargetId>,
	/// Number of sessions started so far.
	pub epoch: u64,
}

/// What an operation did. Failures are resolved locally and reported here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
	Recording,
	Collected { bytes: usize },
	Discarded,
	/// The operation was not legal in the current state.
	Ignored(&'static str),
	/// The session ended without a payload.
	Aborted(String),
}

struct Session {
	state: SessionState,
	target: Option<TargetId>,
	epoch: u64,
	cancel: CancellationToken,
}

/// Identity of the session an in-flight routine belongs to.
struct Ticket {
	epoch: u64,
	target: TargetId,
	cancel: CancellationToken,
}

enum Completion {
	Complete(Value),
	Detached(String),
}

/// Owner of the single tracing session. Cheap to clone; clones share the session.
#[derive(Clone)]
pub struct SessionController {
	channel: Arc<dyn DebugChannel>,
	presenter: Arc<dyn Presenter>,
	settings: Arc<TraceSettings>,
	handoff: mpsc::UnboundedSender<Payload>,
	session: Arc<Mutex<Session>>,
}

impl SessionController {
	/// Collected payloads are sent to `handoff`.
	pub fn new(
		channel: Arc<dyn DebugChannel>,
		presenter: Arc<dyn Presenter>,
		settings: TraceSettings,
		handoff: mpsc::UnboundedSender<Payload>,
	) -> Self {
		Self {
			channel,
			presenter,
			settings: Arc::new(settings),
			handoff,
			session: Arc::new(Mutex::new(Session {
				state: SessionState::Idle,
				target: None,
				epoch: 0,
				cancel: CancellationToken::new(),
			})),
		}
	}

	pub fn snapshot(&self) -> SessionSnapshot {
		let session = self.session.lock();
		SessionSnapshot {
			state: session.state,
			target: session.target.clone(),
			epoch: session.epoch,
		}
	}

	pub fn state(&self) -> SessionState {
		self.session.lock().state
	}

	pub fn channel(&self) -> &Arc<dyn DebugChannel> {
		&self.channel
	}

	/// Attaches to `target` and starts recording. Only legal from `Idle`.
	pub async fn start(&self, target: Option<TargetId>) -> Outcome {
		let ticket = {
			let mut session = self.session.lock();
			if session.state != SessionState::Idle {
				debug!(target = "pw_trace.session", state = ?session.state, "start ignored: session already active");
				return Outcome::Ignored("a session is already active");
			}
			let Some(target) = target else {
				debug!(target = "pw_trace.session", "start ignored: no target resolved");
				return Outcome::Ignored("no target resolved");
			};
			session.epoch += 1;
			session.state = SessionState::Starting;
			session.target = Some(target.clone());
			session.cancel = CancellationToken::new();
			Ticket {
				epoch: session.epoch,
				target,
				cancel: session.cancel.clone(),
			}
		};

		info!(target = "pw_trace.session", target_id = %ticket.target, epoch = ticket.epoch, "starting trace");
		match self.begin_recording(&ticket.target).await {
			Ok(()) => {
				let promoted = {
					let mut session = self.session.lock();
					let current = session.epoch == ticket.epoch && session.state == SessionState::Starting;
					if current {
						session.state = SessionState::Recording;
					}
					current
				};
				if promoted {
					info!(target = "pw_trace.session", target_id = %ticket.target, "recording");
					self.presenter.show(Indicator::Recording, Some(&ticket.target));
					Outcome::Recording
				} else {
					self.detach_quietly(&ticket).await;
					Outcome::Aborted("session reset while starting".to_string())
				}
			}
			Err(e) => {
				warn!(target = "pw_trace.session", target_id = %ticket.target, error = %e, "failed to start trace");
				self.abort(&ticket, format!("start failed: {e}")).await
			}
		}
	}

	async fn begin_recording(&self, target: &TargetId) -> Result<()> {
		self.channel.attach(target).await?;
		let params = serde_json::to_value(TracingStart::streamed(self.settings.categories.iter().cloned()))?;
		self.channel.send_command(target, methods::TRACING_START, params).await?;
		Ok(())
	}

	/// Stops recording and collects the trace. Only legal from `Recording`.
	///
	/// Resolves once the payload has been handed off or the session aborted.
	pub async fn stop_and_collect(&self) -> Outcome {
		let ticket = {
			let mut session = self.session.lock();
			if session.state != SessionState::Recording {
				debug!(target = "pw_trace.session", state = ?session.state, "stop ignored: not recording");
				return Outcome::Ignored("not recording");
			}
			session.state = SessionState::Stopping;
			self.ticket(&session)
		};
		let Some(ticket) = ticket else {
			return Outcome::Ignored("no target resolved");
		};

		info!(target = "pw_trace.session", target_id = %ticket.target, "stopping trace");

		// listen before asking, the completion can race the reply
		let completion = OneShot::subscribe(self.channel.as_ref(), {
			let target = ticket.target.clone();
			move |event: &ChannelEvent| match event {
				ChannelEvent::Detached { target: t, reason } if *t == target => Some(Completion::Detached(reason.clone())),
				_ => event
					.params_of(&target, events::TRACING_COMPLETE)
					.map(|params| Completion::Complete(params.clone())),
			}
		});

		if let Err(e) = self.channel.send_command(&ticket.target, methods::TRACING_END, json!({})).await {
			warn!(target = "pw_trace.session", target_id = %ticket.target, error = %e, "Tracing.end failed");
			return self.abort(&ticket, format!("stop failed: {e}")).await;
		}

		let completion = tokio::select! {
			completion = completion.recv() => completion,
			_ = ticket.cancel.cancelled() => {
				debug!(target = "pw_trace.session", "session reset while waiting for trace completion");
				return Outcome::Aborted("session reset while stopping".to_string());
			}
			_ = tokio::time::sleep(self.settings.completion_timeout()) => {
				warn!(target = "pw_trace.session", target_id = %ticket.target, "no Tracing.tracingComplete before timeout");
				return self.abort(&ticket, "timed out waiting for trace completion".to_string()).await;
			}
		};

		match completion {
			Some(Completion::Complete(params)) => self.collect(&ticket, params).await,
			Some(Completion::Detached(reason)) => {
				self.reset(ticket.epoch, &reason);
				Outcome::Aborted(reason)
			}
			None => self.abort(&ticket, "debug channel closed".to_string()).await,
		}
	}

	async fn collect(&self, ticket: &Ticket, params: Value) -> Outcome {
		let complete: TracingComplete = match serde_json::from_value(params) {
			Ok(complete) => complete,
			Err(e) => {
				warn!(target = "pw_trace.session", error = %e, "malformed Tracing.tracingComplete");
				return self.abort(ticket, format!("malformed completion event: {e}")).await;
			}
		};
		if complete.data_loss_occurred {
			warn!(target = "pw_trace.session", target_id = %ticket.target, "browser reports trace data loss");
		}
		let Some(handle) = complete.stream else {
			warn!(target = "pw_trace.session", target_id = %ticket.target, "trace completed without a stream handle");
			return self.abort(ticket, "missing stream handle".to_string()).await;
		};

		let assembler = StreamAssembler::new(self.channel.as_ref()).with_read_size(self.settings.read_chunk_bytes);
		let assembled = tokio::select! {
			assembled = assembler.assemble(&ticket.target, &handle) => assembled,
			_ = ticket.cancel.cancelled() => Err(AssemblyError::Cancelled),
		};

		let payload = match assembled {
			Ok(payload) => payload,
			Err(AssemblyError::Cancelled) => return Outcome::Aborted(AssemblyError::Cancelled.to_string()),
			Err(e) => {
				warn!(target = "pw_trace.session", target_id = %ticket.target, error = %e, "trace assembly failed");
				return self.abort(ticket, e.to_string()).await;
			}
		};

		if !self.is_current(ticket, SessionState::Stopping) {
			return Outcome::Aborted("session reset while stopping".to_string());
		}

		self.detach_quietly(ticket).await;
		// claim the session before handing off; a reset during the detach wins
		if !self.reset(ticket.epoch, "trace collected") {
			debug!(target = "pw_trace.session", target_id = %ticket.target, "session reset while detaching, trace dropped");
			return Outcome::Aborted("session reset while stopping".to_string());
		}

		let bytes = payload.len();
		info!(target = "pw_trace.session", target_id = %ticket.target, bytes, "trace collected");
		if self.handoff.send(payload).is_err() {
			warn!(target = "pw_trace.session", "no delivery worker; trace dropped");
		}
		Outcome::Collected { bytes }
	}

	/// Stops without collecting. Safe in any state; leaves the session `Idle`.
	pub async fn stop_discard(&self) -> Outcome {
		let (ticket, state) = {
			let session = self.session.lock();
			if session.state == SessionState::Idle {
				debug!(target = "pw_trace.session", "discard ignored: no active session");
				return Outcome::Ignored("no active session");
			}
			(self.ticket(&session), session.state)
		};
		let Some(ticket) = ticket else {
			return Outcome::Ignored("no target resolved");
		};

		info!(target = "pw_trace.session", target_id = %ticket.target, ?state, "discarding trace");
		if state == SessionState::Recording {
			if let Err(e) = self.channel.send_command(&ticket.target, methods::TRACING_END, json!({})).await {
				warn!(target = "pw_trace.session", error = %e, "Tracing.end failed while discarding");
			}
		}

		self.reset(ticket.epoch, "discarded");
		self.detach_quietly(&ticket).await;
		Outcome::Discarded
	}

	/// Out-of-band termination of `target`. Idempotent; returns whether it reset anything.
	pub fn handle_detach(&self, target: &TargetId, reason: &str) -> bool {
		let epoch = {
			let session = self.session.lock();
			if session.state == SessionState::Idle || session.target.as_ref() != Some(target) {
				return false;
			}
			session.epoch
		};
		self.reset(epoch, reason)
	}

	fn ticket(&self, session: &Session) -> Option<Ticket> {
		session.target.clone().map(|target| Ticket {
			epoch: session.epoch,
			target,
			cancel: session.cancel.clone(),
		})
	}

	fn is_current(&self, ticket: &Ticket, state: SessionState) -> bool {
		let session = self.session.lock();
		session.epoch == ticket.epoch && session.state == state
	}

	async fn abort(&self, ticket: &Ticket, reason: String) -> Outcome {
		self.detach_quietly(ticket).await;
		self.reset(ticket.epoch, &reason);
		Outcome::Aborted(reason)
	}

	/// Detaches unless a newer session now owns the same target.
	async fn detach_quietly(&self, ticket: &Ticket) {
		let superseded = {
			let session = self.session.lock();
			session.epoch != ticket.epoch
				&& session.state != SessionState::Idle
				&& session.target.as_ref() == Some(&ticket.target)
		};
		if superseded {
			return;
		}
		if let Err(e) = self.channel.detach(&ticket.target).await {
			debug!(target = "pw_trace.session", target_id = %ticket.target, error = %e, "detach failed");
		}
	}

	/// Returns the session of `epoch` to `Idle`. Only the first reset of a session takes effect.
	fn reset(&self, epoch: u64, reason: &str) -> bool {
		let target = {
			let mut session = self.session.lock();
			if session.epoch != epoch || session.state == SessionState::Idle {
				return false;
			}
			session.cancel.cancel();
			session.state = SessionState::Idle;
			session.target.take()
		};
		info!(target = "pw_trace.session", target_id = ?target, reason, "session reset");
		self.presenter.show(Indicator::Idle, target.as_ref());
		true
	}
}
