//! Turns user intents into session operations.
//!
//! Intents are dispatched as tasks so that out-of-band detach events keep
//! being observed while a start or stop is suspended on the browser.

use pw_trace_protocol::TargetInfo;
use tokio::sync::{broadcast, mpsc};
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, info, warn};

use crate::channel::ChannelEvent;
use crate::session::{Outcome, SessionController, SessionState};
use crate::target::TargetId;

#[derive(Debug, Clone)]
pub enum Intent {
	/// Start recording `target` when idle, stop and collect when recording.
	Toggle { target: Option<TargetInfo> },
	/// Stop without collecting.
	Discard,
}

enum Step {
	Intent(Option<Intent>),
	Event(Result<ChannelEvent, broadcast::error::RecvError>),
	Finished(Result<Outcome, JoinError>),
}

pub struct Orchestrator {
	controller: SessionController,
	events: broadcast::Receiver<ChannelEvent>,
}

impl Orchestrator {
	pub fn new(controller: SessionController) -> Self {
		let events = controller.channel().subscribe();
		Self { controller, events }
	}

	/// Runs until `intents` closes, then waits for dispatched operations to settle.
	pub async fn run(mut self, mut intents: mpsc::Receiver<Intent>) {
		let mut tasks = JoinSet::new();
		let mut events_open = true;

		loop {
			let step = tokio::select! {
				intent = intents.recv() => Step::Intent(intent),
				event = self.events.recv(), if events_open => Step::Event(event),
				Some(finished) = tasks.join_next() => Step::Finished(finished),
			};
			match step {
				Step::Intent(Some(intent)) => self.dispatch(intent, &mut tasks),
				Step::Intent(None) => break,
				Step::Event(Ok(ChannelEvent::Detached { target, reason })) => {
					if self.controller.handle_detach(&target, &reason) {
						info!(target = "pw_trace.orchestrator", target_id = %target, %reason, "session ended out of band");
					}
				}
				Step::Event(Ok(ChannelEvent::Protocol { .. })) => {}
				Step::Event(Err(broadcast::error::RecvError::Lagged(skipped))) => {
					warn!(target = "pw_trace.orchestrator", skipped, "event listener lagged");
				}
				Step::Event(Err(broadcast::error::RecvError::Closed)) => {
					events_open = false;
					if let Some(target) = self.controller.snapshot().target {
						self.controller.handle_detach(&target, "debug channel closed");
					}
				}
				Step::Finished(finished) => report(finished),
			}
		}

		while let Some(finished) = tasks.join_next().await {
			report(finished);
		}
	}

	fn dispatch(&self, intent: Intent, tasks: &mut JoinSet<Outcome>) {
		let controller = self.controller.clone();
		match intent {
			Intent::Toggle { target } => match controller.state() {
				SessionState::Idle => {
					let Some(target) = target else {
						debug!(target = "pw_trace.orchestrator", "toggle ignored: no target");
						return;
					};
					if target.is_privileged() {
						warn!(target = "pw_trace.orchestrator", url = %target.url, "tracing a privileged page is not allowed");
						return;
					}
					let target = TargetId::from(target.target_id);
					tasks.spawn(async move { controller.start(Some(target)).await });
				}
				SessionState::Recording => {
					tasks.spawn(async move { controller.stop_and_collect().await });
				}
				state => debug!(target = "pw_trace.orchestrator", ?state, "toggle ignored while a transition is in flight"),
			},
			Intent::Discard => {
				tasks.spawn(async move { controller.stop_discard().await });
			}
		}
	}
}

fn report(finished: Result<Outcome, JoinError>) {
	match finished {
		Ok(Outcome::Aborted(reason)) => warn!(target = "pw_trace.orchestrator", %reason, "session aborted"),
		Ok(outcome) => debug!(target = "pw_trace.orchestrator", ?outcome, "intent settled"),
		Err(e) => warn!(target = "pw_trace.orchestrator", error = %e, "intent task failed"),
	}
}
