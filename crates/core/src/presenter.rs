//! Presentation seam: how the current session state is shown to the user.

use tracing::info;

use crate::target::TargetId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Indicator {
	Idle,
	Recording,
}

/// Receives indicator changes. Nothing in the session depends on its success.
pub trait Presenter: Send + Sync {
	fn show(&self, indicator: Indicator, target: Option<&TargetId>);
}

/// Reports indicator changes through the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogPresenter;

impl Presenter for LogPresenter {
	fn show(&self, indicator: Indicator, target: Option<&TargetId>) {
		match (indicator, target) {
			(Indicator::Recording, Some(target)) => info!(target = "pw_trace.presenter", target_id = %target, "recording"),
			(Indicator::Recording, None) => info!(target = "pw_trace.presenter", "recording"),
			(Indicator::Idle, _) => info!(target = "pw_trace.presenter", "idle"),
		}
	}
}
