use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use pw_trace::transfer::{FileLauncher, PageLauncher};
use pw_trace::{
	CdpChannel, ChunkedTransfer, DeliveryWorker, Intent, LogPresenter, Orchestrator, Outcome, ReceiverLauncher,
	SessionController, SessionState, TargetId, TraceSettings,
};
use pw_trace_protocol::TargetInfo;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::connect::{ConnectOptions, open_channel, resolve_browser};
use crate::error::{CliError, Result};

const IDLE_POLL: Duration = Duration::from_millis(250);

pub struct RecordOptions {
	pub target: Option<String>,
	pub duration: Option<u64>,
	pub output: Option<PathBuf>,
}

pub async fn execute(options: &ConnectOptions, settings: TraceSettings, record: RecordOptions) -> Result<()> {
	let browser = resolve_browser(options).await?;
	let (channel, _runner) = open_channel(&browser.ws_url).await?;
	let target = pick_target(&channel, record.target.as_deref()).await?;
	info!(target = "pw_trace", target_id = %target.target_id, url = %target.url, "tracing");

	let launcher: Box<dyn ReceiverLauncher> = match &record.output {
		Some(path) => Box::new(FileLauncher::new(path)),
		None => Box::new(PageLauncher::new(channel.clone(), settings.clone())),
	};
	let worker = DeliveryWorker::new(launcher, ChunkedTransfer::new(&settings.transfer));

	let (handoff, payloads) = mpsc::unbounded_channel();
	let controller = SessionController::new(channel.clone(), Arc::new(LogPresenter), settings, handoff);
	let delivery = tokio::spawn(worker.run(payloads));

	let (intents, intent_rx) = mpsc::channel(4);
	let orchestrator = tokio::spawn(Orchestrator::new(controller.clone()).run(intent_rx));

	match controller.start(Some(TargetId::from(target.target_id.as_str()))).await {
		Outcome::Recording => {}
		outcome => return Err(CliError::Record(format!("could not start tracing: {:?}", outcome))),
	}

	if wait_for_stop(&controller, record.duration).await {
		let _ = intents.send(Intent::Toggle { target: None }).await;
	}
	drop(intents);
	drop(controller);
	if let Err(e) = orchestrator.await {
		warn!(target = "pw_trace", error = %e, "orchestrator task failed");
	}

	let delivered = delivery.await.context("delivery task failed")?;
	if delivered == 0 {
		return Err(CliError::Record("no trace was delivered".into()));
	}
	if let Some(path) = &record.output {
		println!("{}", path.display());
	}
	Ok(())
}

/// Resolves `--target`, or the first page that may be traced.
async fn pick_target(channel: &CdpChannel, wanted: Option<&str>) -> Result<TargetInfo> {
	let targets = channel.targets().await?;
	let found = match wanted {
		Some(id) => targets.into_iter().find(|t| t.target_id == id),
		None => targets.into_iter().find(|t| t.is_page() && !t.is_privileged()),
	};
	let target = found.ok_or_else(|| match wanted {
		Some(id) => CliError::Record(format!("no target with id {}", id)),
		None => CliError::Record("no traceable page target; open a page or pass --target".into()),
	})?;
	if target.is_privileged() {
		return Err(CliError::Record(format!("tracing a privileged page is not allowed: {}", target.url)));
	}
	Ok(target)
}

/// Waits for the duration or Ctrl-C. Returns `false` if the session ended by itself.
async fn wait_for_stop(controller: &SessionController, duration: Option<u64>) -> bool {
	let deadline = async {
		match duration {
			Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
			None => {
				eprintln!("Recording. Press Ctrl-C to stop and collect the trace.");
				if let Err(e) = tokio::signal::ctrl_c().await {
					warn!(target = "pw_trace", error = %e, "cannot listen for Ctrl-C");
					std::future::pending::<()>().await;
				}
			}
		}
	};
	let ended = async {
		let mut poll = tokio::time::interval(IDLE_POLL);
		loop {
			poll.tick().await;
			if controller.state() == SessionState::Idle {
				break;
			}
		}
	};

	tokio::select! {
		_ = deadline => true,
		_ = ended => {
			warn!(target = "pw_trace", "session ended before it was stopped");
			false
		}
	}
}
