
use std::sync::Arc;

use pw_trace::{Intent, LogPresenter, Orchestrator, SessionController, SessionState, TargetId, TraceSettings};
use pw_trace_protocol::TargetInfo;
use scripted_channel::ScriptedChannel;
use serde_json::json;
use tokio::sync::mpsc;

fn page(url: &str) -> TargetInfo {
	TargetInfo {
		target_id: "tab-1".into(),
		kind: "page".into(),
		title: "page".into(),
		url: url.into(),
		attached: false,
	}
}

async fn settle(controller: &SessionController, state: SessionState) {
	for _ in 0..200 {
		if controller.state() == state {
			return;
		}
		tokio::task::yield_now().await;
	}
	panic!("session never reached {state:?}");
}

fn spawn_orchestrator(
	channel: &Arc<ScriptedChannel>,
) -> (
	SessionController,
	mpsc::Sender<Intent>,
	mpsc::UnboundedReceiver<pw_trace::Payload>,
	tokio::task::JoinHandle<()>,
) {
	let (handoff, payloads) = mpsc::unbounded_channel();
	let controller = SessionController::new(
		channel.clone(),
		Arc::new(LogPresenter),
		TraceSettings::default(),
		handoff,
	);
	let (intents, rx) = mpsc::channel(8);
	let task = tokio::spawn(Orchestrator::new(controller.clone()).run(rx));
	(controller, intents, payloads, task)
}

#[tokio::test]
async fn toggle_records_then_collects() {
	let channel = ScriptedChannel::new();
	channel.complete_with(json!({"stream": "h1"}));
	channel.read("{}", false, true);
	let (controller, intents, mut payloads, task) = spawn_orchestrator(&channel);

	intents
		.send(Intent::Toggle {
			target: Some(page("https://example.com/")),
		})
		.await
		.unwrap();
	settle(&controller, SessionState::Recording).await;

	intents.send(Intent::Toggle { target: None }).await.unwrap();
	drop(intents);
	task.await.unwrap();

	assert_eq!(payloads.recv().await.unwrap().as_str(), "{}");
	assert_eq!(controller.state(), SessionState::Idle);
}

#[tokio::test]
async fn privileged_pages_are_refused() {
	let channel = ScriptedChannel::new();
	let (controller, intents, _payloads, task) = spawn_orchestrator(&channel);

	for url in ["chrome://settings/", "chrome-extension://abc/popup.html"] {
		intents.send(Intent::Toggle { target: Some(page(url)) }).await.unwrap();
	}
	drop(intents);
	task.await.unwrap();

	assert!(channel.calls().is_empty());
	assert_eq!(controller.state(), SessionState::Idle);
}

#[tokio::test]
async fn out_of_band_detach_resets_the_session() {
	let channel = ScriptedChannel::new();
	let (controller, intents, _payloads, task) = spawn_orchestrator(&channel);

	intents
		.send(Intent::Toggle {
			target: Some(page("https://example.com/")),
		})
		.await
		.unwrap();
	settle(&controller, SessionState::Recording).await;

	channel.detach_out_of_band(&TargetId::from("tab-1"));
	channel.detach_out_of_band(&TargetId::from("tab-1"));
	settle(&controller, SessionState::Idle).await;

	drop(intents);
	task.await.unwrap();
	assert_eq!(channel.count("Tracing.end"), 0);
}

#[tokio::test]
async fn discard_intent_drops_the_recording() {
	let channel = ScriptedChannel::new();
	let (controller, intents, mut payloads, task) = spawn_orchestrator(&channel);

	intents
		.send(Intent::Toggle {
			target: Some(page("https://example.com/")),
		})
		.await
		.unwrap();
	settle(&controller, SessionState::Recording).await;
	intents.send(Intent::Discard).await.unwrap();
	drop(intents);
	task.await.unwrap();

	assert_eq!(controller.state(), SessionState::Idle);
	assert!(payloads.try_recv().is_err());
	assert_eq!(channel.count("detach"), 1);
}
