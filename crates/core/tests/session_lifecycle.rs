
use std::sync::Arc;

use pw_trace::{ChannelEvent, Indicator, Outcome, Payload, SessionController, SessionState, TargetId, TraceSettings};
use scripted_channel::{RecordingPresenter, ScriptedChannel};
use serde_json::json;
use tokio::sync::mpsc;

struct Harness {
	channel: Arc<ScriptedChannel>,
	presenter: Arc<RecordingPresenter>,
	controller: SessionController,
	payloads: mpsc::UnboundedReceiver<Payload>,
}

fn harness_with(settings: TraceSettings) -> Harness {
	let channel = ScriptedChannel::new();
	let presenter = Arc::new(RecordingPresenter::default());
	let (handoff, payloads) = mpsc::unbounded_channel();
	let controller = SessionController::new(channel.clone(), presenter.clone(), settings, handoff);
	Harness {
		channel,
		presenter,
		controller,
		payloads,
	}
}

fn harness() -> Harness {
	harness_with(TraceSettings::default())
}

fn tab() -> TargetId {
	TargetId::from("tab-1")
}

async fn wait_for(controller: &SessionController, state: SessionState) {
	for _ in 0..100 {
		if controller.state() == state {
			return;
		}
		tokio::task::yield_now().await;
	}
	panic!("session never reached {state:?}, stuck in {:?}", controller.state());
}

#[tokio::test]
async fn collects_stream_into_one_payload() {
	let mut h = harness();
	h.channel.complete_with(json!({"stream": "h1", "dataLossOccurred": false}));
	h.channel.read("{\"traceEvents\":", false, false);
	h.channel.read("WzEsMl19", true, true);

	assert_eq!(h.controller.start(Some(tab())).await, Outcome::Recording);
	assert_eq!(h.controller.state(), SessionState::Recording);

	let outcome = h.controller.stop_and_collect().await;
	assert_eq!(outcome, Outcome::Collected { bytes: 21 });

	let payload = h.payloads.try_recv().expect("payload handed off");
	assert_eq!(payload.as_str(), "{\"traceEvents\":[1,2]}");
	assert_eq!(
		h.channel.calls(),
		["attach", "Tracing.start", "Tracing.end", "IO.read", "IO.read", "IO.close", "detach"]
	);

	let snapshot = h.controller.snapshot();
	assert_eq!(snapshot.state, SessionState::Idle);
	assert_eq!(snapshot.target, None);
	assert_eq!(h.presenter.shown(), [Indicator::Recording, Indicator::Idle]);
}

#[tokio::test]
async fn duplicate_completion_is_processed_once() {
	let mut h = harness();
	h.channel.complete_with(json!({"stream": "h1"}));
	h.channel.complete_with(json!({"stream": "h1"}));
	h.channel.read("{}", false, true);

	h.controller.start(Some(tab())).await;
	assert_eq!(h.controller.stop_and_collect().await, Outcome::Collected { bytes: 2 });
	tokio::task::yield_now().await;

	assert_eq!(h.channel.count("IO.read"), 1);
	assert!(h.payloads.try_recv().is_ok());
	assert!(h.payloads.try_recv().is_err());
	assert_eq!(h.controller.state(), SessionState::Idle);
}

#[tokio::test]
async fn start_while_starting_is_a_no_op() {
	let h = harness();
	let gate = h.channel.gate_attach();

	let first = tokio::spawn({
		let controller = h.controller.clone();
		async move { controller.start(Some(tab())).await }
	});
	wait_for(&h.controller, SessionState::Starting).await;

	assert_eq!(
		h.controller.start(Some(tab())).await,
		Outcome::Ignored("a session is already active")
	);
	assert_eq!(h.controller.state(), SessionState::Starting);

	gate.notify_one();
	assert_eq!(first.await.unwrap(), Outcome::Recording);
	assert_eq!(h.channel.count("attach"), 1);
}

#[tokio::test]
async fn start_without_target_is_ignored() {
	let h = harness();
	assert_eq!(h.controller.start(None).await, Outcome::Ignored("no target resolved"));
	assert!(h.channel.calls().is_empty());
	assert_eq!(h.controller.snapshot().epoch, 0);
}

#[tokio::test]
async fn stop_outside_recording_is_ignored() {
	let h = harness();
	assert_eq!(h.controller.stop_and_collect().await, Outcome::Ignored("not recording"));
	assert_eq!(h.controller.stop_discard().await, Outcome::Ignored("no active session"));
	assert!(h.channel.calls().is_empty());
}

#[tokio::test]
async fn repeated_detach_resets_once() {
	let h = harness();
	h.controller.start(Some(tab())).await;

	assert!(h.controller.handle_detach(&tab(), "target closed"));
	let once = h.controller.snapshot();
	assert!(!h.controller.handle_detach(&tab(), "target closed"));
	assert_eq!(h.controller.snapshot(), once);

	assert_eq!(once.state, SessionState::Idle);
	assert_eq!(h.presenter.shown(), [Indicator::Recording, Indicator::Idle]);
}

#[tokio::test]
async fn detach_of_another_target_is_ignored() {
	let h = harness();
	h.controller.start(Some(tab())).await;
	assert!(!h.controller.handle_detach(&TargetId::from("tab-2"), "target closed"));
	assert_eq!(h.controller.state(), SessionState::Recording);
}

#[tokio::test]
async fn missing_stream_handle_aborts_without_reading() {
	let mut h = harness();
	h.channel.complete_with(json!({"dataLossOccurred": false}));

	h.controller.start(Some(tab())).await;
	let outcome = h.controller.stop_and_collect().await;

	assert_eq!(outcome, Outcome::Aborted("missing stream handle".to_string()));
	assert_eq!(h.channel.count("IO.read"), 0);
	assert_eq!(h.channel.count("detach"), 1);
	assert!(h.payloads.try_recv().is_err());
	assert_eq!(h.controller.state(), SessionState::Idle);
}

#[tokio::test]
async fn failed_read_forwards_nothing() {
	let mut h = harness();
	h.channel.complete_with(json!({"stream": "h1"}));
	h.channel.read("{\"traceEvents\":", false, false);
	h.channel.read_error("stream gone");

	h.controller.start(Some(tab())).await;
	let outcome = h.controller.stop_and_collect().await;

	assert!(matches!(outcome, Outcome::Aborted(ref reason) if reason.contains("stream gone")));
	assert_eq!(h.channel.count("IO.close"), 1);
	assert!(h.payloads.try_recv().is_err());
	assert_eq!(h.controller.state(), SessionState::Idle);
}

#[tokio::test]
async fn immediately_final_stream_yields_empty_payload() {
	let mut h = harness();
	h.channel.complete_with(json!({"stream": "h1"}));
	h.channel.read("", false, true);

	h.controller.start(Some(tab())).await;
	assert_eq!(h.controller.stop_and_collect().await, Outcome::Collected { bytes: 0 });
	assert!(h.payloads.try_recv().unwrap().is_empty());
}

#[tokio::test]
async fn data_loss_still_collects() {
	let mut h = harness();
	h.channel.complete_with(json!({"stream": "h1", "dataLossOccurred": true}));
	h.channel.read("[]", false, true);

	h.controller.start(Some(tab())).await;
	assert_eq!(h.controller.stop_and_collect().await, Outcome::Collected { bytes: 2 });
	assert!(h.payloads.try_recv().is_ok());
}

#[tokio::test]
async fn discard_stops_and_detaches_without_reading() {
	let mut h = harness();
	h.channel.complete_with(json!({"stream": "h1"}));

	h.controller.start(Some(tab())).await;
	assert_eq!(h.controller.stop_discard().await, Outcome::Discarded);

	assert_eq!(h.channel.calls(), ["attach", "Tracing.start", "Tracing.end", "detach"]);
	assert!(h.payloads.try_recv().is_err());
	assert_eq!(h.controller.state(), SessionState::Idle);

	// a late completion for the discarded session finds nobody listening
	h.channel.emit(ChannelEvent::Protocol {
		target: tab(),
		method: "Tracing.tracingComplete".to_string(),
		params: json!({"stream": "h1"}),
	});
	for _ in 0..10 {
		tokio::task::yield_now().await;
	}
	assert_eq!(h.channel.count("IO.read"), 0);
	assert!(h.payloads.try_recv().is_err());
}

#[tokio::test]
async fn discard_while_starting_backs_out() {
	let h = harness();
	let gate = h.channel.gate_attach();

	let start = tokio::spawn({
		let controller = h.controller.clone();
		async move { controller.start(Some(tab())).await }
	});
	wait_for(&h.controller, SessionState::Starting).await;

	assert_eq!(h.controller.stop_discard().await, Outcome::Discarded);
	assert_eq!(h.controller.state(), SessionState::Idle);

	gate.notify_one();
	assert!(matches!(start.await.unwrap(), Outcome::Aborted(_)));
	assert_eq!(h.controller.state(), SessionState::Idle);
	assert_eq!(h.channel.count("Tracing.end"), 0);
}

#[tokio::test]
async fn failed_start_returns_to_idle() {
	let h = harness();
	h.channel.fail("Tracing.start", "Tracing is already started");

	let outcome = h.controller.start(Some(tab())).await;
	assert!(matches!(outcome, Outcome::Aborted(ref reason) if reason.contains("already started")));
	assert_eq!(h.channel.count("detach"), 1);
	assert_eq!(h.controller.state(), SessionState::Idle);
	assert_eq!(h.presenter.shown(), [Indicator::Idle]);
}

#[tokio::test]
async fn out_of_band_detach_while_stopping_abandons_collection() {
	let mut h = harness();
	h.controller.start(Some(tab())).await;

	let stop = tokio::spawn({
		let controller = h.controller.clone();
		async move { controller.stop_and_collect().await }
	});
	wait_for(&h.controller, SessionState::Stopping).await;
	tokio::task::yield_now().await;

	h.channel.detach_out_of_band(&tab());
	assert_eq!(stop.await.unwrap(), Outcome::Aborted("target closed".to_string()));
	assert_eq!(h.controller.state(), SessionState::Idle);
	assert_eq!(h.channel.count("IO.read"), 0);
	assert!(h.payloads.try_recv().is_err());
}

#[tokio::test]
async fn reset_while_stopping_cancels_the_wait() {
	let h = harness();
	h.controller.start(Some(tab())).await;

	let stop = tokio::spawn({
		let controller = h.controller.clone();
		async move { controller.stop_and_collect().await }
	});
	wait_for(&h.controller, SessionState::Stopping).await;

	assert!(h.controller.handle_detach(&tab(), "target closed"));
	assert!(matches!(stop.await.unwrap(), Outcome::Aborted(_)));
	assert_eq!(h.controller.state(), SessionState::Idle);
}

#[tokio::test(start_paused = true)]
async fn missing_completion_times_out() {
	let settings = TraceSettings {
		completion_timeout_ms: 1_000,
		..TraceSettings::default()
	};
	let h = harness_with(settings);
	h.controller.start(Some(tab())).await;

	let outcome = h.controller.stop_and_collect().await;
	assert_eq!(outcome, Outcome::Aborted("timed out waiting for trace completion".to_string()));
	assert_eq!(h.controller.state(), SessionState::Idle);
	assert_eq!(h.channel.count("detach"), 1);
}

#[tokio::test]
async fn new_session_after_collect_gets_new_epoch() {
	let h = harness();
	h.channel.complete_with(json!({"stream": "h1"}));
	h.channel.read("{}", false, true);
	h.channel.read("{}", false, true);

	h.controller.start(Some(tab())).await;
	h.controller.stop_and_collect().await;
	assert_eq!(h.controller.start(Some(tab())).await, Outcome::Recording);
	assert_eq!(h.controller.snapshot().epoch, 2);
}

#[tokio::test]
async fn discard_during_final_detach_drops_the_trace() {
	let mut h = harness();
	h.channel.complete_with(json!({"stream": "h1"}));
	h.channel.read("{}", false, true);
	h.controller.start(Some(tab())).await;

	let gate = h.channel.gate_next_detach();
	let collect = tokio::spawn({
		let controller = h.controller.clone();
		async move { controller.stop_and_collect().await }
	});
	for _ in 0..100 {
		if h.channel.count("detach") == 1 {
			break;
		}
		tokio::task::yield_now().await;
	}
	assert_eq!(h.channel.count("detach"), 1, "collect never reached its detach");

	assert_eq!(h.controller.stop_discard().await, Outcome::Discarded);
	gate.notify_one();

	assert!(matches!(collect.await.unwrap(), Outcome::Aborted(_)));
	assert!(h.payloads.try_recv().is_err());
	assert_eq!(h.controller.state(), SessionState::Idle);
}

#[tokio::test]
async fn detach_event_during_final_detach_drops_the_trace() {
	let mut h = harness();
	h.channel.complete_with(json!({"stream": "h1"}));
	h.channel.read("{}", false, true);
	h.controller.start(Some(tab())).await;

	let gate = h.channel.gate_next_detach();
	let collect = tokio::spawn({
		let controller = h.controller.clone();
		async move { controller.stop_and_collect().await }
	});
	for _ in 0..100 {
		if h.channel.count("detach") == 1 {
			break;
		}
		tokio::task::yield_now().await;
	}

	assert!(h.controller.handle_detach(&tab(), "target closed"));
	gate.notify_one();

	assert!(matches!(collect.await.unwrap(), Outcome::Aborted(_)));
	assert!(h.payloads.try_recv().is_err());
}
