use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use pw_trace::transfer::{ChannelHost, FileLauncher, Handshake, InProcessReceiver, VisualizationHost};
use pw_trace::{
	ChunkedTransfer, DeliveryWorker, Error, Payload, ReceiverContext, ReceiverLauncher, Result, TransferError,
	TransferSettings,
};
use pw_trace_protocol::{HostMessage, Piece};
use tokio::sync::mpsc;

fn settings() -> TransferSettings {
	TransferSettings {
		max_piece_bytes: 4,
		..TransferSettings::default()
	}
}

#[derive(Clone, Default)]
struct LoggingReceiver {
	log: Arc<Mutex<Vec<String>>>,
	fail_at: Option<usize>,
}

impl LoggingReceiver {
	fn log(&self) -> Vec<String> {
		self.log.lock().clone()
	}
}

#[async_trait]
impl ReceiverContext for LoggingReceiver {
	async fn wait_ready(&mut self) -> Result<()> {
		self.log.lock().push("ready".into());
		Ok(())
	}

	async fn push_piece(&mut self, piece: Piece<'_>) -> Result<()> {
		if self.fail_at == Some(piece.index) {
			return Err(TransferError::NotReady("page crashed".into()).into());
		}
		self.log.lock().push(format!("piece {}/{} {}", piece.index, piece.total, piece.data));
		Ok(())
	}

	async fn finish(&mut self) -> Result<()> {
		self.log.lock().push("finish".into());
		Ok(())
	}

	async fn abort(&mut self) {
		self.log.lock().push("abort".into());
	}
}

#[async_trait]
impl ReceiverLauncher for LoggingReceiver {
	async fn launch(&self) -> Result<Box<dyn ReceiverContext>> {
		Ok(Box::new(self.clone()))
	}
}

#[tokio::test(start_paused = true)]
async fn pieces_follow_readiness_in_order() {
	let mut receiver = LoggingReceiver::default();
	let report = ChunkedTransfer::new(&settings())
		.deliver(Payload::new("abcdefghij"), &mut receiver)
		.await
		.unwrap();

	assert_eq!(report.pieces, 3);
	assert_eq!(report.bytes, 10);
	assert_eq!(
		receiver.log(),
		["ready", "piece 0/3 abcd", "piece 1/3 efgh", "piece 2/3 ij", "finish"]
	);
}

#[tokio::test(start_paused = true)]
async fn failed_piece_aborts_the_delivery() {
	let launcher = LoggingReceiver {
		fail_at: Some(1),
		..LoggingReceiver::default()
	};
	let worker = DeliveryWorker::new(Box::new(launcher.clone()), ChunkedTransfer::new(&settings()));

	let err = worker.deliver(Payload::new("abcdefghij")).await.unwrap_err();
	assert!(matches!(
		err,
		Error::Transfer(TransferError::Piece { index: 1, total: 3, .. })
	));
	assert_eq!(launcher.log(), ["ready", "piece 0/3 abcd", "abort"]);
}

#[tokio::test(start_paused = true)]
async fn in_process_receiver_injects_after_ready() {
	let settings = settings();
	let (receiver_end, mut page) = ChannelHost::pair();
	let page_task = tokio::spawn(async move {
		let mut seen = Vec::new();
		while let Some(message) = page.next_message().await {
			seen.push(message.clone());
			match message {
				HostMessage::IsReady => page.post(HostMessage::Ready).await.unwrap(),
				HostMessage::InjectProfile { .. } => break,
				HostMessage::Ready => {}
			}
		}
		seen
	});

	let mut receiver = InProcessReceiver::new(receiver_end, Handshake::new(&settings));
	let payload = "{\"traceEvents\":[]}";
	ChunkedTransfer::new(&settings)
		.deliver(Payload::new(payload), &mut receiver)
		.await
		.unwrap();
	assert!(receiver.buffer().pieces().is_empty());

	let seen = page_task.await.unwrap();
	assert_eq!(
		seen,
		[
			HostMessage::IsReady,
			HostMessage::InjectProfile {
				profile: payload.to_string()
			}
		]
	);
}

#[tokio::test(start_paused = true)]
async fn worker_writes_each_payload_to_file() {
	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("traces").join("trace.json");
	let worker = DeliveryWorker::new(Box::new(FileLauncher::new(&path)), ChunkedTransfer::new(&settings()));

	let (handoff, payloads) = mpsc::unbounded_channel();
	handoff.send(Payload::new("{\"traceEvents\":[1]}")).unwrap();
	drop(handoff);

	assert_eq!(worker.run(payloads).await, 1);
	assert_eq!(std::fs::read_to_string(&path).unwrap(), "{\"traceEvents\":[1]}");
	assert!(!dir.path().join("traces").join("trace.json.part").exists());
}
