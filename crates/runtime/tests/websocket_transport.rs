//! WebSocketTransport against a local CDP-shaped echo server.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use pw_trace_runtime::{Connection, WebSocketTransport};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;

#[tokio::test]
async fn connection_round_trip_over_websocket() {
	let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
	let addr = listener.local_addr().unwrap();

	let server = tokio::spawn(async move {
		let (stream, _) = listener.accept().await.unwrap();
		let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
		let (mut ws_tx, mut ws_rx) = ws.split();

		let incoming = ws_rx.next().await.unwrap().unwrap();
		let request: Value = serde_json::from_str(incoming.to_text().unwrap()).unwrap();
		assert_eq!(request["method"], "Target.getTargets");

		let event = json!({"method": "Target.targetCreated", "params": {"targetInfo": {"targetId": "T9"}}});
		ws_tx.send(Message::Text(event.to_string().into())).await.unwrap();

		let reply = json!({"id": request["id"], "result": {"targetInfos": []}});
		ws_tx.send(Message::Text(reply.to_string().into())).await.unwrap();
		ws_tx.send(Message::Close(None)).await.unwrap();
	});

	let url = format!("ws://{}", addr);
	let (transport, message_rx) = WebSocketTransport::connect(&url).await.unwrap();
	let connection = Arc::new(Connection::new(transport.into_transport_parts(message_rx)));
	let mut events = connection.subscribe();

	let runner = tokio::spawn({
		let conn = Arc::clone(&connection);
		async move { conn.run().await }
	});

	let result = connection.send(None, "Target.getTargets", json!({})).await.unwrap();
	assert!(result["targetInfos"].as_array().unwrap().is_empty());

	let event = events.recv().await.unwrap();
	assert_eq!(event.method, "Target.targetCreated");

	server.await.unwrap();
	runner.await.unwrap();
	assert!(connection.send(None, "Target.getTargets", json!({})).await.unwrap_err().is_closed());
}
