//! Reaching a browser: endpoint discovery, optional launch, and the CDP channel on top.

mod browser_finder;
mod browser_launcher;
mod cdp_probe;

use std::process::Child;
use std::sync::Arc;

use pw_trace::CdpChannel;
use pw_trace_runtime::{Connection, WebSocketTransport};
use tokio::task::JoinHandle;
use tracing::{debug, info};

pub use cdp_probe::{CdpVersionInfo, fetch_cdp_endpoint, fetch_version};

use crate::error::{CliError, Result};

#[derive(Debug, Clone)]
pub struct ConnectOptions {
	pub port: u16,
	pub endpoint: Option<String>,
	pub launch: bool,
}

/// A browser this process can talk to.
pub struct Browser {
	pub ws_url: String,
	pub version: Option<CdpVersionInfo>,
	/// Set when this process started the browser; it is left running on exit.
	pub launched: Option<Child>,
}

/// Finds the browser named by `options`, launching one if allowed.
pub async fn resolve_browser(options: &ConnectOptions) -> Result<Browser> {
	if let Some(endpoint) = options.endpoint.as_deref() {
		if endpoint.starts_with("ws://") || endpoint.starts_with("wss://") {
			return Ok(Browser {
				ws_url: endpoint.to_string(),
				version: None,
				launched: None,
			});
		}
		let version = fetch_version(endpoint).await?;
		return Ok(browser_from(version, None));
	}

	match fetch_cdp_endpoint(options.port).await {
		Ok(version) => Ok(browser_from(version, None)),
		Err(e) if options.launch => {
			debug!(target = "pw_trace", error = %e, "no browser listening, launching one");
			let (version, child) = browser_launcher::launch_browser(options.port).await?;
			Ok(browser_from(version, Some(child)))
		}
		Err(e) => Err(CliError::Connect(format!(
			"No browser with remote debugging found on port {}.\n\
			 Last error: {}\n\
			 Start one with --remote-debugging-port={} or pass --launch.",
			options.port, e, options.port
		))),
	}
}

fn browser_from(version: CdpVersionInfo, launched: Option<Child>) -> Browser {
	version.check_protocol_version();
	Browser {
		ws_url: version.web_socket_debugger_url.clone(),
		version: Some(version),
		launched,
	}
}

/// Opens the browser-level WebSocket and the CDP channel on top of it.
///
/// The returned task ends when the connection closes.
pub async fn open_channel(ws_url: &str) -> Result<(Arc<CdpChannel>, JoinHandle<()>)> {
	let (transport, message_rx) = WebSocketTransport::connect(ws_url).await?;
	let connection = Arc::new(Connection::new(transport.into_transport_parts(message_rx)));
	let runner = tokio::spawn({
		let connection = connection.clone();
		async move { connection.run().await }
	});
	let channel = CdpChannel::spawn(connection);
	info!(target = "pw_trace", endpoint = ws_url, "connected");
	Ok((channel, runner))
}
