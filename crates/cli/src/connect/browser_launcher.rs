//! Launching a browser with remote debugging enabled.

use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use pw_trace_runtime::process::port_available;
use tracing::info;

use super::browser_finder::find_browser;
use super::cdp_probe::{CdpVersionInfo, fetch_cdp_endpoint};
use crate::error::{CliError, Result};

const MAX_ATTEMPTS: u32 = 25;

fn profile_dir() -> PathBuf {
	dirs::cache_dir()
		.unwrap_or_else(std::env::temp_dir)
		.join("pw-trace")
		.join("browser-profile")
}

/// Starts a browser debugging on `port` and waits for its endpoint.
///
/// Refuses to start when something already holds the port.
pub(super) async fn launch_browser(port: u16) -> Result<(CdpVersionInfo, Child)> {
	if !port_available(port) {
		return Err(CliError::Connect(format!(
			"Port {} is already in use but does not answer as a debugging endpoint",
			port
		)));
	}
	let browser = find_browser().ok_or_else(|| {
		CliError::Connect("Could not find a Chrome/Chromium executable. Install one or pass --endpoint.".into())
	})?;
	let user_data_dir = profile_dir();

	let mut cmd = Command::new(&browser);
	cmd.arg(format!("--remote-debugging-port={}", port))
		.arg(format!("--user-data-dir={}", user_data_dir.display()))
		.args(["--no-first-run", "--no-default-browser-check"])
		.stdin(Stdio::null())
		.stdout(Stdio::null())
		.stderr(Stdio::null());

	#[cfg(unix)]
	std::os::unix::process::CommandExt::process_group(&mut cmd, 0);

	let mut child = cmd
		.spawn()
		.map_err(|e| CliError::Connect(format!("Failed to launch {}: {}", browser.display(), e)))?;
	info!(target = "pw_trace", browser = %browser.display(), port, "browser launched");

	let mut last_error = "endpoint not reachable".to_string();
	for _ in 0..MAX_ATTEMPTS {
		tokio::time::sleep(Duration::from_millis(200)).await;

		if let Ok(Some(status)) = child.try_wait() {
			return Err(CliError::Connect(format!(
				"Browser exited before its debugging endpoint came up (status: {})",
				status
			)));
		}
		match fetch_cdp_endpoint(port).await {
			Ok(info) => return Ok((info, child)),
			Err(e) => last_error = e.to_string(),
		}
	}

	Err(CliError::Connect(format!(
		"Browser launched but no debugging endpoint on port {}. Last error: {}",
		port, last_error
	)))
}
