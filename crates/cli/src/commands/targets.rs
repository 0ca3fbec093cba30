use tracing::info;

use crate::connect::{ConnectOptions, open_channel, resolve_browser};
use crate::error::Result;

pub async fn execute(options: &ConnectOptions) -> Result<()> {
	let browser = resolve_browser(options).await?;
	let (channel, _runner) = open_channel(&browser.ws_url).await?;

	let targets = channel.targets().await?;
	let pages: Vec<_> = targets.iter().filter(|t| t.is_page()).collect();
	info!(target = "pw_trace", total = targets.len(), pages = pages.len(), "targets");

	for page in pages {
		let marker = if page.is_privileged() { " (not traceable)" } else { "" };
		println!("{}\t{}\t{}{}", page.target_id, page.title, page.url, marker);
	}
	Ok(())
}
