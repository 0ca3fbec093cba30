mod record;
mod targets;

use std::path::PathBuf;

use pw_trace::TraceSettings;
use tracing::debug;

use crate::cli::{Cli, Commands};
use crate::connect::ConnectOptions;
use crate::error::{CliError, Result};

pub async fn dispatch(cli: Cli) -> Result<()> {
	let settings = load_settings(&cli)?;
	let options = ConnectOptions {
		port: cli.port,
		endpoint: cli.endpoint.clone(),
		launch: cli.launch,
	};

	match cli.command {
		Commands::Targets => targets::execute(&options).await,
		Commands::Record { target, duration, output } => {
			record::execute(
				&options,
				settings,
				record::RecordOptions {
					target,
					duration,
					output,
				},
			)
			.await
		}
	}
}

fn default_config_path() -> Option<PathBuf> {
	dirs::config_dir().map(|dir| dir.join("pw-trace").join("config.json"))
}

/// File settings with command line overrides applied on top.
fn load_settings(cli: &Cli) -> Result<TraceSettings> {
	let mut settings = match cli.config.clone().or_else(default_config_path) {
		Some(path) => {
			debug!(target = "pw_trace", path = %path.display(), "loading settings");
			TraceSettings::load(&path)?
		}
		None => TraceSettings::default(),
	};

	if let Some(origin) = &cli.origin {
		settings.host.origin = origin.clone();
	}
	if let Some(kib) = cli.max_piece_kb {
		settings.transfer.max_piece_bytes = kib
			.checked_mul(1024)
			.ok_or_else(|| CliError::Record(format!("--max-piece-kb {} is too large", kib)))?;
	}
	settings.validate()?;
	settings.host.page_url()?;
	Ok(settings)
}
