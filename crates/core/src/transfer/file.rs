//! Delivery into a file on disk.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use pw_trace_protocol::Piece;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use super::{ReceiverContext, ReceiverLauncher};
use crate::error::{Result, TransferError};

pub struct FileLauncher {
	path: PathBuf,
}

impl FileLauncher {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}
}

#[async_trait]
impl ReceiverLauncher for FileLauncher {
	async fn launch(&self) -> Result<Box<dyn ReceiverContext>> {
		Ok(Box::new(FileReceiver::new(&self.path)))
	}
}

/// Writes pieces to `<path>.part` and renames it over `path` once complete.
pub struct FileReceiver {
	path: PathBuf,
	partial: PathBuf,
	file: Option<fs::File>,
	received: usize,
	total: usize,
}

impl FileReceiver {
	pub fn new(path: &Path) -> Self {
		let mut name = path.file_name().unwrap_or_default().to_os_string();
		name.push(".part");
		Self {
			path: path.to_path_buf(),
			partial: path.with_file_name(name),
			file: None,
			received: 0,
			total: 0,
		}
	}
}

#[async_trait]
impl ReceiverContext for FileReceiver {
	async fn wait_ready(&mut self) -> Result<()> {
		if let Some(parent) = self.partial.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent).await?;
		}
		self.file = Some(fs::File::create(&self.partial).await?);
		Ok(())
	}

	async fn push_piece(&mut self, piece: Piece<'_>) -> Result<()> {
		if piece.index != self.received {
			return Err(TransferError::OutOfOrder {
				expected: self.received,
				got: piece.index,
			}
			.into());
		}
		let Some(file) = self.file.as_mut() else {
			return Err(TransferError::NotReady(format!("{} is not open", self.partial.display())).into());
		};
		file.write_all(piece.data.as_bytes()).await?;
		self.received += 1;
		self.total = piece.total;
		Ok(())
	}

	async fn finish(&mut self) -> Result<()> {
		if self.received != self.total || self.total == 0 {
			return Err(TransferError::Incomplete {
				received: self.received,
				total: self.total,
			}
			.into());
		}
		if let Some(mut file) = self.file.take() {
			file.flush().await?;
			file.sync_all().await?;
		}
		fs::rename(&self.partial, &self.path).await?;
		info!(target = "pw_trace.file", path = %self.path.display(), "trace written");
		Ok(())
	}

	async fn abort(&mut self) {
		self.file = None;
		if let Err(e) = fs::remove_file(&self.partial).await {
			debug!(target = "pw_trace.file", path = %self.partial.display(), error = %e, "could not remove partial file");
		}
	}
}
