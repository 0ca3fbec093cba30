use thiserror::Error;

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
	#[error(transparent)]
	Trace(#[from] pw_trace::Error),

	#[error(transparent)]
	Runtime(#[from] pw_trace_runtime::Error),

	#[error("{0}")]
	Connect(String),

	#[error("{0}")]
	Record(String),

	#[error(transparent)]
	Http(#[from] reqwest::Error),

	#[error(transparent)]
	Io(#[from] std::io::Error),

	#[error(transparent)]
	Json(#[from] serde_json::Error),

	#[error(transparent)]
	Anyhow(#[from] anyhow::Error),
}

#[cfg(test)]
mod tests {
	use anyhow::Context;

	use super::*;

	async fn join_with_context(task: tokio::task::JoinHandle<usize>) -> Result<usize> {
		Ok(task.await.context("delivery task failed")?)
	}

	#[tokio::test]
	async fn failed_task_surfaces_with_context() {
		let task = tokio::spawn(async { panic!("worker blew up") });
		let err = join_with_context(task).await.unwrap_err();
		assert!(matches!(err, CliError::Anyhow(_)));
		assert_eq!(err.to_string(), "delivery task failed");
	}

	#[tokio::test]
	async fn finished_task_passes_its_value_through() {
		let task = tokio::spawn(async { 2 });
		assert_eq!(join_with_context(task).await.unwrap(), 2);
	}
}
