use std::path::Path;

/// Runs an external program to completion.
#[async_trait::async_trait]
pub trait ProcessRunner: Send + Sync {
	/// Returns the exit code, `None` when the process was terminated by a signal.
	///
	/// # Errors
	/// Only when the process can't be started.
	async fn run(&self, program: &Path, args: &[String], working_dir: &Path) -> std::io::Result<Option<i32>>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TokioRunner;

#[async_trait::async_trait]
impl ProcessRunner for TokioRunner {
	async fn run(&self, program: &Path, args: &[String], working_dir: &Path) -> std::io::Result<Option<i32>> {
		log::debug!("Running {} {:?} in {}", program.display(), args, working_dir.display());
		let status = tokio::process::Command::new(program)
			.args(args)
			.current_dir(working_dir)
			.kill_on_drop(true)
			.status()
			.await?;
		Ok(status.code())
	}
}
