use std::path::Path;

use super::{PatchError, PatchState, Patcher, ProcessRunner};
use crate::config::GameLayout;

/// Runs the loader's patcher executable directly.
#[derive(Debug, Clone)]
pub struct ProcessPatcher<R> {
	layout: GameLayout,
	runner: R,
}

impl<R: ProcessRunner> ProcessPatcher<R> {
	pub fn new(layout: GameLayout, runner: R) -> Self {
		Self { layout, runner }
	}
}

/// Logs a non-zero exit. The patcher's exit code is not trusted to mean failure, only a failure to start is.
pub(super) fn log_exit(action: &str, code: Option<i32>) {
	match code {
		Some(0) => log::info!("Patcher {} finished.", action),
		Some(code) => log::warn!("Patcher {} exited with {}, assuming it succeeded.", action, code),
		None => log::warn!("Patcher {} was terminated, assuming it succeeded.", action),
	}
}

#[async_trait::async_trait]
impl<R: ProcessRunner> Patcher for ProcessPatcher<R> {
	async fn patch(&self, install_dir: &Path) -> Result<PatchState, PatchError> {
		if super::detect_state(&self.layout, install_dir) == PatchState::Patched {
			return Err(PatchError::AlreadyPatched);
		}
		let patcher = self.layout.patcher_path(install_dir);
		if !patcher.exists() {
			return Err(PatchError::PatcherMissing(patcher));
		}

		log::info!("{:?} {}", PatchState::Patching, install_dir.display());
		let code = self.runner
			.run(&patcher, &["-n".to_string()], install_dir)
			.await
			.map_err(PatchError::Spawn)?;
		log_exit("install", code);

		Ok(PatchState::Patched)
	}

	async fn unpatch(&self, install_dir: &Path) -> Result<PatchState, PatchError> {
		let patcher = self.layout.patcher_path(install_dir);
		if patcher.exists() {
			log::info!("{:?} {}", PatchState::Unpatching, install_dir.display());
			let code = self.runner
				.run(&patcher, &["--revert".to_string(), "-n".to_string()], install_dir)
				.await
				.map_err(PatchError::Spawn)?;
			log_exit("revert", code);
		} else {
			log::warn!("Patcher missing from {}, nothing to revert.", install_dir.display());
		}

		Ok(PatchState::Unpatched)
	}
}
