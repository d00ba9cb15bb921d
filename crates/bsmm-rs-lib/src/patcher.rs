//! Patching the game executable so it loads plugins.
//!
//! The loader ships an external patcher. How it is run depends on the platform the game is
//! installed on, so each strategy implements [`Patcher`]:
//! - [`ProcessPatcher`] runs the patcher natively.
//! - [`CompatPatcher`] runs it for a game under a compatibility layer and fixes the layer's
//!   dll overrides afterwards.
//! - [`UnsupportedPatcher`] refuses everything.

use std::path::Path;
use std::sync::Arc;

use crate::config::GameLayout;

mod runner;
pub use runner::ProcessRunner;
pub use runner::TokioRunner;

mod process;
pub use process::ProcessPatcher;

mod compat;
pub use compat::CompatPatcher;
pub use compat::ensure_registry_overrides;
pub use compat::REGISTRY_OVERRIDE_LINES;

/// Where the game executable is in the patch lifecycle.
///
/// `Patching` and `Unpatching` only exist while the patcher process runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchState {
	Unpatched,
	Patching,
	Patched,
	Unpatching,
}

#[derive(Debug, thiserror::Error)]
pub enum PatchError {
	#[error("patching is not supported on this platform.")]
	UnsupportedPlatform,
	#[error("the game is already patched.")]
	AlreadyPatched,
	#[error("patcher not found at {0}")]
	PatcherMissing(std::path::PathBuf),
	#[error("failed to start the patcher: {0}")]
	Spawn(std::io::Error),
	#[error("compatibility registry not found at {0}")]
	RegistryMissing(std::path::PathBuf),
	#[error("IO error: {0}")]
	IO(#[from] std::io::Error),
}

#[async_trait::async_trait]
pub trait Patcher: Send + Sync {
	/// Moves the game from [`PatchState::Unpatched`] to [`PatchState::Patched`].
	async fn patch(&self, install_dir: &Path) -> Result<PatchState, PatchError>;
	/// Moves the game from [`PatchState::Patched`] to [`PatchState::Unpatched`].
	async fn unpatch(&self, install_dir: &Path) -> Result<PatchState, PatchError>;
}

/// Reads the patch state from the marker file the patcher leaves behind.
pub fn detect_state(layout: &GameLayout, install_dir: &Path) -> PatchState {
	if layout.marker_path(install_dir).exists() {
		PatchState::Patched
	} else {
		PatchState::Unpatched
	}
}

/// Patcher for platforms without a patch strategy.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedPatcher;

#[async_trait::async_trait]
impl Patcher for UnsupportedPatcher {
	async fn patch(&self, _install_dir: &Path) -> Result<PatchState, PatchError> {
		Err(PatchError::UnsupportedPlatform)
	}

	async fn unpatch(&self, _install_dir: &Path) -> Result<PatchState, PatchError> {
		Err(PatchError::UnsupportedPlatform)
	}
}

/// Picks the strategy for the OS we're running on.
pub fn for_current_platform(layout: &GameLayout) -> Arc<dyn Patcher> {
	if cfg!(target_os = "windows") {
		Arc::new(ProcessPatcher::new(layout.clone(), TokioRunner))
	} else if cfg!(target_os = "linux") {
		Arc::new(CompatPatcher::new(layout.clone(), TokioRunner))
	} else {
		log::warn!("No patch strategy for {}.", std::env::consts::OS);
		Arc::new(UnsupportedPatcher)
	}
}

/// Prefix substitutions from the loader archive layout to where the files end up once unpacked.
const LOADER_PATH_REMAP: [(&str, &str); 2] = [
	("IPA/", ""),
	("Data/", "Beat Saber_Data/"),
];

/// Maps a file declared by the loader to the path it occupies relative to the install root.
///
/// Substitutions apply in order, each to the result of the previous one.
pub fn loader_file_path(declared: &str) -> String {
	let mut path = declared.replace('\\', "/");
	for (from, to) in LOADER_PATH_REMAP {
		if let Some(rest) = path.strip_prefix(from) {
			path = format!("{to}{rest}");
		}
	}
	path
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn loader_paths_are_remapped() {
		assert_eq!(loader_file_path("IPA/IPA.exe"), "IPA.exe");
		assert_eq!(loader_file_path("IPA/Data/Managed/IPA.Loader.dll"), "Beat Saber_Data/Managed/IPA.Loader.dll");
		assert_eq!(loader_file_path("IPA\\Libs\\Mono.Cecil.dll"), "Libs/Mono.Cecil.dll");
		assert_eq!(loader_file_path("winhttp.dll"), "winhttp.dll");
	}

	#[test]
	fn state_follows_the_marker() {
		let layout = GameLayout::default();
		let dir = tempfile::tempdir().unwrap();
		assert_eq!(detect_state(&layout, dir.path()), PatchState::Unpatched);
		std::fs::write(layout.marker_path(dir.path()), b"").unwrap();
		assert_eq!(detect_state(&layout, dir.path()), PatchState::Patched);
	}

	#[tokio::test]
	async fn unsupported_platform_refuses() {
		assert!(matches!(UnsupportedPatcher.patch(Path::new(".")).await, Err(PatchError::UnsupportedPlatform)));
		assert!(matches!(UnsupportedPatcher.unpatch(Path::new(".")).await, Err(PatchError::UnsupportedPlatform)));
	}
}
