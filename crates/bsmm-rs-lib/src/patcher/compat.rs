use std::path::Path;

use tokio::io::AsyncWriteExt;

use super::{PatchError, PatchState, Patcher, ProcessRunner};
use crate::config::GameLayout;

/// Lines the compatibility layer's user registry needs so the game loads the patched `winhttp` proxy.
///
/// Matched literally. If the layer ever changes this format, both lines must be updated together.
pub const REGISTRY_OVERRIDE_LINES: [&str; 2] = [
	r"[Software\\Wine\\DllOverrides]",
	r#""winhttp"="native,builtin""#,
];

/// Appends whichever of [`REGISTRY_OVERRIDE_LINES`] the registry file lacks.
///
/// Returns whether the file was changed. Running it again on the same file is a no-op.
pub async fn ensure_registry_overrides(path: &Path) -> std::io::Result<bool> {
	let contents = tokio::fs::read_to_string(path).await?;
	let present = |line: &str| contents.lines().any(|l| l.trim_end_matches('\r') == line);
	let missing: Vec<&str> = REGISTRY_OVERRIDE_LINES.into_iter().filter(|l| !present(*l)).collect();
	if missing.is_empty() {
		return Ok(false);
	}

	let mut appended = String::new();
	if !contents.is_empty() && !contents.ends_with('\n') {
		appended.push('\n');
	}
	for line in missing {
		appended.push_str(line);
		appended.push('\n');
	}

	let mut file = tokio::fs::OpenOptions::new().append(true).open(path).await?;
	file.write_all(appended.as_bytes()).await?;
	file.flush().await?;
	Ok(true)
}

/// Runs the patcher for a game installed under a compatibility layer.
#[derive(Debug, Clone)]
pub struct CompatPatcher<R> {
	layout: GameLayout,
	runner: R,
}

impl<R: ProcessRunner> CompatPatcher<R> {
	pub fn new(layout: GameLayout, runner: R) -> Self {
		Self { layout, runner }
	}

	async fn run_patcher(&self, install_dir: &Path, flags: &[&str]) -> Result<Option<i32>, PatchError> {
		let patcher = self.layout.patcher_path(install_dir);
		if !patcher.exists() {
			return Err(PatchError::PatcherMissing(patcher));
		}

		let mut args = vec![patcher.to_string_lossy().into_owned()];
		args.extend(flags.iter().map(|f| f.to_string()));
		args.push("--relativeToPwd".to_string());
		args.push(self.layout.game_executable.clone());

		self.runner
			.run(Path::new(&self.layout.compat_launcher), &args, install_dir)
			.await
			.map_err(PatchError::Spawn)
	}
}

#[async_trait::async_trait]
impl<R: ProcessRunner> Patcher for CompatPatcher<R> {
	async fn patch(&self, install_dir: &Path) -> Result<PatchState, PatchError> {
		log::info!("{:?} {}", PatchState::Patching, install_dir.display());
		let code = self.run_patcher(install_dir, &["-n", "-f"]).await?;
		super::process::log_exit("install", code);

		let registry = self.layout.compat_registry_path(install_dir);
		if !registry.is_file() {
			return Err(PatchError::RegistryMissing(registry));
		}
		if ensure_registry_overrides(&registry).await? {
			log::info!("Added dll overrides to {}", registry.display());
		}

		Ok(PatchState::Patched)
	}

	async fn unpatch(&self, install_dir: &Path) -> Result<PatchState, PatchError> {
		log::info!("{:?} {}", PatchState::Unpatching, install_dir.display());
		match self.run_patcher(install_dir, &["--revert", "-n"]).await {
			Ok(code) => super::process::log_exit("revert", code),
			Err(PatchError::PatcherMissing(path)) => log::warn!("Patcher missing at {}, nothing to revert.", path.display()),
			Err(e) => return Err(e),
		}
		Ok(PatchState::Unpatched)
	}
}
