//! Installs and uninstalls mods in a game directory.
//!
//! Every mod runs through its own pipeline, acquire then verify then mutate the filesystem then commit
//! to the [`InstalledSet`]. Pipelines of different mods run concurrently. The loader is the exception,
//! it is extracted into the install root and patches the game, so it holds the install root exclusively
//! while it does so and is always processed before the rest of a batch.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::stream::{self, BoxStream, StreamExt};
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;

use crate::acquire::{Acquire, AcquireError};
use crate::archive::{ArchiveError, ModArchive};
use crate::catalog::{DownloadVariant, Mod};
use crate::config::GameLayout;
use crate::installed::{InstallReason, InstalledSet};
use crate::patcher::{PatchError, Patcher};
use crate::progress::{ProgressInfo, StatusProgress, StatusType};

#[derive(Debug, thiserror::Error)]
pub enum InstallError {
	#[error("{name} has no download for platform {platform}.")]
	NoVariantForPlatform {
		name: String,
		platform: String,
	},
	#[error("acquire error: {0}")]
	Acquire(#[from] AcquireError),
	#[error("archive error: {0}")]
	Archive(#[from] ArchiveError),
	#[error("patch error: {0}")]
	Patch(PatchError),
	#[error("IO error: {0}")]
	IO(#[from] std::io::Error),
	#[error("background task failed: {0}")]
	Join(#[from] tokio::task::JoinError),
	/// The running OS has no way to patch the game.
	#[error("unsupported platform.")]
	UnsupportedPlatform,
	#[error("operation cancelled.")]
	Cancelled,
}

impl From<PatchError> for InstallError {
	fn from(value: PatchError) -> Self {
		match value {
			PatchError::UnsupportedPlatform => InstallError::UnsupportedPlatform,
			e => InstallError::Patch(e),
		}
	}
}

pub struct ModInstaller {
	layout: GameLayout,
	platform: String,
	max_concurrent: usize,
	acquirer: Arc<dyn Acquire>,
	patcher: Arc<dyn Patcher>,
	progress: Option<Arc<dyn StatusProgress>>,
	installed: RwLock<InstalledSet>,
	/// One lock per mod name, held for a whole pipeline.
	mod_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
	/// Held exclusively by loader pipelines, shared by everything else writing into the install.
	install_root: RwLock<()>,
}

impl std::fmt::Debug for ModInstaller {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ModInstaller")
			.field("layout", &self.layout)
			.field("platform", &self.platform)
			.field("max_concurrent", &self.max_concurrent)
			.finish_non_exhaustive()
	}
}

impl ModInstaller {
	pub fn new(config: &crate::Config, acquirer: Arc<dyn Acquire>, patcher: Arc<dyn Patcher>) -> Self {
		Self {
			layout: config.layout().clone(),
			platform: config.platform().to_string(),
			max_concurrent: config.max_concurrent().max(1),
			acquirer,
			patcher,
			progress: None,
			installed: RwLock::new(InstalledSet::new(config.loader_name())),
			mod_locks: Mutex::new(HashMap::new()),
			install_root: RwLock::new(()),
		}
	}

	/// Starts from a previously detected set, see [`InstalledSet::detect`].
	pub fn with_installed(mut self, installed: InstalledSet) -> Self {
		self.installed = RwLock::new(installed);
		self
	}

	pub fn with_progress(mut self, progress: Arc<dyn StatusProgress>) -> Self {
		self.progress = Some(progress);
		self
	}

	pub fn with_concurrency(mut self, max_concurrent: usize) -> Self {
		self.max_concurrent = max_concurrent.max(1);
		self
	}

	pub fn layout(&self) -> &GameLayout {
		&self.layout
	}

	pub fn platform(&self) -> &str {
		&self.platform
	}

	/// A copy of the installed set as it is right now.
	pub async fn installed(&self) -> InstalledSet {
		self.installed.read().await.clone()
	}

	/// Records which installed mods were only pulled in as dependencies.
	pub async fn mark_dependencies<'n>(&self, names: impl IntoIterator<Item = &'n str>) {
		let mut installed = self.installed.write().await;
		for name in names {
			installed.set_reason(name, InstallReason::AsDependency);
		}
	}

	/// Forgets every installed mod, meant to follow [`ModInstaller::remove_all_mods`].
	pub async fn clear_installed(&self) {
		self.installed.write().await.clear();
	}

	async fn is_loader(&self, m: &Mod) -> bool {
		self.installed.read().await.is_loader(m)
	}

	async fn mod_lock(&self, name: &str) -> Arc<Mutex<()>> {
		self.mod_locks.lock().await.entry(name.to_string()).or_default().clone()
	}

	/// Drops the entry for `name` unless another pipeline still holds it.
	async fn release_mod_lock(&self, name: &str, lock: Arc<Mutex<()>>) {
		let mut locks = self.mod_locks.lock().await;
		drop(lock);
		if locks.get(name).map_or(false, |l| Arc::strong_count(l) == 1) {
			locks.remove(name);
		}
	}

	fn variant<'m>(&self, m: &'m Mod) -> Result<&'m DownloadVariant, InstallError> {
		m.variant_for(&self.platform).ok_or_else(|| InstallError::NoVariantForPlatform {
			name: m.name().to_string(),
			platform: self.platform.clone(),
		})
	}

	fn report(&self, status: StatusType, m: &Mod) {
		if let Some(progress) = &self.progress {
			progress.report(ProgressInfo::new(status, m.name()));
		}
	}

	/// Runs the install pipeline for a single mod.
	///
	/// The mod is only added to the installed set once its files are on disk and,
	/// for the loader, the game has been patched.
	pub async fn install_mod(&self, install_dir: &Path, m: &Mod, cancel: &CancellationToken) -> Result<(), InstallError> {
		let lock = self.mod_lock(m.name()).await;
		let result = {
			let _guard = lock.lock().await;
			self.install_locked(install_dir, m, cancel).await
		};
		self.release_mod_lock(m.name(), lock).await;
		result
	}

	async fn install_locked(&self, install_dir: &Path, m: &Mod, cancel: &CancellationToken) -> Result<(), InstallError> {
		let variant = self.variant(m)?;
		let bytes = self.acquirer.acquire(&variant.url, cancel).await?;

		let hashes = variant.hashes.clone();
		let mut archive = tokio::task::spawn_blocking(move || -> Result<ModArchive, ArchiveError> {
			let mut archive = ModArchive::new(bytes)?;
			archive.verify(&hashes)?;
			Ok(archive)
		}).await?.map_err(|e| {
			log::warn!("{} failed verification: {}", m, e);
			e
		})?;

		if cancel.is_cancelled() {
			return Err(InstallError::Cancelled);
		}

		if self.is_loader(m).await {
			let _root = self.install_root.write().await;
			let destination = install_dir.to_path_buf();
			tokio::task::spawn_blocking(move || archive.extract(&destination)).await??;
			self.patcher.patch(install_dir).await?;
		} else {
			let _root = self.install_root.read().await;
			let pending = self.layout.pending_path(install_dir);
			tokio::task::spawn_blocking(move || -> Result<Vec<PathBuf>, ArchiveError> {
				std::fs::create_dir_all(&pending)?;
				archive.extract(&pending)
			}).await??;
		}

		self.installed.write().await.add(m.clone());
		log::info!("Installed {}", m);
		Ok(())
	}

	/// Runs the uninstall pipeline for a single mod.
	///
	/// Missing files are skipped, uninstalling a mod that isn't there succeeds without changing anything.
	pub async fn uninstall_mod(&self, install_dir: &Path, m: &Mod, cancel: &CancellationToken) -> Result<(), InstallError> {
		let lock = self.mod_lock(m.name()).await;
		let result = {
			let _guard = lock.lock().await;
			self.uninstall_locked(install_dir, m, cancel).await
		};
		self.release_mod_lock(m.name(), lock).await;
		result
	}

	async fn uninstall_locked(&self, install_dir: &Path, m: &Mod, cancel: &CancellationToken) -> Result<(), InstallError> {
		if cancel.is_cancelled() {
			return Err(InstallError::Cancelled);
		}

		let variant = self.variant(m)?;

		if self.is_loader(m).await {
			let _root = self.install_root.write().await;
			match self.patcher.unpatch(install_dir).await {
				Ok(_) => {},
				Err(PatchError::UnsupportedPlatform) => return Err(InstallError::UnsupportedPlatform),
				Err(e) => log::warn!("Failed to unpatch, removing loader files anyway: {}", e),
			}
			let paths: Vec<PathBuf> = variant.hashes
				.iter()
				.map(|h| install_dir.join(crate::patcher::loader_file_path(&h.file)))
				.collect();
			tokio::task::spawn_blocking(move || remove_files(&paths)).await??;
		} else {
			let pending = self.layout.pending_path(install_dir);
			let paths: Vec<PathBuf> = variant.hashes
				.iter()
				.flat_map(|h| [pending.join(&h.file), install_dir.join(&h.file)])
				.collect();
			{
				let _root = self.install_root.read().await;
				tokio::task::spawn_blocking(move || remove_files(&paths)).await??;
			}
			/* Pruning could race a concurrent extraction creating the same directories */
			let _root = self.install_root.write().await;
			tokio::task::spawn_blocking(move || prune_empty_dirs(&pending)).await??;
		}

		self.installed.write().await.remove(m.name());
		log::info!("Uninstalled {}", m);
		Ok(())
	}

	async fn install_reported(&self, install_dir: &Path, m: Mod, cancel: CancellationToken) -> Option<Mod> {
		self.report(StatusType::Installing, &m);
		match self.install_mod(install_dir, &m, &cancel).await {
			Ok(()) => {
				self.report(StatusType::Completed, &m);
				Some(m)
			},
			Err(e) => {
				log::error!("Failed to install {}: {}", m, e);
				self.report(StatusType::Failed, &m);
				None
			},
		}
	}

	async fn uninstall_reported(&self, install_dir: &Path, m: Mod, cancel: CancellationToken) -> Option<Mod> {
		self.report(StatusType::Uninstalling, &m);
		match self.uninstall_mod(install_dir, &m, &cancel).await {
			Ok(()) => {
				self.report(StatusType::Completed, &m);
				Some(m)
			},
			Err(e) => {
				log::error!("Failed to uninstall {}: {}", m, e);
				self.report(StatusType::Failed, &m);
				None
			},
		}
	}

	async fn split_loader(&self, mods: Vec<Mod>) -> (Vec<Mod>, Vec<Mod>) {
		let installed = self.installed.read().await;
		mods.into_iter().partition(|m| installed.is_loader(m))
	}

	/// Installs `mods`, yielding each mod once it is installed.
	///
	/// Mods that fail are logged and left out of the stream. Once `cancel` fires no new
	/// pipelines are started, the ones in flight stop before touching the filesystem.
	pub fn install_mods<'a>(&'a self, install_dir: &'a Path, mods: Vec<Mod>, cancel: CancellationToken) -> BoxStream<'a, Mod> {
		let max_concurrent = self.max_concurrent;
		stream::once(self.split_loader(mods))
			.flat_map(move |(loader, rest)| {
				let first = stream::iter(loader)
					.take_until(cancel.clone().cancelled_owned())
					.then({
						let cancel = cancel.clone();
						move |m| self.install_reported(install_dir, m, cancel.clone())
					});
				let others = stream::iter(rest)
					.take_until(cancel.clone().cancelled_owned())
					.map({
						let cancel = cancel.clone();
						move |m| self.install_reported(install_dir, m, cancel.clone())
					})
					.buffer_unordered(max_concurrent);
				first.chain(others)
			})
			.filter_map(futures::future::ready)
			.boxed()
	}

	/// Uninstalls `mods`, yielding each mod once it is removed.
	///
	/// Failures and cancellation behave as in [`ModInstaller::install_mods`].
	pub fn uninstall_mods<'a>(&'a self, install_dir: &'a Path, mods: Vec<Mod>, cancel: CancellationToken) -> BoxStream<'a, Mod> {
		let max_concurrent = self.max_concurrent;
		stream::once(self.split_loader(mods))
			.flat_map(move |(loader, rest)| {
				let first = stream::iter(loader)
					.take_until(cancel.clone().cancelled_owned())
					.then({
						let cancel = cancel.clone();
						move |m| self.uninstall_reported(install_dir, m, cancel.clone())
					});
				let others = stream::iter(rest)
					.take_until(cancel.clone().cancelled_owned())
					.map({
						let cancel = cancel.clone();
						move |m| self.uninstall_reported(install_dir, m, cancel.clone())
					})
					.buffer_unordered(max_concurrent);
				first.chain(others)
			})
			.filter_map(futures::future::ready)
			.boxed()
	}

	/// Deletes the plugin, library and loader directories wholesale.
	///
	/// Directories that don't exist are skipped. The installed set is left alone.
	pub async fn remove_all_mods(&self, install_dir: &Path) -> std::io::Result<()> {
		let _root = self.install_root.write().await;
		for dir in self.layout.bulk_removal_paths(install_dir) {
			match tokio::fs::remove_dir_all(&dir).await {
				Ok(()) => log::info!("Removed {}", dir.display()),
				Err(e) if e.kind() == std::io::ErrorKind::NotFound => log::debug!("{} does not exist", dir.display()),
				Err(e) => return Err(e),
			}
		}
		Ok(())
	}
}

fn remove_files(paths: &[PathBuf]) -> std::io::Result<()> {
	for path in paths {
		match std::fs::remove_file(path) {
			Ok(()) => log::debug!("Removed {}", path.display()),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => {},
			Err(e) => return Err(e),
		}
	}
	Ok(())
}

/// Removes directories under `root` left empty by an uninstall, `root` itself is kept.
fn prune_empty_dirs(root: &Path) -> std::io::Result<()> {
	if !root.is_dir() {
		return Ok(());
	}
	for entry in walkdir::WalkDir::new(root).min_depth(1).contents_first(true) {
		let entry = entry.map_err(std::io::Error::from)?;
		if !entry.file_type().is_dir() { continue; }
		if std::fs::read_dir(entry.path())?.next().is_none() {
			log::trace!("Pruning {}", entry.path().display());
			std::fs::remove_dir(entry.path())?;
		}
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::catalog::{FileHash, ModDescriptor, UNIVERSAL_PLATFORM};

	struct NothingToAcquire;

	#[async_trait::async_trait]
	impl Acquire for NothingToAcquire {
		async fn acquire(&self, _locator: &str, _cancel: &CancellationToken) -> Result<Vec<u8>, AcquireError> {
			Err(AcquireError::Status(404))
		}
	}

	fn installer() -> ModInstaller {
		ModInstaller::new(&crate::Config::default(), Arc::new(NothingToAcquire), Arc::new(crate::patcher::UnsupportedPatcher))
	}

	fn foo() -> Mod {
		let mut descriptor = ModDescriptor { name: "Foo".to_string(), version: "1.0.0".to_string(), ..Default::default() };
		descriptor.downloads.insert(UNIVERSAL_PLATFORM.to_string(), DownloadVariant {
			url: "/foo.zip".to_string(),
			hashes: vec![FileHash { file: "Foo.dll".to_string(), hash: String::new() }],
		});
		Mod::Catalog(descriptor)
	}

	#[tokio::test]
	async fn mod_locks_are_released_after_each_pipeline() {
		let dir = tempfile::tempdir().unwrap();
		let installer = installer();

		assert!(installer.install_mod(dir.path(), &foo(), &CancellationToken::new()).await.is_err());
		assert!(installer.mod_locks.lock().await.is_empty());

		for _ in 0..3 {
			installer.uninstall_mod(dir.path(), &foo(), &CancellationToken::new()).await.unwrap();
		}
		assert!(installer.mod_locks.lock().await.is_empty());
	}

	#[tokio::test]
	async fn mod_lock_held_elsewhere_is_kept() {
		let dir = tempfile::tempdir().unwrap();
		let installer = installer();
		let held = installer.mod_lock("Foo").await;

		installer.uninstall_mod(dir.path(), &foo(), &CancellationToken::new()).await.unwrap();
		assert!(installer.mod_locks.lock().await.contains_key("Foo"));

		installer.release_mod_lock("Foo", held).await;
		assert!(installer.mod_locks.lock().await.is_empty());
	}
}
