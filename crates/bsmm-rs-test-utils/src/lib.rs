//! Various helpers for testing
//! 
//! functions in this module should use results and not use any panics to avoid confusion in callers

use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use bsmm_rs::acquire::{Acquire, AcquireError};
use bsmm_rs::catalog::{DownloadVariant, FileHash, ModDescriptor};
use bsmm_rs::patcher::{PatchError, PatchState, Patcher, ProcessRunner};
use tokio_util::sync::CancellationToken;

/// Builds zip archives in memory.
#[derive(Debug, Default, Clone)]
pub struct ArchiveBuilder {
	files: Vec<(String, Vec<u8>)>,
}

impl ArchiveBuilder {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn file(mut self, name: impl Into<String>, contents: impl Into<Vec<u8>>) -> Self {
		self.files.push((name.into(), contents.into()));
		self
	}

	pub fn build(&self) -> zip::result::ZipResult<Vec<u8>> {
		let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
		let options = zip::write::FileOptions::default().compression_method(zip::CompressionMethod::Stored);
		for (name, contents) in &self.files {
			writer.start_file(name.as_str(), options)?;
			writer.write_all(contents)?;
		}
		Ok(writer.finish()?.into_inner())
	}

	/// The [`FileHash`] list matching the archive contents.
	pub fn hashes(&self) -> Vec<FileHash> {
		self.files.iter().map(|(name, contents)| file_hash(name, contents)).collect()
	}
}

pub fn file_hash(file: &str, contents: &[u8]) -> FileHash {
	FileHash {
		file: file.to_string(),
		hash: bsmm_rs::hash::compute_digest_bytes(contents),
	}
}

/// A catalog entry at version `1.0.0` without downloads.
pub fn descriptor(name: &str, dependencies: &[&str]) -> ModDescriptor {
	ModDescriptor {
		name: name.to_string(),
		version: "1.0.0".to_string(),
		dependencies: dependencies.iter().map(|d| d.to_string()).collect(),
		conflicts: Vec::new(),
		downloads: BTreeMap::new(),
	}
}

/// Adds a download for `platform` to `descriptor`.
pub fn with_download(mut descriptor: ModDescriptor, platform: &str, url: &str, hashes: Vec<FileHash>) -> ModDescriptor {
	descriptor.downloads.insert(platform.to_string(), DownloadVariant { url: url.to_string(), hashes });
	descriptor
}

/// Serves archives from memory, unknown locators answer 404.
#[derive(Debug, Default)]
pub struct FakeAcquirer {
	archives: Mutex<HashMap<String, Vec<u8>>>,
	requests: AtomicUsize,
	locators: Mutex<Vec<String>>,
	cancel_on_acquire: bool,
}

impl FakeAcquirer {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_archive(self, locator: impl Into<String>, bytes: Vec<u8>) -> Self {
		if let Ok(mut archives) = self.archives.lock() {
			archives.insert(locator.into(), bytes);
		}
		self
	}

	/// Cancels the caller's token once the archive was handed out, as if cancellation
	/// arrived while the download finished.
	pub fn cancelling_on_acquire(mut self) -> Self {
		self.cancel_on_acquire = true;
		self
	}

	pub fn requests(&self) -> usize {
		self.requests.load(Ordering::SeqCst)
	}

	/// Locators in the order they were requested.
	pub fn locators(&self) -> Vec<String> {
		self.locators.lock().map(|l| l.clone()).unwrap_or_default()
	}
}

#[async_trait::async_trait]
impl Acquire for FakeAcquirer {
	async fn acquire(&self, locator: &str, cancel: &CancellationToken) -> Result<Vec<u8>, AcquireError> {
		self.requests.fetch_add(1, Ordering::SeqCst);
		if let Ok(mut locators) = self.locators.lock() {
			locators.push(locator.to_string());
		}
		if cancel.is_cancelled() {
			return Err(AcquireError::Cancelled);
		}
		let bytes = self.archives
			.lock()
			.ok()
			.and_then(|archives| archives.get(locator).cloned())
			.ok_or(AcquireError::Status(404));
		if self.cancel_on_acquire {
			cancel.cancel();
		}
		bytes
	}
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum PatchOutcome {
	#[default]
	Succeed,
	Fail,
	Unsupported,
}

/// Counts patch calls without touching the filesystem.
#[derive(Debug, Default)]
pub struct CountingPatcher {
	outcome: PatchOutcome,
	patches: AtomicUsize,
	unpatches: AtomicUsize,
}

impl CountingPatcher {
	pub fn new(outcome: PatchOutcome) -> Self {
		Self { outcome, ..Default::default() }
	}

	pub fn patches(&self) -> usize {
		self.patches.load(Ordering::SeqCst)
	}

	pub fn unpatches(&self) -> usize {
		self.unpatches.load(Ordering::SeqCst)
	}

	fn result(&self, install_dir: &Path, state: PatchState) -> Result<PatchState, PatchError> {
		match self.outcome {
			PatchOutcome::Succeed => Ok(state),
			PatchOutcome::Fail => Err(PatchError::PatcherMissing(install_dir.join("IPA.exe"))),
			PatchOutcome::Unsupported => Err(PatchError::UnsupportedPlatform),
		}
	}
}

#[async_trait::async_trait]
impl Patcher for CountingPatcher {
	async fn patch(&self, install_dir: &Path) -> Result<PatchState, PatchError> {
		self.patches.fetch_add(1, Ordering::SeqCst);
		self.result(install_dir, PatchState::Patched)
	}

	async fn unpatch(&self, install_dir: &Path) -> Result<PatchState, PatchError> {
		self.unpatches.fetch_add(1, Ordering::SeqCst);
		self.result(install_dir, PatchState::Unpatched)
	}
}

/// Patches successfully and notes whether `watched` existed every time it patched.
#[derive(Debug)]
pub struct ObservingPatcher {
	watched: PathBuf,
	seen: Mutex<Vec<bool>>,
}

impl ObservingPatcher {
	pub fn new(watched: impl Into<PathBuf>) -> Self {
		Self { watched: watched.into(), seen: Mutex::new(Vec::new()) }
	}

	/// One entry per patch, `true` when `watched` was present at that time.
	pub fn seen(&self) -> Vec<bool> {
		self.seen.lock().map(|s| s.clone()).unwrap_or_default()
	}
}

#[async_trait::async_trait]
impl Patcher for ObservingPatcher {
	async fn patch(&self, _install_dir: &Path) -> Result<PatchState, PatchError> {
		if let Ok(mut seen) = self.seen.lock() {
			seen.push(self.watched.exists());
		}
		Ok(PatchState::Patched)
	}

	async fn unpatch(&self, _install_dir: &Path) -> Result<PatchState, PatchError> {
		Ok(PatchState::Unpatched)
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
	pub program: PathBuf,
	pub args: Vec<String>,
	pub working_dir: PathBuf,
}

/// Records every process it is asked to run. Clones share the record.
#[derive(Debug, Clone, Default)]
pub struct RecordingRunner {
	invocations: Arc<Mutex<Vec<Invocation>>>,
	exit_code: Option<i32>,
	spawn_fails: bool,
}

impl RecordingRunner {
	pub fn exiting_with(exit_code: i32) -> Self {
		Self { exit_code: Some(exit_code), ..Default::default() }
	}

	pub fn failing_to_spawn() -> Self {
		Self { spawn_fails: true, ..Default::default() }
	}

	pub fn invocations(&self) -> Vec<Invocation> {
		self.invocations.lock().map(|i| i.clone()).unwrap_or_default()
	}
}

#[async_trait::async_trait]
impl ProcessRunner for RecordingRunner {
	async fn run(&self, program: &Path, args: &[String], working_dir: &Path) -> std::io::Result<Option<i32>> {
		if let Ok(mut invocations) = self.invocations.lock() {
			invocations.push(Invocation {
				program: program.to_path_buf(),
				args: args.to_vec(),
				working_dir: working_dir.to_path_buf(),
			});
		}
		if self.spawn_fails {
			return Err(std::io::Error::new(std::io::ErrorKind::NotFound, "no such program"));
		}
		Ok(self.exit_code.or(Some(0)))
	}
}

/// A temporary Steam library holding a game install.
///
/// Laid out as `<root>/steamapps/common/Beat Saber` with the compatibility prefix under
/// `<root>/steamapps/compatdata`. Removed on drop.
#[derive(Debug)]
pub struct GameDir {
	root: tempfile::TempDir,
	install_dir: PathBuf,
}

impl GameDir {
	pub fn new() -> std::io::Result<Self> {
		let root = tempfile::tempdir()?;
		let install_dir = root.path().join("steamapps").join("common").join("Beat Saber");
		std::fs::create_dir_all(&install_dir)?;
		Ok(Self { root, install_dir })
	}

	pub fn install_dir(&self) -> &Path {
		&self.install_dir
	}

	pub fn registry_path(&self) -> PathBuf {
		self.root.path().join("steamapps/compatdata/620980/pfx/user.reg")
	}

	/// Creates the compatibility layer registry with `contents`.
	pub fn with_registry(self, contents: &str) -> std::io::Result<Self> {
		let path = self.registry_path();
		if let Some(parent) = path.parent() {
			std::fs::create_dir_all(parent)?;
		}
		std::fs::write(path, contents)?;
		Ok(self)
	}

	/// Writes `contents` at `relative` inside the install.
	pub fn write(&self, relative: &str, contents: &[u8]) -> std::io::Result<PathBuf> {
		let path = self.install_dir.join(relative);
		if let Some(parent) = path.parent() {
			std::fs::create_dir_all(parent)?;
		}
		std::fs::write(&path, contents)?;
		Ok(path)
	}

	/// A config pointing at this install.
	pub fn config(&self) -> bsmm_rs::Config {
		let mut config = bsmm_rs::Config::default();
		config.set_install_dir(self.install_dir.clone());
		config
	}
}
