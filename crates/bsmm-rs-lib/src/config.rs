//! User configuration and the fixed layout of a game install.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Names of the files and directories inside a game install that the manager relies on.
///
/// All paths are relative to the game install root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameLayout {
	pub plugins_dir: String,
	pub libs_dir: String,
	/// Root directory the loader keeps its own files in.
	pub loader_dir: String,
	/// Holding area for mod files the loader moves into place on its next run.
	pub pending_dir: String,
	/// Present once the game executable has been patched.
	pub patch_marker: String,
	pub patcher_executable: String,
	pub game_executable: String,
	pub steam_app_id: u32,
	/// Program used to run the patcher when the game runs under a compatibility layer.
	pub compat_launcher: String,
}

impl Default for GameLayout {
	fn default() -> Self {
		Self {
			plugins_dir: "Plugins".to_string(),
			libs_dir: "Libs".to_string(),
			loader_dir: "IPA".to_string(),
			pending_dir: "IPA/Pending".to_string(),
			patch_marker: "winhttp.dll".to_string(),
			patcher_executable: "IPA.exe".to_string(),
			game_executable: "Beat Saber.exe".to_string(),
			steam_app_id: 620980,
			compat_launcher: "mono".to_string(),
		}
	}
}

impl GameLayout {
	pub fn pending_path(&self, install_dir: &Path) -> PathBuf {
		install_dir.join(&self.pending_dir)
	}

	pub fn patcher_path(&self, install_dir: &Path) -> PathBuf {
		install_dir.join(&self.patcher_executable)
	}

	pub fn marker_path(&self, install_dir: &Path) -> PathBuf {
		install_dir.join(&self.patch_marker)
	}

	/// The directories deleted wholesale when removing every mod.
	pub fn bulk_removal_paths(&self, install_dir: &Path) -> [PathBuf; 3] {
		[
			install_dir.join(&self.plugins_dir),
			install_dir.join(&self.libs_dir),
			install_dir.join(&self.loader_dir),
		]
	}

	/// Registry file of the compatibility layer prefix.
	///
	/// Steam keeps prefixes in `steamapps/compatdata/<appid>` while the game lives in `steamapps/common/<game>`.
	pub fn compat_registry_path(&self, install_dir: &Path) -> PathBuf {
		install_dir
			.join("..")
			.join("..")
			.join("compatdata")
			.join(self.steam_app_id.to_string())
			.join("pfx")
			.join("user.reg")
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
	install_dir: Option<PathBuf>,
	/// Tag of the download variant to install, e.g. `steam` or `oculus`.
	platform: String,
	loader_name: String,
	force_reinstall: bool,
	https_only: bool,
	download_base_url: String,
	max_concurrent: usize,
	layout: GameLayout,
}

impl Default for Config {
	fn default() -> Self {
		Self {
			install_dir: None,
			platform: "steam".to_string(),
			loader_name: "BSIPA".to_string(),
			force_reinstall: false,
			https_only: true,
			download_base_url: "https://beatmods.com".to_string(),
			max_concurrent: 4,
			layout: GameLayout::default(),
		}
	}
}

impl Config {
	fn config_dir() -> crate::Result<PathBuf> {
		#[cfg(target_os = "windows")]
		let path = PathBuf::from(std::env::var("APPDATA").map_err(|_| crate::Error::ConfigDirMissing)?);

		#[cfg(not(target_os = "windows"))]
		let path = if let Ok(e) = std::env::var("XDG_CONFIG_HOME") {
			PathBuf::from(e)
		} else {
			PathBuf::from(std::env::var("HOME").map_err(|_| crate::Error::ConfigDirMissing)?).join(".config")
		};

		Ok(path.join("bsmm-rs"))
	}

	/// Loads the config from the platform config directory.
	///
	/// # Errors
	/// - [`IO`](crate::Error::IO) when the file is missing or unreadable.
	/// - [`SerdeJSON`](crate::Error::SerdeJSON) when the file is not a valid config.
	pub fn load_from_disk() -> crate::Result<Self> {
		Self::load_from_file(Self::config_dir()?.join("config.json"))
	}

	pub fn load_from_file(path: impl AsRef<Path>) -> crate::Result<Self> {
		let file = std::fs::File::open(path)?;
		Ok(serde_json::from_reader(std::io::BufReader::new(file))?)
	}

	pub fn save_to_disk(&self) -> crate::Result<()> {
		self.save_to_file(Self::config_dir()?.join("config.json"))
	}

	pub fn save_to_file(&self, path: impl AsRef<Path>) -> crate::Result<()> {
		let path = path.as_ref();
		std::fs::create_dir_all(path.with_file_name(""))?;
		let file = std::fs::File::create(path)?;
		serde_json::to_writer_pretty(file, self)?;
		Ok(())
	}

	pub fn install_dir(&self) -> Option<&Path> {
		self.install_dir.as_deref()
	}
	/// returns if the directory is valid or not.
	pub fn set_install_dir(&mut self, install_dir: PathBuf) -> bool {
		if install_dir.is_dir() {
			self.install_dir = Some(install_dir);
			true
		} else {
			false
		}
	}

	pub fn platform(&self) -> &str {
		&self.platform
	}
	pub fn set_platform(&mut self, platform: impl Into<String>) {
		self.platform = platform.into();
	}

	pub fn loader_name(&self) -> &str {
		&self.loader_name
	}
	pub fn set_loader_name(&mut self, loader_name: impl Into<String>) {
		self.loader_name = loader_name.into();
	}

	pub fn force_reinstall(&self) -> bool {
		self.force_reinstall
	}
	pub fn set_force_reinstall(&mut self, force_reinstall: bool) {
		self.force_reinstall = force_reinstall;
	}

	pub fn https_only(&self) -> bool {
		self.https_only
	}
	pub fn set_https_only(&mut self, https_only: bool) {
		self.https_only = https_only;
	}

	pub fn download_base_url(&self) -> &str {
		&self.download_base_url
	}
	pub fn set_download_base_url(&mut self, url: impl Into<String>) {
		self.download_base_url = url.into();
	}

	pub fn max_concurrent(&self) -> usize {
		self.max_concurrent
	}
	pub fn set_max_concurrent(&mut self, max_concurrent: usize) {
		self.max_concurrent = max_concurrent.max(1);
	}

	pub fn layout(&self) -> &GameLayout {
		&self.layout
	}
	pub fn layout_mut(&mut self) -> &mut GameLayout {
		&mut self.layout
	}
}
