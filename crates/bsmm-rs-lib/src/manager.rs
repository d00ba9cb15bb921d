//! Session level operations built on the resolver and the installer.

use std::collections::HashSet;
use std::path::Path;

use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::catalog::{Catalog, Mod};
use crate::installed::{InstallReason, InstalledSet};
use crate::installer::ModInstaller;
use crate::relationship_resolver::{resolve_install_set, resolve_uninstall_set};

/// Mods actually changed by [`ModManager::refresh`].
#[derive(Debug, Default, Clone)]
pub struct RefreshResult {
	pub installed: Vec<Mod>,
	pub uninstalled: Vec<Mod>,
}

#[derive(Debug)]
pub struct ModManager {
	config: crate::Config,
	catalog: Catalog,
	installer: ModInstaller,
}

impl ModManager {
	pub fn new(config: crate::Config, catalog: Catalog, installer: ModInstaller) -> Self {
		Self { config, catalog, installer }
	}

	pub fn config(&self) -> &crate::Config {
		&self.config
	}

	pub fn catalog(&self) -> &Catalog {
		&self.catalog
	}

	pub fn installer(&self) -> &ModInstaller {
		&self.installer
	}

	fn install_dir(&self) -> crate::Result<&Path> {
		self.config.install_dir().ok_or(crate::Error::InstallDirMissing)
	}

	fn is_up_to_date(installed: &InstalledSet, m: &Mod) -> bool {
		installed.get(m.name()).map_or(false, |i| i.version() == m.version())
	}

	/// Brings the install in line with `selected`.
	///
	/// Selected mods and their dependencies are installed unless the installed version already matches,
	/// or always when force reinstall is set. Installed mods outside the selection are uninstalled along
	/// with the dependencies only they needed and anything conflicting with the selection.
	/// Uninstalls run before installs.
	pub async fn refresh(&self, selected: &[Mod], cancel: CancellationToken) -> crate::Result<RefreshResult> {
		let install_dir = self.install_dir()?;
		let installed = self.installer.installed().await;

		let resolution = resolve_install_set(selected, &self.catalog, &installed);
		let wanted: HashSet<&str> = resolution.install.iter().map(Mod::name).collect();

		let to_install: Vec<Mod> = resolution.install
			.iter()
			.filter(|m| self.config.force_reinstall() || !Self::is_up_to_date(&installed, m))
			.cloned()
			.collect();

		let mut deselected: Vec<Mod> = installed.iter().filter(|m| !wanted.contains(m.name())).cloned().collect();
		deselected.sort_by_key(|m| self.catalog.position(m.name()));

		let mut to_uninstall = resolve_uninstall_set(&deselected, &self.catalog, &installed);
		for m in resolution.uninstall {
			if !to_uninstall.contains(&m) {
				to_uninstall.push(m);
			}
		}
		to_uninstall.retain(|m| !wanted.contains(m.name()));

		log::info!("Refresh: {} to install, {} to uninstall.", to_install.len(), to_uninstall.len());

		let uninstalled: Vec<Mod> = self.installer.uninstall_mods(install_dir, to_uninstall, cancel.clone()).collect().await;
		let newly_installed: Vec<Mod> = self.installer.install_mods(install_dir, to_install, cancel).collect().await;

		self.installer.mark_dependencies(
			newly_installed
				.iter()
				.map(Mod::name)
				.filter(|name| resolution.dependencies.contains(*name))
				.filter(|name| installed.reason(name) != Some(InstallReason::Explicit))
		).await;

		Ok(RefreshResult {
			installed: newly_installed,
			uninstalled,
		})
	}

	/// Unpatches the game and removes the loader's files.
	///
	/// Returns the removed loader, `None` when no loader is installed.
	///
	/// # Errors
	/// [`UnsupportedPlatform`](crate::Error::UnsupportedPlatform) when the game can't be unpatched on this OS,
	/// the loader is left untouched in that case.
	pub async fn uninstall_mod_loader(&self, cancel: CancellationToken) -> crate::Result<Option<Mod>> {
		let install_dir = self.install_dir()?;
		let Some(loader) = self.installer.installed().await.loader().cloned() else {
			log::info!("No loader installed.");
			return Ok(None);
		};
		self.installer.uninstall_mod(install_dir, &loader, &cancel).await?;
		Ok(Some(loader))
	}

	/// Uninstalls every installed mod then deletes the mod directories wholesale.
	///
	/// Returns the mods whose uninstall succeeded. Nothing is deleted in bulk if `cancel` fired.
	///
	/// The loader is unpatched first; if that fails because the platform is unsupported
	/// nothing is removed and the error is returned.
	pub async fn uninstall_all_mods(&self, cancel: CancellationToken) -> crate::Result<Vec<Mod>> {
		let install_dir = self.install_dir()?;
		let installed = self.installer.installed().await;
		let loader = installed.loader().cloned();
		let mut mods: Vec<Mod> = installed.iter().filter(|m| !installed.is_loader(m)).cloned().collect();
		drop(installed);
		mods.sort_by_key(|m| self.catalog.position(m.name()));

		let mut uninstalled = Vec::new();
		if let Some(loader) = loader {
			self.installer.uninstall_mod(install_dir, &loader, &cancel).await?;
			uninstalled.push(loader);
		}

		uninstalled.extend(self.installer.uninstall_mods(install_dir, mods, cancel.clone()).collect::<Vec<_>>().await);
		if cancel.is_cancelled() {
			log::warn!("Uninstall cancelled, mod directories left in place.");
			return Ok(uninstalled);
		}

		self.installer.remove_all_mods(install_dir).await?;
		self.installer.clear_installed().await;
		Ok(uninstalled)
	}
}
