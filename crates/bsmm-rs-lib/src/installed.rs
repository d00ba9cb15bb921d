//! Record of the mods currently present in the game install.
//!
//! The set only lives for one process run. On startup it can be rebuilt from the files on disk
//! with [`InstalledSet::detect`].

use std::collections::HashMap;
use std::path::Path;

use crate::catalog::{Catalog, Mod};
use crate::config::GameLayout;

/// Why a mod ended up in the install.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum InstallReason {
	/// The user asked for it.
	Explicit,
	/// It was pulled in to satisfy another mod.
	AsDependency,
}

/// Compares `name` against the configured loader name, ignoring case.
pub fn is_loader_name(loader_name: &str, name: &str) -> bool {
	loader_name.eq_ignore_ascii_case(name)
}

#[derive(Debug, Clone)]
pub struct InstalledSet {
	mods: HashMap<String, (Mod, InstallReason)>,
	loader_name: String,
}

impl InstalledSet {
	pub fn new(loader_name: impl Into<String>) -> Self {
		Self {
			mods: HashMap::new(),
			loader_name: loader_name.into(),
		}
	}

	/// Adds an explicitly installed mod, replacing any previous entry with the same name.
	pub fn add(&mut self, m: Mod) {
		self.add_with_reason(m, InstallReason::Explicit);
	}

	/// Adds `m`, an existing explicit entry is never downgraded to a dependency.
	pub fn add_with_reason(&mut self, m: Mod, reason: InstallReason) {
		let reason = match self.reason(m.name()) {
			Some(InstallReason::Explicit) => InstallReason::Explicit,
			_ => reason,
		};
		self.mods.insert(m.name().to_string(), (m, reason));
	}

	pub fn remove(&mut self, name: &str) -> Option<Mod> {
		self.mods.remove(name).map(|(m, _)| m)
	}

	pub fn contains(&self, name: &str) -> bool {
		self.mods.contains_key(name)
	}

	pub fn get(&self, name: &str) -> Option<&Mod> {
		self.mods.get(name).map(|(m, _)| m)
	}

	pub fn reason(&self, name: &str) -> Option<InstallReason> {
		self.mods.get(name).map(|(_, r)| *r)
	}

	/// Returns false when `name` is not installed.
	pub fn set_reason(&mut self, name: &str, reason: InstallReason) -> bool {
		match self.mods.get_mut(name) {
			Some((_, r)) => { *r = reason; true },
			None => false,
		}
	}

	pub fn iter(&self) -> impl Iterator<Item = &Mod> {
		self.mods.values().map(|(m, _)| m)
	}

	pub fn len(&self) -> usize {
		self.mods.len()
	}

	pub fn is_empty(&self) -> bool {
		self.mods.is_empty()
	}

	pub fn clear(&mut self) {
		self.mods.clear();
	}

	pub fn loader_name(&self) -> &str {
		&self.loader_name
	}

	pub fn is_loader_name(&self, name: &str) -> bool {
		is_loader_name(&self.loader_name, name)
	}

	pub fn is_loader(&self, m: &Mod) -> bool {
		self.is_loader_name(m.name())
	}

	/// The installed loader, if any.
	pub fn loader(&self) -> Option<&Mod> {
		self.iter().find(|m| self.is_loader(m))
	}

	/// Rebuilds the set from the files found under `install_dir`.
	///
	/// A catalog mod counts as installed when every file its `platform` variant declares is on disk
	/// with the expected digest, either in the install root or in the staging directory.
	/// Loader files are looked up at their unpacked location. Variants declaring no files can't be
	/// detected and are skipped. Detected mods are recorded as explicit installs.
	pub fn detect(catalog: &Catalog, install_dir: &Path, platform: &str, layout: &GameLayout, loader_name: &str) -> std::io::Result<Self> {
		let mut set = Self::new(loader_name);
		let pending = layout.pending_path(install_dir);

		for descriptor in catalog {
			let Some(variant) = descriptor.variant_for(platform) else { continue };
			if variant.hashes.is_empty() { continue; }
			let loader = is_loader_name(loader_name, &descriptor.name);

			let mut present = true;
			for file_hash in &variant.hashes {
				let mut candidates = vec![install_dir.join(&file_hash.file)];
				if loader {
					candidates.push(install_dir.join(crate::patcher::loader_file_path(&file_hash.file)));
				} else {
					candidates.push(pending.join(&file_hash.file));
				}

				let mut found = false;
				for path in candidates {
					if let Some(digest) = crate::hash::digest_file(&path)? {
						if crate::hash::digests_match(&digest, &file_hash.hash) {
							found = true;
							break;
						}
					}
				}
				if !found {
					present = false;
					break;
				}
			}

			if present {
				log::debug!("Detected {}-{} on disk.", descriptor.name, descriptor.version);
				set.add(Mod::Catalog(descriptor.clone()));
			}
		}

		Ok(set)
	}
}
