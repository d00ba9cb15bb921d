//! Mods available for the current game version.
//!
//! The catalog is fetched by an external client and treated as an immutable snapshot
//! for the duration of a resolve and install batch.

use std::collections::HashMap;

mod descriptor;
pub use descriptor::ModDescriptor;
pub use descriptor::DownloadVariant;
pub use descriptor::FileHash;
pub use descriptor::UNIVERSAL_PLATFORM;

mod local;
pub use local::LocalMod;

/// Any mod the installer can operate on.
///
/// The installer only relies on the capabilities exposed here, never on the variant itself.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum Mod {
	/// An entry of the remote catalog.
	Catalog(ModDescriptor),
	/// An archive supplied by the user from the local filesystem.
	Local(LocalMod),
}

impl Mod {
	pub fn name(&self) -> &str {
		match self {
			Mod::Catalog(m) => &m.name,
			Mod::Local(m) => &m.name,
		}
	}

	pub fn version(&self) -> &str {
		match self {
			Mod::Catalog(m) => &m.version,
			Mod::Local(m) => &m.version,
		}
	}

	pub fn dependencies(&self) -> &[String] {
		match self {
			Mod::Catalog(m) => &m.dependencies,
			Mod::Local(m) => &m.dependencies,
		}
	}

	pub fn conflicts(&self) -> &[String] {
		match self {
			Mod::Catalog(m) => &m.conflicts,
			Mod::Local(_) => &[],
		}
	}

	/// The download matching `platform`, see [`ModDescriptor::variant_for`].
	pub fn variant_for(&self, platform: &str) -> Option<&DownloadVariant> {
		match self {
			Mod::Catalog(m) => m.variant_for(platform),
			Mod::Local(m) => Some(m.variant()),
		}
	}
}

impl std::hash::Hash for Mod {
	fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
		self.name().hash(state);
	}
}

impl PartialEq for Mod {
	fn eq(&self, other: &Self) -> bool {
		self.name() == other.name()
	}
}

impl Eq for Mod {}

impl std::fmt::Display for Mod {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}-{}", self.name(), self.version())
	}
}

impl From<ModDescriptor> for Mod {
	fn from(value: ModDescriptor) -> Self {
		Mod::Catalog(value)
	}
}

impl From<LocalMod> for Mod {
	fn from(value: LocalMod) -> Self {
		Mod::Local(value)
	}
}

/// An ordered snapshot of the catalog with lookup by mod name.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
	mods: Vec<ModDescriptor>,
	index: HashMap<String, usize>,
}

impl Catalog {
	/// Builds a catalog from its entries, keeping their order.
	///
	/// Names are unique within a snapshot; should a duplicate appear the first entry wins.
	pub fn new(mods: Vec<ModDescriptor>) -> Self {
		let mut index = HashMap::with_capacity(mods.len());
		for (i, m) in mods.iter().enumerate() {
			if index.contains_key(&m.name) {
				log::warn!("Duplicate catalog entry {}, keeping the first.", m.name);
				continue;
			}
			index.insert(m.name.clone(), i);
		}
		Self { mods, index }
	}

	/// Reads a catalog snapshot stored as a JSON array of [`ModDescriptor`].
	pub fn from_json(reader: impl std::io::Read) -> crate::Result<Self> {
		let mods: Vec<ModDescriptor> = serde_json::from_reader(reader)?;
		Ok(Self::new(mods))
	}

	pub fn get(&self, name: &str) -> Option<&ModDescriptor> {
		self.index.get(name).map(|&i| &self.mods[i])
	}

	/// Position of the mod in the snapshot.
	pub fn position(&self, name: &str) -> Option<usize> {
		self.index.get(name).copied()
	}

	/// Finds the loader, comparing names case-insensitively.
	pub fn loader(&self, loader_name: &str) -> Option<&ModDescriptor> {
		self.mods.iter().find(|m| crate::installed::is_loader_name(loader_name, &m.name))
	}

	pub fn iter(&self) -> std::slice::Iter<'_, ModDescriptor> {
		self.mods.iter()
	}

	pub fn len(&self) -> usize {
		self.mods.len()
	}

	pub fn is_empty(&self) -> bool {
		self.mods.is_empty()
	}
}

impl<'a> IntoIterator for &'a Catalog {
	type Item = &'a ModDescriptor;
	type IntoIter = std::slice::Iter<'a, ModDescriptor>;

	fn into_iter(self) -> Self::IntoIter {
		self.mods.iter()
	}
}
