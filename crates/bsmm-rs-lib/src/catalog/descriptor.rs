use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Tag of a download usable on every platform.
pub const UNIVERSAL_PLATFORM: &str = "universal";

/// Expected digest of one file the archive places in the game directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileHash {
	/// Path relative to the install root, also the entry name inside the archive.
	pub file: String,
	pub hash: String,
}

/// A platform specific download of a mod.
///
/// Every file the archive places on disk has a [`FileHash`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DownloadVariant {
	pub url: String,
	#[serde(default)]
	pub hashes: Vec<FileHash>,
}

/// Catalog entry for a single mod.
///
/// Two descriptors are equal when their names are, names are unique within a catalog snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModDescriptor {
	pub name: String,
	#[serde(default)]
	pub version: String,
	#[serde(default)]
	pub dependencies: Vec<String>,
	#[serde(default)]
	pub conflicts: Vec<String>,
	/// Downloads keyed by platform tag.
	#[serde(default)]
	pub downloads: BTreeMap<String, DownloadVariant>,
}

impl ModDescriptor {
	/// The download for `platform`, falling back to a [`UNIVERSAL_PLATFORM`] download.
	pub fn variant_for(&self, platform: &str) -> Option<&DownloadVariant> {
		self.downloads.get(platform).or_else(|| self.downloads.get(UNIVERSAL_PLATFORM))
	}
}

impl std::hash::Hash for ModDescriptor {
	fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
		self.name.hash(state);
	}
}

impl PartialEq for ModDescriptor {
	fn eq(&self, other: &Self) -> bool {
		self.name == other.name
	}
}

impl Eq for ModDescriptor {}
