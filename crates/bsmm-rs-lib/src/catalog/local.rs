use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::{DownloadVariant, FileHash};
use crate::acquire::FILE_SCHEME;

/// A mod archive that lives on the local filesystem rather than in the catalog.
///
/// Local archives are platform agnostic, their single download is a [`FILE_SCHEME`] locator
/// pointing at the archive path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalMod {
	pub name: String,
	pub version: String,
	pub dependencies: Vec<String>,
	variant: DownloadVariant,
}

impl LocalMod {
	pub fn new(name: impl Into<String>, version: impl Into<String>, archive: impl AsRef<Path>, hashes: Vec<FileHash>) -> Self {
		Self {
			name: name.into(),
			version: version.into(),
			dependencies: Vec::new(),
			variant: DownloadVariant {
				url: format!("{}{}", FILE_SCHEME, archive.as_ref().display()),
				hashes,
			},
		}
	}

	pub fn with_dependencies(mut self, dependencies: impl IntoIterator<Item = impl Into<String>>) -> Self {
		self.dependencies = dependencies.into_iter().map(Into::into).collect();
		self
	}

	pub fn archive_path(&self) -> PathBuf {
		crate::acquire::local_path(&self.variant.url)
			.map(Path::to_path_buf)
			.unwrap_or_else(|| PathBuf::from(&self.variant.url))
	}

	pub fn variant(&self) -> &DownloadVariant {
		&self.variant
	}
}
