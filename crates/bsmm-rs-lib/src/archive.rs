//! Downloaded mod archives.
//!
//! Archives are held in memory, verified against the catalog's [`FileHash`] list as a whole
//! and only then extracted.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use crate::catalog::FileHash;

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
	#[error("zip error: {0}")]
	Zip(#[from] zip::result::ZipError),
	#[error("IO error: {0}")]
	IO(#[from] std::io::Error),
	/// A declared file has no entry in the archive.
	#[error("archive has no entry for declared file {0}.")]
	MissingEntry(String),
	#[error("hash mismatch for {file}: expected {expected}, found {actual}.")]
	HashMismatch {
		file: String,
		expected: String,
		actual: String,
	},
}

pub struct ModArchive {
	inner: zip::ZipArchive<Cursor<Vec<u8>>>,
}

impl std::fmt::Debug for ModArchive {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ModArchive").field("entries", &self.inner.len()).finish()
	}
}

impl ModArchive {
	pub fn new(bytes: Vec<u8>) -> Result<Self, ArchiveError> {
		Ok(Self {
			inner: zip::ZipArchive::new(Cursor::new(bytes))?,
		})
	}

	pub fn len(&self) -> usize {
		self.inner.len()
	}

	pub fn is_empty(&self) -> bool {
		self.inner.len() == 0
	}

	/// Checks every declared file against the archive.
	///
	/// Verification is all or nothing, the first missing entry or mismatched digest fails the archive.
	pub fn verify(&mut self, hashes: &[FileHash]) -> Result<(), ArchiveError> {
		for hash in hashes {
			let entry = match self.inner.by_name(&hash.file) {
				Ok(entry) => entry,
				Err(zip::result::ZipError::FileNotFound) => return Err(ArchiveError::MissingEntry(hash.file.clone())),
				Err(e) => return Err(e.into()),
			};
			let actual = crate::hash::compute_digest(entry)?;
			if !crate::hash::digests_match(&actual, &hash.hash) {
				return Err(ArchiveError::HashMismatch {
					file: hash.file.clone(),
					expected: hash.hash.clone(),
					actual,
				});
			}
		}
		Ok(())
	}

	/// Extracts every entry under `destination`, overwriting existing files.
	///
	/// Returns the paths of the extracted files.
	/// Entries whose names would escape `destination` are skipped.
	pub fn extract(&mut self, destination: &Path) -> Result<Vec<PathBuf>, ArchiveError> {
		let mut extracted = Vec::with_capacity(self.inner.len());
		for i in 0..self.inner.len() {
			let mut entry = self.inner.by_index(i)?;
			let relative = match entry.enclosed_name() {
				Some(p) => p.to_path_buf(),
				None => {
					log::warn!("Skipping archive entry with unsafe path {}", entry.name());
					continue;
				}
			};
			let target = destination.join(relative);

			if entry.is_dir() {
				std::fs::create_dir_all(&target)?;
				continue;
			}

			if let Some(parent) = target.parent() {
				std::fs::create_dir_all(parent)?;
			}
			let mut file = std::fs::File::create(&target)?;
			std::io::copy(&mut entry, &mut file)?;
			extracted.push(target);
		}
		log::debug!("Extracted {} files to {}", extracted.len(), destination.display());
		Ok(extracted)
	}
}
