//! Library error type.

pub type Result<T> = std::result::Result<T, Error>;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
	#[error("reqwest error: {0}")]
	Reqwest(#[from] reqwest::Error),
	#[error("IO error: {0}")]
	IO(#[from] std::io::Error),
	#[error("JSON error: {0}")]
	SerdeJSON(#[from] serde_json::Error),
	#[error("no config directory could be determined for this platform.")]
	ConfigDirMissing,
	#[error("game install directory is not set.")]
	InstallDirMissing,
	/// Raised when a platform specific step has no implementation for the running OS.
	#[error("unsupported platform.")]
	UnsupportedPlatform,
	#[error("mod not found in catalog: {0}")]
	NotFound(String),
	#[error("install error: {0}")]
	Install(crate::installer::InstallError),
}

impl From<crate::installer::InstallError> for Error {
	fn from(value: crate::installer::InstallError) -> Self {
		match value {
			crate::installer::InstallError::UnsupportedPlatform => Error::UnsupportedPlatform,
			e => Error::Install(e),
		}
	}
}
