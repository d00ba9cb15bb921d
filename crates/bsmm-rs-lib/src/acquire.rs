//! Acquires the archive bytes for a download locator.

use std::path::Path;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Scheme of locators that name an archive on the local filesystem.
pub const FILE_SCHEME: &str = "file://";

/// The filesystem path of a [`FILE_SCHEME`] locator.
pub fn local_path(locator: &str) -> Option<&Path> {
	locator.strip_prefix(FILE_SCHEME).map(Path::new)
}

#[derive(Debug, thiserror::Error)]
pub enum AcquireError {
	#[error("reqwest error: {0}")]
	Reqwest(#[from] reqwest::Error),
	#[error("IO error: {0}")]
	IO(#[from] std::io::Error),
	/// The server answered with a non success status.
	#[error("server responded with status {0}.")]
	Status(u16),
	#[error("download cancelled.")]
	Cancelled,
}

/// Source of mod archives.
#[async_trait]
pub trait Acquire: Send + Sync {
	/// Fetches the whole archive behind `locator`.
	///
	/// Implementations should stop early with [`AcquireError::Cancelled`] once `cancel` fires.
	async fn acquire(&self, locator: &str, cancel: &CancellationToken) -> Result<Vec<u8>, AcquireError>;
}

/// Downloads archives over HTTP.
///
/// Catalog locators are paths relative to the catalog host. Only locators with the
/// [`FILE_SCHEME`] are read from the local filesystem.
#[derive(Debug, Clone)]
pub struct HttpAcquirer {
	client: reqwest::Client,
	base_url: String,
}

impl HttpAcquirer {
	pub fn new(config: &crate::Config) -> crate::Result<Self> {
		let client = reqwest::Client::builder()
			.https_only(config.https_only())
			.user_agent(concat!("bsmm-rs/", env!("CARGO_PKG_VERSION")))
			.build()?;

		Ok(Self::with_client(client, config.download_base_url()))
	}

	pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
		Self {
			client,
			base_url: base_url.into(),
		}
	}

	/// The URL to download `locator` from, `None` for local files.
	pub fn resolve_url(&self, locator: &str) -> Option<String> {
		local_path(locator).is_none().then(|| self.remote_url(locator))
	}

	fn remote_url(&self, locator: &str) -> String {
		if locator.starts_with("http://") || locator.starts_with("https://") {
			locator.to_string()
		} else {
			format!("{}/{}", self.base_url.trim_end_matches('/'), locator.trim_start_matches('/'))
		}
	}

	async fn download(&self, url: &str) -> Result<Vec<u8>, AcquireError> {
		let response = self.client.get(url).send().await?;
		let status = response.status();
		if !status.is_success() {
			return Err(AcquireError::Status(status.as_u16()));
		}
		Ok(response.bytes().await?.to_vec())
	}
}

#[async_trait]
impl Acquire for HttpAcquirer {
	async fn acquire(&self, locator: &str, cancel: &CancellationToken) -> Result<Vec<u8>, AcquireError> {
		let task = async {
			match local_path(locator) {
				Some(path) => {
					log::info!("Reading local archive {}", path.display());
					Ok(tokio::fs::read(path).await?)
				},
				None => {
					let url = self.remote_url(locator);
					log::info!("Downloading {}", url);
					self.download(&url).await
				},
			}
		};

		tokio::select! {
			_ = cancel.cancelled() => Err(AcquireError::Cancelled),
			result = task => result,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn acquirer() -> HttpAcquirer {
		HttpAcquirer::with_client(reqwest::Client::new(), "https://beatmods.com/")
	}

	#[test]
	fn catalog_paths_are_joined_to_the_base_url() {
		assert_eq!(acquirer().resolve_url("/uploads/abc/steam/SongCore.zip").as_deref(), Some("https://beatmods.com/uploads/abc/steam/SongCore.zip"));
	}

	#[test]
	fn absolute_urls_are_used_as_is() {
		assert_eq!(acquirer().resolve_url("https://example.com/a.zip").as_deref(), Some("https://example.com/a.zip"));
	}

	#[test]
	fn file_locators_are_local() {
		assert!(acquirer().resolve_url("file:///home/me/mods/Local.zip").is_none());
		assert_eq!(local_path("file:///home/me/mods/Local.zip"), Some(Path::new("/home/me/mods/Local.zip")));
		assert_eq!(local_path("/uploads/Local.zip"), None);
	}

	#[test]
	fn catalog_paths_are_remote_even_if_they_exist_locally() {
		let dir = tempfile::tempdir().unwrap();
		let archive = dir.path().join("SongCore.zip");
		std::fs::write(&archive, b"zip").unwrap();
		let locator = archive.to_string_lossy().into_owned();

		let url = acquirer().resolve_url(&locator).unwrap();
		assert!(url.starts_with("https://beatmods.com/"));
		assert!(url.ends_with("SongCore.zip"));
		assert_eq!(acquirer().resolve_url("uploads/a.zip").as_deref(), Some("https://beatmods.com/uploads/a.zip"));
	}
}
