//! Content digests used to verify downloaded archives.
//!
//! The catalog publishes MD5 digests as hex strings.

use std::io::Read;

use md5::{Digest, Md5};

/// Computes the hex encoded digest of everything readable from `reader`.
///
/// # Errors
/// Only IO errors from `reader`, these are never verification failures.
pub fn compute_digest(mut reader: impl Read) -> std::io::Result<String> {
	let mut hasher = Md5::new();
	let mut buf = [0u8; 8192];
	loop {
		let n = match reader.read(&mut buf) {
			Ok(0) => break,
			Ok(n) => n,
			Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
			Err(e) => return Err(e),
		};
		hasher.update(&buf[..n]);
	}
	Ok(hex::encode(hasher.finalize()))
}

pub fn compute_digest_bytes(bytes: &[u8]) -> String {
	hex::encode(Md5::digest(bytes))
}

/// Hex case differs between catalog sources so it is ignored.
pub fn digests_match(actual: &str, expected: &str) -> bool {
	actual.eq_ignore_ascii_case(expected.trim())
}

/// Digest of the file at `path`, `None` when it does not exist.
pub fn digest_file(path: &std::path::Path) -> std::io::Result<Option<String>> {
	match std::fs::File::open(path) {
		Ok(f) => compute_digest(std::io::BufReader::new(f)).map(Some),
		Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
		Err(e) => Err(e),
	}
}
