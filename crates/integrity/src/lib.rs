//! Content digests for installation files.
//!
//! Digests are SHA-256, hex encoded, computed over fixed-size chunks so that
//! multi-gigabyte archives never have to fit in memory. A mismatch is an
//! ordinary `false`; only an unreadable file is an error.

use std::io::Read;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

/// Read buffer size used while hashing: 64 KiB.
pub const DIGEST_CHUNK_SIZE: usize = 64 * 1024;

/// Errors produced while hashing files.
#[derive(Debug, thiserror::Error)]
pub enum IntegrityError {
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl IntegrityError {
    /// Path of the file that could not be read.
    pub fn path(&self) -> &Path {
        match self {
            IntegrityError::Io { path, .. } => path,
        }
    }
}

/// Computes SHA-256 of `data` and returns the hex-encoded digest.
pub fn digest_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Computes SHA-256 of an entire file and returns the hex-encoded digest.
pub fn digest_file(path: &Path) -> Result<String, IntegrityError> {
    let io_err = |source| IntegrityError::Io {
        path: path.to_path_buf(),
        source,
    };

    let mut file = std::fs::File::open(path).map_err(io_err)?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; DIGEST_CHUNK_SIZE];
    loop {
        let n = match file.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(io_err(e)),
        };
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Returns `true` if the file at `path` has digest `expected`.
///
/// The comparison ignores hex case and surrounding whitespace.
pub fn verify_file(path: &Path, expected: &str) -> Result<bool, IntegrityError> {
    let actual = digest_file(path)?;
    let matched = digests_equal(&actual, expected);
    if !matched {
        tracing::debug!(
            path = %path.display(),
            expected = expected.trim(),
            actual = %actual,
            "digest mismatch"
        );
    }
    Ok(matched)
}

/// Compares two hex digests, ignoring case and surrounding whitespace.
pub fn digests_equal(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}
