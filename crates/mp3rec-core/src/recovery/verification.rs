/// SHA-256 comparison of a recovered copy against its source
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::RecoveryError;

/// Hex SHA-256 of a file, read in 8 KiB chunks
pub fn calculate_file_hash(path: impl AsRef<Path>) -> io::Result<String> {
    let mut file = File::open(path.as_ref())?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0; 8192];
    loop {
        let n = file.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Hex SHA-256 of an in-memory buffer
pub fn calculate_hash(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Check that `dest` holds exactly the bytes of `src`.
///
/// Returns the shared hash on success.
pub fn verify_copy(src: &Path, dest: &Path) -> Result<String, RecoveryError> {
    let expected = calculate_file_hash(src).map_err(|source| RecoveryError::FileOpen {
        path: src.to_path_buf(),
        source,
    })?;
    let actual = calculate_file_hash(dest).map_err(|source| RecoveryError::FileOpen {
        path: dest.to_path_buf(),
        source,
    })?;

    if expected != actual {
        return Err(RecoveryError::Verification {
            dest: dest.to_path_buf(),
            expected,
            actual,
        });
    }
    Ok(actual)
}
