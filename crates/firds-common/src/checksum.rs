//! SHA-256 digests for local files

use crate::error::Result;
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::Path;

const READ_CHUNK: usize = 64 * 1024;

/// Hex-encoded SHA-256 of a file, read in fixed-size chunks.
pub fn compute_file_checksum(path: impl AsRef<Path>) -> Result<String> {
    let mut file = std::fs::File::open(path)?;
    compute_checksum(&mut file)
}

/// Hex-encoded SHA-256 of any readable source.
pub fn compute_checksum<R: Read>(reader: &mut R) -> Result<String> {
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; READ_CHUNK];

    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};

    const HELLO_WORLD_SHA256: &str =
        "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";

    #[test]
    fn test_compute_checksum() {
        let mut cursor = Cursor::new(b"hello world");
        assert_eq!(compute_checksum(&mut cursor).unwrap(), HELLO_WORLD_SHA256);
    }

    #[test]
    fn test_compute_checksum_larger_than_chunk() {
        let data = vec![b'a'; READ_CHUNK * 2 + 17];
        let expected = hex::encode(Sha256::digest(&data));
        let mut cursor = Cursor::new(data);
        assert_eq!(compute_checksum(&mut cursor).unwrap(), expected);
    }

    #[test]
    fn test_compute_file_checksum() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"hello world").unwrap();
        file.flush().unwrap();

        assert_eq!(compute_file_checksum(file.path()).unwrap(), HELLO_WORLD_SHA256);
    }

    #[test]
    fn test_compute_file_checksum_missing_file() {
        assert!(compute_file_checksum("/nonexistent/table.csv").is_err());
    }
}
