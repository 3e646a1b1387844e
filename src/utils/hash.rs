//! Streaming file digests.

use crate::core::error::{Error, Result};
use crate::detection::signature::HashKind;
use md5::{Digest, Md5};
use sha2::Sha256;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

/// Buffer size for reading files (64KB).
const BUFFER_SIZE: usize = 64 * 1024;

/// Digests of one file's contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHashes {
    /// Lower-case hex MD5
    pub md5: String,
    /// Lower-case hex SHA-256
    pub sha256: String,
    /// Bytes consumed while hashing
    pub bytes_read: u64,
}

impl FileHashes {
    /// Digests in lookup order, each tagged with its algorithm.
    pub fn digests(&self) -> [(HashKind, &str); 2] {
        [
            (HashKind::Md5, self.md5.as_str()),
            (HashKind::Sha256, self.sha256.as_str()),
        ]
    }
}

/// Hash calculator for files.
pub struct HashCalculator;

impl HashCalculator {
    /// Calculate MD5 and SHA-256 of a file in a single pass.
    pub fn hash_file(path: &Path) -> Result<FileHashes> {
        let file = File::open(path).map_err(|e| Error::file_read(path, e))?;
        let reader = BufReader::with_capacity(BUFFER_SIZE, file);
        Self::hash_reader(reader).map_err(|e| Error::file_read(path, e))
    }

    /// Calculate MD5 and SHA-256 of everything `reader` yields.
    pub fn hash_reader<R: Read>(mut reader: R) -> io::Result<FileHashes> {
        let mut md5_hasher = Md5::new();
        let mut sha256_hasher = Sha256::new();
        let mut buffer = vec![0u8; BUFFER_SIZE];
        let mut total = 0u64;

        loop {
            let bytes_read = match reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            md5_hasher.update(&buffer[..bytes_read]);
            sha256_hasher.update(&buffer[..bytes_read]);
            total += bytes_read as u64;
        }

        Ok(FileHashes {
            md5: hex::encode(md5_hasher.finalize()),
            sha256: hex::encode(sha256_hasher.finalize()),
            bytes_read: total,
        })
    }

    /// Calculate SHA-256 of bytes.
    pub fn sha256_bytes(data: &[u8]) -> String {
        hex::encode(Sha256::digest(data))
    }

    /// Calculate MD5 of bytes.
    pub fn md5_bytes(data: &[u8]) -> String {
        hex::encode(Md5::digest(data))
    }
}
