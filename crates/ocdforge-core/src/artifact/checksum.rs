use std::fs;
use std::io;
use std::path::Path;

use sha2::{Digest, Sha256};
use thiserror::Error;

/// One line of a `shasum -a 256` style sidecar file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChecksumEntry {
    pub digest: String,
    pub file_name: String,
}

impl ChecksumEntry {
    pub fn new(digest: String, file_name: String) -> Result<Self, ChecksumFormatError> {
        validate_digest(&digest)?;
        if file_name.trim().is_empty() {
            return Err(ChecksumFormatError::MissingPath);
        }
        Ok(Self { digest, file_name })
    }
}

pub fn sha256_file(path: &Path) -> io::Result<String> {
    let mut file = fs::File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

pub fn render_checksum_line(entry: &ChecksumEntry) -> String {
    format!("{}  {}\n", entry.digest, entry.file_name)
}

pub fn parse_checksum_file(contents: &str) -> Result<Vec<ChecksumEntry>, ChecksumFormatError> {
    let mut entries = Vec::new();
    for (idx, line) in contents.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let (digest, file_name) = trimmed
            .split_once(char::is_whitespace)
            .ok_or(ChecksumFormatError::InvalidLine(idx + 1))?;
        let file_name = file_name.trim_start().trim_start_matches('*');
        entries.push(ChecksumEntry::new(
            digest.to_string(),
            file_name.to_string(),
        )?);
    }
    Ok(entries)
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ChecksumFormatError {
    #[error("checksum line {0} is malformed")]
    InvalidLine(usize),
    #[error("invalid sha256 digest '{0}'")]
    InvalidDigest(String),
    #[error("checksum file name is missing")]
    MissingPath,
}

fn validate_digest(digest: &str) -> Result<(), ChecksumFormatError> {
    if digest.len() != 64 || !digest.chars().all(|ch| ch.is_ascii_hexdigit()) {
        return Err(ChecksumFormatError::InvalidDigest(digest.to_string()));
    }
    Ok(())
}
