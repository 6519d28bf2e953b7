//! File digests and digest algorithms

use crate::error::{Result, SigaError};
use base64::Engine;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha384, Sha512};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Digest algorithms the gateway may ask for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestAlgorithm {
    Sha256,
    Sha384,
    Sha512,
}

impl DigestAlgorithm {
    /// Raw digest of `data`
    pub fn digest(&self, data: &[u8]) -> Vec<u8> {
        match self {
            DigestAlgorithm::Sha256 => Sha256::digest(data).to_vec(),
            DigestAlgorithm::Sha384 => Sha384::digest(data).to_vec(),
            DigestAlgorithm::Sha512 => Sha512::digest(data).to_vec(),
        }
    }

    /// Base64 digest of `data`
    pub fn digest_base64(&self, data: &[u8]) -> String {
        base64::engine::general_purpose::STANDARD.encode(self.digest(data))
    }

    /// Digest length in bytes
    pub fn len_bytes(&self) -> usize {
        match self {
            DigestAlgorithm::Sha256 => 32,
            DigestAlgorithm::Sha384 => 48,
            DigestAlgorithm::Sha512 => 64,
        }
    }

    /// Guess the algorithm of a hex digest from its length
    ///
    /// Returns `None` unless `hash` is all hex digits and exactly as long as
    /// one of the supported digests.
    pub fn detect_hex(hash: &str) -> Option<Self> {
        if !hash.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        [Self::Sha256, Self::Sha384, Self::Sha512]
            .into_iter()
            .find(|alg| alg.len_bytes() * 2 == hash.len())
    }
}

impl FromStr for DigestAlgorithm {
    type Err = SigaError;

    /// Accepts `SHA256`, `SHA-256`, `sha256` and the 384/512 equivalents
    fn from_str(s: &str) -> Result<Self> {
        let normalized: String = s
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect::<String>()
            .to_ascii_uppercase();
        match normalized.as_str() {
            "SHA256" => Ok(DigestAlgorithm::Sha256),
            "SHA384" => Ok(DigestAlgorithm::Sha384),
            "SHA512" => Ok(DigestAlgorithm::Sha512),
            _ => Err(SigaError::UnsupportedDigest(s.to_string())),
        }
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DigestAlgorithm::Sha256 => "SHA256",
            DigestAlgorithm::Sha384 => "SHA384",
            DigestAlgorithm::Sha512 => "SHA512",
        };
        f.write_str(name)
    }
}

/// Wire shape of a data file when registering a hashcode container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HashcodeDataFile {
    pub file_name: String,
    pub file_hash_sha256: String,
    pub file_hash_sha512: String,
    pub file_size: u64,
}

/// One input file and its SHA-256/SHA-512 digests
///
/// Digests are computed once at construction. The content itself is not
/// kept; original bytes are read again from disk at assembly time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestFile {
    name: String,
    size: u64,
    sha256: String,
    sha512: String,
}

impl DigestFile {
    /// Digest `content` under the server-visible `name`
    pub fn new(name: impl Into<String>, size: u64, content: &[u8]) -> Self {
        Self {
            name: name.into(),
            size,
            sha256: DigestAlgorithm::Sha256.digest_base64(content),
            sha512: DigestAlgorithm::Sha512.digest_base64(content),
        }
    }

    /// Digest a file on disk, named after its file name
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                SigaError::Assembly(format!("path has no usable file name: {}", path.display()))
            })?;
        let content = std::fs::read(path)?;
        Ok(Self::new(name, content.len() as u64, &content))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Base64 SHA-256 digest
    pub fn sha256(&self) -> &str {
        &self.sha256
    }

    /// Base64 SHA-512 digest
    pub fn sha512(&self) -> &str {
        &self.sha512
    }

    /// Base64 digest for the given algorithm, if this file carries it
    pub fn digest_for(&self, algorithm: DigestAlgorithm) -> Option<&str> {
        match algorithm {
            DigestAlgorithm::Sha256 => Some(&self.sha256),
            DigestAlgorithm::Sha512 => Some(&self.sha512),
            DigestAlgorithm::Sha384 => None,
        }
    }

    /// Wire form used when creating a hashcode container
    pub fn convert(&self) -> HashcodeDataFile {
        HashcodeDataFile {
            file_name: self.name.clone(),
            file_hash_sha256: self.sha256.clone(),
            file_hash_sha512: self.sha512.clone(),
            file_size: self.size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_content_identical_digests() {
        let a = DigestFile::new("a.txt", 5, b"hello");
        let b = DigestFile::new("b.txt", 5, b"hello");
        assert_eq!(a.sha256(), b.sha256());
        assert_eq!(a.sha512(), b.sha512());
    }

    #[test]
    fn test_known_sha256() {
        let file = DigestFile::new("a.txt", 5, b"hello");
        // sha256("hello") = 2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824
        assert_eq!(file.sha256(), "LPJNul+wow4m6DsqxbninhsWHlwfp0JecwQzYpOLmCQ=");
        let raw = base64::engine::general_purpose::STANDARD
            .decode(file.sha512())
            .unwrap();
        assert_eq!(raw.len(), 64);
    }

    #[test]
    fn test_convert_wire_shape() {
        let file = DigestFile::new("a.txt", 5, b"hello");
        let json = serde_json::to_value(file.convert()).unwrap();
        assert_eq!(json["fileName"], "a.txt");
        assert_eq!(json["fileSize"], 5);
        assert_eq!(json["fileHashSha256"], file.sha256());
        assert_eq!(json["fileHashSha512"], file.sha512());
    }

    #[test]
    fn test_detect_hex() {
        let sha256 = hex::encode(DigestAlgorithm::Sha256.digest(b"hello"));
        let sha384 = hex::encode(DigestAlgorithm::Sha384.digest(b"hello"));
        let sha512 = hex::encode(DigestAlgorithm::Sha512.digest(b"hello")).to_uppercase();

        assert_eq!(DigestAlgorithm::detect_hex(&sha256), Some(DigestAlgorithm::Sha256));
        assert_eq!(DigestAlgorithm::detect_hex(&sha384), Some(DigestAlgorithm::Sha384));
        assert_eq!(DigestAlgorithm::detect_hex(&sha512), Some(DigestAlgorithm::Sha512));
        assert_eq!(DigestAlgorithm::detect_hex(&sha256[..62]), None);
        assert_eq!(DigestAlgorithm::detect_hex(&"g".repeat(64)), None);
        assert_eq!(DigestAlgorithm::detect_hex(""), None);
    }

    #[test]
    fn test_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.txt");
        std::fs::write(&path, b"hello").unwrap();

        let file = DigestFile::from_path(&path).unwrap();
        assert_eq!(file, DigestFile::new("doc.txt", 5, b"hello"));
    }

    #[test]
    fn test_parse_algorithm_names() {
        assert_eq!("SHA256".parse::<DigestAlgorithm>().unwrap(), DigestAlgorithm::Sha256);
        assert_eq!("SHA-384".parse::<DigestAlgorithm>().unwrap(), DigestAlgorithm::Sha384);
        assert_eq!("sha512".parse::<DigestAlgorithm>().unwrap(), DigestAlgorithm::Sha512);
        assert!(matches!(
            "MD5".parse::<DigestAlgorithm>(),
            Err(SigaError::UnsupportedDigest(_))
        ));
    }

    #[test]
    fn test_digest_lengths() {
        for alg in [DigestAlgorithm::Sha256, DigestAlgorithm::Sha384, DigestAlgorithm::Sha512] {
            assert_eq!(alg.digest(b"x").len(), alg.len_bytes());
        }
    }
}
