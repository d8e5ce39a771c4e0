use std::fmt::{Display, Formatter};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::str::FromStr;

use anyhow::{bail, Context, Error};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

/// Length of a SHA256 hash in hex characters.
pub(crate) const SHA256_HEXLEN: usize = 64;

/// Size of the reads when hashing a file.
pub(crate) const READ_BUFFER_SIZE: usize = 80 * 1024;

/// The SHA256 hash of a submit file, as the server records it in the slot JSON.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Sha256Digest {
    /// The raw hash.
    hash: [u8; 32],
}

impl Sha256Digest {
    /// Compute the digest of a file on disk, streaming its content.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Sha256Digest, Error> {
        let path = path.as_ref();
        let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
        let mut hasher = Sha256::new();
        std::io::copy(&mut BufReader::with_capacity(READ_BUFFER_SIZE, file), &mut hasher)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let digest = Sha256Digest {
            hash: hasher.finalize().into(),
        };
        debug!("SHA256 of {} is {}", path.display(), digest);
        Ok(digest)
    }

    /// Compute the digest of an in-memory content.
    pub fn from_content(content: &[u8]) -> Sha256Digest {
        Sha256Digest {
            hash: Sha256::digest(content).into(),
        }
    }
}

impl Display for Sha256Digest {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&hex::encode(self.hash))
    }
}

impl std::fmt::Debug for Sha256Digest {
    fn fmt(&self, f: &mut Formatter) -> Result<(), std::fmt::Error> {
        f.write_str(&self.to_string())
    }
}

impl FromStr for Sha256Digest {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != SHA256_HEXLEN {
            bail!(
                "Invalid SHA256 {:?}: expecting {} hex characters, found {}",
                s,
                SHA256_HEXLEN,
                s.len()
            );
        }
        let mut hash = [0u8; 32];
        hex::decode_to_slice(s.to_ascii_lowercase(), &mut hash)
            .with_context(|| format!("Invalid SHA256 {:?}", s))?;
        Ok(Sha256Digest { hash })
    }
}

impl Serialize for Sha256Digest {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Sha256Digest {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde::de::Error;
        let data = String::deserialize(deserializer)?;
        data.parse().map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use pretty_assertions::{assert_eq, assert_ne};
    use tempfile::TempDir;

    use super::*;

    /// `printf 'hello world' | sha256sum`
    const HELLO_WORLD: &str = "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";

    fn fake_file(path: &Path, content: &[u8]) {
        File::create(path).unwrap().write_all(content).unwrap();
    }

    #[test]
    fn test_from_content() {
        let digest = Sha256Digest::from_content(b"hello world");
        assert_eq!(digest.to_string(), HELLO_WORLD);
    }

    #[test]
    fn test_from_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("file");
        fake_file(&path, b"hello world");
        let digest = Sha256Digest::from_file(&path).unwrap();
        assert_eq!(digest, Sha256Digest::from_content(b"hello world"));
    }

    #[test]
    fn test_from_big_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("file");
        // a few full reads and a partial one
        let content: Vec<u8> = (0..3 * READ_BUFFER_SIZE + 17)
            .map(|i| (i % 251) as u8)
            .collect();
        fake_file(&path, &content);
        let digest = Sha256Digest::from_file(&path).unwrap();
        assert_eq!(digest, Sha256Digest::from_content(&content));
    }

    #[test]
    fn test_from_file_missing() {
        let tmp = TempDir::new().unwrap();
        assert!(Sha256Digest::from_file(tmp.path().join("nope")).is_err());
    }

    #[test]
    fn test_parse() {
        let digest: Sha256Digest = HELLO_WORLD.parse().unwrap();
        assert_eq!(digest.to_string(), HELLO_WORLD);
        let upper: Sha256Digest = HELLO_WORLD.to_uppercase().parse().unwrap();
        assert_eq!(upper, digest);
        assert_ne!(digest, Sha256Digest::from_content(b"ciao"));
    }

    #[test]
    fn test_parse_invalid() {
        assert!("abc".parse::<Sha256Digest>().is_err());
        assert!(HELLO_WORLD.replace('b', "x").parse::<Sha256Digest>().is_err());
        assert!(format!("{}00", HELLO_WORLD).parse::<Sha256Digest>().is_err());
    }
}
