use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Digest algorithms a manifest can be built with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum Algorithm {
    Sha1,
    #[default]
    Sha256,
    Sha384,
    Sha512,
    /// Triple-DES CBC-MAC under a fixed key. Only kept so older manifests still verify.
    MacTripleDes,
    Md5,
    Ripemd160,
}

impl Algorithm {
    /// Order in which manifest files are looked up when none is named.
    pub const SEARCH_ORDER: [Algorithm; 7] = [
        Algorithm::Sha1,
        Algorithm::Sha256,
        Algorithm::Sha384,
        Algorithm::Sha512,
        Algorithm::MacTripleDes,
        Algorithm::Md5,
        Algorithm::Ripemd160,
    ];

    /// Name as written in the manifest's `Algorithm` field.
    pub fn name(self) -> &'static str {
        match self {
            Algorithm::Sha1 => "SHA1",
            Algorithm::Sha256 => "SHA256",
            Algorithm::Sha384 => "SHA384",
            Algorithm::Sha512 => "SHA512",
            Algorithm::MacTripleDes => "MACTripleDES",
            Algorithm::Md5 => "MD5",
            Algorithm::Ripemd160 => "RIPEMD160",
        }
    }

    /// Manifest file extension, e.g. `release.sha256`.
    pub fn extension(self) -> String {
        self.name().to_ascii_lowercase()
    }

    pub fn digest_len(self) -> usize {
        match self {
            Algorithm::Sha1 | Algorithm::Ripemd160 => 20,
            Algorithm::Sha256 => 32,
            Algorithm::Sha384 => 48,
            Algorithm::Sha512 => 64,
            Algorithm::MacTripleDes => 8,
            Algorithm::Md5 => 16,
        }
    }

    pub fn hex_len(self) -> usize {
        self.digest_len() * 2
    }

    pub fn is_legacy(self) -> bool {
        matches!(self, Algorithm::MacTripleDes)
    }

    /// True when `hash` has the length and alphabet this algorithm produces.
    pub fn accepts_hex(self, hash: &str) -> bool {
        hash.len() == self.hex_len() && hash.bytes().all(|b| b.is_ascii_hexdigit())
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownAlgorithm(pub String);

impl fmt::Display for UnknownAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown algorithm {:?}", self.0)
    }
}

impl std::error::Error for UnknownAlgorithm {}

impl FromStr for Algorithm {
    type Err = UnknownAlgorithm;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let norm: String = s.trim().chars().filter(|c| *c != '-' && *c != '_').collect();
        Algorithm::SEARCH_ORDER
            .into_iter()
            .find(|a| a.name().eq_ignore_ascii_case(&norm))
            .ok_or_else(|| UnknownAlgorithm(s.to_string()))
    }
}

impl Serialize for Algorithm {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for Algorithm {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
