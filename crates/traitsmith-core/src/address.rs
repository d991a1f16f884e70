//! # Content Addresser
//!
//! Self-describing content addresses for finished artifacts.
//!
//! An address is a multihash (`varint(code) ‖ varint(len) ‖ digest`)
//! rendered in base-58. With the default sha2-256 algorithm this is the
//! familiar `Qm…` key used by IPFS-style pinning services.
//!
//! Addressing is a pure function of the input bytes: no I/O, no state.

#[cfg(feature = "blake3")]
use crate::primitives::MULTIHASH_BLAKE3;
use crate::primitives::{DIGEST_LEN, MULTIHASH_SHA2_256};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use unsigned_varint as varint;

/// Malformed content address.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("Invalid base58: {0}")]
    Base58(String),

    #[error("Truncated multihash")]
    Truncated,

    #[error("Malformed varint: {0}")]
    Varint(String),

    #[error("Unsupported multihash code 0x{0:x}")]
    UnknownAlgorithm(u64),

    #[error("Digest length {actual} does not match expected {expected}")]
    DigestLength { expected: usize, actual: usize },

    #[error("Unknown hash algorithm '{0}'")]
    UnknownName(String),
}

// =============================================================================
// HASH ALGORITHM
// =============================================================================

/// Supported digest functions.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub enum HashAlgorithm {
    #[default]
    #[serde(rename = "sha2-256")]
    Sha2_256,
    #[cfg(feature = "blake3")]
    #[serde(rename = "blake3")]
    Blake3,
}

impl HashAlgorithm {
    /// Multihash code.
    #[must_use]
    pub fn code(self) -> u64 {
        match self {
            Self::Sha2_256 => MULTIHASH_SHA2_256,
            #[cfg(feature = "blake3")]
            Self::Blake3 => MULTIHASH_BLAKE3,
        }
    }

    /// Multihash table name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Sha2_256 => "sha2-256",
            #[cfg(feature = "blake3")]
            Self::Blake3 => "blake3",
        }
    }

    /// Look up an algorithm by multihash code.
    pub fn from_code(code: u64) -> Result<Self, AddressError> {
        match code {
            MULTIHASH_SHA2_256 => Ok(Self::Sha2_256),
            #[cfg(feature = "blake3")]
            MULTIHASH_BLAKE3 => Ok(Self::Blake3),
            other => Err(AddressError::UnknownAlgorithm(other)),
        }
    }

    fn digest(self, bytes: &[u8]) -> [u8; DIGEST_LEN] {
        let mut out = [0u8; DIGEST_LEN];
        match self {
            Self::Sha2_256 => out.copy_from_slice(&Sha256::digest(bytes)),
            #[cfg(feature = "blake3")]
            Self::Blake3 => out.copy_from_slice(blake3::hash(bytes).as_bytes()),
        }
        out
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HashAlgorithm {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sha2-256" | "sha256" => Ok(Self::Sha2_256),
            #[cfg(feature = "blake3")]
            "blake3" => Ok(Self::Blake3),
            other => Err(AddressError::UnknownName(other.to_string())),
        }
    }
}

// =============================================================================
// CONTENT ADDRESS
// =============================================================================

/// Algorithm tag plus digest. Renders as base-58 multihash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct ContentAddress {
    algorithm: HashAlgorithm,
    digest: [u8; DIGEST_LEN],
}

impl ContentAddress {
    #[must_use]
    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    #[must_use]
    pub fn digest(&self) -> &[u8; DIGEST_LEN] {
        &self.digest
    }

    /// Binary multihash form.
    #[must_use]
    pub fn to_multihash(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(DIGEST_LEN + 4);
        let mut buf = varint::encode::u64_buffer();
        out.extend_from_slice(varint::encode::u64(self.algorithm.code(), &mut buf));
        out.extend_from_slice(varint::encode::u64(DIGEST_LEN as u64, &mut buf));
        out.extend_from_slice(&self.digest);
        out
    }

    /// Parse a binary multihash, validating code and digest length.
    pub fn from_multihash(bytes: &[u8]) -> Result<Self, AddressError> {
        let (code, rest) = varint::decode::u64(bytes).map_err(varint_error)?;
        let algorithm = HashAlgorithm::from_code(code)?;
        let (len, digest) = varint::decode::u64(rest).map_err(varint_error)?;
        if len != DIGEST_LEN as u64 || digest.len() != DIGEST_LEN {
            return Err(AddressError::DigestLength {
                expected: DIGEST_LEN,
                actual: digest.len(),
            });
        }
        let mut out = [0u8; DIGEST_LEN];
        out.copy_from_slice(digest);
        Ok(Self {
            algorithm,
            digest: out,
        })
    }
}

impl fmt::Display for ContentAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&bs58::encode(self.to_multihash()).into_string())
    }
}

impl FromStr for ContentAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|e| AddressError::Base58(e.to_string()))?;
        Self::from_multihash(&bytes)
    }
}

impl From<ContentAddress> for String {
    fn from(address: ContentAddress) -> Self {
        address.to_string()
    }
}

impl TryFrom<String> for ContentAddress {
    type Error = AddressError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

fn varint_error(err: varint::decode::Error) -> AddressError {
    match err {
        varint::decode::Error::Insufficient => AddressError::Truncated,
        other => AddressError::Varint(other.to_string()),
    }
}

// =============================================================================
// ADDRESSER
// =============================================================================

/// Computes content addresses with a fixed algorithm.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContentAddresser {
    algorithm: HashAlgorithm,
}

impl ContentAddresser {
    #[must_use]
    pub fn new(algorithm: HashAlgorithm) -> Self {
        Self { algorithm }
    }

    #[must_use]
    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// Address the exact byte sequence `bytes`.
    #[must_use]
    pub fn address(&self, bytes: &[u8]) -> ContentAddress {
        ContentAddress {
            algorithm: self.algorithm,
            digest: self.algorithm.digest(bytes),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
