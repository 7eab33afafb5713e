//! Digest catalogue for the certificate-status store.
//!
//! The `HASH` column digest is configuration-driven; every supported
//! algorithm carries its OID, output width and a streaming hasher. Base64
//! output uses the standard alphabet with padding, matching the encoder the
//! historical databases were populated with.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use const_oid::ObjectIdentifier;
use digest::{Digest, DynDigest};

use crate::der::oids;

/// Supported digest algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAlgo {
    Sha1,
    Sha224,
    Sha256,
    Sha384,
    Sha512,
    Sha3_224,
    Sha3_256,
    Sha3_384,
    Sha3_512,
}

impl HashAlgo {
    pub const ALL: [HashAlgo; 9] = [
        HashAlgo::Sha1,
        HashAlgo::Sha224,
        HashAlgo::Sha256,
        HashAlgo::Sha384,
        HashAlgo::Sha512,
        HashAlgo::Sha3_224,
        HashAlgo::Sha3_256,
        HashAlgo::Sha3_384,
        HashAlgo::Sha3_512,
    ];

    pub fn oid(&self) -> ObjectIdentifier {
        match self {
            HashAlgo::Sha1 => oids::SHA1,
            HashAlgo::Sha224 => oids::SHA224,
            HashAlgo::Sha256 => oids::SHA256,
            HashAlgo::Sha384 => oids::SHA384,
            HashAlgo::Sha512 => oids::SHA512,
            HashAlgo::Sha3_224 => oids::SHA3_224,
            HashAlgo::Sha3_256 => oids::SHA3_256,
            HashAlgo::Sha3_384 => oids::SHA3_384,
            HashAlgo::Sha3_512 => oids::SHA3_512,
        }
    }

    /// Encoded OID content octets, for DER assembly.
    pub fn oid_der(&self) -> &'static [u8] {
        match self {
            HashAlgo::Sha1 => oids::SHA1.as_bytes(),
            HashAlgo::Sha224 => oids::SHA224.as_bytes(),
            HashAlgo::Sha256 => oids::SHA256.as_bytes(),
            HashAlgo::Sha384 => oids::SHA384.as_bytes(),
            HashAlgo::Sha512 => oids::SHA512.as_bytes(),
            HashAlgo::Sha3_224 => oids::SHA3_224.as_bytes(),
            HashAlgo::Sha3_256 => oids::SHA3_256.as_bytes(),
            HashAlgo::Sha3_384 => oids::SHA3_384.as_bytes(),
            HashAlgo::Sha3_512 => oids::SHA3_512.as_bytes(),
        }
    }

    /// Digest output length in bytes.
    pub fn len(&self) -> usize {
        match self {
            HashAlgo::Sha1 => 20,
            HashAlgo::Sha224 | HashAlgo::Sha3_224 => 28,
            HashAlgo::Sha256 | HashAlgo::Sha3_256 => 32,
            HashAlgo::Sha384 | HashAlgo::Sha3_384 => 48,
            HashAlgo::Sha512 | HashAlgo::Sha3_512 => 64,
        }
    }

    /// Streaming hasher for this algorithm.
    pub fn hasher(&self) -> Box<dyn DynDigest> {
        match self {
            HashAlgo::Sha1 => Box::new(sha1::Sha1::new()),
            HashAlgo::Sha224 => Box::new(sha2::Sha224::new()),
            HashAlgo::Sha256 => Box::new(sha2::Sha256::new()),
            HashAlgo::Sha384 => Box::new(sha2::Sha384::new()),
            HashAlgo::Sha512 => Box::new(sha2::Sha512::new()),
            HashAlgo::Sha3_224 => Box::new(sha3::Sha3_224::new()),
            HashAlgo::Sha3_256 => Box::new(sha3::Sha3_256::new()),
            HashAlgo::Sha3_384 => Box::new(sha3::Sha3_384::new()),
            HashAlgo::Sha3_512 => Box::new(sha3::Sha3_512::new()),
        }
    }

    /// One-shot digest.
    pub fn digest(&self, data: &[u8]) -> Vec<u8> {
        let mut hasher = self.hasher();
        hasher.update(data);
        hasher.finalize_reset().to_vec()
    }

    /// One-shot digest encoded as standard base64 with padding.
    pub fn base64_hash(&self, data: &[u8]) -> String {
        BASE64.encode(self.digest(data))
    }

    /// Parse a configuration spelling (`SHA256`, `SHA-256`, `SHA3-256`, ...).
    pub fn from_name(name: &str) -> Option<HashAlgo> {
        let normalized: String = name
            .trim()
            .chars()
            .filter(|c| !matches!(c, '-' | '_'))
            .collect::<String>()
            .to_ascii_uppercase();
        match normalized.as_str() {
            "SHA1" => Some(HashAlgo::Sha1),
            "SHA224" => Some(HashAlgo::Sha224),
            "SHA256" => Some(HashAlgo::Sha256),
            "SHA384" => Some(HashAlgo::Sha384),
            "SHA512" => Some(HashAlgo::Sha512),
            "SHA3224" => Some(HashAlgo::Sha3_224),
            "SHA3256" => Some(HashAlgo::Sha3_256),
            "SHA3384" => Some(HashAlgo::Sha3_384),
            "SHA3512" => Some(HashAlgo::Sha3_512),
            _ => None,
        }
    }

    pub(crate) fn index(&self) -> usize {
        Self::ALL.iter().position(|a| a == self).unwrap_or(0)
    }
}

impl std::fmt::Display for HashAlgo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            HashAlgo::Sha1 => "SHA1",
            HashAlgo::Sha224 => "SHA224",
            HashAlgo::Sha256 => "SHA256",
            HashAlgo::Sha384 => "SHA384",
            HashAlgo::Sha512 => "SHA512",
            HashAlgo::Sha3_224 => "SHA3-224",
            HashAlgo::Sha3_256 => "SHA3-256",
            HashAlgo::Sha3_384 => "SHA3-384",
            HashAlgo::Sha3_512 => "SHA3-512",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_lengths_match_catalogue() {
        for algo in HashAlgo::ALL {
            assert_eq!(algo.digest(b"abc").len(), algo.len(), "{algo}");
        }
    }

    #[test]
    fn sha256_known_vector() {
        let digest = HashAlgo::Sha256.digest(b"abc");
        assert_eq!(
            hex::encode(digest),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn base64_uses_standard_alphabet_with_padding() {
        // SHA-1("") = da39..., 20 bytes -> 28 base64 chars ending in '='.
        let b64 = HashAlgo::Sha1.base64_hash(b"");
        assert_eq!(b64, "2jmj7l5rSw0yVb/vlWAYkK/YBwk=");
    }

    #[test]
    fn streaming_hasher_equals_one_shot() {
        let mut hasher = HashAlgo::Sha3_256.hasher();
        hasher.update(b"hello ");
        hasher.update(b"world");
        let streamed = hasher.finalize_reset().to_vec();
        assert_eq!(streamed, HashAlgo::Sha3_256.digest(b"hello world"));
    }

    #[test]
    fn name_parsing_accepts_common_spellings() {
        assert_eq!(HashAlgo::from_name("SHA256"), Some(HashAlgo::Sha256));
        assert_eq!(HashAlgo::from_name("sha-256"), Some(HashAlgo::Sha256));
        assert_eq!(HashAlgo::from_name("SHA3-512"), Some(HashAlgo::Sha3_512));
        assert_eq!(HashAlgo::from_name("sha3_224"), Some(HashAlgo::Sha3_224));
        assert_eq!(HashAlgo::from_name("md5"), None);
    }

    #[test]
    fn display_round_trips_through_from_name() {
        for algo in HashAlgo::ALL {
            assert_eq!(HashAlgo::from_name(&algo.to_string()), Some(algo));
        }
    }
}
