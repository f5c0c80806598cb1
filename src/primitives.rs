use crate::Error;
use digest::Digest;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Sha256, Sha512};
use std::convert::TryInto;
use std::fmt;
use std::str::FromStr;

pub const ADDRESS_LENGTH: usize = 20;
pub const HASH_LENGTH: usize = 32;
pub const ELECTION_ID_LENGTH: usize = 16;

/// A principal identifier (a wallet address).
///
/// The all-zero address is never a valid input to any operation that takes
/// an address.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; ADDRESS_LENGTH]);

impl Address {
    pub const ZERO: Address = Address([0; ADDRESS_LENGTH]);

    pub fn new(bytes: [u8; ADDRESS_LENGTH]) -> Self {
        Address(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_LENGTH] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0; ADDRESS_LENGTH]
    }
}

/// A 32-byte hash value: Merkle roots and leaves, nullifiers, commitments,
/// and capability identifiers.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Hash256([u8; HASH_LENGTH]);

impl Hash256 {
    pub const ZERO: Hash256 = Hash256([0; HASH_LENGTH]);

    pub fn new(bytes: [u8; HASH_LENGTH]) -> Self {
        Hash256(bytes)
    }

    /// SHA-256 of the given bytes.
    pub fn digest(data: &[u8]) -> Self {
        Hash256(Sha256::digest(data).into())
    }

    pub fn as_bytes(&self) -> &[u8; HASH_LENGTH] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0; HASH_LENGTH]
    }
}

impl From<[u8; HASH_LENGTH]> for Hash256 {
    fn from(bytes: [u8; HASH_LENGTH]) -> Self {
        Hash256(bytes)
    }
}

/// The stable handle addressing one Election instance in the factory arena.
///
/// Derived deterministically from the university code and the per-university
/// proposal counter, so the same approved proposal always yields the same id.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElectionId([u8; ELECTION_ID_LENGTH]);

impl ElectionId {
    pub fn derive(university_code: &str, proposal_id: u64) -> Self {
        let mut hasher = Sha512::new();
        hasher.update(university_code.as_bytes());
        hasher.update(&proposal_id.to_be_bytes());
        let digest = hasher.finalize();

        let mut id = [0u8; ELECTION_ID_LENGTH];
        id.copy_from_slice(&digest[..ELECTION_ID_LENGTH]);
        ElectionId(id)
    }

    pub fn as_bytes(&self) -> &[u8; ELECTION_ID_LENGTH] {
        &self.0
    }
}

// Hex Display / FromStr / serde for the three identifier types.
// ----------------------------------

macro_rules! hex_identifier {
    ($name:ident, $len:expr) => {
        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "{}", hex::encode(&self.0))
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let bytes = hex::decode(s).map_err(|_| Error::IdentifierBadHex)?;
                if bytes.len() != $len {
                    return Err(Error::IdentifierBadLen);
                }

                // This unwrap is OK - we know the length is valid
                let bytes: [u8; $len] = bytes.as_slice().try_into().unwrap();
                Ok($name(bytes))
            }
        }

        impl Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: Serializer,
            {
                serializer.serialize_str(&self.to_string())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: Deserializer<'de>,
            {
                let s = String::deserialize(deserializer)?;
                FromStr::from_str(&s).map_err(de::Error::custom)
            }
        }
    };
}

hex_identifier!(Address, ADDRESS_LENGTH);
hex_identifier!(Hash256, HASH_LENGTH);
hex_identifier!(ElectionId, ELECTION_ID_LENGTH);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_round_trip() {
        let address = Address::new([7; ADDRESS_LENGTH]);
        let from_string = Address::from_str(&address.to_string()).unwrap();
        assert_eq!(address, from_string);

        let hash = Hash256::digest(b"some leaf");
        let from_string = Hash256::from_str(&hash.to_string()).unwrap();
        assert_eq!(hash, from_string);

        let id = ElectionId::derive("SU", 1);
        let from_string = ElectionId::from_str(&id.to_string()).unwrap();
        assert_eq!(id, from_string);
    }

    #[test]
    fn test_bad_identifiers() {
        assert!(matches!(
            Address::from_str("not hex"),
            Err(Error::IdentifierBadHex)
        ));
        assert!(matches!(
            Address::from_str("0011"),
            Err(Error::IdentifierBadLen)
        ));
        assert!(matches!(
            Hash256::from_str("00112233"),
            Err(Error::IdentifierBadLen)
        ));
    }

    #[test]
    fn test_zero_values() {
        assert!(Address::ZERO.is_zero());
        assert!(!Address::new([1; ADDRESS_LENGTH]).is_zero());
        assert!(Hash256::ZERO.is_zero());
        assert!(!Hash256::digest(b"x").is_zero());
    }

    #[test]
    fn test_election_id_derivation() {
        // Deterministic, and distinct across codes and counters
        assert_eq!(ElectionId::derive("SU", 1), ElectionId::derive("SU", 1));
        assert_ne!(ElectionId::derive("SU", 1), ElectionId::derive("SU", 2));
        assert_ne!(ElectionId::derive("SU", 1), ElectionId::derive("MIT", 1));
    }
}
