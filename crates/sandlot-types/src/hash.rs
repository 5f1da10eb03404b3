use crate::error::TypesError;
use std::fmt;
use std::str::FromStr;

/// 32-byte blake3 digest. Identifies blocks, transactions and storage slots.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Hash([u8; 32]);

impl Hash {
    pub const ZERO: Self = Self([0u8; 32]);
    pub const LEN: usize = 32;

    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn from_slice(slice: &[u8]) -> Result<Self, TypesError> {
        let bytes: [u8; 32] = slice
            .try_into()
            .map_err(|_| TypesError::InvalidHashLength(slice.len()))?;
        Ok(Self(bytes))
    }

    pub fn compute(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    /// Hash several fields, each prefixed with its length, so that
    /// `["ab", "c"]` and `["a", "bc"]` produce different digests.
    pub fn compute_framed(fields: &[&[u8]]) -> Self {
        let mut hasher = blake3::Hasher::new();
        for field in fields {
            hasher.update(&(field.len() as u64).to_le_bytes());
            hasher.update(field);
        }
        Self(*hasher.finalize().as_bytes())
    }

    pub fn is_zero(&self) -> bool {
        self == &Self::ZERO
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", self)
    }
}

impl FromStr for Hash {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s);
        let bytes = hex::decode(digits)?;
        Self::from_slice(&bytes)
    }
}

impl AsRef<[u8]> for Hash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_hash_compute_deterministic() {
        assert_eq!(Hash::compute(b"hello"), Hash::compute(b"hello"));
        assert_ne!(Hash::compute(b"hello"), Hash::compute(b"hello!"));
    }

    #[test]
    fn test_framed_hash_separates_fields() {
        let a = Hash::compute_framed(&[b"ab", b"c"]);
        let b = Hash::compute_framed(&[b"a", b"bc"]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_hash_hex_roundtrip() {
        let hash = Hash::compute(b"test");
        let parsed: Hash = hash.to_string().parse().unwrap();
        assert_eq!(hash, parsed);

        let bare: Hash = hash.to_hex().parse().unwrap();
        assert_eq!(hash, bare);
    }

    #[test]
    fn test_hash_bad_length() {
        assert_eq!("0x1234".parse::<Hash>(), Err(TypesError::InvalidHashLength(2)));
        assert!(matches!("zz".parse::<Hash>(), Err(TypesError::InvalidHex(_))));
    }

    proptest! {
        #[test]
        fn framed_split_points_never_collide(
            data in proptest::collection::vec(any::<u8>(), 2..64),
            a in 1usize..64,
            b in 1usize..64,
        ) {
            let a = a % data.len();
            let b = b % data.len();
            prop_assume!(a != b);
            let left = Hash::compute_framed(&[&data[..a], &data[a..]]);
            let right = Hash::compute_framed(&[&data[..b], &data[b..]]);
            prop_assert_ne!(left, right);
        }
    }
}
