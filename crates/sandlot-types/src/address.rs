use crate::error::TypesError;
use std::fmt;
use std::str::FromStr;

/// What an address points at.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AddressKind {
    /// Externally owned account (keypair)
    Account,
    /// Deployed contract
    Contract,
}

impl AddressKind {
    /// Tag byte stored in front of the address payload.
    pub const fn tag(self) -> u8 {
        match self {
            AddressKind::Account => 0x57,
            AddressKind::Contract => 0x58,
        }
    }

    pub fn from_tag(tag: u8) -> Result<Self, TypesError> {
        match tag {
            0x57 => Ok(AddressKind::Account),
            0x58 => Ok(AddressKind::Contract),
            other => Err(TypesError::UnknownAddressKind(other)),
        }
    }
}

/// 21-byte address: one kind tag followed by a 20-byte payload.
/// Display format: Bech32m with "sbx" human-readable prefix.
///
/// # Derivation
/// `payload = blake3(seed)[0..20]`
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address([u8; 21]);

impl Address {
    pub const LEN: usize = 21;

    /// Bech32m human-readable prefix
    pub const BECH32_HRP: &'static str = "sbx";

    pub const fn new(kind: AddressKind, payload: [u8; 20]) -> Self {
        let mut bytes = [0u8; 21];
        bytes[0] = kind.tag();
        let mut i = 0;
        while i < 20 {
            bytes[i + 1] = payload[i];
            i += 1;
        }
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; 21] {
        &self.0
    }

    /// Create from a byte slice. The first byte must be a known kind tag.
    pub fn from_slice(slice: &[u8]) -> Result<Self, TypesError> {
        if slice.len() != Self::LEN {
            return Err(TypesError::InvalidAddressLength(slice.len()));
        }
        AddressKind::from_tag(slice[0])?;
        let mut bytes = [0u8; 21];
        bytes.copy_from_slice(slice);
        Ok(Self(bytes))
    }

    /// Derive an address of the given kind from arbitrary seed bytes.
    /// Uses blake3 hash, takes first 20 bytes.
    pub fn derive(kind: AddressKind, seed: &[u8]) -> Self {
        let hash = blake3::hash(seed);
        let mut payload = [0u8; 20];
        payload.copy_from_slice(&hash.as_bytes()[..20]);
        Self::new(kind, payload)
    }

    pub fn kind(&self) -> AddressKind {
        // Constructors only admit known tags.
        if self.0[0] == AddressKind::Contract.tag() {
            AddressKind::Contract
        } else {
            AddressKind::Account
        }
    }

    pub fn is_contract(&self) -> bool {
        self.kind() == AddressKind::Contract
    }

    pub fn payload(&self) -> &[u8] {
        &self.0[1..]
    }

    /// Convert to hex string without 0x prefix
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hrp = bech32::Hrp::parse_unchecked(Self::BECH32_HRP);
        match bech32::encode::<bech32::Bech32m>(hrp, &self.0) {
            Ok(encoded) => write!(f, "{}", encoded),
            Err(_) => Err(fmt::Error),
        }
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address(0x{})", hex::encode(self.0))
    }
}

impl fmt::LowerHex for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for Address {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Support both Bech32m ("sbx1...") and hex ("0x...")
        if s.starts_with("sbx1") {
            let (hrp, data) = bech32::decode(s).map_err(|e| TypesError::Bech32Error(e.to_string()))?;

            let expected_hrp = bech32::Hrp::parse_unchecked(Self::BECH32_HRP);
            if hrp != expected_hrp {
                return Err(TypesError::InvalidAddressFormat(format!(
                    "Invalid HRP: expected '{}', got '{}'",
                    Self::BECH32_HRP,
                    hrp
                )));
            }

            Self::from_slice(&data)
        } else if let Some(hex_part) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            let bytes = hex::decode(hex_part)?;
            Self::from_slice(&bytes)
        } else {
            Err(TypesError::InvalidAddressFormat(s.to_string()))
        }
    }
}

impl AsRef<[u8]> for Address {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}
