use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Errors that can occur when parsing a signer address string.
#[derive(Debug, thiserror::Error)]
pub enum AddressError {
    #[error("address must start with '0x'")]
    InvalidPrefix,
    #[error("address must be {expected} characters, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
    #[error("address payload is not valid hexadecimal")]
    InvalidHex(#[from] hex::FromHexError),
}

/// Number of raw bytes contained in a signer address.
pub const ADDRESS_BYTES: usize = 20;
/// Expected string length of an encoded address (`0x` + 40 hex chars).
pub const ADDRESS_STRING_LENGTH: usize = 2 + ADDRESS_BYTES * 2;

/// Address authorised to sign on behalf of a validator.
///
/// The textual form is normalised to lowercase on parse so that
/// checksummed and plain spellings of the same account share one key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SignerAddress(String);

impl SignerAddress {
    /// Parse and normalise an address string.
    pub fn parse(value: &str) -> Result<Self, AddressError> {
        let value = value.trim();
        let payload = value
            .strip_prefix("0x")
            .or_else(|| value.strip_prefix("0X"))
            .ok_or(AddressError::InvalidPrefix)?;

        if value.len() != ADDRESS_STRING_LENGTH {
            return Err(AddressError::InvalidLength {
                expected: ADDRESS_STRING_LENGTH,
                actual: value.len(),
            });
        }

        let mut raw = [0u8; ADDRESS_BYTES];
        hex::decode_to_slice(payload, &mut raw)?;

        Ok(Self::from_bytes(&raw))
    }

    /// Build an address from raw bytes.
    pub fn from_bytes(bytes: &[u8; ADDRESS_BYTES]) -> Self {
        let mut encoded = String::with_capacity(ADDRESS_STRING_LENGTH);
        encoded.push_str("0x");
        encoded.push_str(&hex::encode(bytes));
        Self(encoded)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SignerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for SignerAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<SignerAddress> for String {
    fn from(value: SignerAddress) -> Self {
        value.0
    }
}

impl TryFrom<String> for SignerAddress {
    type Error = AddressError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}
