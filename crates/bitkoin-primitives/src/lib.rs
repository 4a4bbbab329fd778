//! Core types shared across the Bitkoin collections ledger.

use serde::de::{Error as DeError, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Royalty amounts are expressed in basis points; a royalty table may not
/// exceed this total.
pub const ROYALTY_BASIS_POINTS_MAX: u64 = 10_000;

/// Length in bytes of an account address.
pub const ADDRESS_LEN: usize = 25;

/// An opaque fixed-format account address.
///
/// Addresses are compared and stored as raw bytes; the human-readable form is
/// lowercase hex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; ADDRESS_LEN]);

impl Address {
    /// The all-zero address, used as the "nobody" placeholder before a token
    /// has a buyer of record.
    pub const ZERO: Address = Address([0u8; ADDRESS_LEN]);

    pub const fn new(bytes: [u8; ADDRESS_LEN]) -> Self {
        Self(bytes)
    }

    /// Parse an address from a byte slice, returning `None` on length
    /// mismatch.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let bytes: [u8; ADDRESS_LEN] = bytes.try_into().ok()?;
        Some(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }
}

impl Default for Address {
    fn default() -> Self {
        Self::ZERO
    }
}

impl AsRef<[u8]> for Address {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl FromStr for Address {
    type Err = InvalidAddress;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|_| InvalidAddress)?;
        Self::from_slice(&bytes).ok_or(InvalidAddress)
    }
}

// Human-readable formats carry addresses as hex strings, binary formats as
// raw bytes.
impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&hex::encode(self.0))
        } else {
            serializer.serialize_bytes(&self.0)
        }
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct AddressVisitor;

        impl<'de> Visitor<'de> for AddressVisitor {
            type Value = Address;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "a {ADDRESS_LEN}-byte account address")
            }

            fn visit_str<E: DeError>(self, v: &str) -> Result<Address, E> {
                let bytes = hex::decode(v).map_err(E::custom)?;
                Address::from_slice(&bytes)
                    .ok_or_else(|| E::custom(format!("address must be {ADDRESS_LEN} bytes")))
            }

            fn visit_bytes<E: DeError>(self, v: &[u8]) -> Result<Address, E> {
                Address::from_slice(v)
                    .ok_or_else(|| E::custom(format!("address must be {ADDRESS_LEN} bytes")))
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Address, A::Error> {
                let mut bytes = [0u8; ADDRESS_LEN];
                for (i, byte) in bytes.iter_mut().enumerate() {
                    *byte = seq
                        .next_element()?
                        .ok_or_else(|| DeError::invalid_length(i, &self))?;
                }
                Ok(Address(bytes))
            }
        }

        if deserializer.is_human_readable() {
            deserializer.deserialize_str(AddressVisitor)
        } else {
            deserializer.deserialize_bytes(AddressVisitor)
        }
    }
}

/// Error returned when parsing a malformed address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidAddress;

impl fmt::Display for InvalidAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("invalid account address")
    }
}

impl std::error::Error for InvalidAddress {}

/// Token identifier, assigned sequentially at mint time.
///
/// The canonical external form is the decimal string of the mint sequence
/// number, exchanged as bytes; internally the sequence number itself is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TokenId(u64);

impl TokenId {
    pub const fn from_sequence(sequence: u64) -> Self {
        Self(sequence)
    }

    pub const fn sequence(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TokenId {
    type Err = InvalidTokenId;

    // Only canonical decimal strings are accepted: no empty input, no
    // leading zeros, no non-digit bytes.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || (s.len() > 1 && s.starts_with('0')) {
            return Err(InvalidTokenId);
        }
        if !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(InvalidTokenId);
        }
        s.parse::<u64>().map(TokenId).map_err(|_| InvalidTokenId)
    }
}

/// Error returned when parsing a malformed token id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidTokenId;

impl fmt::Display for InvalidTokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("invalid token id")
    }
}

impl std::error::Error for InvalidTokenId {}

/// Per-token ledger record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// Current owner of the token.
    pub owner: Address,
    /// Whether the token has completed its one allowed sale.
    pub bought: bool,
    /// Whether the external redemption flag has been set.
    pub claimed: bool,
    /// The buyer of record, zero until the first sale.
    pub bought_by: Address,
    /// Fixed valuation assigned at mint time.
    pub bitkoin_value: u64,
}

impl Token {
    /// A freshly minted token: unsold, unclaimed, no buyer of record.
    pub fn minted(owner: Address, bitkoin_value: u64) -> Self {
        Self {
            owner,
            bought: false,
            claimed: false,
            bought_by: Address::ZERO,
            bitkoin_value,
        }
    }
}

/// One entry of the royalty table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoyaltyEntry {
    pub address: Address,
    /// Royalty share in basis points.
    pub amount: u64,
}

/// Persisted contract configuration.
///
/// `owner` is `None` until ownership has been transferred at least once; the
/// effective owner then falls back to the compiled-in default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub owner: Option<Address>,
    pub royalties: Vec<RoyaltyEntry>,
}

/// Returns the valuation for the token minted at `sequence`.
///
/// The first `large_supply` tokens take the large value, every later token
/// the standard value.
pub fn bitkoin_value_for(
    sequence: u64,
    large_supply: u64,
    large_value: u64,
    standard_value: u64,
) -> u64 {
    if sequence <= large_supply {
        large_value
    } else {
        standard_value
    }
}
