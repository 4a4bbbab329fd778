//! Compiled-in contract settings.

use crate::Result;
use bitkoin_primitives::Address;
use hex_literal::hex;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// The shipped default owner; also the mint recipient.
const DEFAULT_OWNER: Address = Address::new(hex!(
    "005a3f8e12bd4077c19a5504e62b8fd3106c79ae42d8015b9c"
));

/// The claims authority, doubling as the burn sink address.
const DEFAULT_CLAIMS_ADDRESS: Address = Address::new(hex!(
    "008c41d97e2a60b35f14c88e07d16a42f9305bde71ac24680f"
));

/// The contract's own account.
const DEFAULT_CONTRACT_ID: Address = Address::new(hex!(
    "0017e5b08d4af263c91b7a5e30dd8f6421c05a97eb3d12c480"
));

/// Contract-wide constants: collection metadata, designated addresses, supply
/// caps, the two-tier valuation table and the mint fee knobs.
///
/// Threaded through the lifecycle engine as an explicit dependency; nothing
/// reads these ambiently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Collection name.
    pub name: String,
    /// Collection symbol.
    pub symbol: String,
    /// Metadata base URI.
    pub uri: String,
    /// Compiled-in owner address; mint destination and the effective owner
    /// while no ownership transfer has been persisted. Zero means unset, in
    /// which case fee-less minting requires the contract's own authority.
    pub owner: Address,
    /// The designated downstream redemption authority; burned tokens are
    /// also parked on this address.
    pub claims_address: Address,
    /// The contract's own account.
    pub contract_id: Address,
    /// Highest token id that may ever be minted.
    pub max_supply: u64,
    /// Ids up to and including this sequence number take `large_value`.
    pub large_value_supply: u64,
    /// Valuation of the large tier.
    pub large_value: u64,
    /// Valuation of the standard tier.
    pub standard_value: u64,
    /// A mint fails when it would leave the recipient holding this many
    /// tokens or more.
    pub max_tokens_per_address: u64,
    /// Whether minting collects a fee through the fungible ledger.
    pub mint_fee: bool,
    /// Fee per token minted.
    pub mint_price: u64,
    /// Destination of collected mint fees.
    pub payment_address: Address,
    /// Identity of the fungible-token ledger used for fee collection.
    pub payment_token: Address,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            name: "Bitkoin NFT".to_string(),
            symbol: "BTK".to_string(),
            uri: "https://bafybeiaiw3amn4wgyavmppxhgvlhebdpwgmxluuiwp57rat7v2qzda7ssm.ipfs.nftstorage.link/".to_string(),
            owner: DEFAULT_OWNER,
            claims_address: DEFAULT_CLAIMS_ADDRESS,
            contract_id: DEFAULT_CONTRACT_ID,
            max_supply: 10,
            large_value_supply: 3,
            large_value: 25_000_000_000_000,
            standard_value: 5_000_000_000_000,
            max_tokens_per_address: 201,
            mint_fee: false,
            mint_price: 0,
            payment_address: Address::ZERO,
            payment_token: Address::ZERO,
        }
    }
}

impl Settings {
    /// Reads settings from a JSON file; missing fields fall back to the
    /// shipped defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }
}
