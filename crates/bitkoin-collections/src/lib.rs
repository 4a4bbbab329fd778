//! Non-fungible-token ledger with marketplace lifecycle extensions.
//!
//! Tokens progress from minted, to optionally approved, to bought (sold once,
//! never resellable), to claimed, or burned. This crate owns the
//! token/ownership state machine and its authorization policy:
//!
//! - **Store**: RocksDB-backed registries (config, tokens, balances, token
//!   and operator approvals, supply) addressed by column family. Every
//!   operation stages its writes in a single [`rocksdb::WriteBatch`] and
//!   commits atomically; a failed operation commits nothing.
//! - **Authorization cascade**: an ordered capability check (direct caller,
//!   per-token approval, per-operator approval, host-delegated authority)
//!   kept as a pure function in [`authorize`].
//! - **Lifecycle engine**: [`Collections`], generic over the host-provided
//!   [`AuthorityProvider`], [`EventSink`] and [`FungibleLedger`] seams.
//!
//! Execution is single-threaded and transactional per call; cross-call
//! serialization is the host's responsibility.

pub mod authorize;
mod engine;
mod error;
mod event;
mod host;
mod settings;
mod store;

pub use bitkoin_primitives::{
    Address, Config, RoyaltyEntry, Token, TokenId, ADDRESS_LEN, ROYALTY_BASIS_POINTS_MAX,
};
pub use engine::Collections;
pub use error::{Error, ErrorKind};
pub use event::Event;
pub use host::{AuthorityKind, AuthorityProvider, EventSink, FungibleLedger};
pub use settings::Settings;
pub use store::{CollectionsStore, TokenIterator};

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Column family names for RocksDB.
mod cf {
    /// Column family for the persisted contract configuration.
    /// Single record under [`super::keys::CONFIG`].
    pub const CONFIG: &str = "config";

    /// Column family for token records.
    /// Key: decimal token id bytes, value: bincode `Token`.
    pub const TOKENS: &str = "tokens";

    /// Column family for per-account balances.
    /// Key: address (25 bytes), value: u64 (little-endian).
    pub const BALANCES: &str = "balances";

    /// Column family for per-token approvals.
    /// Key: decimal token id bytes, value: approved address (25 bytes).
    pub const APPROVALS: &str = "approvals";

    /// Column family for per-(owner, operator) approvals.
    /// Key: owner || operator (50 bytes), value: 1-byte flag.
    pub const OPERATOR_APPROVALS: &str = "operator_approvals";

    /// Column family for metadata.
    /// Keys: "supply".
    pub const META: &str = "meta";
}

/// Fixed storage keys.
mod keys {
    pub const CONFIG: &[u8] = b"config";
    pub const SUPPLY: &[u8] = b"supply";
}
