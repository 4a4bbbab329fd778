//! Error types for the collections ledger.

use bitkoin_primitives::{Address, TokenId};

/// Errors that can occur during ledger operations.
///
/// Every failure is terminal for the current call: nothing staged by the
/// failing operation reaches storage.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// RocksDB error.
    #[error("RocksDB error: {0}")]
    Rocksdb(#[from] rocksdb::Error),

    /// Bincode serialization/deserialization error.
    #[error("Bincode error: {0}")]
    Bincode(#[from] bincode::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Settings file could not be parsed.
    #[error("Settings error: {0}")]
    Settings(#[from] serde_json::Error),

    /// Storage not initialized.
    #[error("Storage not initialized")]
    NotInitialized,

    /// The referenced token does not exist.
    #[error("nonexistent token {0}")]
    TokenNotFound(TokenId),

    /// The token has completed its one allowed sale and can never be
    /// transferred again.
    #[error("token {0} already bought; it cannot be resold or transferred anymore")]
    AlreadyBought(TokenId),

    /// The redemption flag was already set for this token.
    #[error("tokens already claimed for {0} and cannot be claimed again")]
    AlreadyClaimed(TokenId),

    /// The royalty table sums past the basis-point ceiling.
    #[error("royalty total {total} exceeds the maximum of {max} basis points")]
    RoyaltiesExceedMax { total: u64, max: u64 },

    /// Minting would move the supply outside `1..=max_supply`.
    #[error("token id out of bounds: new supply {new_supply}, max supply {max_supply}")]
    SupplyOutOfBounds { new_supply: u64, max_supply: u64 },

    /// Minting would push the recipient past the per-address token cap.
    #[error("balance {balance} exceeds the limit of {limit} tokens per address")]
    AddressTokenLimit { balance: u64, limit: u64 },

    /// Approval naming the token's current owner as spender.
    #[error("approve to current owner")]
    ApprovalToOwner,

    /// Operator approval naming the approver itself as operator.
    #[error("operator approval to self")]
    SelfApproval,

    /// The token is not owned by the claimed sender.
    #[error("from is not an owner of token {0}")]
    NotOwner(TokenId),

    /// No tier of the authorization cascade accepted the caller.
    #[error("{0} has not authorized this operation")]
    Unauthorized(Address),

    /// The delegated fungible-token payment did not succeed.
    #[error("failed to pay mint")]
    MintPaymentFailed,

    /// Balance or supply arithmetic left the u64 range.
    #[error("arithmetic overflow or underflow in ledger update")]
    Arithmetic,
}

/// Coarse classification of [`Error`] variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Invalid request or broken domain invariant.
    Validation,
    /// Caller is not the owner/approver/operator and the host oracle did not
    /// vouch for it.
    Authorization,
    /// A delegated external call failed.
    ExternalCall,
    /// Fault in the persistence layer, not a domain failure.
    Storage,
}

impl Error {
    /// Classifies this error for callers that only branch on the kind.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Rocksdb(_) | Error::Bincode(_) | Error::Io(_) | Error::NotInitialized => {
                ErrorKind::Storage
            }
            Error::Settings(_)
            | Error::TokenNotFound(_)
            | Error::AlreadyBought(_)
            | Error::AlreadyClaimed(_)
            | Error::RoyaltiesExceedMax { .. }
            | Error::SupplyOutOfBounds { .. }
            | Error::AddressTokenLimit { .. }
            | Error::ApprovalToOwner
            | Error::SelfApproval
            | Error::Arithmetic => ErrorKind::Validation,
            Error::NotOwner(_) | Error::Unauthorized(_) => ErrorKind::Authorization,
            Error::MintPaymentFailed => ErrorKind::ExternalCall,
        }
    }
}
