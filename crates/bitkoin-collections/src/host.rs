//! Interfaces to the host environment.
//!
//! The ledger never talks to the outside world directly; authorization
//! probes, event emission and fungible-token payments all go through these
//! seams. Production hosts wire them to the real environment, tests supply
//! mocks.

use crate::event::Event;
use bitkoin_primitives::Address;

/// The action class an authority probe is asked about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorityKind {
    /// Calling into the contract.
    ContractCall,
    /// Uploading or replacing contract code.
    ContractUpload,
    /// Applying a whole transaction.
    TransactionApplication,
}

/// Host-provided authority oracle.
pub trait AuthorityProvider {
    /// Identity of the account making the current call.
    fn caller(&self) -> Address;

    /// Whether the current call is authorized to act as `account` for the
    /// given action kind. Covers multi-signature and delegated-signing
    /// accounts recognized only by the host.
    fn check_authority(&self, kind: AuthorityKind, account: &Address) -> bool;
}

/// Host-provided event transport. Fire-and-forget; the ledger never reads
/// events back.
pub trait EventSink {
    fn emit(&self, event: &Event);
}

/// A separate fungible-token ledger, consulted only while collecting mint
/// fees.
pub trait FungibleLedger {
    /// Moves `amount` from `from` to `to`, returning whether the transfer
    /// succeeded.
    fn transfer(&self, from: &Address, to: &Address, amount: u64) -> bool;
}
