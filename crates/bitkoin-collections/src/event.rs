//! Domain events emitted after successful state mutations.

use bitkoin_primitives::{Address, RoyaltyEntry, TokenId};

/// A committed ledger mutation, in the form handed to the host's event sink.
///
/// Events are emitted strictly after the storage commit, so a sink never
/// observes an event for a mutation that was rolled back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Mint {
        to: Address,
        token_id: TokenId,
    },
    Transfer {
        from: Address,
        to: Address,
        token_id: TokenId,
    },
    Burn {
        from: Address,
        to: Address,
        token_id: TokenId,
    },
    Claim {
        bought_by: Address,
        token_id: TokenId,
    },
    TokenApproval {
        approver: Address,
        approved: Address,
        token_id: TokenId,
    },
    OperatorApproval {
        approver: Address,
        operator: Address,
        approved: bool,
    },
    OwnerChanged {
        previous: Address,
        new_owner: Address,
    },
    RoyaltiesChanged {
        royalties: Vec<RoyaltyEntry>,
    },
}

impl Event {
    /// Stable event name, as published to the host.
    pub fn name(&self) -> &'static str {
        match self {
            Event::Mint { .. } => "collections.mint_event",
            Event::Transfer { .. } => "collections.transfer_event",
            Event::Burn { .. } => "collections.burn_event",
            Event::Claim { .. } => "collections.claim_event",
            Event::TokenApproval { .. } => "collections.token_approval_event",
            Event::OperatorApproval { .. } => "collections.operator_approval_event",
            Event::OwnerChanged { .. } => "collections.owner_event",
            Event::RoyaltiesChanged { .. } => "collections.royalties_event",
        }
    }

    /// Accounts impacted by this event.
    pub fn impacted(&self) -> Vec<Address> {
        match self {
            Event::Mint { to, .. } => vec![*to],
            Event::Transfer { from, to, .. } => vec![*to, *from],
            Event::Burn { from, to, .. } => vec![*to, *from],
            Event::Claim { bought_by, .. } => vec![*bought_by],
            Event::TokenApproval {
                approver, approved, ..
            } => vec![*approved, *approver],
            Event::OperatorApproval {
                approver, operator, ..
            } => vec![*operator, *approver],
            Event::OwnerChanged {
                previous,
                new_owner,
            } => vec![*previous, *new_owner],
            Event::RoyaltiesChanged { royalties } => {
                royalties.iter().map(|entry| entry.address).collect()
            }
        }
    }
}
