//! The lifecycle engine: mint, approve, transfer, claim and burn, plus the
//! read-only queries, on top of the store and the host seams.
//!
//! Every operation validates first, stages all of its writes into one
//! [`WriteBatch`], commits atomically and only then emits events. A failed
//! operation leaves no trace in storage.

use crate::authorize;
use crate::host::{AuthorityKind, AuthorityProvider, EventSink, FungibleLedger};
use crate::{CollectionsStore, Error, Event, Result, Settings};
use bitkoin_primitives::{
    bitkoin_value_for, Address, Config, RoyaltyEntry, Token, TokenId, ROYALTY_BASIS_POINTS_MAX,
};
use rocksdb::WriteBatch;

/// The collections ledger, wired to a host environment.
pub struct Collections<A, E, P> {
    store: CollectionsStore,
    settings: Settings,
    authority: A,
    events: E,
    payments: P,
}

impl<A, E, P> Collections<A, E, P>
where
    A: AuthorityProvider,
    E: EventSink,
    P: FungibleLedger,
{
    pub fn new(
        store: CollectionsStore,
        settings: Settings,
        authority: A,
        events: E,
        payments: P,
    ) -> Self {
        Self {
            store,
            settings,
            authority,
            events,
            payments,
        }
    }

    pub fn store(&self) -> &CollectionsStore {
        &self.store
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    // --- Collection metadata.

    pub fn name(&self) -> &str {
        &self.settings.name
    }

    pub fn symbol(&self) -> &str {
        &self.settings.symbol
    }

    pub fn uri(&self) -> &str {
        &self.settings.uri
    }

    pub fn total_supply(&self) -> u64 {
        self.store.supply()
    }

    // --- Config store.

    pub fn config(&self) -> Result<Config> {
        self.store.config()
    }

    /// The effective contract owner: the persisted owner when set, else the
    /// compiled-in default.
    pub fn owner(&self) -> Result<Address> {
        Ok(self.effective_owner(&self.store.config()?))
    }

    pub fn royalties(&self) -> Result<Vec<RoyaltyEntry>> {
        Ok(self.store.config()?.royalties)
    }

    /// Hands the contract to `new_owner`. Requires authority as the current
    /// effective owner.
    pub fn transfer_ownership(&self, new_owner: Address) -> Result<()> {
        let mut config = self.store.config()?;
        let previous = self.effective_owner(&config);
        self.require_authority(AuthorityKind::ContractCall, &previous)?;

        config.owner = Some(new_owner);
        let mut batch = WriteBatch::default();
        self.store.stage_config(&mut batch, &config)?;
        self.store.commit(batch)?;

        tracing::debug!("Ownership transferred: {previous} -> {new_owner}");
        self.events.emit(&Event::OwnerChanged {
            previous,
            new_owner,
        });
        Ok(())
    }

    /// Replaces the whole royalty table. Requires authority as the effective
    /// owner; the amounts may not sum past the basis-point ceiling.
    pub fn set_royalties(&self, royalties: Vec<RoyaltyEntry>) -> Result<()> {
        let mut config = self.store.config()?;
        self.require_authority(AuthorityKind::ContractCall, &self.effective_owner(&config))?;

        let mut total: u64 = 0;
        for entry in &royalties {
            total = total.checked_add(entry.amount).ok_or(Error::Arithmetic)?;
        }
        if total > ROYALTY_BASIS_POINTS_MAX {
            return Err(Error::RoyaltiesExceedMax {
                total,
                max: ROYALTY_BASIS_POINTS_MAX,
            });
        }

        config.royalties = royalties.clone();
        let mut batch = WriteBatch::default();
        self.store.stage_config(&mut batch, &config)?;
        self.store.commit(batch)?;

        self.events.emit(&Event::RoyaltiesChanged { royalties });
        Ok(())
    }

    // --- Read-only queries. Absent records read as zero/empty/false.

    pub fn balance_of(&self, account: &Address) -> Result<u64> {
        self.store.balance_of(account)
    }

    pub fn owner_of(&self, token_id: &TokenId) -> Result<Option<Address>> {
        Ok(self.store.token(token_id)?.map(|token| token.owner))
    }

    pub fn get_bought_by(&self, token_id: &TokenId) -> Result<Option<Address>> {
        Ok(self.store.token(token_id)?.map(|token| token.bought_by))
    }

    pub fn is_bought(&self, token_id: &TokenId) -> Result<bool> {
        Ok(self
            .store
            .token(token_id)?
            .map(|token| token.bought)
            .unwrap_or(false))
    }

    pub fn is_claimed(&self, token_id: &TokenId) -> Result<bool> {
        Ok(self
            .store
            .token(token_id)?
            .map(|token| token.claimed)
            .unwrap_or(false))
    }

    pub fn bitkoin_value_of(&self, token_id: &TokenId) -> Result<u64> {
        Ok(self
            .store
            .token(token_id)?
            .map(|token| token.bitkoin_value)
            .unwrap_or(0))
    }

    pub fn is_approved_for_all(&self, owner: &Address, operator: &Address) -> Result<bool> {
        Ok(self
            .store
            .operator_approval(owner, operator)?
            .unwrap_or(false))
    }

    /// The live approval for a token.
    ///
    /// Unlike the other queries this fails outright once the token has been
    /// bought: resale tooling should stop polling approvals for sold tokens.
    pub fn get_approved(&self, token_id: &TokenId) -> Result<Option<Address>> {
        if let Some(token) = self.store.token(token_id)? {
            if token.bought {
                return Err(Error::AlreadyBought(*token_id));
            }
        }
        self.store.token_approval(token_id)
    }

    // --- Lifecycle operations.

    /// Mints `count` new tokens to the compiled-in recipient.
    ///
    /// With a mint fee configured the fee is collected through the fungible
    /// ledger; otherwise the caller must hold authority as the compiled-in
    /// owner (or as the contract itself when no owner is configured).
    pub fn mint(&self, count: u64) -> Result<()> {
        let to = self.settings.owner;
        let supply = self.store.supply();
        let balance = self.store.balance_of(&to)?;
        let new_supply = supply.checked_add(count).ok_or(Error::Arithmetic)?;

        if self.settings.mint_fee {
            let amount = count
                .checked_mul(self.settings.mint_price)
                .ok_or(Error::Arithmetic)?;
            if !self
                .payments
                .transfer(&to, &self.settings.payment_address, amount)
            {
                return Err(Error::MintPaymentFailed);
            }
        } else if !self.settings.owner.is_zero() {
            self.require_authority(AuthorityKind::ContractCall, &self.settings.owner)?;
        } else {
            self.require_authority(AuthorityKind::ContractCall, &self.settings.contract_id)?;
        }

        if new_supply == 0 || new_supply > self.settings.max_supply {
            return Err(Error::SupplyOutOfBounds {
                new_supply,
                max_supply: self.settings.max_supply,
            });
        }

        let new_balance = balance.checked_add(count).ok_or(Error::Arithmetic)?;
        if new_balance >= self.settings.max_tokens_per_address {
            return Err(Error::AddressTokenLimit {
                balance: new_balance,
                limit: self.settings.max_tokens_per_address,
            });
        }

        let mut batch = WriteBatch::default();
        let mut minted = Vec::with_capacity(count as usize);
        for sequence in supply + 1..=new_supply {
            let token_id = TokenId::from_sequence(sequence);
            let value = bitkoin_value_for(
                sequence,
                self.settings.large_value_supply,
                self.settings.large_value,
                self.settings.standard_value,
            );
            self.store
                .stage_token(&mut batch, &token_id, &Token::minted(to, value))?;
            minted.push(token_id);
        }
        self.store.stage_balance(&mut batch, &to, new_balance)?;
        self.store.stage_supply(&mut batch, new_supply)?;
        self.store.commit_with_supply(batch, new_supply)?;

        tracing::debug!("Minted {count} tokens to {to}, supply: {new_supply}");
        for token_id in minted {
            self.events.emit(&Event::Mint { to, token_id });
        }
        Ok(())
    }

    /// Grants `spender` the token's single outstanding approval on behalf of
    /// `approver`.
    ///
    /// A non-owner approver must itself hold an operator approval from the
    /// token's owner.
    pub fn approve(&self, approver: &Address, spender: &Address, token_id: &TokenId) -> Result<()> {
        self.require_authority(AuthorityKind::ContractCall, approver)?;

        let token = self
            .store
            .token(token_id)?
            .ok_or(Error::TokenNotFound(*token_id))?;

        if token.owner == *spender {
            return Err(Error::ApprovalToOwner);
        }

        if token.owner != *approver {
            let delegated = self
                .store
                .operator_approval(&token.owner, approver)?
                .unwrap_or(false);
            if !delegated {
                return Err(Error::Unauthorized(*approver));
            }
        }

        let mut batch = WriteBatch::default();
        self.store.stage_token_approval(&mut batch, token_id, spender)?;
        self.store.commit(batch)?;

        tracing::debug!("Token {token_id} approved for {spender}");
        self.events.emit(&Event::TokenApproval {
            approver: *approver,
            approved: *spender,
            token_id: *token_id,
        });
        Ok(())
    }

    /// Toggles the durable operator approval of `operator` by `approver`.
    pub fn set_approval_for_all(
        &self,
        approver: &Address,
        operator: &Address,
        approved: bool,
    ) -> Result<()> {
        self.require_authority(AuthorityKind::ContractCall, approver)?;

        if approver == operator {
            return Err(Error::SelfApproval);
        }

        let mut batch = WriteBatch::default();
        self.store
            .stage_operator_approval(&mut batch, approver, operator, approved)?;
        self.store.commit(batch)?;

        self.events.emit(&Event::OperatorApproval {
            approver: *approver,
            operator: *operator,
            approved,
        });
        Ok(())
    }

    /// Sells the token: moves it from `from` to `to` and marks it bought.
    ///
    /// This is the one allowed sale; once committed the token can never be
    /// transferred again. Callers other than `from` go through the
    /// authorization cascade.
    pub fn transfer(&self, from: &Address, to: &Address, token_id: &TokenId) -> Result<()> {
        let mut token = self
            .store
            .token(token_id)?
            .ok_or(Error::TokenNotFound(*token_id))?;

        if token.owner != *from {
            return Err(Error::NotOwner(*token_id));
        }
        if token.bought {
            return Err(Error::AlreadyBought(*token_id));
        }

        let caller = self.authority.caller();
        if caller != *from {
            let approval = self.store.token_approval(token_id)?;
            let operator = self
                .store
                .operator_approval(&token.owner, &caller)?
                .unwrap_or(false);
            let authorized = authorize::is_authorized(from, &caller, approval.as_ref(), operator, || {
                self.authority
                    .check_authority(AuthorityKind::ContractCall, from)
            });
            if !authorized {
                return Err(Error::Unauthorized(*from));
            }
        }

        token.owner = *to;
        token.bought = true;
        token.claimed = false;
        token.bought_by = *to;

        let mut batch = WriteBatch::default();
        self.store.stage_clear_token_approval(&mut batch, token_id)?;
        self.store.stage_token(&mut batch, token_id, &token)?;
        self.stage_balance_move(&mut batch, from, to)?;
        self.store.commit(batch)?;

        tracing::debug!("Transferred token {token_id}: {from} -> {to}");
        self.events.emit(&Event::Transfer {
            from: *from,
            to: *to,
            token_id: *token_id,
        });
        Ok(())
    }

    /// Sets the one-shot redemption flag. Requires authority as the
    /// designated claims address; ownership and balances are untouched.
    pub fn claim_tokens(&self, token_id: &TokenId) -> Result<()> {
        let mut token = self
            .store
            .token(token_id)?
            .ok_or(Error::TokenNotFound(*token_id))?;

        if token.claimed {
            return Err(Error::AlreadyClaimed(*token_id));
        }

        self.require_authority(AuthorityKind::ContractCall, &self.settings.claims_address)?;

        token.claimed = true;
        let bought_by = token.bought_by;

        let mut batch = WriteBatch::default();
        self.store.stage_token(&mut batch, token_id, &token)?;
        self.store.commit(batch)?;

        tracing::debug!("Claimed token {token_id} for {bought_by}");
        self.events.emit(&Event::Claim {
            bought_by,
            token_id: *token_id,
        });
        Ok(())
    }

    /// Parks the token on the burn sink address.
    ///
    /// The acted-as account is the buyer of record; callers other than it go
    /// through the authorization cascade (with the host probing the caller
    /// itself). `bought` and `claimed` are left as they are.
    pub fn burn(&self, token_id: &TokenId) -> Result<()> {
        let mut token = self
            .store
            .token(token_id)?
            .ok_or(Error::TokenNotFound(*token_id))?;

        let bought_by = token.bought_by;
        let caller = self.authority.caller();
        if caller != bought_by {
            let approval = self.store.token_approval(token_id)?;
            let operator = self
                .store
                .operator_approval(&token.owner, &caller)?
                .unwrap_or(false);
            let authorized =
                authorize::is_authorized(&bought_by, &caller, approval.as_ref(), operator, || {
                    self.authority
                        .check_authority(AuthorityKind::ContractCall, &caller)
                });
            if !authorized {
                return Err(Error::Unauthorized(bought_by));
            }
        }

        let sink = self.settings.claims_address;
        token.owner = sink;

        let mut batch = WriteBatch::default();
        self.store.stage_clear_token_approval(&mut batch, token_id)?;
        self.store.stage_token(&mut batch, token_id, &token)?;
        self.stage_balance_move(&mut batch, &bought_by, &sink)?;
        self.store.commit(batch)?;

        tracing::debug!("Burned token {token_id}, parked on {sink}");
        self.events.emit(&Event::Burn {
            from: bought_by,
            to: sink,
            token_id: *token_id,
        });
        Ok(())
    }

    // --- Helpers.

    /// Stage a one-token balance move. A self-move nets to zero and stages
    /// nothing, so the balance invariant survives degenerate calls.
    fn stage_balance_move(&self, batch: &mut WriteBatch, from: &Address, to: &Address) -> Result<()> {
        if from == to {
            // Still a debit followed by a credit: the debit must be possible.
            self.store
                .balance_of(from)?
                .checked_sub(1)
                .ok_or(Error::Arithmetic)?;
            return Ok(());
        }
        let debited = self
            .store
            .balance_of(from)?
            .checked_sub(1)
            .ok_or(Error::Arithmetic)?;
        let credited = self
            .store
            .balance_of(to)?
            .checked_add(1)
            .ok_or(Error::Arithmetic)?;
        self.store.stage_balance(batch, from, debited)?;
        self.store.stage_balance(batch, to, credited)?;
        Ok(())
    }

    fn effective_owner(&self, config: &Config) -> Address {
        config.owner.unwrap_or(self.settings.owner)
    }

    fn require_authority(&self, kind: AuthorityKind, account: &Address) -> Result<()> {
        if self.authority.check_authority(kind, account) {
            Ok(())
        } else {
            Err(Error::Unauthorized(*account))
        }
    }
}
