//! End-to-end lifecycle tests against a temp-dir-backed store.
//!
//! The host environment (authority oracle, event sink, fungible ledger) is
//! mocked in this file; the ledger under test is otherwise the real thing.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use bitkoin_collections::{
    Address, AuthorityKind, AuthorityProvider, Collections, CollectionsStore, Error, ErrorKind,
    Event, EventSink, FungibleLedger, RoyaltyEntry, Settings, TokenId, ADDRESS_LEN,
};
use tempfile::TempDir;

fn addr(tag: u8) -> Address {
    Address::new([tag; ADDRESS_LEN])
}

fn id(sequence: u64) -> TokenId {
    TokenId::from_sequence(sequence)
}

/// Scriptable host: a settable caller, a list of accounts the oracle vouches
/// for, a recording event sink and a fungible ledger that logs transfers and
/// succeeds or fails on demand.
#[derive(Default)]
struct MockHost {
    caller: Cell<Address>,
    authorized: RefCell<Vec<Address>>,
    probes: Cell<usize>,
    payment_ok: Cell<bool>,
    payments: RefCell<Vec<(Address, Address, u64)>>,
    events: RefCell<Vec<Event>>,
}

impl MockHost {
    fn set_caller(&self, account: Address) {
        self.caller.set(account);
    }

    fn authorize(&self, account: Address) {
        self.authorized.borrow_mut().push(account);
    }

    fn revoke(&self, account: &Address) {
        self.authorized.borrow_mut().retain(|a| a != account);
    }

    fn events(&self) -> Vec<Event> {
        self.events.borrow().clone()
    }

    fn probe_count(&self) -> usize {
        self.probes.get()
    }
}

impl AuthorityProvider for Rc<MockHost> {
    fn caller(&self) -> Address {
        self.caller.get()
    }

    fn check_authority(&self, _kind: AuthorityKind, account: &Address) -> bool {
        self.probes.set(self.probes.get() + 1);
        self.authorized.borrow().contains(account)
    }
}

impl EventSink for Rc<MockHost> {
    fn emit(&self, event: &Event) {
        self.events.borrow_mut().push(event.clone());
    }
}

impl FungibleLedger for Rc<MockHost> {
    fn transfer(&self, from: &Address, to: &Address, amount: u64) -> bool {
        self.payments.borrow_mut().push((*from, *to, amount));
        self.payment_ok.get()
    }
}

type Ledger = Collections<Rc<MockHost>, Rc<MockHost>, Rc<MockHost>>;

fn setup(settings: Settings) -> (Ledger, Rc<MockHost>, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let store = CollectionsStore::open(dir.path()).unwrap();
    let host = Rc::new(MockHost::default());
    let ledger = Collections::new(store, settings, host.clone(), host.clone(), host.clone());
    (ledger, host, dir)
}

/// Setup with the mint authority already granted and acting.
fn setup_minting() -> (Ledger, Rc<MockHost>, TempDir) {
    let (ledger, host, dir) = setup(Settings::default());
    let owner = ledger.settings().owner;
    host.authorize(owner);
    host.set_caller(owner);
    (ledger, host, dir)
}

#[test]
fn two_tier_mint_scenario() {
    let (ledger, host, _dir) = setup_minting();
    let owner = ledger.settings().owner;
    let large = ledger.settings().large_value;
    let standard = ledger.settings().standard_value;

    ledger.mint(3).unwrap();
    for sequence in 1..=3 {
        assert_eq!(ledger.bitkoin_value_of(&id(sequence)).unwrap(), large);
        assert_eq!(ledger.owner_of(&id(sequence)).unwrap(), Some(owner));
        assert!(!ledger.is_bought(&id(sequence)).unwrap());
    }
    assert_eq!(ledger.total_supply(), 3);

    ledger.mint(3).unwrap();
    for sequence in 4..=6 {
        assert_eq!(ledger.bitkoin_value_of(&id(sequence)).unwrap(), standard);
    }
    assert_eq!(ledger.total_supply(), 6);
    assert_eq!(ledger.balance_of(&owner).unwrap(), 6);
    assert!(ledger.store().verify_balances().unwrap());

    let mints: Vec<_> = host
        .events()
        .into_iter()
        .filter(|event| matches!(event, Event::Mint { .. }))
        .collect();
    assert_eq!(mints.len(), 6);
    for event in &mints {
        assert_eq!(event.name(), "collections.mint_event");
        assert_eq!(event.impacted(), vec![owner]);
    }
}

#[test]
fn mint_requires_authority() {
    let (ledger, host, _dir) = setup(Settings::default());

    let err = ledger.mint(1).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authorization);
    assert_eq!(ledger.total_supply(), 0);

    host.authorize(ledger.settings().owner);
    ledger.mint(1).unwrap();
    assert_eq!(ledger.total_supply(), 1);
}

#[test]
fn mint_respects_the_supply_cap() {
    let (ledger, _host, _dir) = setup_minting();

    let err = ledger.mint(11).unwrap_err();
    assert!(matches!(err, Error::SupplyOutOfBounds { new_supply: 11, .. }));
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(ledger.total_supply(), 0);

    ledger.mint(10).unwrap();
    assert_eq!(ledger.total_supply(), 10);

    let err = ledger.mint(1).unwrap_err();
    assert!(matches!(err, Error::SupplyOutOfBounds { new_supply: 11, .. }));
    // Supply only ever moves forward.
    assert_eq!(ledger.total_supply(), 10);
}

#[test]
fn mint_zero_at_genesis_is_out_of_bounds() {
    let (ledger, _host, _dir) = setup_minting();
    let err = ledger.mint(0).unwrap_err();
    assert!(matches!(err, Error::SupplyOutOfBounds { new_supply: 0, .. }));
}

#[test]
fn mint_respects_the_per_address_cap() {
    let settings = Settings {
        max_tokens_per_address: 5,
        ..Settings::default()
    };
    let (ledger, host, _dir) = setup(settings);
    host.authorize(ledger.settings().owner);

    let err = ledger.mint(5).unwrap_err();
    assert!(matches!(err, Error::AddressTokenLimit { balance: 5, limit: 5 }));
    assert_eq!(ledger.total_supply(), 0);

    ledger.mint(4).unwrap();
    assert_eq!(ledger.balance_of(&ledger.settings().owner).unwrap(), 4);

    let err = ledger.mint(1).unwrap_err();
    assert!(matches!(err, Error::AddressTokenLimit { balance: 5, limit: 5 }));
}

#[test]
fn mint_fee_is_collected_through_the_fungible_ledger() {
    let settings = Settings {
        mint_fee: true,
        mint_price: 100,
        payment_address: addr(9),
        ..Settings::default()
    };
    let (ledger, host, _dir) = setup(settings);
    host.payment_ok.set(true);

    // No oracle grant needed: the fee is the authorization.
    ledger.mint(3).unwrap();
    assert_eq!(ledger.total_supply(), 3);
    assert_eq!(
        *host.payments.borrow(),
        vec![(ledger.settings().owner, addr(9), 300)]
    );

    host.payment_ok.set(false);
    let err = ledger.mint(1).unwrap_err();
    assert!(matches!(err, Error::MintPaymentFailed));
    assert_eq!(err.kind(), ErrorKind::ExternalCall);
    assert_eq!(ledger.total_supply(), 3);
}

#[test]
fn transfer_marks_bought_and_blocks_resale() {
    let (ledger, host, _dir) = setup_minting();
    let owner = ledger.settings().owner;
    let alice = addr(10);
    let bob = addr(11);
    ledger.mint(2).unwrap();

    ledger.transfer(&owner, &alice, &id(1)).unwrap();
    assert_eq!(ledger.owner_of(&id(1)).unwrap(), Some(alice));
    assert!(ledger.is_bought(&id(1)).unwrap());
    assert_eq!(ledger.get_bought_by(&id(1)).unwrap(), Some(alice));
    assert_eq!(ledger.balance_of(&owner).unwrap(), 1);
    assert_eq!(ledger.balance_of(&alice).unwrap(), 1);

    // Alice legitimately owns the token now, and still cannot resell it.
    host.set_caller(alice);
    host.authorize(alice);
    let err = ledger.transfer(&alice, &bob, &id(1)).unwrap_err();
    assert!(matches!(err, Error::AlreadyBought(_)));
    assert_eq!(err.kind(), ErrorKind::Validation);

    assert!(ledger.store().verify_balances().unwrap());
}

#[test]
fn transfer_requires_the_sender_to_own_the_token() {
    let (ledger, _host, _dir) = setup_minting();
    ledger.mint(1).unwrap();

    let err = ledger.transfer(&addr(10), &addr(11), &id(1)).unwrap_err();
    assert!(matches!(err, Error::NotOwner(_)));
    assert_eq!(err.kind(), ErrorKind::Authorization);
}

#[test]
fn transfer_of_a_nonexistent_token_fails() {
    let (ledger, _host, _dir) = setup_minting();
    let err = ledger.transfer(&addr(10), &addr(11), &id(1)).unwrap_err();
    assert!(matches!(err, Error::TokenNotFound(_)));
}

#[test]
fn token_approval_authorizes_without_consulting_the_host() {
    let (ledger, host, _dir) = setup_minting();
    let owner = ledger.settings().owner;
    let bob = addr(11);
    let carol = addr(12);
    ledger.mint(2).unwrap();

    ledger.approve(&owner, &bob, &id(1)).unwrap();
    ledger.set_approval_for_all(&owner, &carol, true).unwrap();

    host.set_caller(bob);
    let probes_before = host.probe_count();
    ledger.transfer(&owner, &addr(13), &id(1)).unwrap();
    // Token approval decided it; neither the operator relation nor the host
    // oracle was consulted.
    assert_eq!(host.probe_count(), probes_before);
    assert_eq!(ledger.owner_of(&id(1)).unwrap(), Some(addr(13)));

    // The operator tier works for the second token.
    host.set_caller(carol);
    ledger.transfer(&owner, &addr(14), &id(2)).unwrap();
    assert_eq!(ledger.owner_of(&id(2)).unwrap(), Some(addr(14)));
}

#[test]
fn unrelated_caller_cannot_transfer() {
    let (ledger, host, _dir) = setup_minting();
    let owner = ledger.settings().owner;
    ledger.mint(1).unwrap();

    // The owner's oracle grant would let a stranger through the delegated
    // tier, so drop it after minting.
    host.revoke(&owner);
    host.set_caller(addr(66));
    let err = ledger.transfer(&owner, &addr(13), &id(1)).unwrap_err();
    assert!(matches!(err, Error::Unauthorized(_)));
    assert_eq!(err.kind(), ErrorKind::Authorization);

    // Delegated authority for the sender (e.g. a multisig member) is the
    // last tier of the cascade.
    host.authorize(owner);
    ledger.transfer(&owner, &addr(13), &id(1)).unwrap();
}

#[test]
fn transfer_clears_the_token_approval_but_not_operator_approvals() {
    let (ledger, host, _dir) = setup_minting();
    let owner = ledger.settings().owner;
    let bob = addr(11);
    let carol = addr(12);
    ledger.mint(1).unwrap();

    ledger.approve(&owner, &bob, &id(1)).unwrap();
    ledger.set_approval_for_all(&owner, &carol, true).unwrap();
    assert_eq!(ledger.get_approved(&id(1)).unwrap(), Some(bob));

    host.set_caller(owner);
    ledger.transfer(&owner, &addr(13), &id(1)).unwrap();

    assert_eq!(ledger.store().token_approval(&id(1)).unwrap(), None);
    assert!(ledger.is_approved_for_all(&owner, &carol).unwrap());
    // Once sold, the approval query refuses to answer at all.
    let err = ledger.get_approved(&id(1)).unwrap_err();
    assert!(matches!(err, Error::AlreadyBought(_)));
}

#[test]
fn approve_validations() {
    let (ledger, host, _dir) = setup_minting();
    let owner = ledger.settings().owner;
    let bob = addr(11);
    let carol = addr(12);
    ledger.mint(1).unwrap();

    let err = ledger.approve(&owner, &owner, &id(1)).unwrap_err();
    assert!(matches!(err, Error::ApprovalToOwner));

    let err = ledger.approve(&owner, &bob, &id(2)).unwrap_err();
    assert!(matches!(err, Error::TokenNotFound(_)));

    // A non-owner approver needs an operator grant from the owner.
    host.authorize(carol);
    let err = ledger.approve(&carol, &bob, &id(1)).unwrap_err();
    assert!(matches!(err, Error::Unauthorized(_)));

    ledger.set_approval_for_all(&owner, &carol, true).unwrap();
    ledger.approve(&carol, &bob, &id(1)).unwrap();
    assert_eq!(ledger.get_approved(&id(1)).unwrap(), Some(bob));
}

#[test]
fn operator_approval_to_self_is_rejected() {
    let (ledger, host, _dir) = setup(Settings::default());
    let alice = addr(10);

    let err = ledger.set_approval_for_all(&alice, &addr(11), true).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authorization);

    host.authorize(alice);
    let err = ledger.set_approval_for_all(&alice, &alice, true).unwrap_err();
    assert!(matches!(err, Error::SelfApproval));
    assert_eq!(err.kind(), ErrorKind::Validation);

    ledger.set_approval_for_all(&alice, &addr(11), true).unwrap();
    assert!(ledger.is_approved_for_all(&alice, &addr(11)).unwrap());
    ledger.set_approval_for_all(&alice, &addr(11), false).unwrap();
    assert!(!ledger.is_approved_for_all(&alice, &addr(11)).unwrap());
}

#[test]
fn burn_parks_the_token_on_the_sink() {
    let (ledger, host, _dir) = setup_minting();
    let owner = ledger.settings().owner;
    let sink = ledger.settings().claims_address;
    let alice = addr(10);
    ledger.mint(1).unwrap();
    ledger.transfer(&owner, &alice, &id(1)).unwrap();

    // A sold token can still receive a fresh (unusable) approval; burn must
    // clear it again.
    host.authorize(alice);
    ledger.approve(&alice, &addr(11), &id(1)).unwrap();

    host.set_caller(alice);
    ledger.burn(&id(1)).unwrap();

    assert_eq!(ledger.owner_of(&id(1)).unwrap(), Some(sink));
    assert!(ledger.is_bought(&id(1)).unwrap());
    assert_eq!(ledger.get_bought_by(&id(1)).unwrap(), Some(alice));
    assert_eq!(ledger.store().token_approval(&id(1)).unwrap(), None);
    assert_eq!(ledger.balance_of(&alice).unwrap(), 0);
    assert_eq!(ledger.balance_of(&sink).unwrap(), 1);
    assert!(ledger.store().verify_balances().unwrap());

    let burn = host
        .events()
        .into_iter()
        .find(|event| matches!(event, Event::Burn { .. }))
        .unwrap();
    assert_eq!(burn.impacted(), vec![sink, alice]);
}

#[test]
fn burn_of_an_unsold_token_trips_the_balance_guard() {
    let (ledger, host, _dir) = setup_minting();
    ledger.mint(1).unwrap();

    // Nobody has bought the token, so the buyer of record is the zero
    // placeholder. Even a caller the oracle vouches for cannot debit its
    // empty balance.
    let stranger = addr(66);
    host.authorize(stranger);
    host.set_caller(stranger);
    let err = ledger.burn(&id(1)).unwrap_err();
    assert!(matches!(err, Error::Arithmetic));
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(ledger.owner_of(&id(1)).unwrap(), Some(ledger.settings().owner));
}

#[test]
fn claim_is_one_shot_and_gated_on_the_claims_authority() {
    let (ledger, host, _dir) = setup_minting();
    let owner = ledger.settings().owner;
    let alice = addr(10);
    ledger.mint(1).unwrap();
    ledger.transfer(&owner, &alice, &id(1)).unwrap();

    let err = ledger.claim_tokens(&id(1)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authorization);
    assert!(!ledger.is_claimed(&id(1)).unwrap());

    host.authorize(ledger.settings().claims_address);
    ledger.claim_tokens(&id(1)).unwrap();
    assert!(ledger.is_claimed(&id(1)).unwrap());
    // Ownership and balances are untouched by a claim.
    assert_eq!(ledger.owner_of(&id(1)).unwrap(), Some(alice));
    assert_eq!(ledger.balance_of(&alice).unwrap(), 1);

    let err = ledger.claim_tokens(&id(1)).unwrap_err();
    assert!(matches!(err, Error::AlreadyClaimed(_)));
    assert_eq!(err.kind(), ErrorKind::Validation);

    let claim = host
        .events()
        .into_iter()
        .find(|event| matches!(event, Event::Claim { .. }))
        .unwrap();
    assert_eq!(claim.impacted(), vec![alice]);
}

#[test]
fn claim_after_burn_is_still_possible() {
    let (ledger, host, _dir) = setup_minting();
    let owner = ledger.settings().owner;
    let alice = addr(10);
    ledger.mint(1).unwrap();
    ledger.transfer(&owner, &alice, &id(1)).unwrap();

    host.set_caller(alice);
    ledger.burn(&id(1)).unwrap();

    // Burning neither sets nor gates the redemption flag.
    host.authorize(ledger.settings().claims_address);
    host.set_caller(owner);
    ledger.claim_tokens(&id(1)).unwrap();
    assert!(ledger.is_claimed(&id(1)).unwrap());
}

#[test]
fn royalty_table_is_capped_at_ten_thousand_basis_points() {
    let (ledger, host, _dir) = setup(Settings::default());
    host.authorize(ledger.settings().owner);

    let over = vec![
        RoyaltyEntry { address: addr(1), amount: 6_000 },
        RoyaltyEntry { address: addr(2), amount: 4_001 },
    ];
    let err = ledger.set_royalties(over).unwrap_err();
    assert!(matches!(err, Error::RoyaltiesExceedMax { total: 10_001, .. }));
    assert!(ledger.royalties().unwrap().is_empty());

    let exact = vec![
        RoyaltyEntry { address: addr(1), amount: 6_000 },
        RoyaltyEntry { address: addr(2), amount: 4_000 },
    ];
    ledger.set_royalties(exact.clone()).unwrap();
    assert_eq!(ledger.royalties().unwrap(), exact);

    let royalties_event = host
        .events()
        .into_iter()
        .find(|event| matches!(event, Event::RoyaltiesChanged { .. }))
        .unwrap();
    assert_eq!(royalties_event.impacted(), vec![addr(1), addr(2)]);
}

#[test]
fn ownership_transfer_moves_the_owner_gate() {
    let (ledger, host, _dir) = setup(Settings::default());
    let default_owner = ledger.settings().owner;
    let alice = addr(10);

    assert_eq!(ledger.owner().unwrap(), default_owner);

    host.authorize(default_owner);
    ledger.transfer_ownership(alice).unwrap();
    assert_eq!(ledger.owner().unwrap(), alice);

    let changed = host
        .events()
        .into_iter()
        .find(|event| matches!(event, Event::OwnerChanged { .. }))
        .unwrap();
    assert_eq!(changed.impacted(), vec![default_owner, alice]);

    // The old owner's grant no longer opens the gate.
    let err = ledger.set_royalties(vec![]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authorization);

    host.authorize(alice);
    ledger.set_royalties(vec![]).unwrap();
}

#[test]
fn balances_stay_consistent_over_a_mixed_lifecycle() {
    let (ledger, host, _dir) = setup_minting();
    let owner = ledger.settings().owner;
    let alice = addr(10);
    let bob = addr(11);

    ledger.mint(4).unwrap();
    ledger.transfer(&owner, &alice, &id(1)).unwrap();
    ledger.transfer(&owner, &bob, &id(2)).unwrap();

    host.set_caller(alice);
    ledger.burn(&id(1)).unwrap();

    assert_eq!(ledger.balance_of(&owner).unwrap(), 2);
    assert_eq!(ledger.balance_of(&alice).unwrap(), 0);
    assert_eq!(ledger.balance_of(&bob).unwrap(), 1);
    assert_eq!(ledger.balance_of(&ledger.settings().claims_address).unwrap(), 1);
    assert_eq!(ledger.total_supply(), 4);
    assert!(ledger.store().verify_balances().unwrap());
}
