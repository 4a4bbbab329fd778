//! The authorization cascade.
//!
//! Transfer and burn accept callers other than the acted-as account through
//! an ordered capability check. The decision is a pure function over the
//! already-looked-up approvals plus a lazy host probe, so it can be tested
//! without the storage or host layers.

use bitkoin_primitives::Address;

/// Decides whether `caller` may act as `acting_as`.
///
/// Tiers, short-circuiting on the first success:
/// 1. `caller` is `acting_as` itself;
/// 2. the token's live approval names `caller`;
/// 3. the owner-side operator approval for `caller` is set;
/// 4. the host oracle vouches for the probed account (`host_probe` — the call
///    site chooses which account the host is asked about).
///
/// The probe is only evaluated when every earlier tier failed.
pub fn is_authorized<F>(
    acting_as: &Address,
    caller: &Address,
    token_approval: Option<&Address>,
    operator_approved: bool,
    host_probe: F,
) -> bool
where
    F: FnOnce() -> bool,
{
    if caller == acting_as {
        return true;
    }
    if token_approval.is_some_and(|approved| approved == caller) {
        return true;
    }
    if operator_approved {
        return true;
    }
    host_probe()
}
