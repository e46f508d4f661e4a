//! Session-related types.
//!
//! Types stored in the session for the identity and PIN flow.

use webpay_core::{BuyerLookup, Identity};

/// Per-request view of the verified buyer.
///
/// Built from the session by [`RequireIdentity`](crate::middleware::RequireIdentity)
/// and threaded through each PIN transition, which may update the cached
/// flags. Handlers write the flags back with
/// [`save_pin_context`](crate::middleware::save_pin_context).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinContext {
    /// The verified buyer identity.
    pub identity: Identity,
    /// Cached: the buyer has a PIN.
    pub has_pin: bool,
    /// Cached: the buyer must reset their PIN before paying.
    pub needs_pin_reset: bool,
}

impl PinContext {
    /// Context for a freshly verified identity with no knowledge of the buyer.
    #[must_use]
    pub const fn new(identity: Identity) -> Self {
        Self {
            identity,
            has_pin: false,
            needs_pin_reset: false,
        }
    }

    /// Context with flags taken from a buyer lookup.
    #[must_use]
    pub const fn from_lookup(identity: Identity, lookup: &BuyerLookup) -> Self {
        Self {
            identity,
            has_pin: lookup.has_pin(),
            needs_pin_reset: lookup.needs_pin_reset(),
        }
    }
}

/// Session keys for identity and PIN state.
pub mod keys {
    /// Key for the verified buyer identity.
    pub const IDENTITY: &str = "identity";

    /// Key for the cached has-PIN flag.
    pub const HAS_PIN: &str = "has_pin";

    /// Key for the cached needs-PIN-reset flag.
    pub const NEEDS_PIN_RESET: &str = "needs_pin_reset";
}
