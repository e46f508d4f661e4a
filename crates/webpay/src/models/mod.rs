//! Domain models for webpay.
//!
//! Buyer records themselves live in `webpay_core`; this module holds what
//! the web layer keeps per client between requests.

pub mod session;

pub use session::{PinContext, keys as session_keys};
