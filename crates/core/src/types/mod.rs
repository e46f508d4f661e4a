//! Core types for webpay.
//!
//! This module provides type-safe wrappers for the PIN flow domain.

pub mod buyer;
pub mod identity;
pub mod pin;

pub use buyer::{Buyer, BuyerLookup, FieldErrors, OperationResult, PinCheck};
pub use identity::{Identity, IdentityError};
pub use pin::{Pin, PinError};
