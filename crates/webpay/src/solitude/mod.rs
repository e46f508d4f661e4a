//! Solitude account service client.
//!
//! # Architecture
//!
//! - Solitude owns buyers and their PINs - NO local copy, direct API calls
//! - Handlers and the PIN state machine talk to [`AccountService`], so tests
//!   can swap the HTTP client for an in-memory fake
//! - Field-level rejections come back as [`OperationResult::ValidationFailed`],
//!   never as an error; [`SolitudeError`] is reserved for transport and
//!   protocol failures
//!
//! # Example
//!
//! ```rust,ignore
//! use webpay::solitude::{AccountService, SolitudeClient};
//!
//! let client = SolitudeClient::new(&config.solitude)?;
//!
//! match client.get_buyer(&identity).await? {
//!     BuyerLookup::NotFound => client.create_buyer(&identity, &pin).await?,
//!     BuyerLookup::Found(buyer) => client.change_pin(&buyer, &pin).await?,
//! };
//! ```

mod client;
pub mod errors;
#[cfg(test)]
pub mod fake;

pub use client::SolitudeClient;
pub use errors::error_string;

use std::future::Future;

use thiserror::Error;
use webpay_core::{Buyer, BuyerLookup, Identity, OperationResult, Pin, PinCheck};

/// Boxed future returned by [`AccountService`] methods.
pub type BoxFuture<'a, T> = std::pin::Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Errors that can occur when interacting with the solitude API.
#[derive(Debug, Error)]
pub enum SolitudeError {
    /// HTTP request failed (connection refused, timeout, TLS).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an unexpected status.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Response body did not have the expected shape.
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Operations the PIN flow needs from the account service.
///
/// Lookups and PIN checks are keyed by the session identity. Updates take the
/// [`Buyer`] from a lookup already made, so a transition performs exactly one
/// lookup before its mutation. Methods return boxed
/// futures so the service can live behind `Arc<dyn AccountService>` in the
/// application state.
pub trait AccountService: Send + Sync {
    /// Look up the buyer for an identity.
    fn get_buyer<'a>(
        &'a self,
        identity: &'a Identity,
    ) -> BoxFuture<'a, Result<BuyerLookup, SolitudeError>>;

    /// Create a buyer with an initial PIN.
    fn create_buyer<'a>(
        &'a self,
        identity: &'a Identity,
        pin: &'a Pin,
    ) -> BoxFuture<'a, Result<OperationResult, SolitudeError>>;

    /// Set the PIN of an existing buyer that has none.
    fn change_pin<'a>(
        &'a self,
        buyer: &'a Buyer,
        pin: &'a Pin,
    ) -> BoxFuture<'a, Result<OperationResult, SolitudeError>>;

    /// Check a PIN against the stored one.
    fn verify_pin<'a>(
        &'a self,
        identity: &'a Identity,
        pin: &'a Pin,
    ) -> BoxFuture<'a, Result<PinCheck, SolitudeError>>;

    /// Confirm a freshly set PIN by entering it again.
    fn confirm_pin<'a>(
        &'a self,
        identity: &'a Identity,
        pin: &'a Pin,
    ) -> BoxFuture<'a, Result<bool, SolitudeError>>;

    /// Stage a replacement PIN during a reset.
    fn set_new_pin<'a>(
        &'a self,
        buyer: &'a Buyer,
        pin: &'a Pin,
    ) -> BoxFuture<'a, Result<OperationResult, SolitudeError>>;

    /// Flag or unflag the buyer as needing a PIN reset.
    fn set_needs_pin_reset<'a>(
        &'a self,
        buyer: &'a Buyer,
        needs_reset: bool,
    ) -> BoxFuture<'a, Result<(), SolitudeError>>;

    /// Confirm the staged replacement PIN, making it the buyer's PIN.
    fn reset_confirm_pin<'a>(
        &'a self,
        identity: &'a Identity,
        pin: &'a Pin,
    ) -> BoxFuture<'a, Result<bool, SolitudeError>>;
}
