//! Business logic services for webpay.
//!
//! # Services
//!
//! - `browserid` - Identity assertion verification against the remote verifier
//! - `pin` - PIN lifecycle transitions over the account service

pub mod browserid;
pub mod pin;
