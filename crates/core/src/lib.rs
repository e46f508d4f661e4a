//! webpay core - Shared domain types.
//!
//! This crate provides the types shared by the `webpay` server and its tests:
//! - [`Pin`] - a validated four digit PIN
//! - [`Identity`] - the stable buyer identifier derived from a verified email
//! - [`Buyer`], [`BuyerLookup`], [`OperationResult`], [`PinCheck`] - the
//!   shapes returned by the remote account service
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no HTTP clients, no session
//! handling. This keeps it lightweight and allows it to be used anywhere.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
