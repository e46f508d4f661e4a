//! Webpay buyer identity and PIN web layer.
//!
//! This crate provides the webpay handlers, services and middleware as a
//! library, allowing them to be tested and reused by the binary.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod error;
pub mod filters;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod solitude;
pub mod state;
