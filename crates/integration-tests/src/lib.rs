//! Integration tests for webpay.
//!
//! These run against live services and are `#[ignore]`d by default.
//!
//! # Running Tests
//!
//! ```bash
//! # Against a running webpay
//! WEBPAY_BASE_URL=http://127.0.0.1:8000 cargo test -p webpay-integration-tests -- --ignored
//!
//! # Against a running solitude
//! SOLITUDE_URL=http://127.0.0.1:2602 cargo test -p webpay-integration-tests -- --ignored
//! ```
//!
//! # Test Categories
//!
//! - `http_surface` - Health, authorization and headers of a running webpay
//! - `solitude_client` - PIN lifecycle against a running solitude

use std::time::Duration;

use secrecy::SecretString;
use url::Url;
use webpay::config::SolitudeConfig;
use webpay_core::Identity;

/// Base URL of the webpay under test.
///
/// # Panics
///
/// Panics if `WEBPAY_BASE_URL` is unset.
#[must_use]
#[allow(clippy::expect_used)]
pub fn webpay_base_url() -> String {
    let url = std::env::var("WEBPAY_BASE_URL").expect("WEBPAY_BASE_URL must be set");
    url.trim_end_matches('/').to_string()
}

/// HTTP client that keeps cookies and does not follow redirects.
///
/// # Panics
///
/// Panics if the client cannot be built.
#[must_use]
#[allow(clippy::expect_used)]
pub fn browser() -> reqwest::Client {
    reqwest::Client::builder()
        .cookie_store(true)
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .expect("failed to build HTTP client")
}

/// Solitude configuration taken from the environment.
///
/// # Panics
///
/// Panics if `SOLITUDE_URL` is unset or invalid.
#[must_use]
#[allow(clippy::expect_used)]
pub fn solitude_config() -> SolitudeConfig {
    let url = std::env::var("SOLITUDE_URL").expect("SOLITUDE_URL must be set");
    SolitudeConfig {
        url: Url::parse(&url).expect("SOLITUDE_URL must be a valid URL"),
        api_token: std::env::var("SOLITUDE_API_TOKEN")
            .ok()
            .map(SecretString::from),
        timeout: Duration::from_secs(10),
    }
}

/// A fresh identity that no buyer exists for yet.
///
/// # Panics
///
/// Panics if the generated email is rejected, which cannot happen.
#[must_use]
#[allow(clippy::expect_used)]
pub fn fresh_identity() -> Identity {
    let email = format!("it-{}@example.com", uuid::Uuid::new_v4());
    Identity::from_email(&email).expect("generated email is valid")
}
