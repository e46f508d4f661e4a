//! BrowserID assertion verification.
//!
//! The buyer's browser obtains an assertion from the identity provider and
//! posts it to `/auth/verify`. The assertion is forwarded to the remote
//! verifier together with the expected audience. When unverified emails are
//! allowed, the verifier is told to force the configured issuer and accept
//! an `unverified-email` in place of a verified one.

use serde::Deserialize;
use thiserror::Error;
use webpay_core::{Identity, IdentityError};

use crate::config::BrowserIdConfig;
use crate::solitude::BoxFuture;

/// Errors that can occur while verifying an assertion.
#[derive(Debug, Error)]
pub enum BrowserIdError {
    /// HTTP request to the verifier failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The verifier rejected the assertion.
    #[error("Assertion rejected: {0}")]
    Rejected(String),

    /// The verifier response was not understood.
    #[error("Parse error: {0}")]
    Parse(String),

    /// The verifier accepted the assertion but returned no email.
    #[error("Verifier returned no email")]
    MissingEmail,

    /// The returned email cannot be turned into an identity.
    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] IdentityError),
}

/// A successfully verified assertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedAssertion {
    /// The email the assertion was issued for.
    pub email: String,
    /// Issuer reported by the verifier, if any.
    pub issuer: Option<String>,
    /// Whether the email came from `unverified-email`.
    pub unverified: bool,
}

impl VerifiedAssertion {
    /// Derive the buyer identity for this email.
    ///
    /// # Errors
    ///
    /// Returns error if the email is empty or malformed.
    pub fn identity(&self) -> Result<Identity, BrowserIdError> {
        Ok(Identity::from_email(&self.email)?)
    }
}

/// Verifies identity assertions.
pub trait AssertionVerifier: Send + Sync {
    /// Verify an assertion for the given audience.
    fn verify<'a>(
        &'a self,
        assertion: &'a str,
        audience: &'a str,
    ) -> BoxFuture<'a, Result<VerifiedAssertion, BrowserIdError>>;
}

/// Raw verifier response.
#[derive(Debug, Deserialize)]
struct VerifierResponse {
    status: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default, rename = "unverified-email")]
    unverified_email: Option<String>,
    #[serde(default)]
    issuer: Option<String>,
    #[serde(default)]
    reason: Option<String>,
}

/// Remote BrowserID verifier client.
#[derive(Clone)]
pub struct BrowserIdVerifier {
    client: reqwest::Client,
    config: BrowserIdConfig,
}

impl BrowserIdVerifier {
    /// Create a verifier sharing the timeout used for other remote calls.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(
        config: BrowserIdConfig,
        timeout: std::time::Duration,
    ) -> Result<Self, BrowserIdError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, config })
    }

    /// Form parameters sent to the verifier.
    fn params<'a>(&'a self, assertion: &'a str, audience: &'a str) -> Vec<(&'a str, &'a str)> {
        let mut params = vec![("assertion", assertion), ("audience", audience)];
        if self.config.allow_unverified {
            params.push(("forceIssuer", self.config.unverified_issuer.as_str()));
            params.push(("allowUnverified", "true"));
        }
        params
    }

    async fn verify_remote(
        &self,
        assertion: &str,
        audience: &str,
    ) -> Result<VerifiedAssertion, BrowserIdError> {
        tracing::info!(
            url = %self.config.verification_url,
            audience,
            force_issuer = %self.config.unverified_issuer,
            allow_unverified = self.config.allow_unverified,
            assertion,
            "verifying assertion"
        );

        let response = self
            .client
            .post(self.config.verification_url.clone())
            .form(&self.params(assertion, audience))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(BrowserIdError::Rejected(format!(
                "verifier returned {}",
                status.as_u16()
            )));
        }

        let parsed: VerifierResponse =
            serde_json::from_str(&body).map_err(|e| BrowserIdError::Parse(e.to_string()))?;
        interpret(parsed)
    }
}

impl AssertionVerifier for BrowserIdVerifier {
    fn verify<'a>(
        &'a self,
        assertion: &'a str,
        audience: &'a str,
    ) -> BoxFuture<'a, Result<VerifiedAssertion, BrowserIdError>> {
        Box::pin(self.verify_remote(assertion, audience))
    }
}

/// Turn a verifier response into a verified assertion, preferring
/// `unverified-email` over `email`.
fn interpret(response: VerifierResponse) -> Result<VerifiedAssertion, BrowserIdError> {
    if response.status != "okay" {
        return Err(BrowserIdError::Rejected(
            response.reason.unwrap_or(response.status),
        ));
    }

    let (email, unverified) = match (response.unverified_email, response.email) {
        (Some(email), _) => (email, true),
        (None, Some(email)) => (email, false),
        (None, None) => return Err(BrowserIdError::MissingEmail),
    };

    Ok(VerifiedAssertion {
        email,
        issuer: response.issuer,
        unverified,
    })
}
