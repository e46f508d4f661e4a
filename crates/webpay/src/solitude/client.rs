//! HTTP client for the solitude generic buyer API.

use reqwest::StatusCode;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::json;
use webpay_core::{Buyer, BuyerLookup, FieldErrors, Identity, OperationResult, Pin, PinCheck};

use super::{AccountService, BoxFuture, SolitudeError};
use crate::config::SolitudeConfig;

const BUYER_PATH: &str = "generic/buyer/";
const VERIFY_PIN_PATH: &str = "generic/verify_pin/";
const CONFIRM_PIN_PATH: &str = "generic/confirm_pin/";
const RESET_CONFIRM_PIN_PATH: &str = "generic/reset_confirm_pin/";

/// Solitude API client.
///
/// Cheap to clone; the underlying `reqwest::Client` pools connections.
#[derive(Clone)]
pub struct SolitudeClient {
    client: reqwest::Client,
    base_url: String,
}

impl SolitudeClient {
    /// Create a new solitude client.
    ///
    /// # Errors
    ///
    /// Returns error if the API token is not a valid header value or the
    /// HTTP client fails to build.
    pub fn new(config: &SolitudeConfig) -> Result<Self, SolitudeError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        if let Some(token) = &config.api_token {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token.expose_secret()))
                .map_err(|e| SolitudeError::Parse(format!("Invalid API token format: {e}")))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()?;

        let mut base_url = config.url.to_string();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }

        Ok(Self { client, base_url })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Look up the buyer for an identity.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the response is malformed.
    pub async fn get_buyer(&self, identity: &Identity) -> Result<BuyerLookup, SolitudeError> {
        let url = format!(
            "{}?uuid={}",
            self.endpoint(BUYER_PATH),
            urlencoding::encode(identity.as_str())
        );

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(api_error(status, body));
        }

        parse_buyer_list(&body)
    }

    /// Create a buyer with an initial PIN.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails; field rejections are a successful
    /// [`OperationResult::ValidationFailed`].
    pub async fn create_buyer(
        &self,
        identity: &Identity,
        pin: &Pin,
    ) -> Result<OperationResult, SolitudeError> {
        tracing::debug!(identity = %identity, "solitude: creating buyer");
        let body = json!({ "uuid": identity, "pin": pin });
        let response = self
            .client
            .post(self.endpoint(BUYER_PATH))
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        interpret_write(status, &response.text().await?)
    }

    /// Set the PIN of an existing buyer.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails.
    pub async fn change_pin(
        &self,
        buyer: &Buyer,
        pin: &Pin,
    ) -> Result<OperationResult, SolitudeError> {
        self.patch_buyer(buyer, json!({ "pin": pin })).await
    }

    /// Stage a replacement PIN.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails.
    pub async fn set_new_pin(
        &self,
        buyer: &Buyer,
        pin: &Pin,
    ) -> Result<OperationResult, SolitudeError> {
        self.patch_buyer(buyer, json!({ "new_pin": pin })).await
    }

    /// Flag or unflag the buyer as needing a PIN reset.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the service rejects the update.
    pub async fn set_needs_pin_reset(
        &self,
        buyer: &Buyer,
        needs_reset: bool,
    ) -> Result<(), SolitudeError> {
        match self
            .patch_buyer(buyer, json!({ "needs_pin_reset": needs_reset }))
            .await?
        {
            OperationResult::Ok => Ok(()),
            OperationResult::ValidationFailed(errors) => Err(SolitudeError::Api {
                status: StatusCode::BAD_REQUEST.as_u16(),
                message: serde_json::to_string(&errors).unwrap_or_default(),
            }),
        }
    }

    /// Check a PIN.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the response is malformed.
    pub async fn verify_pin(
        &self,
        identity: &Identity,
        pin: &Pin,
    ) -> Result<PinCheck, SolitudeError> {
        let body = self.post_pin(VERIFY_PIN_PATH, identity, pin).await?;
        serde_json::from_str(&body).map_err(|e| SolitudeError::Parse(e.to_string()))
    }

    /// Confirm a freshly set PIN.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the response is malformed.
    pub async fn confirm_pin(&self, identity: &Identity, pin: &Pin) -> Result<bool, SolitudeError> {
        let body = self.post_pin(CONFIRM_PIN_PATH, identity, pin).await?;
        parse_confirmed(&body)
    }

    /// Confirm a staged replacement PIN.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the response is malformed.
    pub async fn reset_confirm_pin(
        &self,
        identity: &Identity,
        pin: &Pin,
    ) -> Result<bool, SolitudeError> {
        let body = self.post_pin(RESET_CONFIRM_PIN_PATH, identity, pin).await?;
        parse_confirmed(&body)
    }

    /// POST `{uuid, pin}` to a PIN check endpoint and return the body.
    async fn post_pin(
        &self,
        path: &str,
        identity: &Identity,
        pin: &Pin,
    ) -> Result<String, SolitudeError> {
        tracing::debug!(identity = %identity, path, "solitude: checking pin");
        let body = json!({ "uuid": identity, "pin": pin });
        let response = self
            .client
            .post(self.endpoint(path))
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(api_error(status, text));
        }

        Ok(text)
    }

    /// PATCH the buyer resource found by an earlier lookup.
    async fn patch_buyer(
        &self,
        buyer: &Buyer,
        body: serde_json::Value,
    ) -> Result<OperationResult, SolitudeError> {
        tracing::debug!(identity = %buyer.uuid, resource_pk = %buyer.resource_pk, "solitude: updating buyer");
        let url = format!(
            "{}{}/",
            self.endpoint(BUYER_PATH),
            urlencoding::encode(&buyer.resource_pk)
        );
        let response = self.client.patch(&url).json(&body).send().await?;
        let status = response.status();
        interpret_write(status, &response.text().await?)
    }
}

impl AccountService for SolitudeClient {
    fn get_buyer<'a>(
        &'a self,
        identity: &'a Identity,
    ) -> BoxFuture<'a, Result<BuyerLookup, SolitudeError>> {
        Box::pin(self.get_buyer(identity))
    }

    fn create_buyer<'a>(
        &'a self,
        identity: &'a Identity,
        pin: &'a Pin,
    ) -> BoxFuture<'a, Result<OperationResult, SolitudeError>> {
        Box::pin(self.create_buyer(identity, pin))
    }

    fn change_pin<'a>(
        &'a self,
        buyer: &'a Buyer,
        pin: &'a Pin,
    ) -> BoxFuture<'a, Result<OperationResult, SolitudeError>> {
        Box::pin(self.change_pin(buyer, pin))
    }

    fn verify_pin<'a>(
        &'a self,
        identity: &'a Identity,
        pin: &'a Pin,
    ) -> BoxFuture<'a, Result<PinCheck, SolitudeError>> {
        Box::pin(self.verify_pin(identity, pin))
    }

    fn confirm_pin<'a>(
        &'a self,
        identity: &'a Identity,
        pin: &'a Pin,
    ) -> BoxFuture<'a, Result<bool, SolitudeError>> {
        Box::pin(self.confirm_pin(identity, pin))
    }

    fn set_new_pin<'a>(
        &'a self,
        buyer: &'a Buyer,
        pin: &'a Pin,
    ) -> BoxFuture<'a, Result<OperationResult, SolitudeError>> {
        Box::pin(self.set_new_pin(buyer, pin))
    }

    fn set_needs_pin_reset<'a>(
        &'a self,
        buyer: &'a Buyer,
        needs_reset: bool,
    ) -> BoxFuture<'a, Result<(), SolitudeError>> {
        Box::pin(self.set_needs_pin_reset(buyer, needs_reset))
    }

    fn reset_confirm_pin<'a>(
        &'a self,
        identity: &'a Identity,
        pin: &'a Pin,
    ) -> BoxFuture<'a, Result<bool, SolitudeError>> {
        Box::pin(self.reset_confirm_pin(identity, pin))
    }
}

// =============================================================================
// Response Parsing
// =============================================================================

/// Wrapper for a list response.
#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    objects: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct ConfirmResponse {
    #[serde(default)]
    confirmed: bool,
}

fn api_error(status: StatusCode, message: String) -> SolitudeError {
    SolitudeError::Api {
        status: status.as_u16(),
        message,
    }
}

/// Parse a buyer list; the first object is the buyer, an empty list means none.
fn parse_buyer_list(body: &str) -> Result<BuyerLookup, SolitudeError> {
    let list: ListResponse<Buyer> =
        serde_json::from_str(body).map_err(|e| SolitudeError::Parse(e.to_string()))?;

    Ok(list
        .objects
        .into_iter()
        .next()
        .map_or(BuyerLookup::NotFound, BuyerLookup::Found))
}

/// Map a write response onto an [`OperationResult`].
///
/// A 400 carrying a non-empty `{field: [messages]}` object is a validation
/// failure; any other non-2xx status is an error.
fn interpret_write(status: StatusCode, body: &str) -> Result<OperationResult, SolitudeError> {
    if status.is_success() {
        return Ok(OperationResult::Ok);
    }

    if status == StatusCode::BAD_REQUEST {
        if let Ok(errors) = serde_json::from_str::<FieldErrors>(body) {
            if !errors.is_empty() {
                return Ok(OperationResult::ValidationFailed(errors));
            }
        }
    }

    Err(api_error(status, body.to_string()))
}

fn parse_confirmed(body: &str) -> Result<bool, SolitudeError> {
    serde_json::from_str::<ConfirmResponse>(body)
        .map(|r| r.confirmed)
        .map_err(|e| SolitudeError::Parse(e.to_string()))
}
