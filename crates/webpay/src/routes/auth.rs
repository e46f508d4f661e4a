//! Authentication route handlers.
//!
//! Handles identity verification via BrowserID assertions and logout.
//! Verification is the only way an identity gets into the session.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form, Json,
    extract::{State, rejection::FormRejection},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use crate::error::{AppError, Result, clear_sentry_user, set_sentry_user};
use crate::filters;
use crate::middleware::{clear_identity, establish_identity};
use crate::models::PinContext;
use crate::routes::paths;
use crate::state::AppState;

// =============================================================================
// Form Types
// =============================================================================

/// Verification form data.
#[derive(Debug, Deserialize)]
pub struct VerifyForm {
    pub assertion: String,
}

/// Verification result returned to the page script.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct VerifyResponse {
    pub has_pin: bool,
    pub needs_pin_reset: bool,
    pub pin_create: String,
    pub pin_reset: String,
}

// =============================================================================
// Templates
// =============================================================================

/// Logout page template.
///
/// Also starts the login flow again, so a buyer who logged out to reset
/// their PIN can re-authenticate from here.
#[derive(Template, WebTemplate)]
#[template(path = "auth/logout.html")]
pub struct LogoutTemplate {
    pub verify_url: &'static str,
    pub pin_verify_url: &'static str,
    pub unverified_issuer: String,
    pub allow_unverified: bool,
}

// =============================================================================
// Verification
// =============================================================================

/// Verify an identity assertion and establish the session.
///
/// Any failure to verify clears the session and answers `400`.
pub async fn verify(
    State(state): State<AppState>,
    session: Session,
    form: std::result::Result<Form<VerifyForm>, FormRejection>,
) -> Result<Response> {
    let assertion = match form {
        Ok(Form(form)) if !form.assertion.trim().is_empty() => form.assertion,
        Ok(_) => return reject(&session, "missing assertion").await,
        Err(e) => {
            tracing::warn!(error = %e, "Malformed verification form");
            return reject(&session, "malformed form").await;
        }
    };

    let audience = state.config().audience();
    let verified = match state.verifier().verify(&assertion, &audience).await {
        Ok(verified) => verified,
        Err(e) => {
            tracing::error!(error = %e, "Assertion verification failed");
            return reject(&session, "assertion not verified").await;
        }
    };

    let identity = match verified.identity() {
        Ok(identity) => identity,
        Err(e) => {
            tracing::warn!(error = %e, "Verified email unusable");
            return reject(&session, "unusable email").await;
        }
    };

    tracing::info!(
        identity = %identity,
        issuer = verified.issuer.as_deref().unwrap_or(""),
        unverified = verified.unverified,
        "Assertion ok"
    );

    let lookup = match state.accounts().get_buyer(&identity).await {
        Ok(lookup) => lookup,
        Err(e) => {
            clear_identity(&session).await?;
            return Err(e.into());
        }
    };

    let ctx = PinContext::from_lookup(identity, &lookup);
    establish_identity(&session, &ctx).await?;
    set_sentry_user(&ctx.identity);

    Ok(Json(VerifyResponse {
        has_pin: ctx.has_pin,
        needs_pin_reset: ctx.needs_pin_reset,
        pin_create: paths::PIN_CREATE.to_string(),
        pin_reset: paths::PIN_RESET_NEW_PIN.to_string(),
    })
    .into_response())
}

/// Clear the session and refuse the verification.
async fn reject(session: &Session, reason: &str) -> Result<Response> {
    clear_identity(session).await?;
    Err(AppError::BadRequest(reason.to_string()))
}

// =============================================================================
// Logout
// =============================================================================

/// Clear the session and render the logout page.
pub async fn logout(State(state): State<AppState>, session: Session) -> Result<impl IntoResponse> {
    clear_identity(&session).await?;
    clear_sentry_user();

    let browserid = &state.config().browserid;
    Ok(LogoutTemplate {
        verify_url: paths::VERIFY,
        pin_verify_url: paths::PIN_VERIFY,
        unverified_issuer: browserid.unverified_issuer.clone(),
        allow_unverified: browserid.allow_unverified,
    })
}
