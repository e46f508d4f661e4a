//! Identity extractor and session helpers.
//!
//! Every PIN route requires an identity established by `/auth/verify`.
//! Requests without one are refused with `403 Forbidden` whatever the method.

use axum::{extract::FromRequestParts, http::request::Parts};
use tower_sessions::Session;
use webpay_core::Identity;

use crate::error::AppError;
use crate::models::{PinContext, session_keys};

/// Extractor that requires a verified identity in the session.
///
/// Yields the [`PinContext`] rebuilt from the session, with the cached
/// buyer flags. A missing identity rejects with `403`.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(
///     RequireIdentity(ctx): RequireIdentity,
/// ) -> impl IntoResponse {
///     format!("has pin: {}", ctx.has_pin)
/// }
/// ```
pub struct RequireIdentity(pub PinContext);

impl<S> FromRequestParts<S> for RequireIdentity
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Get the session from extensions (set by SessionManagerLayer)
        let session = parts
            .extensions
            .get::<Session>()
            .ok_or(AppError::Forbidden)?;

        let identity: Identity = session
            .get(session_keys::IDENTITY)
            .await?
            .ok_or(AppError::Forbidden)?;

        let has_pin = session
            .get::<bool>(session_keys::HAS_PIN)
            .await?
            .unwrap_or(false);
        let needs_pin_reset = session
            .get::<bool>(session_keys::NEEDS_PIN_RESET)
            .await?
            .unwrap_or(false);

        Ok(Self(PinContext {
            identity,
            has_pin,
            needs_pin_reset,
        }))
    }
}

/// Store a freshly verified identity and its buyer flags.
///
/// The session id is cycled first so a pre-login session id cannot be
/// reused after verification.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn establish_identity(
    session: &Session,
    ctx: &PinContext,
) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session.insert(session_keys::IDENTITY, &ctx.identity).await?;
    save_pin_context(session, ctx).await
}

/// Write the cached buyer flags back after a transition.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn save_pin_context(
    session: &Session,
    ctx: &PinContext,
) -> Result<(), tower_sessions::session::Error> {
    session.insert(session_keys::HAS_PIN, ctx.has_pin).await?;
    session
        .insert(session_keys::NEEDS_PIN_RESET, ctx.needs_pin_reset)
        .await
}

/// Drop everything in the session (failed verification, logout).
///
/// # Errors
///
/// Returns an error if the session cannot be deleted from the store.
pub async fn clear_identity(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session.flush().await
}
