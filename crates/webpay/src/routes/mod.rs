//! HTTP route handlers for webpay.
//!
//! # Route Structure
//!
//! ```text
//! # Auth
//! POST /auth/verify            - Verify identity assertion (JSON)
//! GET  /auth/logout            - Clear session, render logout page
//!
//! # PIN (requires verified identity, 403 otherwise)
//! GET|POST /pin/create         - Choose a first PIN
//! GET|POST /pin/verify         - Enter PIN before payment
//! GET|POST /pin/confirm        - Re-enter a new PIN
//! GET|POST /pin/reset/start    - Flag for reset, then log out
//! GET|POST /pin/reset/new-pin  - Choose a replacement PIN
//! GET|POST /pin/reset/confirm  - Re-enter the replacement PIN
//! GET|POST /pin/reset/cancel   - Abandon reset, back to verify
//! ```

pub mod auth;
pub mod pin;

use axum::{
    Router,
    routing::{get, post},
};

use crate::services::pin::Step;
use crate::state::AppState;

/// Absolute paths of the routes, for redirects and JSON links.
pub mod paths {
    pub const VERIFY: &str = "/auth/verify";
    pub const LOGOUT: &str = "/auth/logout";
    pub const PIN_CREATE: &str = "/pin/create";
    pub const PIN_VERIFY: &str = "/pin/verify";
    pub const PIN_CONFIRM: &str = "/pin/confirm";
    pub const PIN_RESET_START: &str = "/pin/reset/start";
    pub const PIN_RESET_NEW_PIN: &str = "/pin/reset/new-pin";
    pub const PIN_RESET_CONFIRM: &str = "/pin/reset/confirm";
    pub const PIN_RESET_CANCEL: &str = "/pin/reset/cancel";
}

/// Where a PIN transition step lives.
#[must_use]
pub fn step_url(state: &AppState, step: Step) -> &str {
    match step {
        Step::Create => paths::PIN_CREATE,
        Step::Verify => paths::PIN_VERIFY,
        Step::Confirm => paths::PIN_CONFIRM,
        Step::ResetConfirm => paths::PIN_RESET_CONFIRM,
        Step::Payment => &state.config().payment_url,
        Step::Logout => paths::LOGOUT,
    }
}

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/verify", post(auth::verify))
        .route("/logout", get(auth::logout))
}

/// Create the PIN routes router.
pub fn pin_routes() -> Router<AppState> {
    Router::new()
        .route("/create", get(pin::create_page).post(pin::create))
        .route("/verify", get(pin::verify_page).post(pin::verify))
        .route("/confirm", get(pin::confirm_page).post(pin::confirm))
        .route("/reset/start", get(pin::reset_start).post(pin::reset_start))
        .route(
            "/reset/new-pin",
            get(pin::reset_new_pin_page).post(pin::reset_new_pin),
        )
        .route(
            "/reset/confirm",
            get(pin::reset_confirm_page).post(pin::reset_confirm),
        )
        .route(
            "/reset/cancel",
            get(pin::reset_cancel).post(pin::reset_cancel),
        )
}

/// Create all routes for webpay.
///
/// Rate limiters are layered on by the binary so the router stays usable
/// without client IP headers.
pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth_routes())
        .nest("/pin", pin_routes())
}
