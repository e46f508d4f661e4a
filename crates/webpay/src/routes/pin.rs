//! PIN route handlers.
//!
//! Every handler requires a verified identity. `GET` renders the empty form;
//! `POST` validates the PIN locally, runs the transition and either
//! redirects (`303`) to the next step or re-renders the form (`200`).

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use webpay_core::{FieldErrors, Pin};

use crate::error::{Result, add_breadcrumb};
use crate::filters;
use crate::middleware::{RequireIdentity, save_pin_context};
use crate::routes::{paths, step_url};
use crate::services::pin::{self as transitions, Failure, Outcome, PIN_FIELD};
use crate::state::AppState;

// =============================================================================
// Form Types
// =============================================================================

/// PIN form data.
#[derive(Debug, Deserialize)]
pub struct PinForm {
    #[serde(default)]
    pub pin: String,
}

impl PinForm {
    /// Validate the submitted PIN exactly as typed.
    fn parse(&self) -> std::result::Result<Pin, Outcome> {
        Pin::parse(&self.pin).map_err(Outcome::invalid_pin)
    }
}

// =============================================================================
// Templates
// =============================================================================

/// What a re-rendered form shows.
#[derive(Debug, Default)]
pub struct FormState {
    /// Messages for the `pin` field.
    pub pin_errors: Vec<String>,
    /// Messages not tied to the `pin` field.
    pub form_errors: Vec<String>,
    /// Business failure, if any.
    pub failure: Option<Failure>,
}

impl FormState {
    fn invalid(errors: &FieldErrors) -> Self {
        Self {
            pin_errors: errors.get(PIN_FIELD).to_vec(),
            form_errors: errors.others(&[PIN_FIELD]),
            failure: None,
        }
    }

    fn failed(failure: Failure) -> Self {
        Self {
            failure: Some(failure),
            ..Self::default()
        }
    }

    /// Wrong PIN entered.
    #[must_use]
    pub fn wrong_pin(&self) -> bool {
        self.failure == Some(Failure::WrongPin)
    }

    /// PIN locked after too many attempts.
    #[must_use]
    pub fn locked(&self) -> bool {
        self.failure == Some(Failure::Locked)
    }

    /// Confirmation did not match.
    #[must_use]
    pub fn mismatch(&self) -> bool {
        self.failure == Some(Failure::Mismatch)
    }

    /// A PIN was already set.
    #[must_use]
    pub fn already_set(&self) -> bool {
        self.failure == Some(Failure::AlreadySet)
    }
}

/// Create PIN page template.
#[derive(Template, WebTemplate)]
#[template(path = "pin/create.html")]
pub struct CreateTemplate {
    pub form: FormState,
}

/// Verify PIN page template.
#[derive(Template, WebTemplate)]
#[template(path = "pin/verify.html")]
pub struct VerifyTemplate {
    pub form: FormState,
}

/// Confirm PIN page template.
#[derive(Template, WebTemplate)]
#[template(path = "pin/confirm.html")]
pub struct ConfirmTemplate {
    pub form: FormState,
}

/// Reset new PIN page template.
#[derive(Template, WebTemplate)]
#[template(path = "pin/reset_new_pin.html")]
pub struct ResetNewPinTemplate {
    pub form: FormState,
}

/// Reset confirm page template.
#[derive(Template, WebTemplate)]
#[template(path = "pin/reset_confirm.html")]
pub struct ResetConfirmTemplate {
    pub form: FormState,
}

/// Turn a transition outcome into a redirect or a re-rendered form.
fn respond<T: IntoResponse>(
    state: &AppState,
    outcome: Outcome,
    render: impl FnOnce(FormState) -> T,
) -> Response {
    match outcome {
        Outcome::Advance(step) => {
            let url = step_url(state, step);
            add_breadcrumb("pin", "advance", Some(&[("next", url)]));
            Redirect::to(url).into_response()
        }
        Outcome::Invalid(errors) => render(FormState::invalid(&errors)).into_response(),
        Outcome::Failed(failure) => render(FormState::failed(failure)).into_response(),
    }
}

// =============================================================================
// Create
// =============================================================================

/// Display the create PIN form.
pub async fn create_page(RequireIdentity(_ctx): RequireIdentity) -> impl IntoResponse {
    CreateTemplate {
        form: FormState::default(),
    }
}

/// Handle create PIN form submission.
#[tracing::instrument(skip_all)]
pub async fn create(
    State(state): State<AppState>,
    session: Session,
    RequireIdentity(mut ctx): RequireIdentity,
    Form(form): Form<PinForm>,
) -> Result<Response> {
    let outcome = match form.parse() {
        Ok(pin) => transitions::create(state.accounts(), &mut ctx, &pin).await?,
        Err(outcome) => outcome,
    };
    save_pin_context(&session, &ctx).await?;

    Ok(respond(&state, outcome, |form| CreateTemplate { form }))
}

// =============================================================================
// Verify
// =============================================================================

/// Display the verify PIN form.
pub async fn verify_page(RequireIdentity(_ctx): RequireIdentity) -> impl IntoResponse {
    VerifyTemplate {
        form: FormState::default(),
    }
}

/// Handle verify PIN form submission.
#[tracing::instrument(skip_all)]
pub async fn verify(
    State(state): State<AppState>,
    RequireIdentity(ctx): RequireIdentity,
    Form(form): Form<PinForm>,
) -> Result<Response> {
    let outcome = match form.parse() {
        Ok(pin) => transitions::verify(state.accounts(), &ctx, &pin).await?,
        Err(outcome) => outcome,
    };

    Ok(respond(&state, outcome, |form| VerifyTemplate { form }))
}

// =============================================================================
// Confirm
// =============================================================================

/// Display the confirm PIN form.
pub async fn confirm_page(RequireIdentity(_ctx): RequireIdentity) -> impl IntoResponse {
    ConfirmTemplate {
        form: FormState::default(),
    }
}

/// Handle confirm PIN form submission.
#[tracing::instrument(skip_all)]
pub async fn confirm(
    State(state): State<AppState>,
    RequireIdentity(ctx): RequireIdentity,
    Form(form): Form<PinForm>,
) -> Result<Response> {
    let outcome = match form.parse() {
        Ok(pin) => transitions::confirm(state.accounts(), &ctx, &pin).await?,
        Err(outcome) => outcome,
    };

    Ok(respond(&state, outcome, |form| ConfirmTemplate { form }))
}

// =============================================================================
// Reset
// =============================================================================

/// Start a PIN reset and send the buyer to log out.
#[tracing::instrument(skip_all)]
pub async fn reset_start(
    State(state): State<AppState>,
    session: Session,
    RequireIdentity(mut ctx): RequireIdentity,
) -> Result<Response> {
    let outcome = transitions::reset_start(state.accounts(), &mut ctx).await?;
    save_pin_context(&session, &ctx).await?;

    Ok(respond(&state, outcome, |_| Redirect::to(paths::PIN_VERIFY)))
}

/// Display the reset new PIN form.
pub async fn reset_new_pin_page(RequireIdentity(_ctx): RequireIdentity) -> impl IntoResponse {
    ResetNewPinTemplate {
        form: FormState::default(),
    }
}

/// Handle reset new PIN form submission.
#[tracing::instrument(skip_all)]
pub async fn reset_new_pin(
    State(state): State<AppState>,
    RequireIdentity(ctx): RequireIdentity,
    Form(form): Form<PinForm>,
) -> Result<Response> {
    let outcome = match form.parse() {
        Ok(pin) => transitions::reset_new_pin(state.accounts(), &ctx, &pin).await?,
        Err(outcome) => outcome,
    };

    Ok(respond(&state, outcome, |form| ResetNewPinTemplate { form }))
}

/// Display the reset confirm form.
pub async fn reset_confirm_page(RequireIdentity(_ctx): RequireIdentity) -> impl IntoResponse {
    ResetConfirmTemplate {
        form: FormState::default(),
    }
}

/// Handle reset confirm form submission.
#[tracing::instrument(skip_all)]
pub async fn reset_confirm(
    State(state): State<AppState>,
    session: Session,
    RequireIdentity(mut ctx): RequireIdentity,
    Form(form): Form<PinForm>,
) -> Result<Response> {
    let outcome = match form.parse() {
        Ok(pin) => transitions::reset_confirm(state.accounts(), &mut ctx, &pin).await?,
        Err(outcome) => outcome,
    };
    save_pin_context(&session, &ctx).await?;

    Ok(respond(&state, outcome, |form| ResetConfirmTemplate { form }))
}

/// Cancel a PIN reset and return to verify.
#[tracing::instrument(skip_all)]
pub async fn reset_cancel(
    State(state): State<AppState>,
    session: Session,
    RequireIdentity(mut ctx): RequireIdentity,
) -> Result<Response> {
    let outcome = transitions::reset_cancel(state.accounts(), &mut ctx).await?;
    save_pin_context(&session, &ctx).await?;

    Ok(respond(&state, outcome, |_| Redirect::to(paths::PIN_VERIFY)))
}
