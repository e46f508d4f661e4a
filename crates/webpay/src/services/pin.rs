//! PIN lifecycle state machine.
//!
//! ```text
//! NoBuyer ──create──▶ BuyerHasPin ──confirm──▶ Verified
//! BuyerNoPin ─change─▶ BuyerHasPin ──verify───▶ Verified
//!
//! reset-start ──▶ (logout, re-authenticate) ──▶ reset-new-pin ──▶ reset-confirm ──▶ Verified
//! reset-cancel ─▶ verify
//! ```
//!
//! Each transition takes the per-request [`PinContext`] (only obtainable from
//! a session that holds a verified identity), performs at most one lookup and
//! one mutation against the account service, and returns an [`Outcome`]
//! telling the handler where to go next. Field rejections and failed checks
//! are outcomes, not errors; only transport and protocol failures surface as
//! [`SolitudeError`].

use webpay_core::{BuyerLookup, FieldErrors, OperationResult, Pin, PinError};

use crate::models::PinContext;
use crate::solitude::{AccountService, SolitudeError, error_string};

/// Form field every PIN form submits.
pub const PIN_FIELD: &str = "pin";

/// Where the buyer goes after a successful transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Choose a first PIN.
    Create,
    /// Enter the existing PIN.
    Verify,
    /// Re-enter a freshly created PIN.
    Confirm,
    /// Re-enter a replacement PIN.
    ResetConfirm,
    /// Continue to the payment flow.
    Payment,
    /// Log out so the buyer re-authenticates before resetting.
    Logout,
}

/// Why a transition stayed on its form without field errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    /// A PIN is already set; creating another is a no-op.
    AlreadySet,
    /// The PIN did not match.
    WrongPin,
    /// Too many wrong attempts.
    Locked,
    /// The confirmation did not match the PIN just chosen.
    Mismatch,
}

/// Result of a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Redirect to the next step.
    Advance(Step),
    /// Re-render the form with these field errors.
    Invalid(FieldErrors),
    /// Re-render the form for a business failure.
    Failed(Failure),
}

impl Outcome {
    /// Outcome for a PIN rejected before reaching the account service.
    #[must_use]
    pub fn invalid_pin(error: PinError) -> Self {
        Self::Invalid(FieldErrors::single(PIN_FIELD, error.to_string()))
    }

    fn from_write(result: OperationResult, next: Step) -> Self {
        match result {
            OperationResult::Ok => Self::Advance(next),
            OperationResult::ValidationFailed(errors) => {
                Self::Invalid(errors.map_messages(error_string))
            }
        }
    }
}

/// Set a first PIN.
///
/// Creates the buyer when none exists, sets the PIN on a buyer that has none,
/// and does nothing for a buyer that already has one (a repeated submit must
/// not overwrite it).
///
/// # Errors
///
/// Returns error if the account service cannot be reached.
pub async fn create(
    accounts: &dyn AccountService,
    ctx: &mut PinContext,
    pin: &Pin,
) -> Result<Outcome, SolitudeError> {
    let result = match accounts.get_buyer(&ctx.identity).await? {
        BuyerLookup::NotFound => {
            tracing::info!(identity = %ctx.identity, "creating buyer with pin");
            accounts.create_buyer(&ctx.identity, pin).await?
        }
        BuyerLookup::Found(buyer) if !buyer.has_pin => {
            tracing::info!(identity = %ctx.identity, "setting pin on existing buyer");
            accounts.change_pin(&buyer, pin).await?
        }
        BuyerLookup::Found(_) => {
            tracing::info!(identity = %ctx.identity, "buyer already has a pin");
            ctx.has_pin = true;
            return Ok(Outcome::Failed(Failure::AlreadySet));
        }
    };

    let outcome = Outcome::from_write(result, Step::Confirm);
    if matches!(outcome, Outcome::Advance(_)) {
        ctx.has_pin = true;
    }
    Ok(outcome)
}

/// Check the buyer's PIN before payment.
///
/// # Errors
///
/// Returns error if the account service cannot be reached.
pub async fn verify(
    accounts: &dyn AccountService,
    ctx: &PinContext,
    pin: &Pin,
) -> Result<Outcome, SolitudeError> {
    let check = accounts.verify_pin(&ctx.identity, pin).await?;

    Ok(if check.valid {
        Outcome::Advance(Step::Payment)
    } else if check.locked {
        tracing::warn!(identity = %ctx.identity, "pin locked");
        Outcome::Failed(Failure::Locked)
    } else {
        tracing::info!(identity = %ctx.identity, "wrong pin");
        Outcome::Failed(Failure::WrongPin)
    })
}

/// Confirm a freshly created PIN.
///
/// # Errors
///
/// Returns error if the account service cannot be reached.
pub async fn confirm(
    accounts: &dyn AccountService,
    ctx: &PinContext,
    pin: &Pin,
) -> Result<Outcome, SolitudeError> {
    Ok(if accounts.confirm_pin(&ctx.identity, pin).await? {
        Outcome::Advance(Step::Payment)
    } else {
        Outcome::Failed(Failure::Mismatch)
    })
}

/// Start a PIN reset.
///
/// Flags the buyer and sends them to logout so that a new PIN can only be
/// chosen after authenticating again.
///
/// # Errors
///
/// Returns error if the account service cannot be reached.
pub async fn reset_start(
    accounts: &dyn AccountService,
    ctx: &mut PinContext,
) -> Result<Outcome, SolitudeError> {
    flag_reset(accounts, ctx, true, Step::Logout).await
}

/// Stage a replacement PIN.
///
/// # Errors
///
/// Returns error if the account service cannot be reached.
pub async fn reset_new_pin(
    accounts: &dyn AccountService,
    ctx: &PinContext,
    pin: &Pin,
) -> Result<Outcome, SolitudeError> {
    let BuyerLookup::Found(buyer) = accounts.get_buyer(&ctx.identity).await? else {
        return Ok(Outcome::Advance(Step::Create));
    };

    let result = accounts.set_new_pin(&buyer, pin).await?;
    Ok(Outcome::from_write(result, Step::ResetConfirm))
}

/// Confirm the replacement PIN, completing the reset.
///
/// # Errors
///
/// Returns error if the account service cannot be reached.
pub async fn reset_confirm(
    accounts: &dyn AccountService,
    ctx: &mut PinContext,
    pin: &Pin,
) -> Result<Outcome, SolitudeError> {
    if !accounts.reset_confirm_pin(&ctx.identity, pin).await? {
        return Ok(Outcome::Failed(Failure::Mismatch));
    }

    tracing::info!(identity = %ctx.identity, "pin reset complete");
    ctx.has_pin = true;
    ctx.needs_pin_reset = false;
    Ok(Outcome::Advance(Step::Payment))
}

/// Abandon a PIN reset and return to normal verification.
///
/// # Errors
///
/// Returns error if the account service cannot be reached.
pub async fn reset_cancel(
    accounts: &dyn AccountService,
    ctx: &mut PinContext,
) -> Result<Outcome, SolitudeError> {
    flag_reset(accounts, ctx, false, Step::Verify).await
}

/// Look the buyer up and set their reset flag. A missing buyer has no PIN to
/// reset and is sent to create one.
async fn flag_reset(
    accounts: &dyn AccountService,
    ctx: &mut PinContext,
    needs_reset: bool,
    next: Step,
) -> Result<Outcome, SolitudeError> {
    let BuyerLookup::Found(buyer) = accounts.get_buyer(&ctx.identity).await? else {
        return Ok(Outcome::Advance(Step::Create));
    };

    tracing::info!(identity = %ctx.identity, needs_reset, "setting pin reset flag");
    accounts.set_needs_pin_reset(&buyer, needs_reset).await?;
    ctx.needs_pin_reset = needs_reset;
    Ok(Outcome::Advance(next))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use webpay_core::Identity;

    use super::*;
    use crate::solitude::fake::{Call, FakeAccounts};

    fn ctx() -> PinContext {
        PinContext::new(Identity::from_email("buyer@example.com").unwrap())
    }

    fn pin(s: &str) -> Pin {
        Pin::parse(s).unwrap()
    }

    fn id(ctx: &PinContext) -> String {
        ctx.identity.to_string()
    }

    #[tokio::test]
    async fn test_create_without_buyer_creates_one() {
        let accounts = FakeAccounts::new();
        let mut ctx = ctx();

        let outcome = create(&accounts, &mut ctx, &pin("1234")).await.unwrap();

        assert_eq!(outcome, Outcome::Advance(Step::Confirm));
        assert!(ctx.has_pin);
        assert_eq!(
            accounts.calls(),
            vec![Call::GetBuyer(id(&ctx)), Call::CreateBuyer(id(&ctx))]
        );
    }

    #[tokio::test]
    async fn test_create_with_buyer_without_pin_changes_pin() {
        let accounts = FakeAccounts::new().with_buyer(None);
        let mut ctx = ctx();

        let outcome = create(&accounts, &mut ctx, &pin("1234")).await.unwrap();

        assert_eq!(outcome, Outcome::Advance(Step::Confirm));
        assert!(ctx.has_pin);
        assert_eq!(
            accounts.calls(),
            vec![Call::GetBuyer(id(&ctx)), Call::ChangePin(id(&ctx))]
        );
    }

    #[tokio::test]
    async fn test_create_with_pin_is_noop() {
        let accounts = FakeAccounts::new().with_buyer(Some("9999"));
        let mut ctx = ctx();

        let outcome = create(&accounts, &mut ctx, &pin("1234")).await.unwrap();

        assert_eq!(outcome, Outcome::Failed(Failure::AlreadySet));
        assert_eq!(accounts.calls(), vec![Call::GetBuyer(id(&ctx))]);
    }

    #[tokio::test]
    async fn test_create_maps_remote_field_errors() {
        let accounts = FakeAccounts::new().with_buyer(None).with_write_errors(
            FieldErrors::single("pin", "PIN may only consists of numbers"),
        );
        let mut ctx = ctx();

        let outcome = create(&accounts, &mut ctx, &pin("1234")).await.unwrap();

        let Outcome::Invalid(errors) = outcome else {
            panic!("expected field errors, got {outcome:?}");
        };
        assert_eq!(errors.get(PIN_FIELD), ["PIN may only consist of numbers"]);
        assert!(!ctx.has_pin);
    }

    #[tokio::test]
    async fn test_create_propagates_outage() {
        let accounts = FakeAccounts::new().unavailable();
        let mut ctx = ctx();

        let result = create(&accounts, &mut ctx, &pin("1234")).await;

        assert!(matches!(result, Err(SolitudeError::Api { status: 503, .. })));
        assert_eq!(accounts.calls(), vec![Call::GetBuyer(id(&ctx))]);
    }

    #[tokio::test]
    async fn test_verify_outcomes() {
        let ctx = ctx();

        let accounts = FakeAccounts::new().with_pin_check(true, false);
        assert_eq!(
            verify(&accounts, &ctx, &pin("1234")).await.unwrap(),
            Outcome::Advance(Step::Payment)
        );

        let accounts = FakeAccounts::new().with_pin_check(false, false);
        assert_eq!(
            verify(&accounts, &ctx, &pin("1234")).await.unwrap(),
            Outcome::Failed(Failure::WrongPin)
        );

        let accounts = FakeAccounts::new().with_pin_check(false, true);
        assert_eq!(
            verify(&accounts, &ctx, &pin("1234")).await.unwrap(),
            Outcome::Failed(Failure::Locked)
        );
    }

    #[tokio::test]
    async fn test_confirm_outcomes() {
        let ctx = ctx();

        let accounts = FakeAccounts::new().with_confirm(true);
        assert_eq!(
            confirm(&accounts, &ctx, &pin("1234")).await.unwrap(),
            Outcome::Advance(Step::Payment)
        );
        assert_eq!(accounts.calls(), vec![Call::ConfirmPin(id(&ctx))]);

        let accounts = FakeAccounts::new().with_confirm(false);
        assert_eq!(
            confirm(&accounts, &ctx, &pin("1234")).await.unwrap(),
            Outcome::Failed(Failure::Mismatch)
        );
    }

    #[tokio::test]
    async fn test_reset_start_flags_and_logs_out() {
        let accounts = FakeAccounts::new().with_buyer(Some("1234"));
        let mut ctx = ctx();

        let outcome = reset_start(&accounts, &mut ctx).await.unwrap();

        assert_eq!(outcome, Outcome::Advance(Step::Logout));
        assert!(ctx.needs_pin_reset);
        assert!(accounts.needs_pin_reset());
        assert_eq!(
            accounts.calls(),
            vec![
                Call::GetBuyer(id(&ctx)),
                Call::SetNeedsPinReset(id(&ctx), true)
            ]
        );
    }

    #[tokio::test]
    async fn test_reset_start_without_buyer_goes_to_create() {
        let accounts = FakeAccounts::new();
        let mut ctx = ctx();

        let outcome = reset_start(&accounts, &mut ctx).await.unwrap();

        assert_eq!(outcome, Outcome::Advance(Step::Create));
        assert_eq!(accounts.calls(), vec![Call::GetBuyer(id(&ctx))]);
    }

    #[tokio::test]
    async fn test_reset_cancel_returns_to_verify() {
        let accounts = FakeAccounts::new().with_buyer(Some("1234"));
        let mut ctx = ctx();
        ctx.needs_pin_reset = true;

        let outcome = reset_cancel(&accounts, &mut ctx).await.unwrap();

        assert_eq!(outcome, Outcome::Advance(Step::Verify));
        assert!(!ctx.needs_pin_reset);
        assert_eq!(
            accounts.calls(),
            vec![
                Call::GetBuyer(id(&ctx)),
                Call::SetNeedsPinReset(id(&ctx), false)
            ]
        );
    }

    #[tokio::test]
    async fn test_reset_new_pin() {
        let accounts = FakeAccounts::new().with_buyer(Some("1234"));
        let ctx = ctx();

        let outcome = reset_new_pin(&accounts, &ctx, &pin("5678")).await.unwrap();

        assert_eq!(outcome, Outcome::Advance(Step::ResetConfirm));
        assert_eq!(
            accounts.calls(),
            vec![Call::GetBuyer(id(&ctx)), Call::SetNewPin(id(&ctx))]
        );
    }

    #[tokio::test]
    async fn test_reset_new_pin_field_errors() {
        let accounts = FakeAccounts::new()
            .with_buyer(Some("1234"))
            .with_write_errors(FieldErrors::single(
                "pin",
                "PIN must be exactly 4 numbers long",
            ));

        let outcome = reset_new_pin(&accounts, &ctx(), &pin("5678"))
            .await
            .unwrap();

        let Outcome::Invalid(errors) = outcome else {
            panic!("expected field errors, got {outcome:?}");
        };
        assert_eq!(
            errors.get(PIN_FIELD),
            ["PIN must be exactly 4 numbers long"]
        );
    }

    #[tokio::test]
    async fn test_reset_round_trip() {
        let accounts = FakeAccounts::new().with_buyer(Some("1234"));
        let mut ctx = ctx();

        reset_start(&accounts, &mut ctx).await.unwrap();
        reset_new_pin(&accounts, &ctx, &pin("5678")).await.unwrap();

        assert_eq!(
            reset_confirm(&accounts, &mut ctx, &pin("0000")).await.unwrap(),
            Outcome::Failed(Failure::Mismatch)
        );
        assert!(ctx.needs_pin_reset);

        assert_eq!(
            reset_confirm(&accounts, &mut ctx, &pin("5678")).await.unwrap(),
            Outcome::Advance(Step::Payment)
        );
        assert!(!ctx.needs_pin_reset);
        assert!(!accounts.needs_pin_reset());

        assert_eq!(
            verify(&accounts, &ctx, &pin("5678")).await.unwrap(),
            Outcome::Advance(Step::Payment)
        );
    }

    #[test]
    fn test_invalid_pin_outcome() {
        let Outcome::Invalid(errors) = Outcome::invalid_pin(PinError::WrongLength) else {
            panic!("expected field errors");
        };
        assert_eq!(
            errors.get(PIN_FIELD),
            ["PIN must be exactly 4 numbers long"]
        );
    }

    mod over_http {
        use std::time::Duration;

        use serde_json::json;
        use wiremock::matchers::{body_json, method, path, query_param};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        use super::*;
        use crate::config::SolitudeConfig;
        use crate::solitude::SolitudeClient;

        async fn solitude(ctx: &PinContext, has_pin: bool) -> (MockServer, SolitudeClient) {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path("/generic/buyer/"))
                .and(query_param("uuid", ctx.identity.as_str()))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "objects": [{"resource_pk": 7, "uuid": ctx.identity.as_str(), "pin": has_pin}]
                })))
                .expect(1)
                .mount(&server)
                .await;

            let client = SolitudeClient::new(&SolitudeConfig {
                url: url::Url::parse(&server.uri()).unwrap(),
                api_token: None,
                timeout: Duration::from_secs(5),
            })
            .unwrap();
            (server, client)
        }

        async fn expect_patch(server: &MockServer, body: serde_json::Value) {
            Mock::given(method("PATCH"))
                .and(path("/generic/buyer/7/"))
                .and(body_json(body))
                .respond_with(ResponseTemplate::new(202))
                .expect(1)
                .mount(server)
                .await;
        }

        #[tokio::test]
        async fn test_create_looks_buyer_up_once() {
            let mut ctx = ctx();
            let (server, client) = solitude(&ctx, false).await;
            expect_patch(&server, json!({ "pin": "1234" })).await;

            let outcome = create(&client, &mut ctx, &pin("1234")).await.unwrap();

            assert_eq!(outcome, Outcome::Advance(Step::Confirm));
            server.verify().await;
        }

        #[tokio::test]
        async fn test_reset_new_pin_looks_buyer_up_once() {
            let ctx = ctx();
            let (server, client) = solitude(&ctx, true).await;
            expect_patch(&server, json!({ "new_pin": "5678" })).await;

            let outcome = reset_new_pin(&client, &ctx, &pin("5678")).await.unwrap();

            assert_eq!(outcome, Outcome::Advance(Step::ResetConfirm));
            server.verify().await;
        }

        #[tokio::test]
        async fn test_reset_start_looks_buyer_up_once() {
            let mut ctx = ctx();
            let (server, client) = solitude(&ctx, true).await;
            expect_patch(&server, json!({ "needs_pin_reset": true })).await;

            let outcome = reset_start(&client, &mut ctx).await.unwrap();

            assert_eq!(outcome, Outcome::Advance(Step::Logout));
            assert!(ctx.needs_pin_reset);
            server.verify().await;
        }

        #[tokio::test]
        async fn test_reset_cancel_looks_buyer_up_once() {
            let mut ctx = ctx();
            ctx.needs_pin_reset = true;
            let (server, client) = solitude(&ctx, true).await;
            expect_patch(&server, json!({ "needs_pin_reset": false })).await;

            let outcome = reset_cancel(&client, &mut ctx).await.unwrap();

            assert_eq!(outcome, Outcome::Advance(Step::Verify));
            assert!(!ctx.needs_pin_reset);
            server.verify().await;
        }
    }
}
