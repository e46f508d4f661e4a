//! In-memory stand-in for solitude used by handler and state machine tests.
//!
//! Behaves like the real service by default (stores the PIN, checks it on
//! verify and confirm) and records every call. Individual responses can be
//! overridden to simulate validation failures, lockouts, and outages.

use std::future::ready;
use std::sync::{Mutex, MutexGuard};

use webpay_core::{Buyer, BuyerLookup, FieldErrors, Identity, OperationResult, Pin, PinCheck};

use super::{AccountService, BoxFuture, SolitudeError};

/// A recorded call, with the identity it was keyed by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    GetBuyer(String),
    CreateBuyer(String),
    ChangePin(String),
    VerifyPin(String),
    ConfirmPin(String),
    SetNewPin(String),
    SetNeedsPinReset(String, bool),
    ResetConfirmPin(String),
}

#[derive(Default)]
struct State {
    exists: bool,
    pin: Option<String>,
    new_pin: Option<String>,
    needs_pin_reset: bool,
    calls: Vec<Call>,
    write_errors: Option<FieldErrors>,
    pin_check: Option<PinCheck>,
    confirm: Option<bool>,
    reset_confirm: Option<bool>,
    unavailable: bool,
}

/// Fake account service.
#[derive(Default)]
pub struct FakeAccounts {
    state: Mutex<State>,
}

impl FakeAccounts {
    /// No buyer exists yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A buyer exists, with the given PIN if any.
    #[must_use]
    pub fn with_buyer(self, pin: Option<&str>) -> Self {
        {
            let mut state = self.lock();
            state.exists = true;
            state.pin = pin.map(String::from);
        }
        self
    }

    /// Every create/change/new-pin write is rejected with these errors.
    #[must_use]
    pub fn with_write_errors(self, errors: FieldErrors) -> Self {
        self.lock().write_errors = Some(errors);
        self
    }

    /// `verify_pin` returns this regardless of the PIN.
    #[must_use]
    pub fn with_pin_check(self, valid: bool, locked: bool) -> Self {
        self.lock().pin_check = Some(PinCheck { locked, valid });
        self
    }

    /// `confirm_pin` returns this regardless of the PIN.
    #[must_use]
    pub fn with_confirm(self, confirmed: bool) -> Self {
        self.lock().confirm = Some(confirmed);
        self
    }

    /// `reset_confirm_pin` returns this regardless of the PIN.
    #[must_use]
    pub fn with_reset_confirm(self, confirmed: bool) -> Self {
        self.lock().reset_confirm = Some(confirmed);
        self
    }

    /// Every call fails as if solitude were down.
    #[must_use]
    pub fn unavailable(self) -> Self {
        self.lock().unavailable = true;
        self
    }

    /// All calls made so far.
    #[must_use]
    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    /// Whether the buyer is currently flagged for a reset.
    #[must_use]
    pub fn needs_pin_reset(&self) -> bool {
        self.lock().needs_pin_reset
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().expect("fake solitude state poisoned")
    }

    fn record(&self, call: Call) -> Result<MutexGuard<'_, State>, SolitudeError> {
        let mut state = self.lock();
        state.calls.push(call);
        if state.unavailable {
            return Err(SolitudeError::Api {
                status: 503,
                message: "solitude unavailable".to_string(),
            });
        }
        Ok(state)
    }

    fn write(
        &self,
        call: Call,
        apply: impl FnOnce(&mut State),
    ) -> Result<OperationResult, SolitudeError> {
        let mut state = self.record(call)?;
        if let Some(errors) = state.write_errors.clone() {
            return Ok(OperationResult::ValidationFailed(errors));
        }
        apply(&mut state);
        Ok(OperationResult::Ok)
    }
}

impl AccountService for FakeAccounts {
    fn get_buyer<'a>(
        &'a self,
        identity: &'a Identity,
    ) -> BoxFuture<'a, Result<BuyerLookup, SolitudeError>> {
        let result = self.record(Call::GetBuyer(identity.to_string())).map(|state| {
            if state.exists {
                BuyerLookup::Found(Buyer {
                    resource_pk: "1".to_string(),
                    uuid: identity.clone(),
                    has_pin: state.pin.is_some(),
                    needs_pin_reset: state.needs_pin_reset,
                })
            } else {
                BuyerLookup::NotFound
            }
        });
        Box::pin(ready(result))
    }

    fn create_buyer<'a>(
        &'a self,
        identity: &'a Identity,
        pin: &'a Pin,
    ) -> BoxFuture<'a, Result<OperationResult, SolitudeError>> {
        let result = self.write(Call::CreateBuyer(identity.to_string()), |state| {
            state.exists = true;
            state.pin = Some(pin.as_str().to_string());
        });
        Box::pin(ready(result))
    }

    fn change_pin<'a>(
        &'a self,
        buyer: &'a Buyer,
        pin: &'a Pin,
    ) -> BoxFuture<'a, Result<OperationResult, SolitudeError>> {
        let result = self.write(Call::ChangePin(buyer.uuid.to_string()), |state| {
            state.pin = Some(pin.as_str().to_string());
        });
        Box::pin(ready(result))
    }

    fn verify_pin<'a>(
        &'a self,
        identity: &'a Identity,
        pin: &'a Pin,
    ) -> BoxFuture<'a, Result<PinCheck, SolitudeError>> {
        let result = self
            .record(Call::VerifyPin(identity.to_string()))
            .map(|state| {
                state.pin_check.unwrap_or(PinCheck {
                    locked: false,
                    valid: state.pin.as_deref() == Some(pin.as_str()),
                })
            });
        Box::pin(ready(result))
    }

    fn confirm_pin<'a>(
        &'a self,
        identity: &'a Identity,
        pin: &'a Pin,
    ) -> BoxFuture<'a, Result<bool, SolitudeError>> {
        let result = self
            .record(Call::ConfirmPin(identity.to_string()))
            .map(|state| {
                state
                    .confirm
                    .unwrap_or_else(|| state.pin.as_deref() == Some(pin.as_str()))
            });
        Box::pin(ready(result))
    }

    fn set_new_pin<'a>(
        &'a self,
        buyer: &'a Buyer,
        pin: &'a Pin,
    ) -> BoxFuture<'a, Result<OperationResult, SolitudeError>> {
        let result = self.write(Call::SetNewPin(buyer.uuid.to_string()), |state| {
            state.new_pin = Some(pin.as_str().to_string());
        });
        Box::pin(ready(result))
    }

    fn set_needs_pin_reset<'a>(
        &'a self,
        buyer: &'a Buyer,
        needs_reset: bool,
    ) -> BoxFuture<'a, Result<(), SolitudeError>> {
        let result = self
            .record(Call::SetNeedsPinReset(buyer.uuid.to_string(), needs_reset))
            .map(|mut state| state.needs_pin_reset = needs_reset);
        Box::pin(ready(result))
    }

    fn reset_confirm_pin<'a>(
        &'a self,
        identity: &'a Identity,
        pin: &'a Pin,
    ) -> BoxFuture<'a, Result<bool, SolitudeError>> {
        let result = self
            .record(Call::ResetConfirmPin(identity.to_string()))
            .map(|mut state| {
                let confirmed = state
                    .reset_confirm
                    .unwrap_or_else(|| state.new_pin.as_deref() == Some(pin.as_str()));
                if confirmed {
                    if let Some(new_pin) = state.new_pin.take() {
                        state.pin = Some(new_pin);
                    }
                    state.needs_pin_reset = false;
                }
                confirmed
            });
        Box::pin(ready(result))
    }
}
