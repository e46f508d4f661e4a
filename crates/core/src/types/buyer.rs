//! Buyer records and operation results from the remote account service.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

use super::identity::Identity;

/// A buyer record owned by the remote account service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Buyer {
    /// Remote primary key, used to address the record for updates.
    #[serde(alias = "id", deserialize_with = "string_or_number")]
    pub resource_pk: String,
    /// The identity the buyer was created for.
    pub uuid: Identity,
    /// Whether a PIN is set. The service reports the PIN opaquely; only its
    /// presence matters here.
    #[serde(rename = "pin", default, deserialize_with = "pin_presence")]
    pub has_pin: bool,
    /// Whether the buyer must choose a new PIN before paying.
    #[serde(default)]
    pub needs_pin_reset: bool,
}

/// Result of looking a buyer up by identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuyerLookup {
    /// No buyer exists for the identity yet.
    NotFound,
    /// The buyer record.
    Found(Buyer),
}

impl BuyerLookup {
    /// Returns the buyer if one was found.
    #[must_use]
    pub const fn buyer(&self) -> Option<&Buyer> {
        match self {
            Self::NotFound => None,
            Self::Found(buyer) => Some(buyer),
        }
    }

    /// Whether the buyer exists and has a PIN set.
    #[must_use]
    pub const fn has_pin(&self) -> bool {
        matches!(self, Self::Found(buyer) if buyer.has_pin)
    }

    /// Whether the buyer exists and is flagged for a PIN reset.
    #[must_use]
    pub const fn needs_pin_reset(&self) -> bool {
        matches!(self, Self::Found(buyer) if buyer.needs_pin_reset)
    }
}

/// Field-level validation messages keyed by form field.
///
/// Absence of errors is what signals success, so an empty set never appears
/// inside [`OperationResult::ValidationFailed`] when built by the client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    /// Create an empty set of errors.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create errors holding a single message for one field.
    #[must_use]
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.push(field, message);
        errors
    }

    /// Append a message for a field.
    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    /// Messages for a field, empty if none.
    #[must_use]
    pub fn get(&self, field: &str) -> &[String] {
        self.0.get(field).map_or(&[], Vec::as_slice)
    }

    /// Messages for fields other than the given ones, including non-field errors.
    #[must_use]
    pub fn others(&self, known: &[&str]) -> Vec<String> {
        self.0
            .iter()
            .filter(|(field, _)| !known.contains(&field.as_str()))
            .flat_map(|(_, messages)| messages.iter().cloned())
            .collect()
    }

    /// Whether there are no messages at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.values().all(Vec::is_empty)
    }

    /// Rewrite every message with `f`, keeping the field keys.
    #[must_use]
    pub fn map_messages(self, f: impl Fn(&str) -> String) -> Self {
        Self(
            self.0
                .into_iter()
                .map(|(field, messages)| (field, messages.iter().map(|m| f(m)).collect()))
                .collect(),
        )
    }
}

/// Result of a remote write (create buyer, change PIN, set new PIN).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationResult {
    /// The write was accepted.
    Ok,
    /// The service rejected the submitted values.
    ValidationFailed(FieldErrors),
}

/// Result of checking a PIN against the stored one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct PinCheck {
    /// Too many failed attempts; the PIN cannot be used for now.
    #[serde(default)]
    pub locked: bool,
    /// The PIN matched.
    #[serde(default)]
    pub valid: bool,
}

/// Accept a primary key serialized as either a JSON string or number.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number for resource_pk, got {other}"
        ))),
    }
}

/// Treat null, false, and empty string as "no PIN"; anything else as set.
fn pin_presence<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null | serde_json::Value::Bool(false)) => false,
        Some(serde_json::Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    })
}
