//! User-facing text for messages returned by solitude.
//!
//! Solitude reports validation failures as developer-oriented strings. Known
//! ones are rewritten here before they reach a form; anything unknown is
//! shown as sent.

/// Known solitude messages and the text shown to buyers.
const ERROR_STRINGS: &[(&str, &str)] = &[
    (
        "PIN must be exactly 4 numbers long",
        "PIN must be exactly 4 numbers long",
    ),
    (
        "PIN may only consists of numbers",
        "PIN may only consist of numbers",
    ),
    ("You have already set a PIN.", "You have already set a PIN."),
    (
        "Buyer with this Uuid already exists.",
        "An account already exists for this login.",
    ),
];

/// Map a solitude message to the text shown on a form.
#[must_use]
pub fn error_string(message: &str) -> String {
    ERROR_STRINGS
        .iter()
        .find(|(raw, _)| *raw == message)
        .map_or_else(|| message.to_string(), |(_, shown)| (*shown).to_string())
}
