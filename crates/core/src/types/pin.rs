//! PIN type.

use core::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Errors that can occur when parsing a [`Pin`].
///
/// The messages match the ones the remote account service returns for the
/// same mistakes, so a form shows the same text whichever side rejected it.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinError {
    /// The input is not exactly [`Pin::LENGTH`] characters.
    #[error("PIN must be exactly 4 numbers long")]
    WrongLength,
    /// The input contains something other than ASCII digits.
    #[error("PIN may only consist of numbers")]
    NonNumeric,
}

/// A four digit PIN.
///
/// ## Constraints
///
/// - Exactly 4 characters
/// - ASCII digits only
///
/// `Debug` never prints the digits. `Serialize` writes the plain string since
/// the remote account service expects it in request bodies.
///
/// ## Examples
///
/// ```
/// use webpay_core::Pin;
///
/// assert!(Pin::parse("1234").is_ok());
/// assert!(Pin::parse("0000").is_ok());
///
/// assert!(Pin::parse("123").is_err());   // too short
/// assert!(Pin::parse("12345").is_err()); // too long
/// assert!(Pin::parse("12a4").is_err());  // not numeric
/// ```
#[derive(Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Pin(String);

impl Pin {
    /// Number of digits in a PIN.
    pub const LENGTH: usize = 4;

    /// Parse a `Pin` from user input.
    ///
    /// Input is taken exactly as submitted: whitespace is never trimmed, so
    /// `"1234 "` and `" 123"` are both rejected.
    ///
    /// # Errors
    ///
    /// Returns [`PinError::WrongLength`] if the input is not exactly four
    /// characters, otherwise [`PinError::NonNumeric`] if any character is not
    /// an ASCII digit.
    pub fn parse(s: &str) -> Result<Self, PinError> {
        if s.chars().count() != Self::LENGTH {
            return Err(PinError::WrongLength);
        }

        if !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(PinError::NonNumeric);
        }

        Ok(Self(s.to_owned()))
    }

    /// Returns the PIN digits.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Pin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Pin(****)")
    }
}

impl<'de> Deserialize<'de> for Pin {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid() {
        assert_eq!(Pin::parse("1234").unwrap().as_str(), "1234");
        assert_eq!(Pin::parse("0000").unwrap().as_str(), "0000");
        assert_eq!(Pin::parse("9870").unwrap().as_str(), "9870");
    }

    #[test]
    fn test_parse_wrong_length() {
        assert_eq!(Pin::parse(""), Err(PinError::WrongLength));
        assert_eq!(Pin::parse("123"), Err(PinError::WrongLength));
        assert_eq!(Pin::parse("12345"), Err(PinError::WrongLength));
    }

    #[test]
    fn test_parse_length_checked_before_digits() {
        assert_eq!(Pin::parse("12a"), Err(PinError::WrongLength));
    }

    #[test]
    fn test_parse_non_numeric() {
        assert_eq!(Pin::parse("abcd"), Err(PinError::NonNumeric));
        assert_eq!(Pin::parse("12 4"), Err(PinError::NonNumeric));
        assert_eq!(Pin::parse("-123"), Err(PinError::NonNumeric));
    }

    #[test]
    fn test_parse_rejects_non_ascii_digits() {
        // Arabic-Indic digits are numeric to `char::is_numeric` but not to the remote service
        assert_eq!(Pin::parse("١٢٣٤"), Err(PinError::NonNumeric));
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            PinError::WrongLength.to_string(),
            "PIN must be exactly 4 numbers long"
        );
        assert_eq!(
            PinError::NonNumeric.to_string(),
            "PIN may only consist of numbers"
        );
    }

    #[test]
    fn test_debug_redacts_digits() {
        let pin = Pin::parse("4821").unwrap();
        let debug = format!("{pin:?}");
        assert!(!debug.contains("4821"));
        assert_eq!(debug, "Pin(****)");
    }

    #[test]
    fn test_serialize_plain_string() {
        let pin = Pin::parse("1234").unwrap();
        assert_eq!(serde_json::to_string(&pin).unwrap(), "\"1234\"");
    }

    #[test]
    fn test_deserialize_validates() {
        let pin: Pin = serde_json::from_str("\"5678\"").unwrap();
        assert_eq!(pin.as_str(), "5678");
        assert!(serde_json::from_str::<Pin>("\"56\"").is_err());
    }
}
