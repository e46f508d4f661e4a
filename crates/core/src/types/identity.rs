//! Buyer identity type.

use core::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Errors that can occur when deriving an [`Identity`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    /// The email is empty.
    #[error("email cannot be empty")]
    Empty,
    /// The email is too long.
    #[error("email must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// The email has no `@` or an empty side around it.
    #[error("email must look like local@domain")]
    Malformed,
}

/// Stable identifier for a buyer.
///
/// Derived from the email address the identity assertion vouched for, so the
/// same person maps to the same remote buyer record on every login. The
/// email itself never reaches the account service.
///
/// Format: `web:` followed by the first 32 hex characters of the SHA-256 of
/// the email.
///
/// ## Examples
///
/// ```
/// use webpay_core::Identity;
///
/// let a = Identity::from_email("buyer@example.com").unwrap();
/// let b = Identity::from_email("buyer@example.com").unwrap();
/// assert_eq!(a, b);
/// assert!(a.as_str().starts_with("web:"));
///
/// assert!(Identity::from_email("not-an-email").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    /// Prefix marking identities issued by the web flow.
    pub const PREFIX: &'static str = "web:";

    /// Maximum accepted email length (RFC 5321).
    pub const MAX_EMAIL_LENGTH: usize = 254;

    const DIGEST_HEX_LENGTH: usize = 32;

    /// Derive the identity for a verified email address.
    ///
    /// # Errors
    ///
    /// Returns an error if the email is empty, too long, or lacks a local
    /// part or domain around a single `@`.
    pub fn from_email(email: &str) -> Result<Self, IdentityError> {
        if email.is_empty() {
            return Err(IdentityError::Empty);
        }

        if email.len() > Self::MAX_EMAIL_LENGTH {
            return Err(IdentityError::TooLong {
                max: Self::MAX_EMAIL_LENGTH,
            });
        }

        match email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && !domain.is_empty() => {}
            _ => return Err(IdentityError::Malformed),
        }

        let digest = format!("{:x}", Sha256::digest(email.as_bytes()));
        let short = digest.get(..Self::DIGEST_HEX_LENGTH).unwrap_or(&digest);

        Ok(Self(format!("{}{short}", Self::PREFIX)))
    }

    /// Returns the identity as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Identity {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
