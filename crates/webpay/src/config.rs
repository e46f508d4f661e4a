//! Webpay configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `WEBPAY_SITE_URL` - Public URL of this site; also the assertion audience
//! - `SOLITUDE_URL` - Base URL of the solitude account service
//!
//! ## Optional
//! - `WEBPAY_HOST` - Bind address (default: 127.0.0.1)
//! - `WEBPAY_PORT` - Listen port (default: 8000)
//! - `WEBPAY_PAYMENT_URL` - Where a verified buyer continues to (default: /mozpay/)
//! - `WEBPAY_DATABASE_URL` - `PostgreSQL` URL for the session store (falls back to
//!   `DATABASE_URL`; sessions are kept in memory when neither is set)
//! - `SOLITUDE_API_TOKEN` - Bearer token for solitude (validated for strength)
//! - `SOLITUDE_TIMEOUT_SECS` - Per-request timeout for solitude calls (default: 10)
//! - `BROWSERID_VERIFICATION_URL` - Assertion verifier endpoint
//! - `BROWSERID_UNVERIFIED_ISSUER` - Issuer forced for unverified emails
//! - `BROWSERID_ALLOW_UNVERIFIED` - Accept unverified emails (default: true)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Transaction sample rate (default: 0.0)

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

const DEFAULT_VERIFICATION_URL: &str = "https://verifier.login.persona.org/verify";
const DEFAULT_UNVERIFIED_ISSUER: &str = "login.persona.org";

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Webpay application configuration.
#[derive(Debug, Clone)]
pub struct WebpayConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public URL of this site (scheme, host, port)
    pub site_url: Url,
    /// Where to send a buyer once their PIN checks out
    pub payment_url: String,
    /// `PostgreSQL` URL for persistent sessions
    pub database_url: Option<SecretString>,
    /// Solitude account service configuration
    pub solitude: SolitudeConfig,
    /// Identity assertion verification configuration
    pub browserid: BrowserIdConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
    /// Fraction of errors sent to Sentry
    pub sentry_sample_rate: f32,
    /// Fraction of transactions traced in Sentry
    pub sentry_traces_sample_rate: f32,
}

/// Solitude account service configuration.
///
/// Implements `Debug` manually to redact the API token.
#[derive(Clone)]
pub struct SolitudeConfig {
    /// Base URL, e.g. `https://solitude.internal/`
    pub url: Url,
    /// Optional bearer token
    pub api_token: Option<SecretString>,
    /// Per-request timeout
    pub timeout: Duration,
}

impl std::fmt::Debug for SolitudeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SolitudeConfig")
            .field("url", &self.url.as_str())
            .field(
                "api_token",
                &self.api_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Identity assertion verification configuration.
#[derive(Debug, Clone)]
pub struct BrowserIdConfig {
    /// Remote verifier endpoint
    pub verification_url: Url,
    /// Issuer to force when accepting unverified emails
    pub unverified_issuer: String,
    /// Whether unverified emails are accepted
    pub allow_unverified: bool,
}

impl WebpayConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let host = get_env_or_default("WEBPAY_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("WEBPAY_HOST".to_string(), e.to_string()))?;
        let port = get_env_or_default("WEBPAY_PORT", "8000")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("WEBPAY_PORT".to_string(), e.to_string()))?;
        let site_url = get_required_url("WEBPAY_SITE_URL")?;
        let payment_url = get_env_or_default("WEBPAY_PAYMENT_URL", "/mozpay/");
        let database_url = get_database_url("WEBPAY_DATABASE_URL");

        let solitude = SolitudeConfig::from_env()?;
        let browserid = BrowserIdConfig::from_env()?;

        Ok(Self {
            host,
            port,
            site_url,
            payment_url,
            database_url,
            solitude,
            browserid,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
            sentry_sample_rate: get_parsed_or_default("SENTRY_SAMPLE_RATE", 1.0)?,
            sentry_traces_sample_rate: get_parsed_or_default("SENTRY_TRACES_SAMPLE_RATE", 0.0)?,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Audience that identity assertions must be issued for.
    ///
    /// This is the site origin, e.g. `https://pay.example.com` (no trailing slash).
    #[must_use]
    pub fn audience(&self) -> String {
        self.site_url.origin().ascii_serialization()
    }

    /// Whether the site is served over HTTPS (controls the `Secure` cookie flag).
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.site_url.scheme() == "https"
    }
}

impl SolitudeConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let timeout_secs: u64 = get_parsed_or_default("SOLITUDE_TIMEOUT_SECS", 10)?;
        Ok(Self {
            url: get_required_url("SOLITUDE_URL")?,
            api_token: get_optional_validated_secret("SOLITUDE_API_TOKEN")?,
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}

impl BrowserIdConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let verification_url = parse_url(
            "BROWSERID_VERIFICATION_URL",
            &get_env_or_default("BROWSERID_VERIFICATION_URL", DEFAULT_VERIFICATION_URL),
        )?;
        Ok(Self {
            verification_url,
            unverified_issuer: get_env_or_default(
                "BROWSERID_UNVERIFIED_ISSUER",
                DEFAULT_UNVERIFIED_ISSUER,
            ),
            allow_unverified: get_parsed_or_default("BROWSERID_ALLOW_UNVERIFIED", true)?,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get a required environment variable as a URL.
fn get_required_url(key: &str) -> Result<Url, ConfigError> {
    parse_url(key, &get_required_env(key)?)
}

fn parse_url(key: &str, value: &str) -> Result<Url, ConfigError> {
    Url::parse(value).map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL` (used by Fly.io postgres attach).
fn get_database_url(primary_key: &str) -> Option<SecretString> {
    std::env::var(primary_key)
        .or_else(|_| std::env::var("DATABASE_URL"))
        .ok()
        .map(SecretString::from)
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable, using `default` when unset.
fn get_parsed_or_default<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match get_optional_env(key) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string())),
        None => Ok(default),
    }
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate an optional secret from environment.
fn get_optional_validated_secret(key: &str) -> Result<Option<SecretString>, ConfigError> {
    get_optional_env(key)
        .map(|value| {
            validate_secret_strength(&value, key)?;
            Ok(SecretString::from(value))
        })
        .transpose()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn test_config(site_url: &str) -> WebpayConfig {
        WebpayConfig {
            host: "127.0.0.1".parse().unwrap(),
            port: 8000,
            site_url: Url::parse(site_url).unwrap(),
            payment_url: "/mozpay/".to_string(),
            database_url: None,
            solitude: SolitudeConfig {
                url: Url::parse("http://solitude.local/").unwrap(),
                api_token: Some(SecretString::from("super_secret_solitude_token")),
                timeout: Duration::from_secs(10),
            },
            browserid: BrowserIdConfig {
                verification_url: Url::parse(DEFAULT_VERIFICATION_URL).unwrap(),
                unverified_issuer: DEFAULT_UNVERIFIED_ISSUER.to_string(),
                allow_unverified: true,
            },
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 0.0,
        }
    }

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        // "ab" has entropy of 1 bit per char (50% a, 50% b)
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let result = validate_secret_strength("your-api-key-here", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        let result = validate_secret_strength("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6", "TEST_VAR");
        assert!(result.is_ok());
    }

    #[test]
    fn test_socket_addr() {
        let config = test_config("http://localhost:8000");
        let addr = config.socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 8000);
    }

    #[test]
    fn test_audience_is_origin() {
        let config = test_config("https://pay.example.org/some/path");
        assert_eq!(config.audience(), "https://pay.example.org");

        let config = test_config("http://localhost:8000/");
        assert_eq!(config.audience(), "http://localhost:8000");
    }

    #[test]
    fn test_is_secure() {
        assert!(test_config("https://pay.example.org").is_secure());
        assert!(!test_config("http://localhost:8000").is_secure());
    }

    #[test]
    fn test_solitude_config_debug_redacts_token() {
        let config = test_config("http://localhost:8000");
        let debug_output = format!("{:?}", config.solitude);

        assert!(debug_output.contains("solitude.local"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super_secret_solitude_token"));
    }

    #[test]
    fn test_parse_url_invalid() {
        let result = parse_url("TEST_URL", "not a url");
        assert!(matches!(result, Err(ConfigError::InvalidEnvVar(_, _))));
    }
}
