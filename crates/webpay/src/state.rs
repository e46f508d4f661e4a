//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::WebpayConfig;
use crate::services::browserid::{AssertionVerifier, BrowserIdError, BrowserIdVerifier};
use crate::solitude::{AccountService, SolitudeClient, SolitudeError};

/// Error building the remote clients.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("solitude client: {0}")]
    Solitude(#[from] SolitudeError),
    #[error("browserid verifier: {0}")]
    BrowserId(#[from] BrowserIdError),
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// configuration and the remote services.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: WebpayConfig,
    accounts: Arc<dyn AccountService>,
    verifier: Arc<dyn AssertionVerifier>,
    pool: Option<PgPool>,
}

impl AppState {
    /// Create application state backed by the real solitude and verifier
    /// clients.
    ///
    /// # Arguments
    ///
    /// * `config` - Webpay configuration
    /// * `pool` - `PostgreSQL` pool holding sessions, if configured
    ///
    /// # Errors
    ///
    /// Returns an error if either HTTP client cannot be built.
    pub fn new(config: WebpayConfig, pool: Option<PgPool>) -> Result<Self, StateError> {
        let accounts = Arc::new(SolitudeClient::new(&config.solitude)?);
        let verifier = Arc::new(BrowserIdVerifier::new(
            config.browserid.clone(),
            config.solitude.timeout,
        )?);

        Ok(Self::with_services(config, accounts, verifier, pool))
    }

    /// Create application state with explicit service implementations.
    #[must_use]
    pub fn with_services(
        config: WebpayConfig,
        accounts: Arc<dyn AccountService>,
        verifier: Arc<dyn AssertionVerifier>,
        pool: Option<PgPool>,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                accounts,
                verifier,
                pool,
            }),
        }
    }

    /// Get a reference to the webpay configuration.
    #[must_use]
    pub fn config(&self) -> &WebpayConfig {
        &self.inner.config
    }

    /// Get the account service.
    #[must_use]
    pub fn accounts(&self) -> &dyn AccountService {
        self.inner.accounts.as_ref()
    }

    /// Get the assertion verifier.
    #[must_use]
    pub fn verifier(&self) -> &dyn AssertionVerifier {
        self.inner.verifier.as_ref()
    }

    /// Get the session database pool, if sessions are persisted.
    #[must_use]
    pub fn pool(&self) -> Option<&PgPool> {
        self.inner.pool.as_ref()
    }
}
