//! Response security headers.
//!
//! Every page is locked down except where the BrowserID login needs it: the
//! identity provider's `include.js` and login frame load from its origin, and
//! its popup must be able to talk back to the page that opened it.

use axum::{
    extract::Request,
    http::{
        HeaderName, HeaderValue,
        header::{
            CACHE_CONTROL, CONTENT_SECURITY_POLICY, REFERRER_POLICY, X_CONTENT_TYPE_OPTIONS,
            X_FRAME_OPTIONS,
        },
    },
    middleware::Next,
    response::Response,
};

const CONTENT_SECURITY: &str = "default-src 'none'; \
     script-src 'self' https://login.persona.org; \
     frame-src https://login.persona.org; \
     style-src 'self'; \
     img-src 'self'; \
     connect-src 'self'; \
     object-src 'none'; \
     base-uri 'self'; \
     form-action 'self'; \
     frame-ancestors 'none'; \
     upgrade-insecure-requests";

const PERMISSIONS: &str = "camera=(), geolocation=(), microphone=(), payment=(), \
     publickey-credentials-get=(), usb=()";

/// Headers set on every response.
///
/// COOP keeps popups reachable and COEP is `credentialless` because the
/// stricter values break the login popup and its cross-origin script.
const HEADERS: [(HeaderName, &str); 10] = [
    (X_FRAME_OPTIONS, "DENY"),
    (X_CONTENT_TYPE_OPTIONS, "nosniff"),
    (REFERRER_POLICY, "no-referrer"),
    (CONTENT_SECURITY_POLICY, CONTENT_SECURITY),
    (HeaderName::from_static("permissions-policy"), PERMISSIONS),
    (CACHE_CONTROL, "no-store, max-age=0"),
    (
        HeaderName::from_static("cross-origin-opener-policy"),
        "same-origin-allow-popups",
    ),
    (
        HeaderName::from_static("cross-origin-resource-policy"),
        "same-origin",
    ),
    (
        HeaderName::from_static("cross-origin-embedder-policy"),
        "credentialless",
    ),
    (HeaderName::from_static("x-dns-prefetch-control"), "off"),
];

/// Add security headers to all responses.
///
/// PIN pages and verification results are never cached.
pub async fn security_headers_middleware(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    for (name, value) in HEADERS {
        headers.insert(name, HeaderValue::from_static(value));
    }

    response
}
