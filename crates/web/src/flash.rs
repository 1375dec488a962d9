//! One-shot flash messages carried in a cookie across a redirect.
//!
//! A handler that redirects attaches a [`Flash`] to the response with
//! [`Flash::redirect`]. On the next request [`flash_middleware`] decodes the
//! cookie into request extensions, where handlers read it as an
//! `Option<Flash>` extractor, and expires the cookie so the message is shown
//! once.

use axum::{
    extract::{OptionalFromRequestParts, Request},
    http::{
        HeaderValue,
        header::{COOKIE, SET_COOKIE},
        request::Parts,
    },
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};

/// Cookie holding the pending flash.
pub const FLASH_COOKIE: &str = "flash";

/// How long an undelivered flash survives.
const FLASH_MAX_AGE_SECONDS: u32 = 300;

/// Visual weight of a flash message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Notice,
    Warning,
    Error,
}

impl Priority {
    /// CSS modifier used by the layout.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Notice => "notice",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

/// A message to show on the next page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    pub priority: Priority,
    pub message: String,
}

impl Flash {
    #[must_use]
    pub fn notice(message: impl Into<String>) -> Self {
        Self {
            priority: Priority::Notice,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            priority: Priority::Warning,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            priority: Priority::Error,
            message: message.into(),
        }
    }

    /// Cookie-safe encoding: base64url of the JSON form.
    #[must_use]
    pub fn encode(&self) -> String {
        // Serializing a struct of an enum and a string cannot fail.
        let json = serde_json::to_vec(self).unwrap_or_default();
        URL_SAFE_NO_PAD.encode(json)
    }

    /// Inverse of [`Flash::encode`]. Garbage yields `None`.
    #[must_use]
    pub fn decode(value: &str) -> Option<Self> {
        let bytes = URL_SAFE_NO_PAD.decode(value).ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    /// Redirect to `to`, showing this message on arrival.
    #[must_use]
    pub fn redirect(self, to: &str) -> Response {
        let mut response = Redirect::to(to).into_response();
        let cookie = format!(
            "{FLASH_COOKIE}={}; Path=/; Max-Age={FLASH_MAX_AGE_SECONDS}; HttpOnly; SameSite=Lax",
            self.encode()
        );
        if let Ok(value) = HeaderValue::from_str(&cookie) {
            response.headers_mut().append(SET_COOKIE, value);
        }
        response
    }
}

/// Find and decode the flash cookie among the request's `Cookie` headers.
fn read_flash_cookie(headers: &axum::http::HeaderMap) -> Option<Flash> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == FLASH_COOKIE)
        .and_then(|(_, value)| Flash::decode(value))
}

fn sets_flash(response: &Response) -> bool {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .any(|value| value.starts_with(&format!("{FLASH_COOKIE}=")))
}

/// Move an incoming flash cookie into request extensions and expire it.
///
/// The cookie is left alone when the response sets a new flash itself.
pub async fn flash_middleware(mut request: Request, next: Next) -> Response {
    let flash = read_flash_cookie(request.headers());
    let had_flash = flash.is_some();
    if let Some(flash) = flash {
        request.extensions_mut().insert(flash);
    }

    let mut response = next.run(request).await;

    if had_flash && !sets_flash(&response) {
        let expired = format!("{FLASH_COOKIE}=; Path=/; Max-Age=0; HttpOnly; SameSite=Lax");
        if let Ok(value) = HeaderValue::from_str(&expired) {
            response.headers_mut().append(SET_COOKIE, value);
        }
    }

    response
}

impl<S> OptionalFromRequestParts<S> for Flash
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(parts.extensions.get::<Self>().cloned())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::{Router, body::Body, http::StatusCode, routing::get};
    use tower::ServiceExt;

    use super::*;

    #[test]
    fn test_encode_decode() {
        let flash = Flash::warning("Heads up; this = that");
        let encoded = flash.encode();
        assert!(!encoded.contains(';'));
        assert!(!encoded.contains('='));
        assert_eq!(Flash::decode(&encoded), Some(flash));
        assert_eq!(Flash::decode("not base64!"), None);
    }

    #[test]
    fn test_redirect_sets_cookie() {
        let response = Flash::error("Nope").redirect("/login");
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers().get("location").unwrap(), "/login");
        let cookie = response.headers().get(SET_COOKIE).unwrap().to_str().unwrap();
        assert!(cookie.starts_with("flash="));
        assert!(cookie.contains("HttpOnly"));
    }

    #[test]
    fn test_read_flash_cookie_among_others() {
        let flash = Flash::notice("Saved");
        let mut headers = axum::http::HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_str(&format!("sc_session=abc; flash={}", flash.encode())).unwrap(),
        );
        assert_eq!(read_flash_cookie(&headers), Some(flash));
    }

    async fn show(flash: Option<Flash>) -> String {
        flash.map(|f| f.message).unwrap_or_default()
    }

    #[tokio::test]
    async fn test_middleware_delivers_once() {
        let app = Router::new()
            .route("/", get(show))
            .layer(axum::middleware::from_fn(flash_middleware));

        let request = axum::http::Request::builder()
            .uri("/")
            .header(COOKIE, format!("flash={}", Flash::notice("Welcome").encode()))
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        let cookie = response.headers().get(SET_COOKIE).unwrap().to_str().unwrap();
        assert!(cookie.contains("Max-Age=0"));
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(body.as_ref(), b"Welcome");
    }

    #[tokio::test]
    async fn test_middleware_keeps_new_flash() {
        let app = Router::new()
            .route("/", get(|| async { Flash::notice("Again").redirect("/") }))
            .layer(axum::middleware::from_fn(flash_middleware));

        let request = axum::http::Request::builder()
            .uri("/")
            .header(COOKIE, format!("flash={}", Flash::notice("First").encode()))
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        let cookies: Vec<_> = response.headers().get_all(SET_COOKIE).iter().collect();
        assert_eq!(cookies.len(), 1);
        assert!(!cookies.first().unwrap().to_str().unwrap().contains("Max-Age=0"));
    }
}
