//! Request authentication for the trigger endpoints.
//!
//! Two independent mechanisms, either of which grants access: a shared key
//! (`X-KEY` header or `?key=` query parameter) and HTTP basic auth. With
//! neither configured, every request passes through.

use {
    axum::{
        extract::{Request, State},
        http::{HeaderValue, StatusCode, header},
        middleware::Next,
        response::{IntoResponse, Response},
    },
    base64::{Engine as _, engine::general_purpose::STANDARD},
    jobtick_config::AuthConfig,
    tracing::warn,
};

use crate::AppState;

pub async fn require_auth(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let auth = &state.auth;
    if !auth.basic_enabled() && auth.key.is_none() {
        return next.run(request).await;
    }

    if let Some(key) = request
        .headers()
        .get("x-key")
        .and_then(|v| v.to_str().ok())
        && auth.check_key(key)
    {
        return next.run(request).await;
    }
    if let Some(query) = request.uri().query()
        && let Some(key) = query_param(query, "key")
        && auth.check_key(key)
    {
        return next.run(request).await;
    }

    if auth.basic_enabled()
        && let Some(value) = request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
        && let Some((username, password)) = parse_basic(value)
        && auth.check_basic(&username, &password)
    {
        return next.run(request).await;
    }

    warn!(path = %request.uri().path(), "trigger request denied");
    unauthorized(auth)
}

fn unauthorized(auth: &AuthConfig) -> Response {
    let mut response =
        (StatusCode::UNAUTHORIZED, "authentication required\n").into_response();
    if auth.basic_enabled() {
        response.headers_mut().insert(
            header::WWW_AUTHENTICATE,
            HeaderValue::from_static("Basic realm=\"jobtick\""),
        );
    }
    response
}

/// Decode `Authorization: Basic <base64(user:pass)>`.
fn parse_basic(value: &str) -> Option<(String, String)> {
    let encoded = value.strip_prefix("Basic ")?;
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}

/// First value for `name` in a raw query string. Keys are opaque tokens, so
/// no percent-decoding is applied.
fn query_param<'a>(query: &'a str, name: &str) -> Option<&'a str> {
    query.split('&').find_map(|pair| {
        let (k, v) = pair.split_once('=')?;
        (k == name).then_some(v)
    })
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic() {
        // base64("admin:s3cret")
        let value = format!("Basic {}", STANDARD.encode("admin:s3cret"));
        assert_eq!(
            parse_basic(&value),
            Some(("admin".to_string(), "s3cret".to_string()))
        );
        assert_eq!(parse_basic("Bearer token"), None);
        assert_eq!(parse_basic("Basic not-base64!"), None);
    }

    #[test]
    fn test_query_param() {
        assert_eq!(query_param("key=abc&x=1", "key"), Some("abc"));
        assert_eq!(query_param("x=1&key=abc", "key"), Some("abc"));
        assert_eq!(query_param("keyed=abc", "key"), None);
        assert_eq!(query_param("", "key"), None);
    }
}
