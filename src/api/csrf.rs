use axum::{
    Json,
    extract::{Request, State},
    http::{HeaderMap, Method, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Serialize;
use std::sync::Arc;

use super::{ApiError, ApiResponse, AppState};
use crate::auth::csrf::{ANONYMOUS_BINDING, constant_time_eq};
use crate::auth::{CSRF_COOKIE, CSRF_HEADER, CsrfSigner, SESSION_COOKIE};

const TOKEN_REJECTED: &str = "CSRF token missing or invalid";
const ORIGIN_REJECTED: &str = "Cross-site request blocked: origin mismatch";

#[derive(Serialize)]
pub struct CsrfTokenResponse {
    pub csrf_token: String,
}

/// Rejects mutating requests that fail the same-origin check or do not echo
/// the `csrf_token` cookie in the `x-csrf-token` header.
pub async fn csrf_middleware(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if !is_mutating(request.method()) {
        return Ok(next.run(request).await);
    }

    if !is_same_origin(
        request.headers(),
        &state.config().server.cors_allowed_origins,
    ) {
        record_rejection("origin");
        tracing::info!(path = %request.uri().path(), "Cross-site request rejected");
        return Err(ApiError::CsrfRejected(ORIGIN_REJECTED.to_string()));
    }

    let submitted = request
        .headers()
        .get(CSRF_HEADER)
        .and_then(|v| v.to_str().ok());
    let cookie = jar.get(CSRF_COOKIE).map(Cookie::value);

    if !token_matches(state.csrf(), submitted, cookie, session_binding(&jar)) {
        record_rejection(if submitted.is_none() { "missing" } else { "invalid" });
        tracing::info!(path = %request.uri().path(), "CSRF token rejected");
        return Err(ApiError::CsrfRejected(TOKEN_REJECTED.to_string()));
    }

    Ok(next.run(request).await)
}

/// GET /auth/csrf
///
/// Hands out a token bound to the caller's current session cookie, reusing
/// the existing one while it still verifies.
pub async fn get_csrf_token(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<impl IntoResponse, ApiError> {
    let binding = session_binding(&jar);
    let token = match jar.get(CSRF_COOKIE) {
        Some(existing) if state.csrf().verify(existing.value(), binding) => {
            existing.value().to_string()
        }
        _ => state.csrf().issue(binding)?,
    };

    let jar = jar.add(csrf_cookie(&state, token.clone()));
    Ok((
        jar,
        Json(ApiResponse::success(CsrfTokenResponse { csrf_token: token })),
    ))
}

/// Not `HttpOnly`: the client reads it to fill the header.
pub(super) fn csrf_cookie(state: &AppState, token: String) -> Cookie<'static> {
    let max_age = time::Duration::seconds(state.sessions().ttl().num_seconds());

    Cookie::build((CSRF_COOKIE, token))
        .http_only(false)
        .secure(state.config().server.secure_cookies)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(max_age)
        .build()
}

fn session_binding(jar: &CookieJar) -> &str {
    jar.get(SESSION_COOKIE)
        .map_or(ANONYMOUS_BINDING, Cookie::value)
}

fn is_mutating(method: &Method) -> bool {
    [Method::POST, Method::PUT, Method::PATCH, Method::DELETE].contains(method)
}

fn token_matches(
    signer: &CsrfSigner,
    submitted: Option<&str>,
    cookie: Option<&str>,
    session_binding: &str,
) -> bool {
    let (Some(submitted), Some(cookie)) = (submitted, cookie) else {
        return false;
    };

    constant_time_eq(submitted.as_bytes(), cookie.as_bytes())
        && signer.verify(submitted, session_binding)
}

/// Requests without an `Origin` pass. Otherwise the origin must be one of the
/// configured CORS origins or match the `Host` the request was sent to.
fn is_same_origin(headers: &HeaderMap, allowed_origins: &[String]) -> bool {
    let Some(origin) = headers.get(header::ORIGIN) else {
        return true;
    };
    let Ok(origin) = origin.to_str() else {
        return false;
    };

    if allowed_origins
        .iter()
        .filter(|allowed| allowed.as_str() != "*")
        .any(|allowed| allowed.trim_end_matches('/').eq_ignore_ascii_case(origin))
    {
        return true;
    }

    let Ok(origin_url) = url::Url::parse(origin) else {
        return false;
    };
    let Some(host) = headers.get(header::HOST).and_then(|h| h.to_str().ok()) else {
        return false;
    };
    // The scheme is not visible behind a proxy; compare host and port.
    let Ok(request_url) = url::Url::parse(&format!("{}://{host}", origin_url.scheme())) else {
        return false;
    };

    origin_url.origin() == request_url.origin()
}

fn record_rejection(reason: &'static str) {
    metrics::counter!("csrf_rejected_total", "reason" => reason).increment(1);
}
