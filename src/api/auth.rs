use axum::{
    Extension, Json,
    extract::{Request, State, rejection::JsonRejection},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::csrf::csrf_cookie;
use super::validation::validate_email;
use super::{ApiError, ApiResponse, AppState, MessageResponse, SessionDto, UserDto};
use crate::auth::csrf::ANONYMOUS_BINDING;
use crate::auth::{AuthContext, Permission, SESSION_COOKIE, SessionState};
use crate::services::AccountError;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub user: UserDto,
    pub state: SessionState,
    /// Bound to the new session; the previous token stops verifying.
    pub csrf_token: String,
}

#[derive(Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

// ============================================================================
// Middleware
// ============================================================================

/// Resolves the `session_token` cookie into an [`AuthContext`] and attaches
/// it to the request. Never rejects on its own: a missing, tampered or
/// expired token leaves the request anonymous and the handler's permission
/// check decides.
pub async fn session_middleware(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let context = match jar.get(SESSION_COOKIE) {
        Some(cookie) => state.auth().resolve_session(cookie.value()).await?,
        None => AuthContext::anonymous(),
    };

    match &context {
        AuthContext::Authenticated { user, .. } => {
            tracing::Span::current().record("user_id", user.id);
        }
        AuthContext::Anonymous {
            reason: Some(reason),
        } => {
            tracing::debug!(reason = reason.metric_label(), "Session token rejected");
        }
        AuthContext::Anonymous { reason: None } => {}
    }

    request.extensions_mut().insert(context);
    Ok(next.run(request).await)
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    payload: Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Some(payload) = parse_login(payload) else {
        record_login("malformed");
        return Err(ApiError::validation("Invalid login request format."));
    };

    let email = validate_email(&payload.email).inspect_err(|_| record_login("invalid"))?;
    if payload.password.is_empty() {
        record_login("invalid");
        return Err(ApiError::validation("Enter your password to continue."));
    }

    let result = match state.auth().login(&email, &payload.password).await {
        Ok(result) => result,
        Err(AccountError::InvalidCredentials) => {
            record_login("failure");
            tracing::info!("Login failed");
            return Err(ApiError::Unauthorized("Invalid credentials".to_string()));
        }
        Err(e) => {
            record_login("error");
            return Err(e.into());
        }
    };

    record_login("success");
    tracing::info!(user_id = result.user.id, state = ?result.state, "User logged in");

    let csrf_token = state.csrf().issue(&result.token)?;
    let jar = jar
        .add(session_cookie(&state, result.token))
        .add(csrf_cookie(&state, csrf_token.clone()));
    let body = LoginResponse {
        user: UserDto::from(&result.user),
        state: result.state,
        csrf_token,
    };

    Ok((jar, Json(ApiResponse::success(body))))
}

/// POST /auth/logout
pub async fn logout(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<impl IntoResponse, ApiError> {
    let csrf_token = state.csrf().issue(ANONYMOUS_BINDING)?;
    let jar = jar
        .remove(Cookie::build(SESSION_COOKIE).path("/"))
        .add(csrf_cookie(&state, csrf_token));
    Ok((
        jar,
        Json(ApiResponse::success(MessageResponse::new("Logged out"))),
    ))
}

/// GET /auth/me
///
/// Open to any authenticated user, forced-change sessions included, so the
/// client can tell it must show the password form.
pub async fn me(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<ApiResponse<SessionDto>>, ApiError> {
    let AuthContext::Authenticated { user, state: session_state } = &auth else {
        return Err(ApiError::Unauthorized("Not authenticated".to_string()));
    };

    Ok(Json(ApiResponse::success(SessionDto {
        user: UserDto::from(user),
        state: *session_state,
        permissions: state.guard().effective_permissions(&auth),
    })))
}

/// PUT /auth/password
pub async fn change_password(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    payload: Result<Json<ChangePasswordRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    let user = state
        .guard()
        .require_user(&auth, Permission::ChangeOwnPassword)?;
    let Json(payload) = payload?;

    if payload.new_password.is_empty() {
        return Err(ApiError::validation("New password is required"));
    }

    state
        .auth()
        .change_password(user.id, &payload.current_password, &payload.new_password)
        .await?;

    tracing::info!(user_id = user.id, "Password changed");

    Ok(Json(ApiResponse::success(MessageResponse::new(
        "Password changed successfully",
    ))))
}

fn session_cookie(state: &AppState, token: String) -> Cookie<'static> {
    let secure = state.config().server.secure_cookies;
    let max_age = time::Duration::seconds(state.sessions().ttl().num_seconds());

    Cookie::build((SESSION_COOKIE, token))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(max_age)
        .build()
}

fn parse_login(payload: Result<Json<serde_json::Value>, JsonRejection>) -> Option<LoginRequest> {
    let Json(value) = payload.ok()?;
    if !value.is_object() {
        return None;
    }
    serde_json::from_value(value).ok()
}

fn record_login(outcome: &'static str) {
    metrics::counter!("auth_login_total", "outcome" => outcome).increment(1);
}
