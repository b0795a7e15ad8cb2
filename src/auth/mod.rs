//! Session authentication and role-based authorization.

pub mod csrf;
mod error;
pub mod password;
pub mod rbac;
pub mod session;

pub use csrf::CsrfSigner;
pub use error::AuthError;
pub use password::PasswordHasher;
pub use rbac::{AuthContext, Permission, RbacGuard, RolePermissions, SessionState, can_manage};
pub use session::{SessionClaims, SessionIssuer};

pub use crate::entities::users::Role;

/// Name of the cookie carrying the session token.
pub const SESSION_COOKIE: &str = "session_token";

/// Name of the cookie carrying the CSRF token. Readable by scripts so the
/// client can echo it back in [`CSRF_HEADER`].
pub const CSRF_COOKIE: &str = "csrf_token";

pub const CSRF_HEADER: &str = "x-csrf-token";
