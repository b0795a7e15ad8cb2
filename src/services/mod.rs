pub mod auth_service;
pub use auth_service::{AccountError, AuthService, LoginResult, NewAccount};

pub mod auth_service_impl;
pub use auth_service_impl::SeaOrmAuthService;

pub mod bootstrap;
pub use bootstrap::{BootstrapOutcome, ensure_bootstrap_admin, reset_bootstrap_admin_password};
