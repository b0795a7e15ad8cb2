use std::sync::Arc;

use crate::auth::{CsrfSigner, PasswordHasher, RbacGuard, RolePermissions, SessionIssuer};
use crate::config::Config;
use crate::db::Store;
use crate::services::{AuthService, SeaOrmAuthService, ensure_bootstrap_admin};

/// Process-wide services, built once at startup and never mutated.
#[derive(Clone)]
pub struct SharedState {
    pub config: Arc<Config>,

    pub store: Store,

    pub hasher: PasswordHasher,

    pub sessions: SessionIssuer,

    pub csrf: CsrfSigner,

    pub guard: RbacGuard,

    pub auth_service: Arc<dyn AuthService>,
}

impl SharedState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let store = Store::with_pool_options(
            &config.general.database_path,
            config.general.max_db_connections,
            config.general.min_db_connections,
        )
        .await?;

        let hasher = PasswordHasher::new(&config.security)?;
        let sessions = SessionIssuer::from_config(&config.security);
        let csrf = CsrfSigner::from_config(&config.security);
        let guard = RbacGuard::new(Arc::new(RolePermissions::standard()));

        ensure_bootstrap_admin(&store, &hasher, &config.bootstrap).await?;

        let auth_service: Arc<dyn AuthService> = Arc::new(SeaOrmAuthService::new(
            store.clone(),
            hasher.clone(),
            sessions.clone(),
            &config.security,
        ));

        Ok(Self {
            config: Arc::new(config),
            store,
            hasher,
            sessions,
            csrf,
            guard,
            auth_service,
        })
    }
}
