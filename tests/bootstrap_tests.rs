use timetracker::auth::{AuthContext, AuthError, PasswordHasher, Role, SessionIssuer, SessionState};
use timetracker::config::{BootstrapConfig, Config, SecurityConfig};
use timetracker::db::{NewUser, Store, UserChanges};
use timetracker::services::{
    AccountError, AuthService, BootstrapOutcome, SeaOrmAuthService, ensure_bootstrap_admin,
    reset_bootstrap_admin_password,
};

fn fast_security() -> SecurityConfig {
    SecurityConfig {
        secret_key: "bootstrap-test-secret".to_string(),
        argon2_memory_cost_kib: 1024,
        argon2_time_cost: 1,
        ..SecurityConfig::default()
    }
}

fn bootstrap(password: &str) -> BootstrapConfig {
    BootstrapConfig {
        admin_email: "Admin@Example.com".to_string(),
        admin_password: password.to_string(),
        admin_full_name: "First Admin".to_string(),
    }
}

fn temp_db_url() -> String {
    let db_path = std::env::temp_dir().join(format!(
        "timetracker-bootstrap-{}.db",
        uuid::Uuid::new_v4()
    ));
    format!("sqlite:{}", db_path.display())
}

async fn spawn_store() -> Store {
    Store::new(&temp_db_url())
        .await
        .expect("Failed to open test database")
}

#[tokio::test]
async fn bootstrap_creates_admin_once() {
    let store = spawn_store().await;
    let hasher = PasswordHasher::new(&fast_security()).unwrap();

    let outcome = ensure_bootstrap_admin(&store, &hasher, &bootstrap("first-password-1"))
        .await
        .unwrap();
    assert_eq!(outcome, BootstrapOutcome::Created);

    let admin = store
        .find_admin_by_email("admin@example.com")
        .await
        .unwrap()
        .expect("admin should exist");
    assert_eq!(admin.role, Role::Admin);
    assert!(admin.must_change_password);
    assert_eq!(admin.email, "admin@example.com");

    // A changed bootstrap password must not touch the existing admin.
    let outcome = ensure_bootstrap_admin(&store, &hasher, &bootstrap("second-password-2"))
        .await
        .unwrap();
    assert_eq!(outcome, BootstrapOutcome::AlreadyProvisioned);
    assert_eq!(store.count_admins().await.unwrap(), 1);

    let hash = store.get_user_password_hash(admin.id).await.unwrap().unwrap();
    assert!(hasher.verify("first-password-1", &hash));
    assert!(!hasher.verify("second-password-2", &hash));
}

#[tokio::test]
async fn bootstrap_rejects_invalid_settings() {
    let store = spawn_store().await;
    let hasher = PasswordHasher::new(&fast_security()).unwrap();

    let mut config = bootstrap("first-password-1");
    config.admin_email = "not-an-email".to_string();
    assert!(ensure_bootstrap_admin(&store, &hasher, &config).await.is_err());

    assert!(
        ensure_bootstrap_admin(&store, &hasher, &bootstrap(""))
            .await
            .is_err()
    );
    assert_eq!(store.count_admins().await.unwrap(), 0);
}

#[tokio::test]
async fn reset_admin_password_sets_forced_change() {
    let store = spawn_store().await;
    let hasher = PasswordHasher::new(&fast_security()).unwrap();
    ensure_bootstrap_admin(&store, &hasher, &bootstrap("first-password-1"))
        .await
        .unwrap();

    let admin = store
        .find_admin_by_email("admin@example.com")
        .await
        .unwrap()
        .unwrap();
    store
        .set_user_password(
            admin.id,
            &hasher.hash("settled-password-1").unwrap(),
            false,
        )
        .await
        .unwrap();

    let reset = reset_bootstrap_admin_password(&store, &hasher, "ADMIN@example.com", "rescue-password-1")
        .await
        .unwrap();
    assert!(reset);

    let admin = store.get_user(admin.id).await.unwrap().unwrap();
    assert!(admin.must_change_password);
    let hash = store.get_user_password_hash(admin.id).await.unwrap().unwrap();
    assert!(hasher.verify("rescue-password-1", &hash));

    let missing = reset_bootstrap_admin_password(&store, &hasher, "ghost@example.com", "whatever-1234")
        .await
        .unwrap();
    assert!(!missing);
}

#[tokio::test]
async fn reset_admin_password_ignores_non_admins() {
    let store = spawn_store().await;
    let hasher = PasswordHasher::new(&fast_security()).unwrap();

    store
        .create_user(NewUser {
            email: "staff@example.com".to_string(),
            full_name: "Staff".to_string(),
            password_hash: hasher.hash("staff-password-1").unwrap(),
            role: Role::Staff,
            must_change_password: false,
        })
        .await
        .unwrap();

    let reset = reset_bootstrap_admin_password(&store, &hasher, "staff@example.com", "hijack-attempt-1")
        .await
        .unwrap();
    assert!(!reset);
}

#[tokio::test]
async fn login_upgrades_outdated_hash_parameters() {
    let store = spawn_store().await;
    let old_hasher = PasswordHasher::new(&fast_security()).unwrap();

    let user = store
        .create_user(NewUser {
            email: "legacy@example.com".to_string(),
            full_name: "Legacy".to_string(),
            password_hash: old_hasher.hash("legacy-password-1").unwrap(),
            role: Role::Staff,
            must_change_password: false,
        })
        .await
        .unwrap();

    let security = SecurityConfig {
        argon2_time_cost: 2,
        ..fast_security()
    };
    let hasher = PasswordHasher::new(&security).unwrap();
    let service = SeaOrmAuthService::new(
        store.clone(),
        hasher.clone(),
        SessionIssuer::from_config(&security),
        &security,
    );

    assert!(hasher.needs_rehash(&store.get_user_password_hash(user.id).await.unwrap().unwrap()));

    let result = service
        .login("LEGACY@example.com", "legacy-password-1")
        .await
        .unwrap();
    assert_eq!(result.user.id, user.id);
    assert_eq!(result.state, SessionState::Active);

    let upgraded = store.get_user_password_hash(user.id).await.unwrap().unwrap();
    assert!(!hasher.needs_rehash(&upgraded));
    assert!(hasher.verify("legacy-password-1", &upgraded));

    let context = service.resolve_session(&result.token).await.unwrap();
    assert_eq!(context.user().map(|u| u.id), Some(user.id));
}

#[tokio::test]
async fn unknown_subjects_and_garbage_tokens_resolve_anonymous() {
    let store = spawn_store().await;
    let security = fast_security();
    let hasher = PasswordHasher::new(&security).unwrap();
    let sessions = SessionIssuer::from_config(&security);
    let service = SeaOrmAuthService::new(store.clone(), hasher, sessions.clone(), &security);

    let token = sessions.issue(4242).unwrap();
    let context = service.resolve_session(&token).await.unwrap();
    assert!(context.user().is_none());

    let context = service.resolve_session("garbage").await.unwrap();
    assert!(context.user().is_none());
}

#[tokio::test]
async fn deactivated_user_resolves_anonymous_and_cannot_log_in() {
    let store = spawn_store().await;
    let security = fast_security();
    let hasher = PasswordHasher::new(&security).unwrap();
    let sessions = SessionIssuer::from_config(&security);
    let service = SeaOrmAuthService::new(store.clone(), hasher.clone(), sessions.clone(), &security);

    let user = store
        .create_user(NewUser {
            email: "leaver@example.com".to_string(),
            full_name: "Leaver".to_string(),
            password_hash: hasher.hash("leaver-password-1").unwrap(),
            role: Role::Staff,
            must_change_password: false,
        })
        .await
        .unwrap();
    let token = service
        .login("leaver@example.com", "leaver-password-1")
        .await
        .unwrap()
        .token;

    let updated = service
        .update_user(
            user.id,
            UserChanges {
                active: Some(false),
                ..UserChanges::default()
            },
        )
        .await
        .unwrap();
    assert!(!updated.active);
    assert_eq!(updated.full_name, "Leaver");

    let context = service.resolve_session(&token).await.unwrap();
    assert!(matches!(
        context,
        AuthContext::Anonymous {
            reason: Some(AuthError::UnknownSubject)
        }
    ));

    let result = service.login("leaver@example.com", "leaver-password-1").await;
    assert!(matches!(result, Err(AccountError::InvalidCredentials)));

    let missing = service.update_user(9999, UserChanges::default()).await;
    assert!(matches!(missing, Err(AccountError::UserNotFound)));
}

#[tokio::test]
async fn cli_reset_falls_back_to_configured_password() {
    let mut config = Config::default();
    config.general.database_path = temp_db_url();
    config.security = fast_security();
    config.bootstrap = bootstrap("configured-password-1");

    let store = Store::new(&config.general.database_path).await.unwrap();
    let hasher = PasswordHasher::new(&config.security).unwrap();
    ensure_bootstrap_admin(&store, &hasher, &config.bootstrap)
        .await
        .unwrap();
    let admin = store
        .find_admin_by_email("admin@example.com")
        .await
        .unwrap()
        .unwrap();
    store
        .set_user_password(admin.id, &hasher.hash("settled-password-1").unwrap(), false)
        .await
        .unwrap();

    timetracker::cli::cmd_reset_admin_password(&config, None, None)
        .await
        .unwrap();

    let admin = store.get_user(admin.id).await.unwrap().unwrap();
    assert!(admin.must_change_password);
    let hash = store.get_user_password_hash(admin.id).await.unwrap().unwrap();
    assert!(hasher.verify("configured-password-1", &hash));

    let result =
        timetracker::cli::cmd_reset_admin_password(&config, None, Some("ghost@example.com")).await;
    assert!(result.is_err());
}
