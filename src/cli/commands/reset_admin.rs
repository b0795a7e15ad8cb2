use crate::auth::PasswordHasher;
use crate::config::Config;
use crate::db::Store;
use crate::services::reset_bootstrap_admin_password;

pub async fn cmd_reset_admin_password(
    config: &Config,
    password: Option<&str>,
    email: Option<&str>,
) -> anyhow::Result<()> {
    let password = resolve_password(config, password)?;

    let store = Store::new(&config.general.database_path).await?;
    let hasher = PasswordHasher::new(&config.security)?;
    let email = email.unwrap_or(&config.bootstrap.admin_email);

    if !reset_bootstrap_admin_password(&store, &hasher, email, &password).await? {
        anyhow::bail!("No admin account found for {email}");
    }

    println!("✓ Password reset for {email}. A change is required at next login.");
    Ok(())
}

/// `--password` wins; otherwise the configured bootstrap password, which the
/// environment may already have overridden.
fn resolve_password(config: &Config, password: Option<&str>) -> anyhow::Result<String> {
    let password = password
        .unwrap_or(&config.bootstrap.admin_password)
        .trim()
        .to_string();

    if password.is_empty() {
        anyhow::bail!("No password given via --password or BOOTSTRAP_ADMIN_PASSWORD");
    }
    if password.chars().count() < config.security.min_password_length {
        anyhow::bail!(
            "Password must be at least {} characters",
            config.security.min_password_length
        );
    }

    Ok(password)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_password_wins() {
        let config = Config::default();
        let password = resolve_password(&config, Some("  explicit-pass-1 ")).unwrap();
        assert_eq!(password, "explicit-pass-1");
    }

    #[test]
    fn falls_back_to_bootstrap_password() {
        let mut config = Config::default();
        config.bootstrap.admin_password = "from-environment-1".to_string();
        assert_eq!(
            resolve_password(&config, None).unwrap(),
            "from-environment-1"
        );
    }

    #[test]
    fn rejects_missing_or_short_password() {
        let mut config = Config::default();
        config.bootstrap.admin_password = "   ".to_string();
        assert!(resolve_password(&config, None).is_err());
        assert!(resolve_password(&config, Some("short")).is_err());
    }
}
