use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Signing secret shipped in the default config. Refused in production.
pub const DEFAULT_SECRET_KEY: &str = "change-me-in-production";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,

    pub server: ServerConfig,

    pub security: SecurityConfig,

    pub bootstrap: BootstrapConfig,

    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub database_path: String,

    pub log_level: String,

    /// "development" or "production"
    pub environment: String,

    /// Number of tokio worker threads (default: 2)
    /// Set to 0 to use the number of CPU cores
    pub worker_threads: usize,

    /// Maximum database connections (default: 5)
    pub max_db_connections: u32,

    /// Minimum database connections (default: 1)
    pub min_db_connections: u32,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            database_path: "sqlite:data/timetracker.db".to_string(),
            log_level: "info".to_string(),
            environment: "development".to_string(),
            worker_threads: 2,
            max_db_connections: 5,
            min_db_connections: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,

    pub cors_allowed_origins: Vec<String>,

    /// Whether to set the Secure flag on the session cookie.
    /// Leave off for local development without HTTPS.
    pub secure_cookies: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8000,
            cors_allowed_origins: vec![
                "http://localhost:8000".to_string(),
                "http://127.0.0.1:8000".to_string(),
            ],
            secure_cookies: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// HMAC key for session tokens. Rotating it logs everybody out.
    pub secret_key: String,

    /// Lifetime of a session token in hours (default: 12)
    pub session_ttl_hours: u32,

    /// Argon2 memory cost in KiB (default: 19456 = 19MB)
    pub argon2_memory_cost_kib: u32,

    /// Argon2 time cost (iterations)
    pub argon2_time_cost: u32,

    /// Argon2 parallelism (default: 1)
    pub argon2_parallelism: u32,

    /// Re-hash stored passwords with the current params on successful login
    pub auto_migrate_password_hashes: bool,

    pub min_password_length: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            secret_key: DEFAULT_SECRET_KEY.to_string(),
            session_ttl_hours: 12,
            argon2_memory_cost_kib: 19456,
            argon2_time_cost: 2,
            argon2_parallelism: 1,
            auto_migrate_password_hashes: true,
            min_password_length: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BootstrapConfig {
    /// Email of the first administrator, created only when no admin exists.
    pub admin_email: String,

    /// Initial password of the bootstrap admin. Ignored once any admin exists.
    #[serde(skip_serializing)]
    pub admin_password: String,

    pub admin_full_name: String,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            admin_email: "admin@change.me".to_string(),
            admin_password: "ChangeMeNow!123".to_string(),
            admin_full_name: "System Admin".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub metrics_enabled: bool,

    pub loki_enabled: bool,

    pub loki_url: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: true,
            loki_enabled: false,
            loki_url: "http://localhost:3100".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            server: ServerConfig::default(),
            security: SecurityConfig::default(),
            bootstrap: BootstrapConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl Config {
    /// Loads the first config file found on the search path (or defaults),
    /// then applies `.env` and process environment overrides.
    pub fn load() -> Result<Self> {
        if let Err(e) = dotenvy::dotenv()
            && !e.not_found()
        {
            warn!("Failed to read .env file: {e}");
        }

        let mut config = Self::load_file()?;
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    fn load_file() -> Result<Self> {
        for path in &Self::config_paths() {
            if path.exists() {
                info!("Loading config from: {}", path.display());
                return Self::load_from_path(path);
            }
        }

        info!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Overlays environment settings. `lookup` is injected so tests do not
    /// have to mutate the process environment.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("SECRET_KEY") {
            self.security.secret_key = v;
        }
        if let Some(v) = lookup("DATABASE_URL") {
            self.general.database_path = v;
        }
        if let Some(v) = lookup("ENVIRONMENT") {
            self.general.environment = v;
        }
        if let Some(v) = lookup("SECURE_COOKIES") {
            self.server.secure_cookies = parse_bool(&v)
                .with_context(|| format!("SECURE_COOKIES must be a boolean, got '{v}'"))?;
        }
        if let Some(v) = lookup("SESSION_TTL_HOURS") {
            self.security.session_ttl_hours = v
                .trim()
                .parse()
                .with_context(|| format!("SESSION_TTL_HOURS must be an integer, got '{v}'"))?;
        }
        if let Some(v) = lookup("BOOTSTRAP_ADMIN_EMAIL") {
            self.bootstrap.admin_email = v;
        }
        if let Some(v) = lookup("BOOTSTRAP_ADMIN_PASSWORD") {
            self.bootstrap.admin_password = v;
        }
        Ok(())
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Config saved to: {}", path.display());
        Ok(())
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("config.toml")];

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("timetracker").join("config.toml"));
        }

        paths
    }

    fn default_config_path() -> PathBuf {
        PathBuf::from("config.toml")
    }

    /// Writes a default config with a freshly generated secret key.
    pub fn create_default_if_missing() -> Result<bool> {
        let path = Self::default_config_path();
        if path.exists() {
            return Ok(false);
        }

        let mut config = Self::default();
        config.security.secret_key = generate_secret_key();
        config.save_to_path(&path)?;
        info!("Created default config file: {}", path.display());
        Ok(true)
    }

    #[must_use]
    pub fn is_production(&self) -> bool {
        self.general.environment.eq_ignore_ascii_case("production")
    }

    pub fn validate(&self) -> Result<()> {
        if self.security.secret_key.trim().is_empty() {
            anyhow::bail!("security.secret_key cannot be empty");
        }

        if self.is_production() && self.security.secret_key == DEFAULT_SECRET_KEY {
            anyhow::bail!("security.secret_key must be changed before running in production");
        }

        if self.security.session_ttl_hours == 0 {
            anyhow::bail!("security.session_ttl_hours must be > 0");
        }

        if self.security.min_password_length < 8 {
            anyhow::bail!("security.min_password_length must be at least 8");
        }

        if self.is_production() && !self.server.secure_cookies {
            warn!("Running in production without secure cookies");
        }

        Ok(())
    }
}

/// Generate a random signing secret (64 character hex string)
#[must_use]
pub fn generate_secret_key() -> String {
    use rand::Rng;

    let mut rng = rand::rng();
    let bytes: [u8; 32] = rng.random();

    bytes.iter().fold(String::with_capacity(64), |mut acc, b| {
        use std::fmt::Write;
        let _ = write!(acc, "{b:02x}");
        acc
    })
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.security.session_ttl_hours, 12);
        assert_eq!(config.security.min_password_length, 10);
        assert!(!config.server.secure_cookies);
        assert_eq!(config.bootstrap.admin_email, "admin@change.me");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization_hides_bootstrap_password() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[security]"));
        assert!(!toml_str.contains("ChangeMeNow!123"));
    }

    #[test]
    fn test_config_deserialization() {
        let toml_str = r#"
            [general]
            log_level = "debug"

            [security]
            session_ttl_hours = 4
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.security.session_ttl_hours, 4);
        assert_eq!(config.server.port, 8000);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("SECRET_KEY", "from-env"),
            ("SECURE_COOKIES", "true"),
            ("ENVIRONMENT", "production"),
            ("BOOTSTRAP_ADMIN_EMAIL", "boss@example.com"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config
            .apply_env_overrides(|k| env.get(k).map(|v| (*v).to_string()))
            .unwrap();

        assert_eq!(config.security.secret_key, "from-env");
        assert!(config.server.secure_cookies);
        assert!(config.is_production());
        assert_eq!(config.bootstrap.admin_email, "boss@example.com");
    }

    #[test]
    fn test_env_override_rejects_bad_bool() {
        let mut config = Config::default();
        let result = config.apply_env_overrides(|k| {
            (k == "SECURE_COOKIES").then(|| "maybe".to_string())
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_production_rejects_default_secret() {
        let mut config = Config::default();
        config.general.environment = "production".to_string();
        assert!(config.validate().is_err());

        config.security.secret_key = "a-real-secret".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_generated_secret_key_is_hex() {
        let key = generate_secret_key();
        assert_eq!(key.len(), 64);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(key, generate_secret_key());
    }

    #[test]
    fn test_zero_ttl_rejected() {
        let mut config = Config::default();
        config.security.session_ttl_hours = 0;
        assert!(config.validate().is_err());
    }
}
