use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub registration: RegistrationConfig,
    #[serde(default)]
    pub uploads: UploadsConfig,
    #[serde(default)]
    pub smtp: SmtpConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_expiry_hours: u64,
    /// Lifetime of an email verification code
    #[serde(default = "default_code_expiry")]
    pub code_expiry_minutes: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistrationConfig {
    /// Email suffixes accepted at registration, e.g. "@maju.edu.pk".
    /// Empty accepts any address.
    #[serde(default)]
    pub allowed_email_domains: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadsConfig {
    pub dir: String,
    #[serde(default = "default_max_image_bytes")]
    pub max_image_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    /// When disabled, verification codes are written to the log
    pub enabled: bool,
    /// Use local sendmail binary instead of SMTP server
    #[serde(default = "default_true")]
    pub use_sendmail: bool,
    #[serde(default)]
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    pub from_email: String,
    pub from_name: String,
}

fn default_true() -> bool { true }
fn default_smtp_port() -> u16 { 587 }
fn default_code_expiry() -> i64 { 10 }
fn default_max_image_bytes() -> usize { 5 * 1024 * 1024 }

impl Default for UploadsConfig {
    fn default() -> Self {
        Self {
            dir: "./data/uploads".to_string(),
            max_image_bytes: default_max_image_bytes(),
        }
    }
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            use_sendmail: true,
            host: "".to_string(),
            port: 587,
            username: "".to_string(),
            password: "".to_string(),
            from_email: "noreply@7chalo.app".to_string(),
            from_name: "7chalo".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
            database: DatabaseConfig {
                path: "./data/chalo.db".to_string(),
            },
            auth: AuthConfig {
                jwt_secret: "change-me-in-production".to_string(),
                token_expiry_hours: 24 * 7,
                code_expiry_minutes: default_code_expiry(),
            },
            registration: RegistrationConfig::default(),
            uploads: UploadsConfig::default(),
            smtp: SmtpConfig::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let mut config = Self::load_file()?;

        // Secrets usually arrive through the environment (or .env)
        if let Ok(secret) = std::env::var("CHALO_JWT_SECRET") {
            config.auth.jwt_secret = secret;
        }
        if let Ok(path) = std::env::var("CHALO_DATABASE") {
            config.database.path = path;
        }
        Ok(config)
    }

    fn load_file() -> Result<Self> {
        if let Ok(path) = std::env::var("CHALO_CONFIG") {
            return Self::load_from_path(&PathBuf::from(path));
        }

        let default_paths = vec![
            PathBuf::from("chalo-server.toml"),
            PathBuf::from("config/chalo-server.toml"),
            PathBuf::from("/etc/chalo/server.toml"),
        ];

        for path in default_paths {
            if path.exists() {
                return Self::load_from_path(&path);
            }
        }

        tracing::warn!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_path(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}
