use anyhow::Result;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub directory: DirectoryConfig,
    #[serde(default)]
    pub registration: RegistrationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    pub server: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            server: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryConfig {
    /// How long a ride stays listed after its departure time
    #[serde(default = "default_grace_minutes")]
    pub grace_minutes: i64,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            grace_minutes: default_grace_minutes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationConfig {
    /// Email suffixes accepted at sign-up; empty accepts any domain
    #[serde(default = "default_email_domains")]
    pub allowed_email_domains: Vec<String>,
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            allowed_email_domains: default_email_domains(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    15
}

fn default_grace_minutes() -> i64 {
    30
}

/// Longest grace window the directory honours: one day
pub const MAX_GRACE_MINUTES: i64 = 24 * 60;

/// Parse a `grace_minutes` value given on the command line
pub fn parse_grace_minutes(value: &str) -> Result<i64> {
    let minutes: i64 = value.trim().parse()?;
    if !(0..=MAX_GRACE_MINUTES).contains(&minutes) {
        anyhow::bail!("grace_minutes must be between 0 and {}", MAX_GRACE_MINUTES);
    }
    Ok(minutes)
}

fn default_email_domains() -> Vec<String> {
    vec!["@maju.edu.pk".to_string(), "@jinnah.edu".to_string()]
}

impl Config {
    fn project_dirs() -> Result<ProjectDirs> {
        ProjectDirs::from("com", "chalo", "chalo")
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))
    }

    pub fn config_path() -> Result<PathBuf> {
        let proj_dirs = Self::project_dirs()?;

        let config_dir = proj_dirs.config_dir();
        std::fs::create_dir_all(config_dir)?;

        Ok(config_dir.join("config.toml"))
    }

    /// Location of the local key-value storage file
    pub fn storage_path() -> Result<PathBuf> {
        let proj_dirs = Self::project_dirs()?;

        let data_dir = proj_dirs.data_dir();
        std::fs::create_dir_all(data_dir)?;

        Ok(data_dir.join("storage.json"))
    }

    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn grace(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.directory.grace_minutes.clamp(0, MAX_GRACE_MINUTES))
    }
}
