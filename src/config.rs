//! Configuration: the site's `holo.json` plus process-level server settings.
//!
//! [`HoloConfig`] is read fresh on every request that needs it, so edits to `holo.json`
//! take effect without a restart. API keys never live in the file; the connection views
//! ([`ProviderConnection`], [`CoreConnection`]) pull them from the environment.

use anyhow::{Context, Result};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::info;

/// File name of the site configuration inside the config directory.
pub const CONFIG_FILE_NAME: &str = "holo.json";

/// Environment variable holding the CORE API key.
pub const CORE_API_KEY_ENV: &str = "CORE_API_KEY";

/// Environment variable naming the directory that contains `holo.json`.
pub const CONFIG_PATH_ENV: &str = "HOLO_CONFIG_PATH";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("holo.json not found at {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid holo.json:\n{}", format_issues(.0))]
    Invalid(Vec<String>),

    #[error("missing configuration: {0}")]
    Missing(&'static str),
}

// ── holo.json ────────────────────────────────────────────────────────────────

/// The declarative site configuration stored in `holo.json`.
///
/// Unknown top-level keys are kept in `extra` so a rewrite by the CLI preserves them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HoloConfig {
    #[serde(default)]
    pub name: String,
    pub core: CoreSection,
    pub providers: ProviderSection,
    #[serde(default)]
    pub navigation: Vec<NavigationGroup>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colors: Option<Colors>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub favicon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub navbar: Option<Navbar>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub footer: Option<Footer>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreSection {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSection {
    pub name: String,
    pub model: String,
    pub base_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationGroup {
    pub group: String,
    #[serde(default)]
    pub pages: Vec<String>,
}

impl NavigationGroup {
    /// A group whose pages point at CORE documents rather than local files.
    pub fn is_core_group(&self) -> bool {
        self.pages.iter().any(|p| p.starts_with("CORE "))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Colors {
    pub primary: String,
    pub light: String,
    pub dark: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Navbar {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links: Option<Vec<NavbarLink>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary: Option<NavbarPrimary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavbarLink {
    pub label: String,
    pub href: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavbarPrimary {
    #[serde(rename = "type")]
    pub kind: String,
    pub href: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Footer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub socials: Option<Socials>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Socials {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub twitter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linkedin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discord: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
}

/// Provider connection info derived from `holo.json` and the environment.
#[derive(Debug, Clone)]
pub struct ProviderConnection {
    pub name: String,
    pub model: String,
    pub base_url: String,
    pub api_key: Option<String>,
}

/// CORE connection info derived from `holo.json` and the environment.
#[derive(Debug, Clone)]
pub struct CoreConnection {
    pub url: String,
    pub api_key: Option<String>,
    pub labels: Vec<String>,
}

/// Name of the env var holding the API key for a provider, e.g. `OPENAI_API_KEY`.
pub fn provider_key_env(provider_name: &str) -> String {
    format!("{}_API_KEY", provider_name.to_uppercase())
}

fn process_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

impl HoloConfig {
    /// Read and parse `<dir>/holo.json`. Structural validation beyond the required
    /// fields is left to [`HoloConfig::validate`].
    pub fn load(dir: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = dir.as_ref().join(CONFIG_FILE_NAME);
        let contents = std::fs::read_to_string(&path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.clone())
            } else {
                ConfigError::Read {
                    path: path.clone(),
                    source,
                }
            }
        })?;
        serde_json::from_str(&contents).map_err(|source| ConfigError::Parse { path, source })
    }

    /// Load and run the full schema validation.
    pub fn load_validated(dir: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let config = Self::load(dir)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every schema rule and report all violations at once.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut issues = Vec::new();

        if self.name.trim().is_empty() {
            issues.push("name: Name is required and cannot be empty".to_string());
        }
        if !is_valid_url(&self.core.url) {
            issues.push("core.url: Core URL must be a valid URL".to_string());
        }
        if self.providers.name.is_empty() {
            issues.push("providers.name: Provider name cannot be empty".to_string());
        }
        if self.providers.model.is_empty() {
            issues.push("providers.model: Model name cannot be empty".to_string());
        }
        if !is_valid_url(&self.providers.base_url) {
            issues.push("providers.baseUrl: Base URL must be a valid URL".to_string());
        }

        if self.navigation.is_empty() {
            issues.push("navigation: At least one navigation group is required".to_string());
        }
        for (i, group) in self.navigation.iter().enumerate() {
            if group.group.is_empty() {
                issues.push(format!("navigation[{i}].group: Group name cannot be empty"));
            }
            if group.pages.is_empty() {
                issues.push(format!("navigation[{i}].pages: At least one page is required"));
            }
            for (j, page) in group.pages.iter().enumerate() {
                if page.is_empty() {
                    issues.push(format!(
                        "navigation[{i}].pages[{j}]: Page name cannot be empty"
                    ));
                }
            }
        }

        if let Some(colors) = &self.colors {
            for (field, value) in [
                ("primary", &colors.primary),
                ("light", &colors.light),
                ("dark", &colors.dark),
            ] {
                if !is_hex_color(value) {
                    issues.push(format!(
                        "colors.{field}: color must be a valid hex color (#RRGGBB)"
                    ));
                }
            }
        }

        if let Some(navbar) = &self.navbar {
            for (i, link) in navbar.links.iter().flatten().enumerate() {
                if link.label.is_empty() {
                    issues.push(format!("navbar.links[{i}].label: Link label cannot be empty"));
                }
                if !is_valid_url(&link.href) {
                    issues.push(format!("navbar.links[{i}].href: Link href must be a valid URL"));
                }
            }
            if let Some(primary) = &navbar.primary {
                if primary.kind != "github" && primary.kind != "custom" {
                    issues.push(
                        "navbar.primary.type: Primary type must be either \"github\" or \"custom\""
                            .to_string(),
                    );
                }
                if !is_valid_url(&primary.href) {
                    issues.push("navbar.primary.href: Primary href must be a valid URL".to_string());
                }
            }
        }

        if let Some(socials) = self.footer.as_ref().and_then(|f| f.socials.as_ref()) {
            for (field, value) in [
                ("twitter", &socials.twitter),
                ("linkedin", &socials.linkedin),
                ("github", &socials.github),
                ("discord", &socials.discord),
                ("website", &socials.website),
            ] {
                if let Some(url) = value {
                    if !is_valid_url(url) {
                        issues.push(format!("footer.socials.{field}: URL must be a valid URL"));
                    }
                }
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(issues))
        }
    }

    /// Provider view with the API key taken from `<NAME>_API_KEY`.
    pub fn provider_connection(&self) -> Result<ProviderConnection, ConfigError> {
        self.provider_connection_with(process_env)
    }

    pub fn provider_connection_with(
        &self,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<ProviderConnection, ConfigError> {
        if self.providers.name.trim().is_empty() {
            return Err(ConfigError::Missing("providers.name"));
        }
        let api_key = env(&provider_key_env(&self.providers.name)).filter(|k| !k.is_empty());
        Ok(ProviderConnection {
            name: self.providers.name.clone(),
            model: self.providers.model.clone(),
            base_url: self.providers.base_url.clone(),
            api_key,
        })
    }

    /// CORE view with the API key taken from `CORE_API_KEY`.
    pub fn core_connection(&self) -> Result<CoreConnection, ConfigError> {
        self.core_connection_with(process_env)
    }

    pub fn core_connection_with(
        &self,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<CoreConnection, ConfigError> {
        if self.core.url.trim().is_empty() {
            return Err(ConfigError::Missing("core.url"));
        }
        Ok(CoreConnection {
            url: self.core.url.trim_end_matches('/').to_string(),
            api_key: env(CORE_API_KEY_ENV).filter(|k| !k.is_empty()),
            labels: self.core.labels.clone().unwrap_or_default(),
        })
    }
}

fn format_issues(issues: &[String]) -> String {
    issues
        .iter()
        .map(|i| format!("  - {i}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn is_valid_url(value: &str) -> bool {
    Url::parse(value).is_ok()
}

fn is_hex_color(value: &str) -> bool {
    value.len() == 7
        && value.starts_with('#')
        && value[1..].chars().all(|c| c.is_ascii_hexdigit())
}

// ── Server settings ──────────────────────────────────────────────────────────

/// Process-level settings for the HTTP server, taken from defaults plus `HOLO_*`
/// environment overrides.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Directory containing `holo.json` and the page files.
    pub config_dir: PathBuf,
    pub host: String,
    pub port: u16,
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            config_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            host: "127.0.0.1".into(),
            port: 3000,
            log_level: "info".into(),
        }
    }
}

impl ServerConfig {
    /// Defaults, then env overrides (HOLO_CONFIG_PATH, HOLO_HOST, HOLO_PORT, HOLO_LOG_LEVEL).
    pub fn load() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env_overrides()?;
        info!(config_dir = %config.config_dir.display(), "server settings loaded");
        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(val) = std::env::var(CONFIG_PATH_ENV) {
            self.config_dir = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("HOLO_HOST") {
            self.host = val;
        }
        if let Ok(val) = std::env::var("HOLO_PORT") {
            self.port = val
                .parse()
                .with_context(|| format!("invalid HOLO_PORT: {val}"))?;
        }
        if let Ok(val) = std::env::var("HOLO_LOG_LEVEL") {
            self.log_level = val;
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn holo_json_path(&self) -> PathBuf {
        self.config_dir.join(CONFIG_FILE_NAME)
    }
}
