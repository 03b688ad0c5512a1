//! Configuration loading and root folder resolution
//!
//! Root folder priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file (`root_folder` key)
//! 4. OS-dependent compiled default (fallback)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Default address prefix for registered IRIs
pub const DEFAULT_IRI_DOMAIN: &str = "https://w3id.org/xapi/";

/// Default HTTP port
pub const DEFAULT_PORT: u16 = 5780;

/// Database file name inside the root folder
pub const DATABASE_FILE: &str = "vocab.db";

/// Redirect rule publishing settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedirectConfig {
    /// Target for JSON-LD content negotiation
    pub jsonld_target: String,
    /// Target for HTML content negotiation
    pub html_target: String,
    /// Rewrite rules file; relative paths resolve under the root folder
    pub rules_file: PathBuf,
}

impl Default for RedirectConfig {
    fn default() -> Self {
        Self {
            jsonld_target: "http://jsonld-redirect".to_string(),
            html_target: "http://html-redirect".to_string(),
            rules_file: PathBuf::from("redirects.htaccess"),
        }
    }
}

/// Contents of the TOML config file
///
/// Every key is optional; missing keys fall back to defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub root_folder: Option<PathBuf>,
    pub iri_domain: String,
    pub bind_host: String,
    pub port: u16,
    /// Notification delivery endpoint; notifications are only logged when unset
    pub notification_webhook: Option<String>,
    pub event_bus_capacity: usize,
    pub max_upload_bytes: usize,
    pub redirect: RedirectConfig,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            root_folder: None,
            iri_domain: DEFAULT_IRI_DOMAIN.to_string(),
            bind_host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            notification_webhook: None,
            event_bus_capacity: 1000,
            max_upload_bytes: 10 * 1024 * 1024,
            redirect: RedirectConfig::default(),
        }
    }
}

impl TomlConfig {
    /// Parse config text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: TomlConfig =
            toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from an explicit file path
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Load from the explicit path if given, else the platform config file,
    /// else defaults. A missing platform file is not an error.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            info!("Loading config file: {}", path.display());
            return Self::load(path);
        }

        match find_config_file() {
            Some(path) => {
                info!("Loading config file: {}", path.display());
                Self::load(&path)
            }
            None => {
                warn!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    fn validate(&self) -> Result<()> {
        if !(self.iri_domain.starts_with("http://") || self.iri_domain.starts_with("https://")) {
            return Err(Error::Config(format!(
                "iri_domain must be an absolute http(s) URL, got '{}'",
                self.iri_domain
            )));
        }
        if !self.iri_domain.ends_with('/') {
            return Err(Error::Config(format!(
                "iri_domain must end with '/', got '{}'",
                self.iri_domain
            )));
        }
        if self.event_bus_capacity == 0 {
            return Err(Error::Config("event_bus_capacity must be > 0".to_string()));
        }
        Ok(())
    }
}

/// Root folder resolution in priority order (see module docs)
pub fn resolve_root_folder(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    config: &TomlConfig,
) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3: TOML config file
    if let Some(root_folder) = &config.root_folder {
        return root_folder.clone();
    }

    // Priority 4: OS-dependent compiled default
    default_root_folder()
}

/// Platform config file location, if one exists
fn find_config_file() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("vocab").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/vocab/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// OS-dependent default root folder path
pub fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/vocab (or /var/lib/vocab for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("vocab"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/vocab"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("vocab"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/vocab"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("vocab"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\vocab"))
    } else {
        PathBuf::from("./vocab_data")
    }
}

/// Fully resolved runtime settings
#[derive(Debug, Clone)]
pub struct SiteConfig {
    pub root_folder: PathBuf,
    pub db_path: PathBuf,
    pub iri_domain: String,
    pub bind_addr: String,
    pub notification_webhook: Option<String>,
    pub event_bus_capacity: usize,
    pub max_upload_bytes: usize,
    pub redirect: RedirectConfig,
}

impl SiteConfig {
    /// Combine the TOML settings with the resolved root folder and CLI overrides
    pub fn from_toml(toml: TomlConfig, root_folder: PathBuf, port_override: Option<u16>) -> Self {
        let port = port_override.unwrap_or(toml.port);
        let mut redirect = toml.redirect;
        if redirect.rules_file.is_relative() {
            redirect.rules_file = root_folder.join(&redirect.rules_file);
        }

        Self {
            db_path: root_folder.join(DATABASE_FILE),
            root_folder,
            iri_domain: toml.iri_domain,
            bind_addr: format!("{}:{}", toml.bind_host, port),
            notification_webhook: toml.notification_webhook,
            event_bus_capacity: toml.event_bus_capacity,
            max_upload_bytes: toml.max_upload_bytes,
            redirect,
        }
    }

    /// Settings for tests and tools: defaults under the given root folder
    pub fn with_domain(root_folder: PathBuf, iri_domain: &str) -> Self {
        let toml = TomlConfig {
            iri_domain: iri_domain.to_string(),
            ..TomlConfig::default()
        };
        Self::from_toml(toml, root_folder, None)
    }

    /// Create the root folder if it does not exist
    pub fn ensure_root_folder(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root_folder)?;
        Ok(())
    }
}
