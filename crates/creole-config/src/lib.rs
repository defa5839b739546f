//! Configuration management for the Creole formatter.
//!
//! Parses `creole.toml` configuration files with serde and provides
//! auto-discovery of config files in parent directories.
//!
//! CLI settings can be applied during load via [`CliSettings`].
//!
//! ## Environment Variable Expansion
//!
//! String configuration values support environment variable expansion:
//!
//! - `${VAR}` - expands to the value of VAR, errors if unset
//! - `${VAR:-default}` - expands to VAR if set, otherwise uses default
//!
//! Expanded fields:
//! - `format.link_prefix`
//! - `format.link_suffix`
//! - every `interwiki` URL

mod expand;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use creole_markup::{FormatOptions, LinkFormat};
use serde::Deserialize;

/// CLI settings that override configuration file values.
///
/// All fields are optional. Only non-None values override the loaded config.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Override the input size limit.
    pub max_input_bytes: Option<usize>,
    /// Override the wiki link prefix.
    pub link_prefix: Option<String>,
    /// Override the wiki link suffix.
    pub link_suffix: Option<String>,
    /// Override the default image alt text.
    pub default_image_text: Option<String>,
}

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "creole.toml";

/// Default input size limit (1 MiB).
pub const DEFAULT_MAX_INPUT_BYTES: usize = 1024 * 1024;

/// Application configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Link and image formatting.
    pub format: FormatConfig,
    /// Interwiki prefixes: name to base URL.
    pub interwiki: BTreeMap<String, String>,
    /// Input limits.
    pub limits: LimitsConfig,

    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

/// Link and image formatting configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FormatConfig {
    /// Alt text for images without one.
    pub default_image_text: String,
    /// Text placed before wiki link targets.
    pub link_prefix: Option<String>,
    /// Text placed after wiki link targets.
    pub link_suffix: Option<String>,
}

/// Input limits.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Largest accepted input in bytes.
    pub max_input_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_input_bytes: DEFAULT_MAX_INPUT_BYTES,
        }
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
    /// Environment variable error during expansion.
    #[error("Environment variable error in {field}: {message}")]
    EnvVar {
        /// Config field path (e.g., "`format.link_prefix`").
        field: String,
        /// Error message (e.g., "${`WIKI_ROOT`} not set").
        message: String,
    },
}

/// Require a value to be safe inside a double-quoted HTML attribute.
fn require_attribute_safe(value: &str, field: &str) -> Result<(), ConfigError> {
    if let Some(c) = value.chars().find(|c| matches!(c, '"' | '<' | '>')) {
        return Err(ConfigError::Validation(format!(
            "{field} cannot contain {c:?}"
        )));
    }
    Ok(())
}

/// Require an interwiki name to be usable in `[[Name:Page]]` links.
fn require_interwiki_name(name: &str) -> Result<(), ConfigError> {
    if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '.') {
        return Err(ConfigError::Validation(format!(
            "interwiki name {name:?} must be letters, digits, '_' or '.'"
        )));
    }
    Ok(())
}

impl Config {
    /// Load configuration from file with optional CLI settings.
    ///
    /// If `config_path` is provided, loads from that file.
    /// Otherwise, searches for `creole.toml` in current directory and parents.
    ///
    /// CLI settings are applied after loading, allowing CLI arguments to take
    /// precedence over config file values.
    ///
    /// # Errors
    ///
    /// Returns error if explicit `config_path` doesn't exist, parsing fails,
    /// or the resulting configuration is invalid.
    pub fn load(
        config_path: Option<&Path>,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Self::load_from_file(path)?
        } else if let Some(discovered) = Self::discover_config() {
            Self::load_from_file(&discovered)?
        } else {
            Self::default()
        };

        if let Some(settings) = cli_settings {
            config.apply_cli_settings(settings);
            config.validate()?;
        }

        Ok(config)
    }

    /// Apply CLI settings to the configuration.
    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        if let Some(max_input_bytes) = settings.max_input_bytes {
            self.limits.max_input_bytes = max_input_bytes;
        }
        if let Some(prefix) = &settings.link_prefix {
            self.format.link_prefix = Some(prefix.clone());
        }
        if let Some(suffix) = &settings.link_suffix {
            self.format.link_suffix = Some(suffix.clone());
        }
        if let Some(text) = &settings.default_image_text {
            self.format.default_image_text.clone_from(text);
        }
    }

    /// Formatter options described by this configuration.
    ///
    /// A link format is set when either the prefix or the suffix is configured.
    #[must_use]
    pub fn format_options(&self) -> FormatOptions {
        let mut options =
            FormatOptions::default().with_default_image_text(&self.format.default_image_text);
        if self.format.link_prefix.is_some() || self.format.link_suffix.is_some() {
            options = options.with_link_format(LinkFormat::new(
                self.format.link_prefix.clone().unwrap_or_default(),
                self.format.link_suffix.clone().unwrap_or_default(),
            ));
        }
        options.interwiki.clone_from(&self.interwiki);
        options
    }

    /// Search for config file in current directory and parents.
    fn discover_config() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;
        loop {
            let candidate = current.join(CONFIG_FILENAME);
            if candidate.exists() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;

        expand::expand_env_vars(&mut config)?;
        config.config_path = Some(path.to_path_buf());
        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// Values end up inside HTML attributes unescaped, so quotes and angle
    /// brackets are rejected. Called automatically after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if any validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_format()?;
        self.validate_interwiki()?;
        self.validate_limits()?;
        Ok(())
    }

    fn validate_format(&self) -> Result<(), ConfigError> {
        require_attribute_safe(&self.format.default_image_text, "format.default_image_text")?;
        if let Some(prefix) = &self.format.link_prefix {
            require_attribute_safe(prefix, "format.link_prefix")?;
        }
        if let Some(suffix) = &self.format.link_suffix {
            require_attribute_safe(suffix, "format.link_suffix")?;
        }
        Ok(())
    }

    fn validate_interwiki(&self) -> Result<(), ConfigError> {
        for (name, url) in &self.interwiki {
            require_interwiki_name(name)?;
            let field = format!("interwiki.{name}");
            if url.is_empty() {
                return Err(ConfigError::Validation(format!("{field} cannot be empty")));
            }
            require_attribute_safe(url, &field)?;
        }
        Ok(())
    }

    fn validate_limits(&self) -> Result<(), ConfigError> {
        if self.limits.max_input_bytes == 0 {
            return Err(ConfigError::Validation(
                "limits.max_input_bytes must be greater than 0".to_owned(),
            ));
        }
        Ok(())
    }

}
