//! Settings loading from files and environment variables

use crate::error::{Error, Result};
use config::{Config as ConfigLib, ConfigBuilder as LibConfigBuilder, Environment, File};
use std::path::Path;

use super::defaults::*;
use super::{global_settings_path, Settings};

/// Helper to set a config default with consistent error mapping
fn set_config_default<T: Into<config::Value>>(
    builder: LibConfigBuilder<config::builder::DefaultState>,
    key: &str,
    value: T,
) -> Result<LibConfigBuilder<config::builder::DefaultState>> {
    builder
        .set_default(key, value)
        .map_err(|e| Error::config(format!("Failed to set {key} default: {e}")))
}

impl Settings {
    /// Loads settings from a TOML file with environment variable overrides
    ///
    /// Environment variables are prefixed with `BINDWEAVE_` and use double underscores
    /// for nested values. For example:
    /// - `BINDWEAVE_RESOLVER__CONSTRUCTOR_AUTOBINDING=false`
    pub fn from_file(path: &Path) -> Result<Self> {
        let builder = ConfigLib::builder();

        // config crate doesn't apply serde defaults for missing sections
        let builder = set_config_default(
            builder,
            "resolver.constructor_autobinding",
            default_constructor_autobinding(),
        )?;
        let builder = set_config_default(
            builder,
            "resolver.default_autobind_mode",
            default_autobind_mode().to_string(),
        )?;
        let builder = set_config_default(
            builder,
            "resolver.cross_injector_hints",
            default_cross_injector_hints(),
        )?;
        let builder = set_config_default(
            builder,
            "diagnostics.warnings_as_errors",
            default_warnings_as_errors(),
        )?;
        let builder = set_config_default(
            builder,
            "diagnostics.max_reported_per_unit",
            default_max_reported_per_unit() as i64,
        )?;
        let builder =
            set_config_default(builder, "naming.factory_suffix", default_factory_suffix())?;
        let mut builder = set_config_default(
            builder,
            "naming.child_factory_prefix",
            default_child_factory_prefix(),
        )?;

        // Add the settings file if it exists
        if path.exists() {
            builder = builder.add_source(File::from(path));
        }

        builder = builder.add_source(
            Environment::with_prefix("BINDWEAVE")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .map_err(|e| Error::config(format!("Failed to build settings: {e}")))?;

        let settings: Settings = settings
            .try_deserialize()
            .map_err(|e| Error::config(format!("Failed to deserialize settings: {e}")))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Creates settings from a TOML string (useful for testing)
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let settings: Settings = toml::from_str(content)
            .map_err(|e| Error::config(format!("Failed to parse TOML: {e}")))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings
    ///
    /// Precedence (lowest to highest):
    /// 1. Hardcoded defaults
    /// 2. Settings file (~/.bindweave/settings.toml or a custom path)
    /// 3. Environment variables (BINDWEAVE_*)
    pub fn load(settings_path: Option<&Path>) -> Result<Self> {
        let path = match settings_path {
            Some(p) => p.to_path_buf(),
            None => global_settings_path()?,
        };
        Self::from_file(&path)
    }
}
