//! Process-wide settings for a resolution pass
//!
//! Settings are loaded once by the host (TOML file and/or environment
//! variables) and handed to the resolver by reference. The resolver itself
//! never reads files or the environment.

mod defaults;
mod loading;


use crate::entities::FabricationMode;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use defaults::*;

/// Returns the path to the global settings file
///
/// The global settings are stored at `~/.bindweave/settings.toml`.
pub fn global_settings_path() -> Result<PathBuf> {
    let home_dir = dirs::home_dir()
        .ok_or_else(|| Error::config("Unable to determine home directory".to_string()))?;
    Ok(home_dir.join(".bindweave").join("settings.toml"))
}

/// Main settings structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Resolution behaviour
    #[serde(default)]
    pub resolver: ResolverConfig,

    /// Diagnostics collection
    #[serde(default)]
    pub diagnostics: DiagnosticsConfig,

    /// Naming knobs consumed by emission; no effect on resolution
    #[serde(default)]
    pub naming: NamingConfig,
}

/// Resolver configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Synthesize bindings from constructors when no explicit binding exists
    #[serde(default = "default_constructor_autobinding")]
    pub constructor_autobinding: bool,

    /// Fabrication mode of synthesized bindings whose type declares none
    #[serde(default = "default_autobind_mode")]
    pub default_autobind_mode: FabricationMode,

    /// Emit cross-injector advisories after the global merge
    #[serde(default = "default_cross_injector_hints")]
    pub cross_injector_hints: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            constructor_autobinding: default_constructor_autobinding(),
            default_autobind_mode: default_autobind_mode(),
            cross_injector_hints: default_cross_injector_hints(),
        }
    }
}

/// Diagnostics configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticsConfig {
    /// Promote per-injector warnings to errors
    #[serde(default = "default_warnings_as_errors")]
    pub warnings_as_errors: bool,

    /// Maximum non-fatal findings kept per unit of work (0 = unlimited)
    #[serde(default = "default_max_reported_per_unit")]
    pub max_reported_per_unit: usize,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            warnings_as_errors: default_warnings_as_errors(),
            max_reported_per_unit: default_max_reported_per_unit(),
        }
    }
}

/// Naming configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamingConfig {
    /// Suffix of generated injector implementations
    #[serde(default = "default_factory_suffix")]
    pub factory_suffix: String,

    /// Prefix of generated child factory members
    #[serde(default = "default_child_factory_prefix")]
    pub child_factory_prefix: String,
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            factory_suffix: default_factory_suffix(),
            child_factory_prefix: default_child_factory_prefix(),
        }
    }
}

impl Settings {
    /// Validate the settings
    pub fn validate(&self) -> Result<()> {
        if self.naming.factory_suffix.trim().is_empty() {
            return Err(Error::config(
                "naming.factory_suffix must not be empty".to_string(),
            ));
        }

        if !is_identifier(&self.naming.factory_suffix) {
            return Err(Error::config(format!(
                "naming.factory_suffix '{}' is not a valid identifier",
                self.naming.factory_suffix
            )));
        }

        if !self.naming.child_factory_prefix.is_empty()
            && !is_identifier(&self.naming.child_factory_prefix)
        {
            return Err(Error::config(format!(
                "naming.child_factory_prefix '{}' is not a valid identifier",
                self.naming.child_factory_prefix
            )));
        }

        Ok(())
    }

    /// Serialize the settings to a TOML string
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| Error::config(format!("Failed to serialize settings: {e}")))
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_')
}
