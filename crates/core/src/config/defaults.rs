//! Default values and functions for configuration

use crate::entities::FabricationMode;

// Default constants
pub(crate) const DEFAULT_FACTORY_SUFFIX: &str = "Factory";
pub(crate) const DEFAULT_CHILD_FACTORY_PREFIX: &str = "make";
pub(crate) const DEFAULT_MAX_REPORTED_PER_UNIT: usize = 256;

pub(crate) fn default_constructor_autobinding() -> bool {
    true
}

pub(crate) fn default_autobind_mode() -> FabricationMode {
    FabricationMode::Recurrent
}

pub(crate) fn default_cross_injector_hints() -> bool {
    true
}

pub(crate) fn default_warnings_as_errors() -> bool {
    false
}

pub(crate) fn default_max_reported_per_unit() -> usize {
    DEFAULT_MAX_REPORTED_PER_UNIT
}

pub(crate) fn default_factory_suffix() -> String {
    DEFAULT_FACTORY_SUFFIX.to_string()
}

pub(crate) fn default_child_factory_prefix() -> String {
    DEFAULT_CHILD_FACTORY_PREFIX.to_string()
}
