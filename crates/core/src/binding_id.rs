//! Deterministic binding identifiers
//!
//! Emission names storage slots and accessor members after these ids, so the
//! same binding must get the same id on every run.

use serde::{Deserialize, Serialize};
use std::fmt;
use twox_hash::XxHash3_128;

use crate::qualified_type::QualifiedType;

/// Stable identifier of a resolved binding
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BindingId(String);

impl BindingId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BindingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Generate a binding id from the binding's origin, member and produced type
///
/// `origin` distinguishes explicit specifications, link expansions,
/// dependency forwards and synthesized bindings; including the member keeps
/// two partial factories in one specification apart.
pub fn generate_binding_id(origin: &str, member: &str, target: &QualifiedType) -> BindingId {
    let unique_str = format!("{origin}:{member}:{target}");
    BindingId(format!(
        "binding-{:032x}",
        XxHash3_128::oneshot(unique_str.as_bytes())
    ))
}
