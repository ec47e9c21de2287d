//! Fabrication-mode scheduling
//!
//! Every binding of a registry gets a [`Schedule`]: how often its value is
//! produced and how the owner of the producing member is instantiated.

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

use bindweave_core::{
    BindingId, DiagnosticCode, Diagnostics, FabricationMode, SpecificationMode,
};
use indexmap::IndexMap;
use serde::Serialize;
use tracing::debug;

use crate::registry::{BindingRegistry, Origin, Provider, Resolution};

/// Caching policy and owner instantiation of one binding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Schedule {
    pub fabrication: FabricationMode,
    pub instantiation: SpecificationMode,
}

impl Schedule {
    pub fn of(provider: &Provider) -> Self {
        match provider.origin.root() {
            // The parent owns caching of forwarded values
            Origin::Dependency { .. } => Self {
                fabrication: FabricationMode::Recurrent,
                instantiation: SpecificationMode::Dependency,
            },
            Origin::Synthesized => Self {
                fabrication: provider.fabrication(),
                instantiation: SpecificationMode::Static,
            },
            Origin::Specification { .. } | Origin::Link { .. } => Self {
                fabrication: provider.fabrication(),
                instantiation: provider.instantiation,
            },
        }
    }
}

/// Schedule every binding of the registry, keyed by binding id
pub fn schedule(
    registry: &BindingRegistry,
    diagnostics: &Diagnostics,
) -> IndexMap<BindingId, Schedule> {
    let schedules: IndexMap<BindingId, Schedule> = registry
        .all_providers()
        .map(|provider| (provider.id.clone(), Schedule::of(provider)))
        .collect();

    let mut captive = 0;
    for provider in registry.all_providers() {
        if Schedule::of(provider).fabrication != FabricationMode::ContainerScoped {
            continue;
        }
        // Link providers share the input's binding, checked under the input
        if matches!(provider.origin, Origin::Link { .. }) {
            continue;
        }
        for dependency in provider.binding.dependencies() {
            if dependency.kind.is_deferred() {
                continue;
            }
            let scoped = match registry.resolve(&dependency.ty) {
                Resolution::Forwarded(_) | Resolution::Cyclic | Resolution::Missing => false,
                resolution => resolution
                    .providers()
                    .iter()
                    .any(|p| Schedule::of(p).fabrication == FabricationMode::Scoped),
            };
            if scoped {
                captive += 1;
                diagnostics.report(
                    DiagnosticCode::CaptiveDependency,
                    provider.binding.target().to_string(),
                    format!(
                        "container-scoped {} from {} captures scoped {}; request it lazily or widen its scope",
                        provider.binding.target(),
                        provider.origin,
                        dependency.ty
                    ),
                    provider.location(),
                );
            }
        }
    }

    debug!(
        "fabrication[{}]: scheduled={}, captive={}",
        registry.injector(),
        schedules.len(),
        captive
    );
    schedules
}
