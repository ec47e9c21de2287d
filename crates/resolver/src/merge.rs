//! Global merge across injectors
//!
//! Each injector is resolved on its own. Afterwards the explicitly provided
//! types of every injector are unioned so that an injector which fell back to
//! a constructor binding, or failed to bind a type at all, can be pointed at
//! specifications elsewhere in the graph that provide it. Findings here are
//! advisories and never block generation.

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

use bindweave_core::{DiagnosticCode, Diagnostics, QualifiedType, SourceToken};
use im::{HashMap, OrdSet};
use tracing::{debug, trace};

use crate::registry::{BindingRegistry, Origin, Resolution};

/// Explicitly provided types of every injector, with the providing specifications
#[derive(Debug, Clone, Default)]
pub struct GlobalIndex {
    explicit: HashMap<QualifiedType, OrdSet<String>>,
}

impl GlobalIndex {
    pub fn from_registries<'a>(registries: impl IntoIterator<Item = &'a BindingRegistry>) -> Self {
        let explicit = registries
            .into_iter()
            .map(explicit_of)
            .fold(HashMap::new(), |merged, local| {
                merged.union_with(local, |a, b| a.union(b))
            });
        debug!("merge: explicit types={}", explicit.len());
        Self { explicit }
    }

    /// Specifications anywhere in the graph that explicitly provide `ty`
    pub fn providers_of(&self, ty: &QualifiedType) -> Option<&OrdSet<String>> {
        self.explicit.get(ty)
    }

    pub fn len(&self) -> usize {
        self.explicit.len()
    }

    pub fn is_empty(&self) -> bool {
        self.explicit.is_empty()
    }

    /// Providing specifications of `ty` not attached to `registry`'s injector
    fn candidates(&self, registry: &BindingRegistry, ty: &QualifiedType) -> Vec<String> {
        self.providers_of(ty)
            .map(|names| {
                names
                    .iter()
                    .filter(|name| !registry.specifications().contains(name.as_str()))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn explicit_of(registry: &BindingRegistry) -> HashMap<QualifiedType, OrdSet<String>> {
    let mut local = HashMap::new();
    for (ty, providers) in registry.provided() {
        let names: OrdSet<String> = providers
            .iter()
            .filter_map(|provider| match &provider.origin {
                Origin::Specification { name } => Some(name.clone()),
                _ => None,
            })
            .collect();
        if !names.is_empty() {
            local.insert(ty.clone(), names);
        }
    }
    local
}

/// Record cross-injector advisories for one injector.
///
/// Returns the number of advisories recorded.
pub fn advise(index: &GlobalIndex, registry: &BindingRegistry, diagnostics: &Diagnostics) -> usize {
    let mut advisories = 0;

    for (ty, provider) in registry.synthesized() {
        let candidates = index.candidates(registry, ty);
        if candidates.is_empty() {
            continue;
        }
        trace!(
            "merge[{}]: {} synthesized but provided by {:?}",
            registry.injector(),
            ty,
            candidates
        );
        diagnostics.report(
            DiagnosticCode::ShadowedAutobinding,
            ty.to_string(),
            format!(
                "injector {} builds {ty} from its constructor, but it is explicitly provided by {}; is a specification missing from the injector?",
                registry.injector(),
                candidates.join(", ")
            ),
            provider.location(),
        );
        advisories += 1;
    }

    for (ty, sites) in registry.needed() {
        if !matches!(registry.resolve(ty), Resolution::Missing) {
            continue;
        }
        let candidates = index.candidates(registry, ty);
        if candidates.is_empty() {
            continue;
        }
        let location = sites
            .first()
            .map(|site| site.location.clone())
            .unwrap_or_else(SourceToken::unknown);
        diagnostics.report(
            DiagnosticCode::CandidateElsewhere,
            ty.to_string(),
            format!(
                "{ty} is provided by {}, which injector {} does not attach",
                candidates.join(", "),
                registry.injector()
            ),
            &location,
        );
        advisories += 1;
    }

    debug!(
        "merge[{}]: advisories={}",
        registry.injector(),
        advisories
    );
    advisories
}
