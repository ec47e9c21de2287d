//! Missing and ambiguous binding detection
//!
//! Runs after links, auto-binding and cycle detection have settled the
//! registry. Each needed type is diagnosed at most once, listing every site
//! that needs it.

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

use bindweave_core::{DiagnosticCode, Diagnostics, SourceToken};
use tracing::debug;

use crate::registry::{BindingRegistry, NeedSite, NeedSource, Origin, Provider, Resolution};

/// Report missing bindings, missing builders and duplicate providers.
///
/// Returns the number of findings recorded.
pub fn check(registry: &BindingRegistry, diagnostics: &Diagnostics) -> usize {
    let before = diagnostics.len();

    for (ty, sites) in registry.needed() {
        // Unresolved links, inputs and outputs alike, are reported by link expansion
        if registry.pending_link_for(ty).is_some() || only_linked(sites) {
            continue;
        }
        if let Resolution::Missing = registry.resolve(ty) {
            let reason = registry
                .autobind_failure(ty)
                .map(|failure| format!(": {failure}"))
                .unwrap_or_default();
            diagnostics.report(
                DiagnosticCode::MissingBinding,
                ty.to_string(),
                format!(
                    "no binding for {ty} in injector {}{reason} (required by {})",
                    registry.injector(),
                    describe_sites(sites)
                ),
                first_location(sites),
            );
        }
    }

    for (ty, providers) in registry.provided() {
        if providers.len() < 2 || providers.iter().all(Provider::is_partial) {
            continue;
        }
        if is_relayed_ambiguity(registry, providers) {
            continue;
        }
        diagnostics.report(
            DiagnosticCode::DuplicateBinding,
            ty.to_string(),
            format!(
                "{ty} is provided more than once in injector {}: {}",
                registry.injector(),
                describe_providers(providers)
            ),
            providers[1].location(),
        );
    }

    for (ty, sites) in registry.needed_builders() {
        if registry.builder(ty).is_empty() {
            diagnostics.report(
                DiagnosticCode::MissingBuilder,
                ty.to_string(),
                format!(
                    "no builder for {ty} in injector {} (required by {})",
                    registry.injector(),
                    describe_sites(sites)
                ),
                first_location(sites),
            );
        }
    }

    for (ty, providers) in registry.builders() {
        if providers.len() > 1 {
            diagnostics.report(
                DiagnosticCode::DuplicateBuilder,
                ty.to_string(),
                format!(
                    "{ty} has more than one builder in injector {}: {}",
                    registry.injector(),
                    describe_providers(providers)
                ),
                providers[1].location(),
            );
        }
    }

    let recorded = diagnostics.len().saturating_sub(before);
    debug!("gaps[{}]: findings={}", registry.injector(), recorded);
    recorded
}

/// A link output inherits the ambiguity of its input, which is already reported
fn is_relayed_ambiguity(registry: &BindingRegistry, providers: &[Provider]) -> bool {
    let mut inputs = providers.iter().map(|p| match &p.origin {
        Origin::Link { input, .. } => Some(input),
        _ => None,
    });
    let Some(Some(first)) = inputs.next() else {
        return false;
    };
    inputs.all(|input| input == Some(first))
        && matches!(registry.resolve(first), Resolution::Ambiguous(_))
}

fn only_linked(sites: &[NeedSite]) -> bool {
    !sites.is_empty()
        && sites
            .iter()
            .all(|site| matches!(site.source, NeedSource::Link { .. }))
}

fn describe_providers(providers: &[Provider]) -> String {
    providers
        .iter()
        .map(|p| format!("{}.{}", p.origin, p.binding.member()))
        .collect::<Vec<_>>()
        .join(", ")
}

fn describe_sites(sites: &[NeedSite]) -> String {
    sites
        .iter()
        .map(|site| site.source.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn first_location(sites: &[NeedSite]) -> &SourceToken {
    static UNKNOWN: SourceToken = SourceToken::unknown();
    sites.first().map(|site| &site.location).unwrap_or(&UNKNOWN)
}

/// True when every needed type of the registry resolves
pub fn is_complete(registry: &BindingRegistry) -> bool {
    registry
        .needed()
        .all(|(ty, _)| registry.resolve(ty).is_usable())
}
