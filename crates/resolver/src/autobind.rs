//! Auto-binding synthesizer
//!
//! Needed types without an explicit provider are bound from their single
//! eligible constructor. The constructor's parameters and required
//! properties become needed in turn, so synthesis runs over a work queue
//! until it is empty. Each type is enqueued at most once: a type is queued
//! only when it first becomes needed.

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

use bindweave_core::{Factory, MetadataIndex, QualifiedType, RequestKind, ResolverConfig};
use std::collections::VecDeque;
use tracing::{debug, trace};

use crate::registry::{AutobindFailure, BindingRegistry, NeedSite, NeedSource};

/// Member name recorded on synthesized bindings
pub const CONSTRUCTOR_MEMBER: &str = "<init>";

/// Close the registry over constructor bindings.
///
/// Returns the number of synthesized bindings.
pub fn synthesize(
    registry: &mut BindingRegistry,
    index: &MetadataIndex<'_>,
    config: &ResolverConfig,
) -> usize {
    let mut queue: VecDeque<QualifiedType> = registry
        .needed()
        .map(|(ty, _)| ty)
        .filter(|ty| !registry.has_local_provider(ty) && !registry.is_forwarded(ty))
        .cloned()
        .collect();

    if !config.constructor_autobinding {
        for ty in queue {
            if registry.pending_link_for(&ty).is_none() {
                registry.record_autobind_failure(ty, AutobindFailure::Disabled);
            }
        }
        return 0;
    }

    let mut synthesized = 0;
    while let Some(ty) = queue.pop_front() {
        if registry.has_local_provider(&ty)
            || registry.is_forwarded(&ty)
            || registry.is_synthesized(&ty)
        {
            trace!("autobind[{}]: {} already bound", registry.injector(), ty);
            continue;
        }

        // A pending link owns its output: bind the input instead
        if let Some(pending) = registry.pending_link_for(&ty) {
            let input = pending.link.input.clone();
            let site = NeedSite {
                source: NeedSource::Link {
                    declared_in: pending.declared_in.clone(),
                },
                kind: RequestKind::Direct,
                location: pending.link.location.clone(),
            };
            trace!(
                "autobind[{}]: {} is a link output, binding {} instead",
                registry.injector(),
                ty,
                input
            );
            if registry.need(input.clone(), site) {
                queue.push_back(input);
            }
            continue;
        }

        if ty.is_qualified() {
            registry.record_autobind_failure(ty, AutobindFailure::Qualified);
            continue;
        }

        let Some(decl) = index.type_decl(&ty.ty) else {
            registry.record_autobind_failure(ty, AutobindFailure::NoTypeDeclaration);
            continue;
        };

        let eligible: Vec<_> = decl.eligible_constructors().collect();
        let constructor = match eligible.as_slice() {
            [only] => *only,
            [] => {
                registry.record_autobind_failure(ty, AutobindFailure::NoEligibleConstructor);
                continue;
            }
            many => {
                registry.record_autobind_failure(
                    ty,
                    AutobindFailure::MultipleEligibleConstructors { count: many.len() },
                );
                continue;
            }
        };

        for dependency in constructor
            .parameters
            .iter()
            .chain(decl.required_properties.iter())
        {
            let site = NeedSite {
                source: NeedSource::Constructor { ty: ty.clone() },
                kind: dependency.kind,
                location: constructor.location.clone(),
            };
            if registry.need(dependency.ty.clone(), site) {
                queue.push_back(dependency.ty.clone());
            }
        }

        // Dependencies are queued before the type is marked synthesized
        let factory = Factory {
            member: CONSTRUCTOR_MEMBER.to_string(),
            provides: ty.clone(),
            mode: decl.mode.unwrap_or(config.default_autobind_mode),
            parameters: constructor.parameters.clone(),
            properties: decl.required_properties.clone(),
            partial: false,
            location: constructor.location.clone(),
        };
        let id = registry.synthesize(ty.clone(), factory).id.clone();
        trace!(
            "autobind[{}]: synthesized {} as {}",
            registry.injector(),
            ty,
            id
        );
        synthesized += 1;
    }

    debug!(
        "autobind[{}]: synthesized={}",
        registry.injector(),
        synthesized
    );
    synthesized
}
