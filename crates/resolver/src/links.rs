//! Link expansion
//!
//! A link `input -> output` makes every place needing `output` use the
//! binding that satisfies `input`. Links may chain, so expansion runs until
//! no pending link makes progress.

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

use bindweave_core::{DiagnosticCode, Diagnostics};
use tracing::{debug, trace};

use crate::registry::BindingRegistry;

/// Expand every link whose input currently has a provider.
///
/// Returns the number of links expanded. Links whose input is still missing
/// stay pending.
pub fn expand(registry: &mut BindingRegistry) -> usize {
    let mut expanded = 0;
    loop {
        let pending = std::mem::take(&mut registry.pending_links);
        let before = pending.len();
        let mut remaining = Vec::with_capacity(before);
        for entry in pending {
            if registry.expand_link(&entry.link, &entry.declared_in) {
                expanded += 1;
            } else {
                remaining.push(entry);
            }
        }
        let progressed = remaining.len() < before;
        registry.pending_links = remaining;
        if !progressed {
            break;
        }
    }

    debug!(
        "links[{}]: expanded={}, pending={}",
        registry.injector(),
        expanded,
        registry.pending_links.len()
    );
    expanded
}

/// Expand what is left after auto-binding and report the rest as unresolved.
///
/// Unresolved links stay pending so later stages can tell their outputs apart
/// from plain missing bindings.
pub fn finish(registry: &mut BindingRegistry, diagnostics: &Diagnostics) {
    expand(registry);

    for entry in &registry.pending_links {
        trace!(
            "links[{}]: unresolved {} -> {}",
            registry.injector(),
            entry.link.input,
            entry.link.output
        );
        diagnostics.report(
            DiagnosticCode::UnresolvedLink,
            entry.link.output.to_string(),
            format!(
                "link {} -> {} declared in {} has no binding for its input",
                entry.link.input, entry.link.output, entry.declared_in
            ),
            &entry.link.location,
        );
    }
}
