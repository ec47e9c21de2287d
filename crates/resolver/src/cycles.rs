//! Construction cycle detection
//!
//! Direct dependencies form the construction graph; lazy and provider
//! requests are deferred and never close a cycle. Each strongly connected
//! component of that graph is one cycle finding, and every type in it is
//! marked unusable so later stages do not diagnose it again.

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

use bindweave_core::{DiagnosticCode, Diagnostics, QualifiedType, SourceToken};
use std::collections::{HashMap, HashSet};
use std::fmt;
use tracing::{debug, trace};

use crate::registry::BindingRegistry;

/// Types that depend on each other directly, starting at the smallest member.
///
/// When every member has exactly one direct dependency inside the group the
/// members are in path order; otherwise they are sorted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Cycle {
    pub members: Vec<QualifiedType>,
    /// The members form a single closed path
    pub simple: bool,
}

impl fmt::Display for Cycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.simple {
            let members = self
                .members
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            return write!(f, "among {{{members}}}");
        }
        for member in &self.members {
            write!(f, "{member} -> ")?;
        }
        match self.members.first() {
            Some(first) => write!(f, "{first}"),
            None => Ok(()),
        }
    }
}

fn direct_dependencies(registry: &BindingRegistry, ty: &QualifiedType) -> Vec<QualifiedType> {
    let mut seen = HashSet::new();
    registry
        .resolve(ty)
        .providers()
        .iter()
        .flat_map(|provider| provider.binding.dependencies())
        .filter(|dependency| !dependency.kind.is_deferred())
        .map(|dependency| dependency.ty.clone())
        .filter(|dependency| seen.insert(dependency.clone()))
        .collect()
}

struct Visit {
    node: QualifiedType,
    successors: Vec<QualifiedType>,
    next: usize,
}

/// Iterative Tarjan over the construction graph
#[derive(Default)]
struct Components {
    index: HashMap<QualifiedType, usize>,
    lowlink: HashMap<QualifiedType, usize>,
    stack: Vec<QualifiedType>,
    on_stack: HashSet<QualifiedType>,
    found: Vec<Vec<QualifiedType>>,
}

impl Components {
    fn enter(&mut self, registry: &BindingRegistry, node: QualifiedType) -> Visit {
        let order = self.index.len();
        self.index.insert(node.clone(), order);
        self.lowlink.insert(node.clone(), order);
        self.stack.push(node.clone());
        self.on_stack.insert(node.clone());
        Visit {
            successors: direct_dependencies(registry, &node),
            node,
            next: 0,
        }
    }

    fn lower(&mut self, node: &QualifiedType, to: usize) {
        if let Some(low) = self.lowlink.get_mut(node) {
            *low = (*low).min(to);
        }
    }

    fn search(&mut self, registry: &BindingRegistry, root: QualifiedType) {
        let mut visits = vec![self.enter(registry, root)];

        while let Some(top) = visits.last_mut() {
            if let Some(child) = top.successors.get(top.next).cloned() {
                top.next += 1;
                let parent = top.node.clone();
                match self.index.get(&child).copied() {
                    None => {
                        let visit = self.enter(registry, child);
                        visits.push(visit);
                    }
                    Some(order) if self.on_stack.contains(&child) => self.lower(&parent, order),
                    Some(_) => {}
                }
                continue;
            }

            let Some(done) = visits.pop() else {
                break;
            };
            let low = self.lowlink.get(&done.node).copied().unwrap_or_default();
            if self.index.get(&done.node) == Some(&low) {
                let mut component = Vec::new();
                while let Some(member) = self.stack.pop() {
                    self.on_stack.remove(&member);
                    let last = member == done.node;
                    component.push(member);
                    if last {
                        break;
                    }
                }
                let closed = component.len() > 1 || done.successors.contains(&done.node);
                if closed {
                    self.found.push(component);
                }
            }
            if let Some(parent) = visits.last() {
                let parent = parent.node.clone();
                self.lower(&parent, low);
            }
        }
    }
}

/// Order a component as a closed path when it is one
fn to_cycle(registry: &BindingRegistry, mut members: Vec<QualifiedType>) -> Cycle {
    members.sort();
    let group: HashSet<&QualifiedType> = members.iter().collect();
    let mut next: HashMap<&QualifiedType, QualifiedType> = HashMap::new();
    let mut simple = true;
    for member in &members {
        let inside: Vec<QualifiedType> = direct_dependencies(registry, member)
            .into_iter()
            .filter(|dependency| group.contains(dependency))
            .collect();
        match inside.as_slice() {
            [only] => {
                next.insert(member, only.clone());
            }
            _ => simple = false,
        }
    }

    if simple {
        if let Some(start) = members.first() {
            let mut path = vec![start.clone()];
            while let Some(step) = path.last().and_then(|last| next.get(last)) {
                if step == start || path.len() >= members.len() {
                    break;
                }
                path.push(step.clone());
            }
            if path.len() == members.len() {
                return Cycle {
                    members: path,
                    simple: true,
                };
            }
        }
    }
    Cycle {
        members,
        simple: false,
    }
}

/// Find construction cycles, report each once and mark its members cyclic
pub fn detect(registry: &mut BindingRegistry, diagnostics: &Diagnostics) -> Vec<Cycle> {
    let roots: Vec<QualifiedType> = registry
        .provided()
        .map(|(ty, _)| ty)
        .chain(registry.synthesized().map(|(ty, _)| ty))
        .cloned()
        .collect();

    let mut components = Components::default();
    for root in roots {
        if !components.index.contains_key(&root) {
            components.search(registry, root);
        }
    }
    trace!(
        "cycles[{}]: visited={}",
        registry.injector(),
        components.index.len()
    );

    let found: Vec<Cycle> = components
        .found
        .into_iter()
        .map(|component| to_cycle(registry, component))
        .collect();

    for cycle in &found {
        let location = cycle
            .members
            .first()
            .and_then(|ty| registry.resolve(ty).providers().first())
            .map(|provider| provider.location().clone())
            .unwrap_or_else(SourceToken::default);
        let subject = cycle
            .members
            .first()
            .map(ToString::to_string)
            .unwrap_or_default();
        diagnostics.report(
            DiagnosticCode::DependencyCycle,
            subject,
            format!("construction cycle {cycle}; request one edge lazily to break it"),
            &location,
        );
    }
    for cycle in &found {
        for member in &cycle.members {
            registry.mark_cyclic(member.clone());
        }
    }

    debug!("cycles[{}]: found={}", registry.injector(), found.len());
    found
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{Origin, Provider, Resolution};
    use bindweave_core::{Binding, Dependency, Factory, FactoryBuilder, SpecificationMode};
    use std::sync::Arc;

    fn qt(s: &str) -> QualifiedType {
        QualifiedType::parse(s).unwrap()
    }

    fn provide(registry: &mut BindingRegistry, provides: &str, params: Vec<Dependency>) {
        let factory: Factory = FactoryBuilder::default()
            .member(provides.to_lowercase())
            .provides(qt(provides))
            .parameters(params)
            .build()
            .unwrap();
        registry.provide(Provider::new(
            Origin::Specification {
                name: "Spec".to_string(),
            },
            Arc::new(Binding::Factory(factory)),
            SpecificationMode::Static,
        ));
    }

    #[test]
    fn test_detects_two_node_cycle_once() {
        let mut registry = BindingRegistry::new("App");
        provide(&mut registry, "A", vec![Dependency::direct(qt("B"))]);
        provide(&mut registry, "B", vec![Dependency::direct(qt("A"))]);
        let diagnostics = Diagnostics::new("test");

        let cycles = detect(&mut registry, &diagnostics);

        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].to_string(), "A -> B -> A");
        let findings = diagnostics.into_vec();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].code, DiagnosticCode::DependencyCycle);
        assert!(matches!(registry.resolve(&qt("A")), Resolution::Cyclic));
        assert!(matches!(registry.resolve(&qt("B")), Resolution::Cyclic));
    }

    #[test]
    fn test_lazy_edge_breaks_cycle() {
        let mut registry = BindingRegistry::new("App");
        provide(&mut registry, "A", vec![Dependency::direct(qt("B"))]);
        provide(&mut registry, "B", vec![Dependency::lazy(qt("A"))]);
        let diagnostics = Diagnostics::new("test");

        assert!(detect(&mut registry, &diagnostics).is_empty());
        assert!(diagnostics.is_empty());
        assert!(matches!(registry.resolve(&qt("A")), Resolution::Provided(_)));
    }

    #[test]
    fn test_self_cycle_and_acyclic_neighbour() {
        let mut registry = BindingRegistry::new("App");
        provide(&mut registry, "Loop", vec![Dependency::direct(qt("Loop"))]);
        provide(&mut registry, "Leaf", vec![]);
        provide(&mut registry, "Root", vec![Dependency::direct(qt("Leaf"))]);

        let cycles = detect(&mut registry, &Diagnostics::new("test"));

        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].members, vec![qt("Loop")]);
        assert!(matches!(registry.resolve(&qt("Root")), Resolution::Provided(_)));
    }

    #[test]
    fn test_overlapping_cycles_mark_every_member() {
        // X -> A -> B -> X and X -> C -> A -> B -> X share members
        let mut registry = BindingRegistry::new("App");
        provide(
            &mut registry,
            "X",
            vec![Dependency::direct(qt("A")), Dependency::direct(qt("C"))],
        );
        provide(&mut registry, "A", vec![Dependency::direct(qt("B"))]);
        provide(&mut registry, "B", vec![Dependency::direct(qt("X"))]);
        provide(&mut registry, "C", vec![Dependency::direct(qt("A"))]);
        let diagnostics = Diagnostics::new("test");

        let cycles = detect(&mut registry, &diagnostics);

        assert_eq!(cycles.len(), 1);
        assert!(!cycles[0].simple);
        assert_eq!(cycles[0].members, vec![qt("A"), qt("B"), qt("C"), qt("X")]);
        assert_eq!(cycles[0].to_string(), "among {A, B, C, X}");
        assert_eq!(diagnostics.len(), 1);
        for ty in ["A", "B", "C", "X"] {
            assert!(matches!(registry.resolve(&qt(ty)), Resolution::Cyclic), "{ty}");
        }
    }

    #[test]
    fn test_three_node_cycle_in_path_order() {
        let mut registry = BindingRegistry::new("App");
        provide(&mut registry, "A", vec![Dependency::direct(qt("C"))]);
        provide(&mut registry, "B", vec![Dependency::direct(qt("A"))]);
        provide(&mut registry, "C", vec![Dependency::direct(qt("B"))]);
        provide(&mut registry, "Outside", vec![Dependency::direct(qt("A"))]);

        let cycles = detect(&mut registry, &Diagnostics::new("test"));

        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].to_string(), "A -> C -> B -> A");
        assert!(matches!(
            registry.resolve(&qt("Outside")),
            Resolution::Provided(_)
        ));
    }
}
