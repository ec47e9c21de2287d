//! Hierarchical composition
//!
//! A parent injector declares child factories, each constructing a nested
//! injector. The child is resolved on its own; whatever it cannot satisfy
//! locally is forwarded to the parent through its dependency interface. This
//! module validates each child factory against the parent and maps the
//! factory's parameters onto the child's externally supplied values.

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

use bindweave_core::{
    ChildFactoryDecl, DiagnosticCode, Diagnostics, InjectorDecl, MetadataIndex, QualifiedType,
    SpecificationMode, TypeIdentity,
};
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, trace};

use crate::plan::{plan_type, InvocationChain};
use crate::registry::BindingRegistry;

/// What a child factory argument supplies to the child
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Supplied {
    /// The instance of an instantiated specification
    Specification { name: String },
    /// A value the child's dependency interface exposes
    Dependency { interface: TypeIdentity },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChildArgument {
    pub ty: QualifiedType,
    /// Position in the child factory's parameter list
    pub parameter: usize,
    pub supplies: Supplied,
}

/// A validated child factory
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChildComposition {
    pub parent: String,
    pub member: String,
    pub child: String,
    /// Child constructor arguments in the child's declaration order
    pub arguments: Vec<ChildArgument>,
    /// Parent plans for every type the child's dependency interface exposes
    pub forwards: Vec<InvocationChain>,
}

/// Values the child needs from outside, in declaration order
fn external_supply(
    index: &MetadataIndex<'_>,
    child: &InjectorDecl,
) -> IndexMap<QualifiedType, Supplied> {
    let mut supply = IndexMap::new();
    for name in &child.specifications {
        let Some(spec) = index.specification(name) else {
            continue;
        };
        if spec.mode == SpecificationMode::Instantiated {
            supply
                .entry(QualifiedType::unqualified(spec.instance_type()))
                .or_insert_with(|| Supplied::Specification { name: name.clone() });
        }
    }
    if let Some(dependency) = &child.dependency {
        for ty in &dependency.exposes {
            supply
                .entry(ty.clone())
                .or_insert_with(|| Supplied::Dependency {
                    interface: dependency.interface.clone(),
                });
        }
    }
    supply
}

fn join(types: &[&QualifiedType]) -> String {
    types
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Validate one child factory of `parent`.
///
/// Every failure is recorded against the child factory declaration; returns
/// `None` when any was found.
pub fn compose(
    parent: &BindingRegistry,
    decl: &ChildFactoryDecl,
    index: &MetadataIndex<'_>,
    diagnostics: &Diagnostics,
) -> Option<ChildComposition> {
    let subject = format!("{}.{}", parent.injector(), decl.member);
    let Some(child) = index.injector(&decl.child) else {
        diagnostics.report(
            DiagnosticCode::MissingChildInjector,
            subject,
            format!("child factory constructs {}, which is not declared", decl.child),
            &decl.location,
        );
        return None;
    };

    let mut rejected = false;

    if let Some(dependency) = &child.dependency {
        let unexposed: Vec<&QualifiedType> = dependency
            .exposes
            .iter()
            .filter(|ty| !parent.resolve(ty).is_usable())
            .collect();
        if !unexposed.is_empty() {
            rejected = true;
            diagnostics.report(
                DiagnosticCode::NotExposedByParent,
                subject.clone(),
                format!(
                    "{} requires {} from {}, which injector {} does not provide",
                    child.name,
                    join(&unexposed),
                    dependency.interface,
                    parent.injector()
                ),
                &decl.location,
            );
        }
    }

    let supply = external_supply(index, child);
    let mut positions: HashMap<&QualifiedType, usize> = HashMap::new();
    let mut duplicated = Vec::new();
    for (position, ty) in decl.parameters.iter().enumerate() {
        if positions.insert(ty, position).is_some() {
            duplicated.push(ty);
        }
    }
    let missing: Vec<&QualifiedType> = supply
        .keys()
        .filter(|ty| !positions.contains_key(ty))
        .collect();
    let unexpected: Vec<&QualifiedType> = decl
        .parameters
        .iter()
        .filter(|ty| !supply.contains_key(*ty))
        .collect();

    for (problem, types) in [
        ("missing from", &missing),
        ("not expected in", &unexpected),
        ("duplicated in", &duplicated),
    ] {
        if types.is_empty() {
            continue;
        }
        rejected = true;
        diagnostics.report(
            DiagnosticCode::ChildParameterMismatch,
            subject.clone(),
            format!(
                "{} {problem} the parameters of child factory {} for {}",
                join(types),
                decl.member,
                child.name
            ),
            &decl.location,
        );
    }

    if rejected {
        trace!("hierarchy: {} rejected", subject);
        return None;
    }

    let arguments = supply
        .into_iter()
        .filter_map(|(ty, supplies)| {
            let parameter = *positions.get(&ty)?;
            Some(ChildArgument {
                ty,
                parameter,
                supplies,
            })
        })
        .collect();

    let forwards = child
        .dependency
        .iter()
        .flat_map(|dependency| dependency.exposes.iter())
        .filter_map(|ty| plan_type(parent, &format!("{}[{}]", decl.member, ty), ty))
        .collect();

    debug!("hierarchy: {} composes {}", subject, child.name);
    Some(ChildComposition {
        parent: parent.injector().to_string(),
        member: decl.member.clone(),
        child: child.name.clone(),
        arguments,
        forwards,
    })
}
