//! Invocation chains
//!
//! For each injector request the planner produces the post-order sequence
//! of member calls that fabricates the requested value. Arguments refer to
//! earlier steps by index; each type is fabricated once per chain.

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

use bindweave_core::{
    BindingId, FabricationMode, QualifiedType, Request, RequestKind, RequestTarget, TypeIdentity,
};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt;
use tracing::trace;

use crate::fabrication::Schedule;
use crate::registry::{BindingRegistry, Origin, Provider, Resolution};

/// The member invoked by a step
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Callee {
    /// A member of a specification
    Member { owner: String, member: String },
    /// The constructor of a type
    Constructor { ty: TypeIdentity },
    /// An accessor of the parent's dependency interface
    Forward {
        interface: TypeIdentity,
        member: String,
    },
    /// Gathers the contributions of partial factories
    Collect,
}

impl fmt::Display for Callee {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Callee::Member { owner, member } => write!(f, "{owner}.{member}"),
            Callee::Constructor { ty } => write!(f, "new {ty}"),
            Callee::Forward { interface, member } => write!(f, "{interface}.{member}"),
            Callee::Collect => f.write_str("collect"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Argument {
    /// The value produced by an earlier step
    Step { index: usize },
    /// A lazy or provider handle resolved on first use
    Deferred {
        ty: QualifiedType,
        #[serde(rename = "request")]
        kind: RequestKind,
    },
    /// The caller-supplied value a builder initializes
    Target,
}

impl fmt::Display for Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Argument::Step { index } => write!(f, "#{index}"),
            Argument::Deferred { ty, kind } => write!(f, "{kind}<{ty}>"),
            Argument::Target => f.write_str("target"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvocationStep {
    pub target: QualifiedType,
    /// Binding invoked; `None` for collection steps
    pub binding: Option<BindingId>,
    pub callee: Callee,
    pub arguments: Vec<Argument>,
    pub fabrication: FabricationMode,
}

impl fmt::Display for InvocationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let arguments = self
            .arguments
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        write!(f, "{}({arguments})", self.callee)
    }
}

/// Ordered plan for one injector request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvocationChain {
    pub request: String,
    pub target: QualifiedType,
    pub steps: Vec<InvocationStep>,
    /// Types handed out as lazy or provider handles
    pub deferred: Vec<QualifiedType>,
}

impl InvocationChain {
    /// The step producing the requested value
    pub fn result(&self) -> Option<&InvocationStep> {
        self.steps.last()
    }
}

impl fmt::Display for InvocationChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let steps = self
            .steps
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" → ");
        write!(f, "[{steps}]")
    }
}

struct Planner<'r> {
    registry: &'r BindingRegistry,
    steps: Vec<InvocationStep>,
    produced: HashMap<QualifiedType, usize>,
    visiting: HashSet<QualifiedType>,
    deferred: Vec<QualifiedType>,
}

impl<'r> Planner<'r> {
    fn new(registry: &'r BindingRegistry) -> Self {
        Self {
            registry,
            steps: Vec::new(),
            produced: HashMap::new(),
            visiting: HashSet::new(),
            deferred: Vec::new(),
        }
    }

    /// Plan `ty`; returns the index of the step producing it
    fn visit(&mut self, ty: &QualifiedType) -> Option<usize> {
        if let Some(&index) = self.produced.get(ty) {
            return Some(index);
        }
        if !self.visiting.insert(ty.clone()) {
            return None;
        }
        let index = self.produce(ty);
        self.visiting.remove(ty);
        let index = index?;
        self.produced.insert(ty.clone(), index);
        Some(index)
    }

    fn produce(&mut self, ty: &QualifiedType) -> Option<usize> {
        match self.registry.resolve(ty) {
            Resolution::Provided(provider)
            | Resolution::Forwarded(provider)
            | Resolution::Synthesized(provider) => self.invoke(ty, provider, Vec::new()),
            Resolution::Collection(providers) => {
                let mut arguments = Vec::with_capacity(providers.len());
                for provider in providers {
                    let index = self.invoke(ty, provider, Vec::new())?;
                    arguments.push(Argument::Step { index });
                }
                Some(self.push(InvocationStep {
                    target: ty.clone(),
                    binding: None,
                    callee: Callee::Collect,
                    arguments,
                    fabrication: FabricationMode::Recurrent,
                }))
            }
            Resolution::Ambiguous(_) | Resolution::Cyclic | Resolution::Missing => None,
        }
    }

    fn invoke(
        &mut self,
        ty: &QualifiedType,
        provider: &Provider,
        mut arguments: Vec<Argument>,
    ) -> Option<usize> {
        for dependency in provider.binding.dependencies() {
            if dependency.kind.is_deferred() {
                if !self.deferred.contains(&dependency.ty) {
                    self.deferred.push(dependency.ty.clone());
                }
                arguments.push(Argument::Deferred {
                    ty: dependency.ty.clone(),
                    kind: dependency.kind,
                });
            } else {
                let index = self.visit(&dependency.ty)?;
                arguments.push(Argument::Step { index });
            }
        }
        Some(self.push(InvocationStep {
            target: ty.clone(),
            binding: Some(provider.id.clone()),
            callee: callee_of(provider),
            arguments,
            fabrication: Schedule::of(provider).fabrication,
        }))
    }

    fn push(&mut self, step: InvocationStep) -> usize {
        trace!("plan: #{} {}", self.steps.len(), step);
        self.steps.push(step);
        self.steps.len() - 1
    }
}

fn callee_of(provider: &Provider) -> Callee {
    let member = provider.binding.member().to_string();
    match provider.origin.root() {
        Origin::Specification { name } => Callee::Member {
            owner: name.clone(),
            member,
        },
        Origin::Dependency { interface } => Callee::Forward {
            interface: interface.clone(),
            member,
        },
        Origin::Synthesized | Origin::Link { .. } => Callee::Constructor {
            ty: provider.binding.target().ty.clone(),
        },
    }
}

/// Plan one injector request.
///
/// Returns `None` when the request or one of its direct dependencies does
/// not resolve; those gaps are diagnosed by earlier stages.
pub fn plan_request(registry: &BindingRegistry, request: &Request) -> Option<InvocationChain> {
    let mut planner = Planner::new(registry);
    let target = request.ty().clone();

    match &request.target {
        RequestTarget::Provide(dependency) if dependency.kind.is_deferred() => {
            // The handle itself is the result; plan what it will produce
            planner.deferred.push(dependency.ty.clone());
            planner.visit(&dependency.ty)?;
        }
        RequestTarget::Provide(dependency) => {
            planner.visit(&dependency.ty)?;
        }
        RequestTarget::Build(ty) => {
            let [provider] = registry.builder(ty) else {
                return None;
            };
            planner.invoke(ty, provider, vec![Argument::Target])?;
        }
    }

    Some(InvocationChain {
        request: request.member.clone(),
        target,
        steps: planner.steps,
        deferred: planner.deferred,
    })
}

/// Plan a single type outside any request, as a parent does for forwards
pub fn plan_type(
    registry: &BindingRegistry,
    label: &str,
    ty: &QualifiedType,
) -> Option<InvocationChain> {
    let mut planner = Planner::new(registry);
    planner.visit(ty)?;
    Some(InvocationChain {
        request: label.to_string(),
        target: ty.clone(),
        steps: planner.steps,
        deferred: planner.deferred,
    })
}
