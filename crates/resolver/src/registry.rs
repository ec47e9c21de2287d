//! Per-injector binding registry
//!
//! The registry aggregates every factory and builder declared by the
//! specifications attached to one injector, indexed by qualified type, and
//! records which types are needed and by whom. Construction never fails:
//! gaps and ambiguities are detected by later stages so one pass reports
//! every problem.
//!
//! Stages mutate the registry while the pass runs; once the pass returns it
//! is only ever read, so lookups are idempotent.

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

use bindweave_core::{
    generate_binding_id, Binding, BindingId, DependencyRef, DiagnosticCode, Diagnostics,
    FabricationMode, Factory, InjectorDecl, Link, MetadataIndex, QualifiedType, RequestKind,
    RequestTarget, SourceToken, Specification, SpecificationMode, TypeIdentity,
};
use indexmap::{IndexMap, IndexSet};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

/// Where a provider's binding comes from
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Origin {
    /// Declared by a specification attached to the injector
    Specification { name: String },
    /// Expanded from a link; `source` is the origin of the input's binding
    Link {
        declared_in: String,
        input: QualifiedType,
        source: Box<Origin>,
    },
    /// Forwarded to the parent through a dependency interface
    Dependency { interface: TypeIdentity },
    /// Synthesized from the type's constructor
    Synthesized,
}

impl Origin {
    /// The specification that ultimately provides the binding, if any
    pub fn providing_specification(&self) -> Option<&str> {
        match self {
            Origin::Specification { name } => Some(name),
            Origin::Link { source, .. } => source.providing_specification(),
            Origin::Dependency { .. } | Origin::Synthesized => None,
        }
    }

    /// The origin with link indirections removed
    pub fn root(&self) -> &Origin {
        match self {
            Origin::Link { source, .. } => source.root(),
            other => other,
        }
    }

    fn id_prefix(&self) -> String {
        match self {
            Origin::Specification { name } => format!("spec:{name}"),
            Origin::Link {
                declared_in, input, ..
            } => format!("link:{declared_in}:{input}"),
            Origin::Dependency { interface } => format!("dependency:{interface}"),
            Origin::Synthesized => "auto".to_string(),
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::Specification { name } => f.write_str(name),
            Origin::Link {
                declared_in,
                input,
                source,
            } => write!(f, "{source} (via link from {input} in {declared_in})"),
            Origin::Dependency { interface } => write!(f, "parent dependency {interface}"),
            Origin::Synthesized => f.write_str("synthesized constructor binding"),
        }
    }
}

/// A binding registered for a qualified type
#[derive(Debug, Clone, Serialize)]
pub struct Provider {
    pub id: BindingId,
    pub origin: Origin,
    pub binding: Arc<Binding>,
    pub instantiation: SpecificationMode,
}

impl Provider {
    pub fn new(origin: Origin, binding: Arc<Binding>, instantiation: SpecificationMode) -> Self {
        let id = generate_binding_id(&origin.id_prefix(), binding.member(), binding.target());
        Self {
            id,
            origin,
            binding,
            instantiation,
        }
    }

    /// Re-register this provider's binding for another type through a link
    fn linked(&self, link: &Link, declared_in: &str) -> Self {
        let origin = Origin::Link {
            declared_in: declared_in.to_string(),
            input: link.input.clone(),
            source: Box::new(self.origin.clone()),
        };
        let id = generate_binding_id(&origin.id_prefix(), self.binding.member(), &link.output);
        Self {
            id,
            origin,
            binding: Arc::clone(&self.binding),
            instantiation: self.instantiation,
        }
    }

    pub fn is_partial(&self) -> bool {
        self.binding.is_partial()
    }

    /// Declared fabrication mode; builders are never cached
    pub fn fabrication(&self) -> FabricationMode {
        match self.binding.as_ref() {
            Binding::Factory(factory) => factory.mode,
            Binding::Builder(_) => FabricationMode::Recurrent,
        }
    }

    pub fn location(&self) -> &SourceToken {
        self.binding.location()
    }
}

/// Who needs a type
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NeedSource {
    /// An injector request member
    Request { member: String },
    /// A parameter or property of a declared binding
    Binding { owner: String, member: String },
    /// A parameter or property of a synthesized constructor binding
    Constructor { ty: QualifiedType },
    /// The input of a link whose output was needed
    Link { declared_in: String },
}

impl fmt::Display for NeedSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NeedSource::Request { member } => write!(f, "request {member}"),
            NeedSource::Binding { owner, member } => write!(f, "{owner}.{member}"),
            NeedSource::Constructor { ty } => write!(f, "constructor of {ty}"),
            NeedSource::Link { declared_in } => write!(f, "link in {declared_in}"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NeedSite {
    pub source: NeedSource,
    pub kind: RequestKind,
    pub location: SourceToken,
}

/// A link whose input was not yet provided when links were first expanded
#[derive(Debug, Clone)]
pub(crate) struct PendingLink {
    pub link: Link,
    pub declared_in: String,
}

/// Why the synthesizer could not bind a type
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AutobindFailure {
    Disabled,
    Qualified,
    NoTypeDeclaration,
    NoEligibleConstructor,
    MultipleEligibleConstructors { count: usize },
}

impl fmt::Display for AutobindFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AutobindFailure::Disabled => f.write_str("constructor auto-binding is disabled"),
            AutobindFailure::Qualified => {
                f.write_str("qualified requests are never bound from constructors")
            }
            AutobindFailure::NoTypeDeclaration => {
                f.write_str("no constructor metadata is known for the type")
            }
            AutobindFailure::NoEligibleConstructor => {
                f.write_str("the type has no eligible constructor")
            }
            AutobindFailure::MultipleEligibleConstructors { count } => {
                write!(f, "the type has {count} eligible constructors")
            }
        }
    }
}

/// How a qualified type resolves in a registry
#[derive(Debug, Clone, Copy)]
pub enum Resolution<'a> {
    /// Exactly one non-partial local provider
    Provided(&'a Provider),
    /// Every local provider is partial; all of them contribute
    Collection(&'a [Provider]),
    /// Satisfied by the parent through the dependency interface
    Forwarded(&'a Provider),
    /// Satisfied by a synthesized constructor binding
    Synthesized(&'a Provider),
    /// Several local providers, at least one not partial
    Ambiguous(&'a [Provider]),
    /// Part of a construction cycle
    Cyclic,
    Missing,
}

impl<'a> Resolution<'a> {
    pub fn is_usable(&self) -> bool {
        matches!(
            self,
            Resolution::Provided(_)
                | Resolution::Collection(_)
                | Resolution::Forwarded(_)
                | Resolution::Synthesized(_)
        )
    }

    /// Every provider taking part in the resolution
    pub fn providers(self) -> &'a [Provider] {
        match self {
            Resolution::Provided(p) | Resolution::Forwarded(p) | Resolution::Synthesized(p) => {
                std::slice::from_ref(p)
            }
            Resolution::Collection(ps) | Resolution::Ambiguous(ps) => ps,
            Resolution::Cyclic | Resolution::Missing => &[],
        }
    }
}

/// Binding registry of one injector
#[derive(Debug, Clone, Default)]
pub struct BindingRegistry {
    injector: String,
    specifications: IndexSet<String>,
    provided: IndexMap<QualifiedType, Vec<Provider>>,
    builders: IndexMap<QualifiedType, Vec<Provider>>,
    forwarded: IndexMap<QualifiedType, Provider>,
    synthesized: IndexMap<QualifiedType, Provider>,
    needed: IndexMap<QualifiedType, Vec<NeedSite>>,
    needed_builders: IndexMap<QualifiedType, Vec<NeedSite>>,
    origins: IndexMap<QualifiedType, Vec<String>>,
    autobind_failures: IndexMap<QualifiedType, AutobindFailure>,
    cyclic: HashSet<QualifiedType>,
    pub(crate) pending_links: Vec<PendingLink>,
}

impl BindingRegistry {
    pub fn new(injector: impl Into<String>) -> Self {
        Self {
            injector: injector.into(),
            ..Self::default()
        }
    }

    /// Register the injector's requests, attached specifications and
    /// dependency interface.
    ///
    /// Unknown specification names are reported and skipped.
    pub fn build(
        index: &MetadataIndex<'_>,
        injector: &InjectorDecl,
        diagnostics: &Diagnostics,
    ) -> Self {
        let mut registry = Self::new(&injector.name);

        for request in &injector.requests {
            let site = NeedSite {
                source: NeedSource::Request {
                    member: request.member.clone(),
                },
                kind: RequestKind::Direct,
                location: request.location.clone(),
            };
            match &request.target {
                RequestTarget::Provide(dependency) => {
                    registry.need(
                        dependency.ty.clone(),
                        NeedSite {
                            kind: dependency.kind,
                            ..site
                        },
                    );
                }
                RequestTarget::Build(ty) => registry.need_builder(ty.clone(), site),
            }
        }

        for name in &injector.specifications {
            if registry.specifications.contains(name) {
                trace!("{}: specification {} attached twice", injector.name, name);
                continue;
            }
            match index.specification(name) {
                Some(spec) => registry.register_specification(spec),
                None => diagnostics.report(
                    DiagnosticCode::MissingSpecification,
                    name,
                    format!(
                        "injector {} attaches specification {name}, which is not declared",
                        injector.name
                    ),
                    &injector.location,
                ),
            }
        }

        if let Some(dependency) = &injector.dependency {
            registry.register_dependency(dependency);
        }

        debug!(
            "registry[{}]: specifications={}, provided={}, builders={}, forwarded={}, needed={}, pending_links={}",
            registry.injector,
            registry.specifications.len(),
            registry.provided.len(),
            registry.builders.len(),
            registry.forwarded.len(),
            registry.needed.len(),
            registry.pending_links.len()
        );

        registry
    }

    fn register_specification(&mut self, spec: &Specification) {
        self.specifications.insert(spec.name.clone());

        for factory in &spec.factories {
            let owner = NeedSource::Binding {
                owner: spec.name.clone(),
                member: factory.member.clone(),
            };
            for dependency in factory.dependencies() {
                self.need(
                    dependency.ty.clone(),
                    NeedSite {
                        source: owner.clone(),
                        kind: dependency.kind,
                        location: factory.location.clone(),
                    },
                );
            }
            self.provide(Provider::new(
                Origin::Specification {
                    name: spec.name.clone(),
                },
                Arc::new(Binding::Factory(factory.clone())),
                spec.mode,
            ));
        }

        for builder in &spec.builders {
            for dependency in &builder.parameters {
                self.need(
                    dependency.ty.clone(),
                    NeedSite {
                        source: NeedSource::Binding {
                            owner: spec.name.clone(),
                            member: builder.member.clone(),
                        },
                        kind: dependency.kind,
                        location: builder.location.clone(),
                    },
                );
            }
            self.provide_builder(Provider::new(
                Origin::Specification {
                    name: spec.name.clone(),
                },
                Arc::new(Binding::Builder(builder.clone())),
                spec.mode,
            ));
        }

        for link in &spec.links {
            self.pending_links.push(PendingLink {
                link: link.clone(),
                declared_in: spec.name.clone(),
            });
        }
    }

    pub(crate) fn register_dependency(&mut self, dependency: &DependencyRef) {
        for exposed in &dependency.exposes {
            let factory = Factory {
                member: accessor_name(&exposed.ty),
                provides: exposed.clone(),
                mode: FabricationMode::Recurrent,
                parameters: Vec::new(),
                properties: Vec::new(),
                partial: false,
                location: dependency.location.clone(),
            };
            let provider = Provider::new(
                Origin::Dependency {
                    interface: dependency.interface.clone(),
                },
                Arc::new(Binding::Factory(factory)),
                SpecificationMode::Dependency,
            );
            self.forwarded.entry(exposed.clone()).or_insert(provider);
        }
    }

    /// Record that `ty` is needed; returns true the first time
    pub(crate) fn need(&mut self, ty: QualifiedType, site: NeedSite) -> bool {
        let fresh = !self.needed.contains_key(&ty);
        self.needed.entry(ty).or_default().push(site);
        fresh
    }

    pub(crate) fn need_builder(&mut self, ty: QualifiedType, site: NeedSite) {
        self.needed_builders.entry(ty).or_default().push(site);
    }

    pub(crate) fn provide(&mut self, provider: Provider) {
        let ty = provider.binding.target().clone();
        self.provide_as(ty, provider);
    }

    pub(crate) fn provide_builder(&mut self, provider: Provider) {
        let ty = provider.binding.target().clone();
        self.builders.entry(ty).or_default().push(provider);
    }

    fn provide_as(&mut self, ty: QualifiedType, provider: Provider) {
        if let Some(spec) = provider.origin.providing_specification() {
            let names = self.origins.entry(ty.clone()).or_default();
            if !names.iter().any(|n| n == spec) {
                names.push(spec.to_string());
            }
        }
        self.provided.entry(ty).or_default().push(provider);
    }

    /// Register `link.output` with every provider currently satisfying `link.input`.
    ///
    /// Returns false when the input has no provider yet.
    pub(crate) fn expand_link(&mut self, link: &Link, declared_in: &str) -> bool {
        let sources: Vec<Provider> = match self.resolve(&link.input) {
            Resolution::Cyclic | Resolution::Missing => return false,
            resolution => resolution.providers().to_vec(),
        };
        for source in sources {
            let provider = source.linked(link, declared_in);
            trace!(
                "registry[{}]: link {} -> {} from {}",
                self.injector,
                link.input,
                link.output,
                provider.origin
            );
            self.provide_as(link.output.clone(), provider);
        }
        true
    }

    pub(crate) fn synthesize(&mut self, ty: QualifiedType, factory: Factory) -> &Provider {
        let provider = Provider::new(
            Origin::Synthesized,
            Arc::new(Binding::Factory(factory)),
            SpecificationMode::Static,
        );
        self.synthesized.entry(ty).or_insert(provider)
    }

    pub(crate) fn record_autobind_failure(&mut self, ty: QualifiedType, failure: AutobindFailure) {
        self.autobind_failures.entry(ty).or_insert(failure);
    }

    pub(crate) fn mark_cyclic(&mut self, ty: QualifiedType) {
        self.cyclic.insert(ty);
    }

    /// Resolve a qualified type against the registry.
    ///
    /// Local providers win over the parent's dependency interface, which wins
    /// over synthesized bindings.
    pub fn resolve(&self, ty: &QualifiedType) -> Resolution<'_> {
        if self.cyclic.contains(ty) {
            return Resolution::Cyclic;
        }
        if let Some(providers) = self.provided.get(ty).filter(|ps| !ps.is_empty()) {
            return if providers.iter().all(Provider::is_partial) {
                Resolution::Collection(providers)
            } else if providers.len() == 1 {
                Resolution::Provided(&providers[0])
            } else {
                Resolution::Ambiguous(providers)
            };
        }
        if let Some(provider) = self.forwarded.get(ty) {
            return Resolution::Forwarded(provider);
        }
        if let Some(provider) = self.synthesized.get(ty) {
            return Resolution::Synthesized(provider);
        }
        Resolution::Missing
    }

    /// Builder registered for a caller-supplied type
    pub fn builder(&self, ty: &QualifiedType) -> &[Provider] {
        self.builders.get(ty).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn injector(&self) -> &str {
        &self.injector
    }

    /// Names of the attached specifications that exist
    pub fn specifications(&self) -> &IndexSet<String> {
        &self.specifications
    }

    pub fn has_local_provider(&self, ty: &QualifiedType) -> bool {
        self.provided.get(ty).is_some_and(|ps| !ps.is_empty())
    }

    pub fn is_forwarded(&self, ty: &QualifiedType) -> bool {
        self.forwarded.contains_key(ty)
    }

    pub fn is_synthesized(&self, ty: &QualifiedType) -> bool {
        self.synthesized.contains_key(ty)
    }

    pub fn is_needed(&self, ty: &QualifiedType) -> bool {
        self.needed.contains_key(ty)
    }

    /// Explicitly provided types (specifications and links)
    pub fn provided(&self) -> impl Iterator<Item = (&QualifiedType, &[Provider])> {
        self.provided.iter().map(|(ty, ps)| (ty, ps.as_slice()))
    }

    pub fn builders(&self) -> impl Iterator<Item = (&QualifiedType, &[Provider])> {
        self.builders.iter().map(|(ty, ps)| (ty, ps.as_slice()))
    }

    pub fn forwarded(&self) -> impl Iterator<Item = (&QualifiedType, &Provider)> {
        self.forwarded.iter()
    }

    pub fn synthesized(&self) -> impl Iterator<Item = (&QualifiedType, &Provider)> {
        self.synthesized.iter()
    }

    pub fn needed(&self) -> impl Iterator<Item = (&QualifiedType, &[NeedSite])> {
        self.needed.iter().map(|(ty, sites)| (ty, sites.as_slice()))
    }

    pub fn needed_builders(&self) -> impl Iterator<Item = (&QualifiedType, &[NeedSite])> {
        self.needed_builders
            .iter()
            .map(|(ty, sites)| (ty, sites.as_slice()))
    }

    /// Reverse index: specifications providing `ty`
    pub fn origins_of(&self, ty: &QualifiedType) -> &[String] {
        self.origins.get(ty).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn autobind_failure(&self, ty: &QualifiedType) -> Option<&AutobindFailure> {
        self.autobind_failures.get(ty)
    }

    pub fn is_cyclic(&self, ty: &QualifiedType) -> bool {
        self.cyclic.contains(ty)
    }

    /// Every provider in the registry, in registration order
    pub fn all_providers(&self) -> impl Iterator<Item = &Provider> {
        self.provided
            .values()
            .flatten()
            .chain(self.builders.values().flatten())
            .chain(self.forwarded.values())
            .chain(self.synthesized.values())
    }

    pub(crate) fn pending_link_for(&self, output: &QualifiedType) -> Option<&PendingLink> {
        self.pending_links.iter().find(|p| &p.link.output == output)
    }
}

/// Accessor member name on a dependency interface (`app::AuthToken` -> `authToken`)
fn accessor_name(ty: &TypeIdentity) -> String {
    let name = ty.simple_name();
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}
