//! Resolution driver
//!
//! Runs every stage for one injector, or for the whole metadata graph with
//! per-injector passes in parallel followed by the global merge and the
//! composition of child injectors.

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

use bindweave_core::{
    BindingId, Diagnostic, DiagnosticCode, Diagnostics, Error, InjectorDecl, MetadataGraph,
    MetadataIndex, QualifiedType, Result, Settings,
};
use indexmap::IndexMap;
use rayon::prelude::*;
use tracing::debug;

use crate::cycles::{self, Cycle};
use crate::fabrication::{self, Schedule};
use crate::hierarchy::{self, ChildComposition};
use crate::merge::{self, GlobalIndex};
use crate::plan::{self, InvocationChain};
use crate::registry::BindingRegistry;
use crate::{autobind, gaps, links};

/// Everything resolved for one injector
#[derive(Debug, Clone)]
pub struct InjectorResolution {
    pub injector: String,
    pub registry: BindingRegistry,
    /// One chain per request that could be planned, in request order
    pub chains: Vec<InvocationChain>,
    pub schedules: IndexMap<BindingId, Schedule>,
    pub cycles: Vec<Cycle>,
    pub children: Vec<ChildComposition>,
    pub diagnostics: Vec<Diagnostic>,
}

impl InjectorResolution {
    /// The chain planned for a request member
    pub fn chain(&self, member: &str) -> Option<&InvocationChain> {
        self.chains.iter().find(|chain| chain.request == member)
    }

    /// Schedule of the binding `ty` resolves to, if it resolves to exactly one
    pub fn schedule_of(&self, ty: &QualifiedType) -> Option<Schedule> {
        match self.registry.resolve(ty).providers() {
            [provider] => self.schedules.get(&provider.id).copied(),
            _ => None,
        }
    }

    pub fn has_fatal(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity.is_fatal_class())
    }

    /// Keep the resolution unless a fatal-class finding was recorded
    pub fn into_result(self) -> Result<Self> {
        let errors: Vec<Error> = self
            .diagnostics
            .iter()
            .filter_map(Diagnostic::to_error)
            .collect();
        if errors.is_empty() {
            Ok(self)
        } else {
            Err(Error::aggregate(errors))
        }
    }
}

/// Results of resolving a whole metadata graph
#[derive(Debug, Clone, Default)]
pub struct ResolutionReport {
    pub injectors: IndexMap<String, InjectorResolution>,
    /// Findings not attributable to a single injector
    pub diagnostics: Vec<Diagnostic>,
}

impl ResolutionReport {
    pub fn injector(&self, name: &str) -> Option<&InjectorResolution> {
        self.injectors.get(name)
    }

    /// Graph findings followed by each injector's findings
    pub fn all_diagnostics(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .chain(self.injectors.values().flat_map(|r| r.diagnostics.iter()))
    }

    pub fn has_fatal(&self) -> bool {
        self.all_diagnostics().any(|d| d.severity.is_fatal_class())
    }

    /// Keep the report unless a fatal-class finding was recorded anywhere
    pub fn into_result(self) -> Result<Self> {
        let errors: Vec<Error> = self
            .all_diagnostics()
            .filter_map(Diagnostic::to_error)
            .collect();
        if errors.is_empty() {
            Ok(self)
        } else {
            Err(Error::aggregate(errors))
        }
    }
}

/// Resolves injectors of one metadata graph
pub struct Resolver<'a> {
    index: MetadataIndex<'a>,
    settings: &'a Settings,
}

impl<'a> Resolver<'a> {
    pub fn new(graph: &'a MetadataGraph, settings: &'a Settings) -> Self {
        Self {
            index: graph.index(),
            settings,
        }
    }

    /// Resolve a single injector and its child factories.
    ///
    /// Cross-injector advisories need the whole graph and are only produced
    /// by [`Resolver::resolve_all`].
    ///
    /// # Errors
    ///
    /// Returns an error if no injector has the given name. Resolution
    /// problems are reported as diagnostics on the result.
    pub fn resolve_injector(&self, name: &str) -> Result<InjectorResolution> {
        let decl = self
            .index
            .injector(name)
            .ok_or_else(|| Error::invalid_input(format!("Unknown injector: {name}")))?;
        let mut resolution = self.resolve_decl(decl);
        self.compose_children(&mut resolution, decl);
        Ok(resolution)
    }

    /// Resolve every injector of the graph
    pub fn resolve_all(&self) -> ResolutionReport {
        let graph_diagnostics =
            Diagnostics::with_config("resolving metadata graph", &self.settings.diagnostics);
        self.report_duplicates(&graph_diagnostics);

        // Duplicate declarations keep the first one
        let decls: Vec<&InjectorDecl> = self
            .index
            .graph()
            .injectors
            .iter()
            .filter(|decl| {
                self.index
                    .injector(&decl.name)
                    .is_some_and(|first| std::ptr::eq(first, *decl))
            })
            .collect();

        let mut resolutions: Vec<InjectorResolution> = decls
            .par_iter()
            .map(|decl| self.resolve_decl(decl))
            .collect();

        if self.settings.resolver.cross_injector_hints {
            let global = GlobalIndex::from_registries(resolutions.iter().map(|r| &r.registry));
            resolutions.par_iter_mut().for_each(|resolution| {
                let diagnostics = Diagnostics::with_config(
                    format!("merging injector {}", resolution.injector),
                    &self.settings.diagnostics,
                );
                merge::advise(&global, &resolution.registry, &diagnostics);
                resolution.diagnostics.extend(diagnostics.into_vec());
            });
        }

        for (resolution, decl) in resolutions.iter_mut().zip(&decls) {
            self.compose_children(resolution, decl);
        }

        let report = ResolutionReport {
            injectors: resolutions
                .into_iter()
                .map(|resolution| (resolution.injector.clone(), resolution))
                .collect(),
            diagnostics: graph_diagnostics.into_vec(),
        };
        debug!(
            "resolver: injectors={}, diagnostics={}",
            report.injectors.len(),
            report.all_diagnostics().count()
        );
        report
    }

    fn report_duplicates(&self, diagnostics: &Diagnostics) {
        for spec in self.index.duplicate_specifications() {
            diagnostics.report(
                DiagnosticCode::DuplicateDeclaration,
                &spec.name,
                format!("specification {} is declared more than once", spec.name),
                &spec.location,
            );
        }
        for injector in self.index.duplicate_injectors() {
            diagnostics.report(
                DiagnosticCode::DuplicateDeclaration,
                &injector.name,
                format!("injector {} is declared more than once", injector.name),
                &injector.location,
            );
        }
        for decl in self.index.duplicate_types() {
            diagnostics.report(
                DiagnosticCode::DuplicateDeclaration,
                decl.ty.to_string(),
                format!("type {} is declared more than once", decl.ty),
                &decl.location,
            );
        }
    }

    fn resolve_decl(&self, decl: &InjectorDecl) -> InjectorResolution {
        let diagnostics = Diagnostics::with_config(
            format!("resolving injector {}", decl.name),
            &self.settings.diagnostics,
        );

        let mut registry = BindingRegistry::build(&self.index, decl, &diagnostics);
        links::expand(&mut registry);
        let synthesized = autobind::synthesize(&mut registry, &self.index, &self.settings.resolver);
        links::finish(&mut registry, &diagnostics);
        let cycles = cycles::detect(&mut registry, &diagnostics);
        gaps::check(&registry, &diagnostics);
        let schedules = fabrication::schedule(&registry, &diagnostics);

        let mut chains = Vec::with_capacity(decl.requests.len());
        for request in &decl.requests {
            match plan::plan_request(&registry, request) {
                Some(chain) => chains.push(chain),
                // A request can only fail to plan over a reported problem
                None if !diagnostics.has_fatal() => diagnostics.report(
                    DiagnosticCode::InternalInvariant,
                    format!("{}.{}", decl.name, request.member),
                    format!(
                        "request {} for {} could not be planned although every binding resolved",
                        request.member,
                        request.ty()
                    ),
                    &request.location,
                ),
                None => {}
            }
        }

        debug!(
            "resolver[{}]: specifications={}, needed={}, synthesized={}, cycles={}, chains={}, diagnostics={}",
            decl.name,
            registry.specifications().len(),
            registry.needed().count(),
            synthesized,
            cycles.len(),
            chains.len(),
            diagnostics.len()
        );

        InjectorResolution {
            injector: decl.name.clone(),
            registry,
            chains,
            schedules,
            cycles,
            children: Vec::new(),
            diagnostics: diagnostics.into_vec(),
        }
    }

    fn compose_children(&self, resolution: &mut InjectorResolution, decl: &InjectorDecl) {
        if decl.children.is_empty() {
            return;
        }
        let diagnostics = Diagnostics::with_config(
            format!("composing injector {}", decl.name),
            &self.settings.diagnostics,
        );
        for child in &decl.children {
            if let Some(composition) =
                hierarchy::compose(&resolution.registry, child, &self.index, &diagnostics)
            {
                resolution.children.push(composition);
            }
        }
        resolution.diagnostics.extend(diagnostics.into_vec());
    }
}
