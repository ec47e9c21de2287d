//! Shared fixtures for resolver integration tests

#![allow(dead_code)]

use bindweave_core::{
    ChildFactoryDecl, Constructor, Dependency, DependencyRef, Diagnostic, DiagnosticCode,
    FabricationMode, Factory, FactoryBuilder, InjectorDecl, InjectorDeclBuilder, Link,
    MetadataGraph, QualifiedType, Request, SourceToken, Specification, SpecificationBuilder,
    SpecificationMode, TypeDecl, TypeIdentity,
};
use std::sync::Once;

static INIT_LOGGING: Once = Once::new();

/// Initialize test logging based on environment variables
///
/// Checks `BINDWEAVE_TEST_LOG`, then `RUST_LOG`, defaulting to "error".
/// Safe to call from every test.
pub fn init_test_logging() {
    INIT_LOGGING.call_once(|| {
        let log_level = std::env::var("BINDWEAVE_TEST_LOG")
            .or_else(|_| std::env::var("RUST_LOG"))
            .unwrap_or_else(|_| "error".to_string());

        tracing_subscriber::fmt()
            .with_env_filter(log_level)
            .with_test_writer()
            .try_init()
            .ok(); // Ignore error if already initialized
    });
}

pub fn qt(s: &str) -> QualifiedType {
    QualifiedType::parse(s).unwrap()
}

pub fn ty(s: &str) -> TypeIdentity {
    TypeIdentity::parse(s).unwrap()
}

/// A factory whose parameters are all direct requests
pub fn factory(member: &str, provides: &str, params: &[&str]) -> Factory {
    factory_with(
        member,
        provides,
        params.iter().map(|p| Dependency::direct(qt(p))).collect(),
    )
}

pub fn factory_with(member: &str, provides: &str, params: Vec<Dependency>) -> Factory {
    FactoryBuilder::default()
        .member(member)
        .provides(qt(provides))
        .parameters(params)
        .location(SourceToken::new(format!("{member}@{provides}")))
        .build()
        .unwrap()
}

pub fn scoped(mut factory: Factory, mode: FabricationMode) -> Factory {
    factory.mode = mode;
    factory
}

pub fn partial(mut factory: Factory) -> Factory {
    factory.partial = true;
    factory
}

pub fn spec(name: &str, factories: Vec<Factory>) -> Specification {
    SpecificationBuilder::default()
        .name(name)
        .factories(factories)
        .location(SourceToken::new(name))
        .build()
        .unwrap()
}

pub fn spec_with_links(name: &str, factories: Vec<Factory>, links: &[(&str, &str)]) -> Specification {
    let mut spec = spec(name, factories);
    spec.links = links
        .iter()
        .map(|(input, output)| Link {
            input: qt(input),
            output: qt(output),
            location: SourceToken::new(format!("{name}:{input}->{output}")),
        })
        .collect();
    spec
}

/// An instantiated specification whose instance the caller supplies
pub fn instantiated(name: &str, factories: Vec<Factory>) -> Specification {
    let mut spec = spec(name, factories);
    spec.mode = SpecificationMode::Instantiated;
    spec
}

/// An injector with `(member, type)` provide requests
pub fn injector(name: &str, requests: &[(&str, &str)], specs: &[&str]) -> InjectorDecl {
    InjectorDeclBuilder::default()
        .name(name)
        .requests(
            requests
                .iter()
                .map(|(member, provides)| Request::provide(*member, qt(provides)))
                .collect::<Vec<_>>(),
        )
        .specifications(specs.iter().map(|s| s.to_string()).collect::<Vec<_>>())
        .location(SourceToken::new(name))
        .build()
        .unwrap()
}

pub fn with_dependency(mut decl: InjectorDecl, interface: &str, exposes: &[&str]) -> InjectorDecl {
    decl.dependency = Some(DependencyRef {
        interface: ty(interface),
        exposes: exposes.iter().map(|t| qt(t)).collect(),
        location: SourceToken::new(format!("{}:{interface}", decl.name)),
    });
    decl
}

pub fn with_child(mut decl: InjectorDecl, member: &str, child: &str, params: &[&str]) -> InjectorDecl {
    decl.children.push(ChildFactoryDecl {
        member: member.to_string(),
        child: child.to_string(),
        parameters: params.iter().map(|p| qt(p)).collect(),
        location: SourceToken::new(format!("{}.{member}", decl.name)),
    });
    decl
}

/// Builder for metadata graphs
#[derive(Default)]
pub struct GraphBuilder {
    graph: MetadataGraph,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn specification(mut self, spec: Specification) -> Self {
        self.graph.specifications.push(spec);
        self
    }

    pub fn injector(mut self, decl: InjectorDecl) -> Self {
        self.graph.injectors.push(decl);
        self
    }

    /// Declare a type with one constructor per parameter list
    pub fn constructible(self, name: &str, constructors: &[&[&str]]) -> Self {
        self.constructible_with(
            name,
            constructors
                .iter()
                .map(|params| params.iter().map(|p| Dependency::direct(qt(p))).collect())
                .collect(),
        )
    }

    pub fn constructible_with(mut self, name: &str, constructors: Vec<Vec<Dependency>>) -> Self {
        self.graph.types.push(TypeDecl {
            ty: ty(name),
            constructors: constructors
                .into_iter()
                .map(|parameters| Constructor {
                    parameters,
                    eligible: true,
                    location: SourceToken::new(format!("{name}.<init>")),
                })
                .collect(),
            required_properties: Vec::new(),
            mode: None,
            location: SourceToken::new(name),
        });
        self
    }

    pub fn build(self) -> MetadataGraph {
        self.graph
    }
}

pub fn codes(diagnostics: &[Diagnostic]) -> Vec<DiagnosticCode> {
    diagnostics.iter().map(|d| d.code).collect()
}
