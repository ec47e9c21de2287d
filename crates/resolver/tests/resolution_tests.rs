//! Integration tests for per-injector resolution and the global merge
//!
//! Run with: cargo test -p bindweave-resolver --test resolution_tests
//! Verbose: BINDWEAVE_TEST_LOG=trace cargo test -p bindweave-resolver --test resolution_tests

mod common;

use anyhow::Result;
use bindweave_core::{
    Dependency, DiagnosticCode, Error, FabricationMode, FailureClass, Settings, Severity,
    SpecificationMode,
};
use bindweave_resolver::{Origin, Resolution, Resolver};
use common::*;
use pretty_assertions::assert_eq;
use std::sync::Arc;

fn s1_s2_graph() -> bindweave_core::MetadataGraph {
    GraphBuilder::new()
        .specification(spec("S1", vec![factory("logger", "Logger", &[])]))
        .specification(spec("S2", vec![factory("service", "Service", &["Logger"])]))
        .injector(injector("App", &[("service", "Service")], &["S1", "S2"]))
        .build()
}

#[test]
fn test_end_to_end_chain_without_diagnostics() -> Result<()> {
    init_test_logging();
    let graph = s1_s2_graph();
    let settings = Settings::default();

    let report = Resolver::new(&graph, &settings).resolve_all().into_result()?;

    assert_eq!(report.all_diagnostics().count(), 0);
    let app = report.injector("App").unwrap();
    assert_eq!(
        app.chain("service").unwrap().to_string(),
        "[S1.logger() → S2.service(#0)]"
    );
    Ok(())
}

#[test]
fn test_resolving_twice_yields_identical_decision() -> Result<()> {
    let graph = GraphBuilder::new()
        .specification(spec("S1", vec![factory("logger", "Logger", &[])]))
        .injector(injector("App", &[("service", "Service")], &["S1"]))
        .constructible("Service", &[&["Logger"]])
        .build();
    let settings = Settings::default();
    let resolver = Resolver::new(&graph, &settings);

    let app = resolver.resolve_injector("App")?;
    for ty in ["Logger", "Service"] {
        let first = app.registry.resolve(&qt(ty)).providers();
        let second = app.registry.resolve(&qt(ty)).providers();
        assert_eq!(first.len(), 1);
        assert!(Arc::ptr_eq(&first[0].binding, &second[0].binding));
    }

    // A fresh pass makes the same decisions with the same ids
    let again = resolver.resolve_injector("App")?;
    assert_eq!(app.chains, again.chains);
    assert_eq!(
        app.schedules.keys().collect::<Vec<_>>(),
        again.schedules.keys().collect::<Vec<_>>()
    );
    Ok(())
}

#[test]
fn test_link_reports_input_origin() -> Result<()> {
    let graph = GraphBuilder::new()
        .specification(spec("S", vec![factory("fileLogger", "FileLogger", &[])]))
        .specification(spec_with_links("Aliases", vec![], &[("FileLogger", "Logger")]))
        .injector(injector("App", &[("logger", "Logger")], &["Aliases", "S"]))
        .build();
    let settings = Settings::default();

    let app = Resolver::new(&graph, &settings).resolve_injector("App")?;

    assert!(app.diagnostics.is_empty());
    let Resolution::Provided(provider) = app.registry.resolve(&qt("Logger")) else {
        panic!("Logger should resolve through the link");
    };
    assert_eq!(provider.origin.providing_specification(), Some("S"));
    assert!(matches!(provider.origin, Origin::Link { ref declared_in, .. } if declared_in == "Aliases"));
    assert_eq!(app.registry.origins_of(&qt("Logger")), &["S".to_string()]);
    assert_eq!(app.chain("logger").unwrap().to_string(), "[S.fileLogger()]");
    Ok(())
}

#[test]
fn test_link_to_constructor_bound_input() -> Result<()> {
    let graph = GraphBuilder::new()
        .specification(spec_with_links("Aliases", vec![], &[("app::FileLogger", "app::Logger")]))
        .injector(injector("App", &[("logger", "app::Logger")], &["Aliases"]))
        .constructible("app::FileLogger", &[&[]])
        .build();
    let settings = Settings::default();

    let app = Resolver::new(&graph, &settings).resolve_injector("App")?;

    assert!(app.diagnostics.is_empty(), "{:?}", app.diagnostics);
    assert_eq!(
        app.chain("logger").unwrap().to_string(),
        "[new app::FileLogger()]"
    );
    Ok(())
}

#[test]
fn test_unresolved_link_is_incomplete() {
    let graph = GraphBuilder::new()
        .specification(spec_with_links("Aliases", vec![], &[("Ghost", "Logger")]))
        .injector(injector("App", &[("logger", "Logger")], &["Aliases"]))
        .build();
    let settings = Settings::default();

    let app = Resolver::new(&graph, &settings)
        .resolve_injector("App")
        .unwrap();

    // The link output is reported once, through the link
    assert_eq!(codes(&app.diagnostics), vec![DiagnosticCode::UnresolvedLink]);
    assert_eq!(app.diagnostics[0].class(), FailureClass::Incomplete);
    assert!(app.chains.is_empty());
}

#[test]
fn test_zero_or_many_constructors_are_incomplete() {
    let graph = GraphBuilder::new()
        .injector(injector(
            "App",
            &[("empty", "Empty"), ("overloaded", "Overloaded")],
            &[],
        ))
        .constructible("Empty", &[])
        .constructible("Overloaded", &[&[], &["Empty"]])
        .build();
    let settings = Settings::default();

    let app = Resolver::new(&graph, &settings)
        .resolve_injector("App")
        .unwrap();

    assert!(!app.registry.is_synthesized(&qt("Empty")));
    assert!(!app.registry.is_synthesized(&qt("Overloaded")));
    assert_eq!(
        codes(&app.diagnostics),
        vec![DiagnosticCode::MissingBinding, DiagnosticCode::MissingBinding]
    );
    assert!(app.diagnostics[0].message.contains("no eligible constructor"));
    assert!(app.diagnostics[1].message.contains("2 eligible constructors"));

    match app.into_result() {
        Err(Error::Aggregate(errors)) => {
            assert_eq!(errors.len(), 2);
            assert!(errors.iter().all(|e| matches!(e, Error::Incomplete { .. })));
        }
        other => panic!("expected aggregate failure, got {other:?}"),
    }
}

#[test]
fn test_duplicate_providers_are_one_invalid_finding() {
    let graph = GraphBuilder::new()
        .specification(spec("S1", vec![factory("logger", "Logger", &[])]))
        .specification(spec("S2", vec![factory("logger", "Logger", &[])]))
        .injector(injector("App", &[("logger", "Logger")], &["S1", "S2"]))
        .build();
    let settings = Settings::default();

    let app = Resolver::new(&graph, &settings)
        .resolve_injector("App")
        .unwrap();

    assert_eq!(codes(&app.diagnostics), vec![DiagnosticCode::DuplicateBinding]);
    let finding = &app.diagnostics[0];
    assert_eq!(finding.class(), FailureClass::Invalid);
    assert!(finding.message.contains("S1"));
    assert!(finding.message.contains("S2"));
    assert!(app.chains.is_empty());
    assert!(matches!(app.into_result(), Err(Error::Invalid { .. })));
}

#[test]
fn test_partial_providers_form_a_collection() -> Result<()> {
    let graph = GraphBuilder::new()
        .specification(spec("S1", vec![partial(factory("audit", "Plugin", &[]))]))
        .specification(spec("S2", vec![partial(factory("metrics", "Plugin", &[]))]))
        .injector(injector("App", &[("plugins", "Plugin")], &["S1", "S2"]))
        .build();
    let settings = Settings::default();

    let app = Resolver::new(&graph, &settings)
        .resolve_injector("App")?
        .into_result()?;

    assert_eq!(
        app.chain("plugins").unwrap().to_string(),
        "[S1.audit() → S2.metrics() → collect(#0, #1)]"
    );
    Ok(())
}

#[test]
fn test_constructor_cycle_is_invalid() {
    let graph = GraphBuilder::new()
        .injector(injector("App", &[("a", "A")], &[]))
        .constructible("A", &[&["B"]])
        .constructible("B", &[&["A"]])
        .build();
    let settings = Settings::default();

    let app = Resolver::new(&graph, &settings)
        .resolve_injector("App")
        .unwrap();

    assert_eq!(codes(&app.diagnostics), vec![DiagnosticCode::DependencyCycle]);
    assert_eq!(app.cycles.len(), 1);
    assert_eq!(app.cycles[0].to_string(), "A -> B -> A");
    assert!(app.chain("a").is_none());
}

#[test]
fn test_overlapping_cycles_are_one_finding() {
    let graph = GraphBuilder::new()
        .injector(injector("App", &[("x", "X"), ("c", "C")], &[]))
        .constructible("X", &[&["A", "C"]])
        .constructible("A", &[&["B"]])
        .constructible("B", &[&["X"]])
        .constructible("C", &[&["A"]])
        .build();
    let settings = Settings::default();

    let app = Resolver::new(&graph, &settings)
        .resolve_injector("App")
        .unwrap();

    assert_eq!(codes(&app.diagnostics), vec![DiagnosticCode::DependencyCycle]);
    assert_eq!(app.cycles.len(), 1);
    assert_eq!(app.cycles[0].to_string(), "among {A, B, C, X}");
    for ty in ["A", "B", "C", "X"] {
        assert!(app.registry.is_cyclic(&qt(ty)), "{ty}");
    }
    assert!(app.chains.is_empty());
}

#[test]
fn test_lazy_edge_breaks_constructor_cycle() -> Result<()> {
    let graph = GraphBuilder::new()
        .injector(injector("App", &[("a", "A")], &[]))
        .constructible("A", &[&["B"]])
        .constructible_with("B", vec![vec![Dependency::lazy(qt("A"))]])
        .build();
    let settings = Settings::default();

    let app = Resolver::new(&graph, &settings)
        .resolve_injector("App")?
        .into_result()?;

    let chain = app.chain("a").unwrap();
    assert_eq!(chain.to_string(), "[new B(lazy<A>) → new A(#0)]");
    assert_eq!(chain.deferred, vec![qt("A")]);
    Ok(())
}

#[test]
fn test_autobinding_disabled_reports_reason() {
    let graph = GraphBuilder::new()
        .injector(injector("App", &[("service", "Service")], &[]))
        .constructible("Service", &[&[]])
        .build();
    let mut settings = Settings::default();
    settings.resolver.constructor_autobinding = false;

    let app = Resolver::new(&graph, &settings)
        .resolve_injector("App")
        .unwrap();

    assert_eq!(codes(&app.diagnostics), vec![DiagnosticCode::MissingBinding]);
    assert!(app.diagnostics[0].message.contains("auto-binding is disabled"));
}

#[test]
fn test_missing_specification_continues_resolution() {
    let mut graph = s1_s2_graph();
    graph.injectors[0].specifications.push("Ghost".to_string());
    let settings = Settings::default();

    let app = Resolver::new(&graph, &settings)
        .resolve_injector("App")
        .unwrap();

    assert_eq!(
        codes(&app.diagnostics),
        vec![DiagnosticCode::MissingSpecification]
    );
    assert!(app.chain("service").is_some());
}

#[test]
fn test_schedules_follow_declared_modes() -> Result<()> {
    let graph = GraphBuilder::new()
        .specification(instantiated(
            "Pools",
            vec![scoped(
                factory("pool", "Pool", &[]),
                FabricationMode::ContainerScoped,
            )],
        ))
        .injector(injector(
            "App",
            &[("pool", "Pool"), ("clock", "Clock")],
            &["Pools"],
        ))
        .constructible("Clock", &[&[]])
        .build();
    let mut settings = Settings::default();
    settings.resolver.default_autobind_mode = FabricationMode::Scoped;

    let app = Resolver::new(&graph, &settings).resolve_injector("App")?;

    let pool = app.schedule_of(&qt("Pool")).unwrap();
    assert_eq!(pool.fabrication, FabricationMode::ContainerScoped);
    assert_eq!(pool.instantiation, SpecificationMode::Instantiated);
    let clock = app.schedule_of(&qt("Clock")).unwrap();
    assert_eq!(clock.fabrication, FabricationMode::Scoped);
    assert_eq!(clock.instantiation, SpecificationMode::Static);
    Ok(())
}

#[test]
fn test_captive_dependency_promoted_by_warnings_as_errors() {
    let graph = GraphBuilder::new()
        .specification(spec(
            "S",
            vec![
                scoped(factory("session", "Session", &[]), FabricationMode::Scoped),
                scoped(
                    factory("pool", "Pool", &["Session"]),
                    FabricationMode::ContainerScoped,
                ),
            ],
        ))
        .injector(injector("App", &[("pool", "Pool")], &["S"]))
        .build();

    let lenient = Settings::default();
    let app = Resolver::new(&graph, &lenient)
        .resolve_injector("App")
        .unwrap();
    assert_eq!(codes(&app.diagnostics), vec![DiagnosticCode::CaptiveDependency]);
    assert_eq!(app.diagnostics[0].severity, Severity::Warning);
    assert!(app.into_result().is_ok());

    let mut strict = Settings::default();
    strict.diagnostics.warnings_as_errors = true;
    let app = Resolver::new(&graph, &strict)
        .resolve_injector("App")
        .unwrap();
    assert_eq!(app.diagnostics[0].severity, Severity::Error);
    assert!(app.into_result().is_err());
}

#[test]
fn test_cross_injector_shadowing_warns() -> Result<()> {
    let graph = GraphBuilder::new()
        .specification(spec("LoggingSpec", vec![factory("logger", "Logger", &[])]))
        .injector(injector("First", &[("logger", "Logger")], &["LoggingSpec"]))
        .injector(injector("Second", &[("logger", "Logger")], &[]))
        .constructible("Logger", &[&[]])
        .build();
    let mut settings = Settings::default();
    // Advisories stay warnings even in strict mode
    settings.diagnostics.warnings_as_errors = true;

    let report = Resolver::new(&graph, &settings).resolve_all().into_result()?;

    assert!(report.injector("First").unwrap().diagnostics.is_empty());
    let second = report.injector("Second").unwrap();
    assert_eq!(
        codes(&second.diagnostics),
        vec![DiagnosticCode::ShadowedAutobinding]
    );
    assert_eq!(second.diagnostics[0].severity, Severity::Warning);
    assert!(second.diagnostics[0].message.contains("LoggingSpec"));
    assert_eq!(second.diagnostics[0].unit, "merging injector Second");
    assert_eq!(
        second.chain("logger").unwrap().to_string(),
        "[new Logger()]"
    );
    Ok(())
}

#[test]
fn test_missing_type_hint_and_hint_toggle() {
    let graph = GraphBuilder::new()
        .specification(spec("ClockSpec", vec![factory("clock", "Clock", &[])]))
        .injector(injector("First", &[("clock", "Clock")], &["ClockSpec"]))
        .injector(injector("Second", &[("clock", "Clock")], &[]))
        .build();

    let settings = Settings::default();
    let report = Resolver::new(&graph, &settings).resolve_all();
    let second = report.injector("Second").unwrap();
    assert_eq!(
        codes(&second.diagnostics),
        vec![
            DiagnosticCode::MissingBinding,
            DiagnosticCode::CandidateElsewhere
        ]
    );
    assert_eq!(second.diagnostics[1].severity, Severity::Info);
    assert!(report.has_fatal());

    let mut quiet = Settings::default();
    quiet.resolver.cross_injector_hints = false;
    let report = Resolver::new(&graph, &quiet).resolve_all();
    assert_eq!(
        codes(&report.injector("Second").unwrap().diagnostics),
        vec![DiagnosticCode::MissingBinding]
    );
}

#[test]
fn test_duplicate_declarations_and_unknown_injector() {
    let graph = GraphBuilder::new()
        .specification(spec("S1", vec![factory("logger", "Logger", &[])]))
        .specification(spec("S1", vec![]))
        .injector(injector("App", &[("logger", "Logger")], &["S1"]))
        .injector(injector("App", &[], &[]))
        .build();
    let settings = Settings::default();
    let resolver = Resolver::new(&graph, &settings);

    let report = resolver.resolve_all();
    assert_eq!(
        codes(&report.diagnostics),
        vec![
            DiagnosticCode::DuplicateDeclaration,
            DiagnosticCode::DuplicateDeclaration
        ]
    );
    // The first declaration wins
    assert_eq!(report.injectors.len(), 1);
    assert!(report.injector("App").unwrap().chain("logger").is_some());

    assert!(matches!(
        resolver.resolve_injector("Nowhere"),
        Err(Error::InvalidInput(_))
    ));
}

#[test]
fn test_duplicate_type_declaration_keeps_the_first() {
    let graph = GraphBuilder::new()
        .injector(injector("App", &[("clock", "Clock")], &[]))
        .constructible("Clock", &[&[]])
        .constructible("Clock", &[&["Missing"]])
        .build();
    let settings = Settings::default();

    let report = Resolver::new(&graph, &settings).resolve_all();

    assert_eq!(
        codes(&report.diagnostics),
        vec![DiagnosticCode::DuplicateDeclaration]
    );
    assert_eq!(report.diagnostics[0].subject, "Clock");
    let app = report.injector("App").unwrap();
    assert!(app.diagnostics.is_empty());
    assert_eq!(app.chain("clock").unwrap().steps.len(), 1);
}
