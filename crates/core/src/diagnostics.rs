//! Diagnostics produced while resolving a unit of work
//!
//! A `Diagnostics` aggregator collects every independent finding for one
//! unit ("resolving injector X") so a single pass reports all problems.
//! It is append-only and can be shared across threads.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use strum_macros::{Display, EnumString};
use tracing::{debug, warn};

use crate::config::DiagnosticsConfig;
use crate::entities::SourceToken;
use crate::error::{Error, Result};

/// Diagnostic severity, ordered from least to most severe
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Fatal,
}

impl Severity {
    /// Fatal-class findings cause the unit's results to be discarded
    pub fn is_fatal_class(self) -> bool {
        self >= Severity::Error
    }
}

/// Failure taxonomy a diagnostic belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FailureClass {
    /// A required type is unprovided and not auto-bindable
    Incomplete,
    /// A structural rule was violated
    Invalid,
    /// An internal invariant did not hold
    Internal,
    /// Informational; never blocks generation
    Advisory,
}

/// Stable identifier of a diagnostic
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum DiagnosticCode {
    MissingSpecification,
    MissingBinding,
    MissingBuilder,
    UnresolvedLink,
    MissingChildInjector,
    DuplicateBinding,
    DuplicateBuilder,
    DuplicateDeclaration,
    DependencyCycle,
    ChildParameterMismatch,
    NotExposedByParent,
    CaptiveDependency,
    ShadowedAutobinding,
    CandidateElsewhere,
    InternalInvariant,
}

impl DiagnosticCode {
    pub fn class(self) -> FailureClass {
        use DiagnosticCode::*;
        match self {
            MissingSpecification | MissingBinding | MissingBuilder | UnresolvedLink
            | MissingChildInjector => FailureClass::Incomplete,
            DuplicateBinding | DuplicateBuilder | DuplicateDeclaration | DependencyCycle
            | ChildParameterMismatch | NotExposedByParent => FailureClass::Invalid,
            InternalInvariant => FailureClass::Internal,
            CaptiveDependency | ShadowedAutobinding | CandidateElsewhere => FailureClass::Advisory,
        }
    }

    pub fn default_severity(self) -> Severity {
        match self {
            DiagnosticCode::InternalInvariant => Severity::Fatal,
            DiagnosticCode::CandidateElsewhere => Severity::Info,
            DiagnosticCode::CaptiveDependency | DiagnosticCode::ShadowedAutobinding => {
                Severity::Warning
            }
            _ => Severity::Error,
        }
    }

    /// Cross-injector advisories are never promoted by `warnings_as_errors`
    pub fn is_cross_injector(self) -> bool {
        matches!(
            self,
            DiagnosticCode::ShadowedAutobinding | DiagnosticCode::CandidateElsewhere
        )
    }
}

/// One finding, attributable to a declaration site
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub code: DiagnosticCode,
    pub severity: Severity,
    /// The type or declaration the finding is about
    pub subject: String,
    pub message: String,
    pub location: SourceToken,
    /// The unit of work that produced the finding
    pub unit: String,
}

impl Diagnostic {
    pub fn new(
        code: DiagnosticCode,
        subject: impl Into<String>,
        message: impl Into<String>,
        location: SourceToken,
    ) -> Self {
        Self {
            code,
            severity: code.default_severity(),
            subject: subject.into(),
            message: message.into(),
            location,
            unit: String::new(),
        }
    }

    #[must_use]
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn class(&self) -> FailureClass {
        self.code.class()
    }

    /// The error this diagnostic stands for, if it is fatal-class
    pub fn to_error(&self) -> Option<Error> {
        if !self.severity.is_fatal_class() {
            return None;
        }
        Some(match self.class() {
            FailureClass::Incomplete => Error::incomplete(&self.subject, &self.message),
            FailureClass::Invalid | FailureClass::Advisory => {
                Error::invalid(&self.subject, &self.message)
            }
            FailureClass::Internal => Error::internal(format!("{}: {}", self.subject, self.message)),
        })
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[{}] {}: {} ({})",
            self.severity, self.code, self.subject, self.message, self.location
        )
    }
}

/// Append-only, thread-safe collector for one unit of work
#[derive(Debug)]
pub struct Diagnostics {
    unit: String,
    max_reported: usize,
    warnings_as_errors: bool,
    entries: Mutex<Vec<Diagnostic>>,
    suppressed: AtomicUsize,
}

impl Diagnostics {
    pub fn new(unit: impl Into<String>) -> Self {
        Self::with_config(unit, &DiagnosticsConfig::default())
    }

    pub fn with_config(unit: impl Into<String>, config: &DiagnosticsConfig) -> Self {
        Self {
            unit: unit.into(),
            max_reported: config.max_reported_per_unit,
            warnings_as_errors: config.warnings_as_errors,
            entries: Mutex::new(Vec::new()),
            suppressed: AtomicUsize::new(0),
        }
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    /// Record a finding; processing of sibling declarations continues
    pub fn record(&self, mut diagnostic: Diagnostic) {
        diagnostic.unit = self.unit.clone();
        if self.warnings_as_errors
            && diagnostic.severity == Severity::Warning
            && !diagnostic.code.is_cross_injector()
        {
            diagnostic.severity = Severity::Error;
        }

        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        // The limit only trims non-fatal findings
        if self.max_reported > 0
            && entries.len() >= self.max_reported
            && !diagnostic.severity.is_fatal_class()
        {
            self.suppressed.fetch_add(1, Ordering::Relaxed);
            return;
        }

        if diagnostic.severity.is_fatal_class() {
            warn!("{}: {}", self.unit, diagnostic);
        } else {
            debug!("{}: {}", self.unit, diagnostic);
        }
        entries.push(diagnostic);
    }

    /// Shorthand for `record(Diagnostic::new(..))`
    pub fn report(
        &self,
        code: DiagnosticCode,
        subject: impl Into<String>,
        message: impl Into<String>,
        location: &SourceToken,
    ) {
        self.record(Diagnostic::new(code, subject, message, location.clone()));
    }

    pub fn extend(&self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        for diagnostic in diagnostics {
            self.record(diagnostic);
        }
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Findings dropped because the per-unit limit was reached
    pub fn suppressed(&self) -> usize {
        self.suppressed.load(Ordering::Relaxed)
    }

    pub fn has_fatal(&self) -> bool {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|d| d.severity.is_fatal_class())
    }

    pub fn snapshot(&self) -> Vec<Diagnostic> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.entries
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Keep `value` unless a fatal-class finding was recorded
    pub fn finish<T>(self, value: T) -> Result<(T, Vec<Diagnostic>)> {
        let diagnostics = self.into_vec();
        let errors: Vec<Error> = diagnostics.iter().filter_map(Diagnostic::to_error).collect();
        if errors.is_empty() {
            Ok((value, diagnostics))
        } else {
            Err(Error::aggregate(errors))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn token() -> SourceToken {
        SourceToken::new("spec.kt:12")
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Info < Severity::Warning);
        assert!(!Severity::Warning.is_fatal_class());
        assert!(Severity::Error.is_fatal_class());
        assert!(Severity::Fatal.is_fatal_class());
    }

    #[test]
    fn test_code_identifiers_are_kebab_case() {
        assert_eq!(DiagnosticCode::MissingBinding.to_string(), "missing-binding");
        assert_eq!(
            "dependency-cycle".parse::<DiagnosticCode>().ok(),
            Some(DiagnosticCode::DependencyCycle)
        );
    }

    #[test]
    fn test_finish_keeps_results_with_warnings_only() {
        let diagnostics = Diagnostics::new("resolving injector App");
        diagnostics.report(
            DiagnosticCode::ShadowedAutobinding,
            "app::Logger",
            "synthesized",
            &token(),
        );
        let (value, findings) = diagnostics.finish(7).ok().unwrap_or_default();
        assert_eq!(value, 7);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].unit, "resolving injector App");
    }

    #[test]
    fn test_finish_discards_on_fatal_class() {
        let diagnostics = Diagnostics::new("resolving injector App");
        diagnostics.report(DiagnosticCode::MissingBinding, "app::A", "no binding", &token());
        diagnostics.report(DiagnosticCode::DuplicateBinding, "app::B", "twice", &token());
        let err = diagnostics.finish(()).err();
        assert!(matches!(err, Some(Error::Aggregate(ref errors)) if errors.len() == 2));
    }

    #[test]
    fn test_warnings_as_errors_spares_cross_injector_advisories() {
        let config = DiagnosticsConfig {
            warnings_as_errors: true,
            ..DiagnosticsConfig::default()
        };
        let diagnostics = Diagnostics::with_config("unit", &config);
        diagnostics.report(DiagnosticCode::CaptiveDependency, "app::A", "captive", &token());
        diagnostics.report(DiagnosticCode::ShadowedAutobinding, "app::B", "shadow", &token());
        let findings = diagnostics.snapshot();
        assert_eq!(findings[0].severity, Severity::Error);
        assert_eq!(findings[1].severity, Severity::Warning);
    }

    #[test]
    fn test_limit_suppresses_excess_findings() {
        let config = DiagnosticsConfig {
            max_reported_per_unit: 2,
            ..DiagnosticsConfig::default()
        };
        let diagnostics = Diagnostics::with_config("unit", &config);
        for i in 0..5 {
            diagnostics.report(DiagnosticCode::CandidateElsewhere, format!("app::T{i}"), "", &token());
        }
        assert_eq!(diagnostics.len(), 2);
        assert_eq!(diagnostics.suppressed(), 3);
    }

    #[test]
    fn test_limit_never_drops_fatal_class_findings() {
        let config = DiagnosticsConfig {
            max_reported_per_unit: 1,
            ..DiagnosticsConfig::default()
        };
        let diagnostics = Diagnostics::with_config("unit", &config);
        diagnostics.report(DiagnosticCode::CaptiveDependency, "app::Pool", "captive", &token());
        diagnostics.report(DiagnosticCode::MissingBinding, "app::Clock", "no binding", &token());
        diagnostics.report(DiagnosticCode::CaptiveDependency, "app::Cache", "captive", &token());

        assert!(diagnostics.has_fatal());
        assert_eq!(diagnostics.len(), 2);
        assert_eq!(diagnostics.suppressed(), 1);
        assert!(matches!(
            diagnostics.finish(()),
            Err(Error::Incomplete { ref subject, .. }) if subject == "app::Clock"
        ));
    }

    #[test]
    fn test_shared_across_threads() {
        let diagnostics = Arc::new(Diagnostics::new("unit"));
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let diagnostics = Arc::clone(&diagnostics);
                std::thread::spawn(move || {
                    diagnostics.report(
                        DiagnosticCode::CandidateElsewhere,
                        format!("app::T{i}"),
                        "hint",
                        &SourceToken::default(),
                    );
                })
            })
            .collect();
        for handle in handles {
            assert!(handle.join().is_ok());
        }
        assert_eq!(diagnostics.len(), 4);
    }
}
