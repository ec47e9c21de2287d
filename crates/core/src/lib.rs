//! Core types for the bindweave dependency-injection resolver
//!
//! This crate provides the model shared by every resolution stage:
//!
//! - **Type identity**: structural type names, qualifiers and qualified lookup keys
//! - **Entities**: factories, builders, links, specifications, injectors and
//!   constructor metadata
//! - **Metadata**: the closed input graph of a compilation pass
//! - **Diagnostics**: stable finding codes and the per-unit aggregator
//! - **Configuration**: process-wide settings
//! - **Error handling**: unified error types
//!

pub mod binding_id;
pub mod config;
pub mod diagnostics;
pub mod entities;
pub mod error;
pub mod metadata;
pub mod qualified_type;

// Re-export main types for convenience
pub use binding_id::{generate_binding_id, BindingId};
pub use config::{DiagnosticsConfig, NamingConfig, ResolverConfig, Settings};
pub use diagnostics::{Diagnostic, DiagnosticCode, Diagnostics, FailureClass, Severity};
pub use entities::{
    Binding, BuilderBinding, ChildFactoryDecl, Constructor, Dependency, DependencyRef,
    FabricationMode, Factory, FactoryBuilder, InjectorDecl, InjectorDeclBuilder, Link, Request,
    RequestKind, RequestTarget, SourceToken, Specification, SpecificationBuilder,
    SpecificationMode, TypeDecl,
};
pub use error::{Error, Result, ResultExt};
pub use metadata::{MetadataGraph, MetadataIndex};
pub use qualified_type::{QualifiedType, Qualifier, TypeIdentity};

/// Version of the core library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::Settings;
    pub use crate::diagnostics::{Diagnostic, DiagnosticCode, Diagnostics};
    pub use crate::error::{Result, ResultExt};
    pub use crate::qualified_type::{QualifiedType, Qualifier, TypeIdentity};
}
