//! Binding resolution for bindweave injectors
//!
//! Given the metadata graph of a compilation pass, the resolver decides for
//! every injector request which binding satisfies it:
//!
//! - **Registry**: per-injector index of explicit factories and builders
//! - **Links**: aliases satisfying one type with another type's binding
//! - **Auto-binding**: constructor bindings synthesized for unbound types
//! - **Cycles and gaps**: construction cycles, missing and ambiguous bindings
//! - **Fabrication**: caching policy of every binding and its runtime model
//! - **Merge**: cross-injector advisories
//! - **Hierarchy**: validation of child injector factories
//! - **Plans**: ordered invocation chains handed to emission

#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

pub mod autobind;
pub mod cycles;
pub mod fabrication;
pub mod frame;
pub mod gaps;
pub mod hierarchy;
pub mod links;
pub mod merge;
pub mod plan;
pub mod registry;
pub mod resolver;

// Re-export for ease of use
pub use cycles::Cycle;
pub use fabrication::Schedule;
pub use frame::{Frame, Instance};
pub use hierarchy::{ChildArgument, ChildComposition, Supplied};
pub use merge::GlobalIndex;
pub use plan::{Argument, Callee, InvocationChain, InvocationStep};
pub use registry::{BindingRegistry, NeedSite, NeedSource, Origin, Provider, Resolution};
pub use resolver::{InjectorResolution, ResolutionReport, Resolver};
