//! The closed metadata graph handed to the resolver for one compilation pass.
//!
//! The graph is produced by an external scraper and is read-only for the
//! whole pass. `MetadataIndex` provides the name and identity lookups every
//! resolver stage needs, built once per pass.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::entities::{InjectorDecl, Specification, TypeDecl};
use crate::error::{Error, Result, ResultExt};
use crate::qualified_type::TypeIdentity;

/// Every injector, specification and constructor-bearing type of a pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataGraph {
    #[serde(default)]
    pub injectors: Vec<InjectorDecl>,
    #[serde(default)]
    pub specifications: Vec<Specification>,
    #[serde(default)]
    pub types: Vec<TypeDecl>,
}

impl MetadataGraph {
    /// Decode a metadata document
    pub fn from_json_str(content: &str) -> Result<Self> {
        serde_json::from_str(content)
            .map_err(|e| Error::metadata(format!("Failed to parse metadata JSON: {e}")))
    }

    /// Read and decode a metadata document from disk
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read metadata file {}", path.display()))?;
        Self::from_json_str(&content)
    }

    pub fn index(&self) -> MetadataIndex<'_> {
        MetadataIndex::new(self)
    }
}

/// Lookup tables over a `MetadataGraph`.
///
/// Duplicate names keep the first declaration; the duplicates are listed in
/// `duplicate_specifications`, `duplicate_injectors` and `duplicate_types` so
/// callers can report them.
#[derive(Debug)]
pub struct MetadataIndex<'a> {
    graph: &'a MetadataGraph,
    specifications: HashMap<&'a str, &'a Specification>,
    injectors: HashMap<&'a str, &'a InjectorDecl>,
    types: HashMap<&'a TypeIdentity, &'a TypeDecl>,
    duplicate_specifications: Vec<&'a Specification>,
    duplicate_injectors: Vec<&'a InjectorDecl>,
    duplicate_types: Vec<&'a TypeDecl>,
}

impl<'a> MetadataIndex<'a> {
    pub fn new(graph: &'a MetadataGraph) -> Self {
        let mut specifications = HashMap::new();
        let mut duplicate_specifications = Vec::new();
        for spec in &graph.specifications {
            if specifications.contains_key(spec.name.as_str()) {
                duplicate_specifications.push(spec);
            } else {
                specifications.insert(spec.name.as_str(), spec);
            }
        }

        let mut injectors = HashMap::new();
        let mut duplicate_injectors = Vec::new();
        for injector in &graph.injectors {
            if injectors.contains_key(injector.name.as_str()) {
                duplicate_injectors.push(injector);
            } else {
                injectors.insert(injector.name.as_str(), injector);
            }
        }

        let mut types = HashMap::new();
        let mut duplicate_types = Vec::new();
        for decl in &graph.types {
            if types.contains_key(&decl.ty) {
                duplicate_types.push(decl);
            } else {
                types.insert(&decl.ty, decl);
            }
        }

        Self {
            graph,
            specifications,
            injectors,
            types,
            duplicate_specifications,
            duplicate_injectors,
            duplicate_types,
        }
    }

    pub fn graph(&self) -> &'a MetadataGraph {
        self.graph
    }

    pub fn specification(&self, name: &str) -> Option<&'a Specification> {
        self.specifications.get(name).copied()
    }

    pub fn injector(&self, name: &str) -> Option<&'a InjectorDecl> {
        self.injectors.get(name).copied()
    }

    pub fn type_decl(&self, ty: &TypeIdentity) -> Option<&'a TypeDecl> {
        self.types.get(ty).copied()
    }

    pub fn duplicate_specifications(&self) -> &[&'a Specification] {
        &self.duplicate_specifications
    }

    pub fn duplicate_injectors(&self) -> &[&'a InjectorDecl] {
        &self.duplicate_injectors
    }

    pub fn duplicate_types(&self) -> &[&'a TypeDecl] {
        &self.duplicate_types
    }
}
