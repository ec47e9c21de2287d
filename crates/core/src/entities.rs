use derive_builder::Builder;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use strum_macros::{Display, EnumString};

use crate::qualified_type::{QualifiedType, TypeIdentity};

/// Opaque source-location token supplied by the metadata scraper
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceToken(String);

impl SourceToken {
    /// The token of declarations without a known position
    pub const fn unknown() -> Self {
        Self(String::new())
    }

    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_unknown(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for SourceToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("<unknown>")
        } else {
            f.write_str(&self.0)
        }
    }
}

impl From<&str> for SourceToken {
    fn from(token: &str) -> Self {
        Self::new(token)
    }
}

/// How a dependency is requested
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RequestKind {
    /// The value itself, constructed before the dependent
    #[default]
    Direct,
    /// A handle resolving the value once, on first use
    Lazy,
    /// A handle producing the value on every call
    Provider,
}

impl RequestKind {
    /// Deferred requests do not order construction and so never close a cycle
    pub fn is_deferred(self) -> bool {
        !matches!(self, RequestKind::Direct)
    }
}

/// A required qualified type and the way it is requested
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Dependency {
    #[serde(rename = "type")]
    pub ty: QualifiedType,
    pub kind: RequestKind,
}

impl Dependency {
    pub fn direct(ty: QualifiedType) -> Self {
        Self {
            ty,
            kind: RequestKind::Direct,
        }
    }

    pub fn lazy(ty: QualifiedType) -> Self {
        Self {
            ty,
            kind: RequestKind::Lazy,
        }
    }

    pub fn provider(ty: QualifiedType) -> Self {
        Self {
            ty,
            kind: RequestKind::Provider,
        }
    }
}

impl From<QualifiedType> for Dependency {
    fn from(ty: QualifiedType) -> Self {
        Self::direct(ty)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DependencyRepr {
    Text(String),
    Structured {
        #[serde(rename = "type")]
        ty: QualifiedType,
        #[serde(default)]
        kind: RequestKind,
    },
}

impl<'de> Deserialize<'de> for Dependency {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match DependencyRepr::deserialize(deserializer)? {
            DependencyRepr::Text(s) => QualifiedType::parse(&s)
                .map(Dependency::direct)
                .map_err(serde::de::Error::custom),
            DependencyRepr::Structured { ty, kind } => Ok(Self { ty, kind }),
        }
    }
}

/// Caching policy attached to a Factory binding
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FabricationMode {
    /// Fresh value on every call
    #[default]
    Recurrent,
    /// Cached once per scope instance
    Scoped,
    /// Cached once per root frame and shared with every descendant frame
    ContainerScoped,
}

impl FabricationMode {
    pub fn is_cached(self) -> bool {
        !matches!(self, FabricationMode::Recurrent)
    }
}

/// How the owner of a binding is instantiated
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SpecificationMode {
    /// No instance state; members are called statically
    #[default]
    Static,
    /// Constructed once per injector and supplied from outside
    Instantiated,
    /// Satisfied through a parent-exposed dependency interface
    Dependency,
}

/// A factory binding: produces a value of `provides`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Builder)]
#[builder(setter(into))]
pub struct Factory {
    /// Producing member name
    pub member: String,

    /// The produced type
    pub provides: QualifiedType,

    #[builder(default)]
    #[serde(default)]
    pub mode: FabricationMode,

    /// Ordered parameters of the producing member
    #[builder(default)]
    #[serde(default)]
    pub parameters: Vec<Dependency>,

    /// Ordered properties that must be initialized after construction
    #[builder(default)]
    #[serde(default)]
    pub properties: Vec<Dependency>,

    /// Partial factories contribute to a collection instead of conflicting
    #[builder(default)]
    #[serde(default)]
    pub partial: bool,

    #[builder(default)]
    #[serde(default)]
    pub location: SourceToken,
}

impl Factory {
    /// Parameters followed by required properties
    pub fn dependencies(&self) -> impl Iterator<Item = &Dependency> {
        self.parameters.iter().chain(self.properties.iter())
    }
}

/// A builder binding: initializes a caller-supplied value of `builds`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuilderBinding {
    pub member: String,
    pub builds: QualifiedType,
    #[serde(default)]
    pub parameters: Vec<Dependency>,
    #[serde(default)]
    pub location: SourceToken,
}

/// Closed set of binding kinds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Binding {
    Factory(Factory),
    Builder(BuilderBinding),
}

impl Binding {
    /// The type this binding produces or initializes
    pub fn target(&self) -> &QualifiedType {
        match self {
            Binding::Factory(factory) => &factory.provides,
            Binding::Builder(builder) => &builder.builds,
        }
    }

    pub fn member(&self) -> &str {
        match self {
            Binding::Factory(factory) => &factory.member,
            Binding::Builder(builder) => &builder.member,
        }
    }

    pub fn location(&self) -> &SourceToken {
        match self {
            Binding::Factory(factory) => &factory.location,
            Binding::Builder(builder) => &builder.location,
        }
    }

    /// Every dependency of the binding in declaration order
    pub fn dependencies(&self) -> Vec<&Dependency> {
        match self {
            Binding::Factory(factory) => factory.dependencies().collect(),
            Binding::Builder(builder) => builder.parameters.iter().collect(),
        }
    }

    pub fn is_partial(&self) -> bool {
        match self {
            Binding::Factory(factory) => factory.partial,
            Binding::Builder(_) => false,
        }
    }
}

/// Wherever `output` is required, satisfy it with `input`'s binding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub input: QualifiedType,
    pub output: QualifiedType,
    #[serde(default)]
    pub location: SourceToken,
}

/// A named bundle of factories, builders and links
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Builder)]
#[builder(setter(into))]
pub struct Specification {
    pub name: String,

    #[builder(default)]
    #[serde(default)]
    pub mode: SpecificationMode,

    /// Type of the specification instance when it must be supplied from outside
    #[builder(default)]
    #[serde(default)]
    pub instance: Option<TypeIdentity>,

    #[builder(default)]
    #[serde(default)]
    pub factories: Vec<Factory>,

    #[builder(default)]
    #[serde(default)]
    pub builders: Vec<BuilderBinding>,

    #[builder(default)]
    #[serde(default)]
    pub links: Vec<Link>,

    #[builder(default)]
    #[serde(default)]
    pub location: SourceToken,
}

impl Specification {
    /// The instance type, falling back to the specification name
    pub fn instance_type(&self) -> TypeIdentity {
        self.instance.clone().unwrap_or_else(|| {
            TypeIdentity::parse(&self.name).unwrap_or_else(|_| TypeIdentity::new("", &self.name))
        })
    }
}

fn default_eligible() -> bool {
    true
}

/// A constructor of a declared type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Constructor {
    #[serde(default)]
    pub parameters: Vec<Dependency>,

    /// Whether the scraper considered this constructor usable for injection
    #[serde(default = "default_eligible")]
    pub eligible: bool,

    #[serde(default)]
    pub location: SourceToken,
}

/// Constructor metadata of a type, consulted by the auto-binding synthesizer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDecl {
    #[serde(rename = "type")]
    pub ty: TypeIdentity,

    #[serde(default)]
    pub constructors: Vec<Constructor>,

    /// Properties that must be initialized after construction
    #[serde(default)]
    pub required_properties: Vec<Dependency>,

    /// Preferred fabrication mode for a synthesized binding
    #[serde(default)]
    pub mode: Option<FabricationMode>,

    #[serde(default)]
    pub location: SourceToken,
}

impl TypeDecl {
    pub fn eligible_constructors(&self) -> impl Iterator<Item = &Constructor> {
        self.constructors.iter().filter(|c| c.eligible)
    }
}

/// What an injector request asks for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestTarget {
    /// Return a value of the type
    Provide(Dependency),
    /// Initialize a caller-supplied value of the type
    Build(QualifiedType),
}

/// A provider or builder member declared on an injector
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub member: String,
    pub target: RequestTarget,
    #[serde(default)]
    pub location: SourceToken,
}

impl Request {
    pub fn provide(member: impl Into<String>, ty: QualifiedType) -> Self {
        Self {
            member: member.into(),
            target: RequestTarget::Provide(Dependency::direct(ty)),
            location: SourceToken::default(),
        }
    }

    pub fn build(member: impl Into<String>, ty: QualifiedType) -> Self {
        Self {
            member: member.into(),
            target: RequestTarget::Build(ty),
            location: SourceToken::default(),
        }
    }

    /// The requested type, whichever the kind
    pub fn ty(&self) -> &QualifiedType {
        match &self.target {
            RequestTarget::Provide(dependency) => &dependency.ty,
            RequestTarget::Build(ty) => ty,
        }
    }
}

/// Reference to a parent-exposed dependency interface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyRef {
    pub interface: TypeIdentity,
    /// The subset of the parent's bindings the interface projects
    pub exposes: Vec<QualifiedType>,
    #[serde(default)]
    pub location: SourceToken,
}

/// A parent-injector member constructing a child injector
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildFactoryDecl {
    pub member: String,
    /// Name of the child injector
    pub child: String,
    /// Types supplied by the caller of the child factory
    #[serde(default)]
    pub parameters: Vec<QualifiedType>,
    #[serde(default)]
    pub location: SourceToken,
}

/// An injector contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Builder)]
#[builder(setter(into))]
pub struct InjectorDecl {
    pub name: String,

    #[builder(default)]
    #[serde(default)]
    pub requests: Vec<Request>,

    /// Names of the attached specifications
    #[builder(default)]
    #[serde(default)]
    pub specifications: Vec<String>,

    #[builder(default, setter(into, strip_option))]
    #[serde(default)]
    pub dependency: Option<DependencyRef>,

    #[builder(default)]
    #[serde(default)]
    pub children: Vec<ChildFactoryDecl>,

    #[builder(default)]
    #[serde(default)]
    pub location: SourceToken,
}
