//! Structural type identities and the qualified lookup keys built from them.
//!
//! A `TypeIdentity` names a type by namespace, base name and ordered type
//! arguments. A `QualifiedType` pairs it with a `Qualifier` and is the key
//! every binding map in the resolver is indexed by.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{self, Display};

use crate::error::{Error, Result};

/// Structural identity of a named type plus its generic arguments.
///
/// Equality, ordering and hashing recurse into the arguments, so
/// `app::Box<app::A>` and `app::Box<app::B>` are distinct keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeIdentity {
    namespace: Vec<String>,
    name: String,
    arguments: Vec<TypeIdentity>,
}

impl TypeIdentity {
    /// Create an identity from a namespace path (`app::services`) and a base name.
    ///
    /// An empty namespace places the type in the global namespace.
    pub fn new(namespace: &str, name: impl Into<String>) -> Self {
        Self {
            namespace: split_path_lossy(namespace),
            name: name.into(),
            arguments: Vec::new(),
        }
    }

    /// Attach ordered type arguments
    #[must_use]
    pub fn with_arguments(mut self, arguments: Vec<TypeIdentity>) -> Self {
        self.arguments = arguments;
        self
    }

    /// Parse the textual form `ns::sub::Name<Arg, Other<X>>`.
    ///
    /// Dotted paths (`ns.sub.Name`) are accepted as well.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is empty, has empty path segments or
    /// unbalanced angle brackets.
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::invalid_input("type name cannot be empty"));
        }

        let (head, arguments) = match s.find('<') {
            Some(open) => {
                let inner = s[open + 1..].strip_suffix('>').ok_or_else(|| {
                    Error::invalid_input(format!("unbalanced type arguments: {s}"))
                })?;
                (&s[..open], split_arguments(inner, s)?)
            }
            None => {
                if s.contains('>') {
                    return Err(Error::invalid_input(format!(
                        "unbalanced type arguments: {s}"
                    )));
                }
                (s, Vec::new())
            }
        };

        let mut segments = split_path(head)
            .ok_or_else(|| Error::invalid_input(format!("type name contains empty segment: {s}")))?;
        let name = segments
            .pop()
            .ok_or_else(|| Error::invalid_input(format!("type name has no base name: {s}")))?;

        Ok(Self {
            namespace: segments,
            name,
            arguments,
        })
    }

    /// The base name without namespace or arguments
    pub fn simple_name(&self) -> &str {
        &self.name
    }

    /// Namespace segments from outermost to innermost
    pub fn namespace(&self) -> &[String] {
        &self.namespace
    }

    /// Ordered type arguments
    pub fn arguments(&self) -> &[TypeIdentity] {
        &self.arguments
    }

    /// Whether this identity carries type arguments
    pub fn is_generic(&self) -> bool {
        !self.arguments.is_empty()
    }
}

fn split_path(head: &str) -> Option<Vec<String>> {
    let head = head.trim();
    let segments: Vec<String> = if head.contains("::") {
        head.split("::").map(|s| s.trim().to_string()).collect()
    } else {
        head.split('.').map(|s| s.trim().to_string()).collect()
    };
    if segments.iter().any(|s| s.is_empty()) {
        None
    } else {
        Some(segments)
    }
}

fn split_path_lossy(path: &str) -> Vec<String> {
    if path.trim().is_empty() {
        return Vec::new();
    }
    split_path(path).unwrap_or_else(|| {
        path.split("::")
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect()
    })
}

fn split_arguments(inner: &str, whole: &str) -> Result<Vec<TypeIdentity>> {
    let mut depth = 0usize;
    let mut start = 0usize;
    let mut arguments = Vec::new();

    for (i, c) in inner.char_indices() {
        match c {
            '<' => depth += 1,
            '>' => {
                depth = depth.checked_sub(1).ok_or_else(|| {
                    Error::invalid_input(format!("unbalanced type arguments: {whole}"))
                })?;
            }
            ',' if depth == 0 => {
                arguments.push(TypeIdentity::parse(&inner[start..i])?);
                start = i + 1;
            }
            _ => {}
        }
    }

    if depth != 0 {
        return Err(Error::invalid_input(format!(
            "unbalanced type arguments: {whole}"
        )));
    }
    arguments.push(TypeIdentity::parse(&inner[start..])?);
    Ok(arguments)
}

impl Display for TypeIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.namespace {
            write!(f, "{segment}::")?;
        }
        f.write_str(&self.name)?;
        if !self.arguments.is_empty() {
            f.write_str("<")?;
            for (i, argument) in self.arguments.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{argument}")?;
            }
            f.write_str(">")?;
        }
        Ok(())
    }
}

impl Serialize for TypeIdentity {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for TypeIdentity {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        TypeIdentity::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Disambiguation tag on a type request.
///
/// Qualifiers hold no source position; two qualifiers written at different
/// places compare equal when their content does.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Qualifier {
    /// Matches unqualified requests
    #[default]
    None,
    /// A free-form label (`@Named("primary")`)
    Label(String),
    /// A custom marker type
    Custom(TypeIdentity),
}

impl Qualifier {
    pub fn is_none(&self) -> bool {
        matches!(self, Qualifier::None)
    }
}

impl Display for Qualifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Qualifier::None => Ok(()),
            Qualifier::Label(label) => write!(f, "@\"{label}\""),
            Qualifier::Custom(marker) => write!(f, "@{marker}"),
        }
    }
}

/// A type together with its qualifier; the universal lookup key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QualifiedType {
    pub ty: TypeIdentity,
    pub qualifier: Qualifier,
}

impl QualifiedType {
    pub fn new(ty: TypeIdentity, qualifier: Qualifier) -> Self {
        Self { ty, qualifier }
    }

    /// An unqualified request for `ty`
    pub fn unqualified(ty: TypeIdentity) -> Self {
        Self::new(ty, Qualifier::None)
    }

    /// Parse `Type`, `Type@"label"` or `Type@marker::Type`.
    ///
    /// # Errors
    ///
    /// Returns an error if either the type or the qualifier part is malformed.
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        let Some((ty, qualifier)) = s.split_once('@') else {
            return Ok(Self::unqualified(TypeIdentity::parse(s)?));
        };

        let qualifier = qualifier.trim();
        let qualifier = if let Some(label) = qualifier
            .strip_prefix('"')
            .and_then(|rest| rest.strip_suffix('"'))
        {
            Qualifier::Label(label.to_string())
        } else if qualifier.starts_with('"') {
            return Err(Error::invalid_input(format!("unterminated label: {s}")));
        } else {
            Qualifier::Custom(TypeIdentity::parse(qualifier)?)
        };

        Ok(Self::new(TypeIdentity::parse(ty)?, qualifier))
    }

    pub fn is_qualified(&self) -> bool {
        !self.qualifier.is_none()
    }
}

impl From<TypeIdentity> for QualifiedType {
    fn from(ty: TypeIdentity) -> Self {
        Self::unqualified(ty)
    }
}

impl Display for QualifiedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.ty, self.qualifier)
    }
}

impl Serialize for QualifiedType {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

/// Accepted wire forms: the textual form, or `{ "type": ..., "qualifier": ... }`
#[derive(Deserialize)]
#[serde(untagged)]
enum QualifiedTypeRepr {
    Text(String),
    Structured {
        #[serde(rename = "type")]
        ty: TypeIdentity,
        #[serde(default)]
        qualifier: Qualifier,
    },
}

impl<'de> Deserialize<'de> for QualifiedType {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match QualifiedTypeRepr::deserialize(deserializer)? {
            QualifiedTypeRepr::Text(s) => {
                QualifiedType::parse(&s).map_err(serde::de::Error::custom)
            }
            QualifiedTypeRepr::Structured { ty, qualifier } => Ok(Self::new(ty, qualifier)),
        }
    }
}
