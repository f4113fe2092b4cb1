use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::authz::errors::AuthzError;

/// Opaque node identifier.
pub type NodeId = String;

/// Access level. `Write` satisfies both read and write requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Permission {
    #[serde(rename = "READ")]
    Read,
    #[serde(rename = "WRITE")]
    Write,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::Read => "READ",
            Permission::Write => "WRITE",
        }
    }
}

impl FromStr for Permission {
    type Err = AuthzError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "READ" => Ok(Permission::Read),
            "WRITE" => Ok(Permission::Write),
            other => Err(AuthzError::InvalidAction(other.to_string())),
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    Account,
    Namespace,
    Object,
}

impl Kind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::Account => "account",
            Kind::Namespace => "namespace",
            Kind::Object => "object",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "account" => Some(Kind::Account),
            "namespace" => Some(Kind::Namespace),
            "object" => Some(Kind::Object),
            _ => None,
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Directed edge types of the resource graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeLabel {
    /// Namespace -> Object
    Owns,
    /// Object -> Object
    Contains,
    /// Account -> Object, facets `permission` and `inherit`
    AccessTo,
    /// Account -> Namespace, facet `permission`
    AccessToNamespace,
}

impl EdgeLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeLabel::Owns => "owns",
            EdgeLabel::Contains => "contains",
            EdgeLabel::AccessTo => "access.to",
            EdgeLabel::AccessToNamespace => "access.to.namespace",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "owns" => Some(EdgeLabel::Owns),
            "contains" => Some(EdgeLabel::Contains),
            "access.to" => Some(EdgeLabel::AccessTo),
            "access.to.namespace" => Some(EdgeLabel::AccessToNamespace),
            _ => None,
        }
    }
}

impl fmt::Display for EdgeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Edge properties. Structural edges carry none.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Facets {
    pub permission: Option<Permission>,
    pub inherit: Option<bool>,
}

impl Facets {
    pub fn structural() -> Self {
        Self::default()
    }

    pub fn object_grant(permission: Permission, inherit: bool) -> Self {
        Self {
            permission: Some(permission),
            inherit: Some(inherit),
        }
    }

    pub fn namespace_grant(permission: Permission) -> Self {
        Self {
            permission: Some(permission),
            inherit: None,
        }
    }

    pub fn inherits(&self) -> bool {
        self.inherit.unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeTarget {
    pub to: NodeId,
    pub facets: Facets,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub kind: Kind,
    pub name: Option<String>,
    pub enabled: bool,
}

impl Node {
    pub fn new(id: impl Into<NodeId>, kind: Kind, name: Option<&str>) -> Self {
        Self {
            id: id.into(),
            kind,
            name: name.map(str::to_string),
            enabled: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GrantScope {
    Namespace,
    Object,
}

/// A grant edge as recorded by the grant store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantRecord {
    pub subject: NodeId,
    pub target: NodeId,
    pub scope: GrantScope,
    pub permission: Permission,
    /// Always true for namespace grants.
    pub inherit: bool,
}

impl GrantRecord {
    pub fn label(&self) -> EdgeLabel {
        match self.scope {
            GrantScope::Namespace => EdgeLabel::AccessToNamespace,
            GrantScope::Object => EdgeLabel::AccessTo,
        }
    }

    pub fn facets(&self) -> Facets {
        match self.scope {
            GrantScope::Namespace => Facets::namespace_grant(self.permission),
            GrantScope::Object => Facets::object_grant(self.permission, self.inherit),
        }
    }
}

// ---------- API request/response types ----------

#[derive(Debug, Deserialize)]
pub struct CheckRequest {
    /// Account id
    pub subject: String,
    /// Namespace or object id
    pub resource: String,
    /// "READ" | "WRITE"
    pub action: String,
}

#[derive(Debug, Serialize)]
pub struct CheckResponse {
    pub allowed: bool,
}

#[derive(Debug, Deserialize)]
pub struct ObjectGrantRequest {
    pub subject: String,
    pub resource: String,
    pub action: String,
    #[serde(default)]
    pub inherit: bool,
}

#[derive(Debug, Deserialize)]
pub struct NamespaceGrantRequest {
    pub subject: String,
    /// Namespace id
    pub namespace: String,
    pub action: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateNamedRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateObjectRequest {
    pub name: String,
    /// Namespace or object id
    pub parent: String,
}

#[derive(Debug, Serialize)]
pub struct NamespaceResponse {
    pub id: NodeId,
    pub name: String,
}
