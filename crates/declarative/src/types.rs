//! Core types for declarative resource convergence

use crate::error::ParseError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Desired or observed attributes of a resource, keyed by attribute name
pub type Attributes = BTreeMap<String, String>;

/// The closed set of manageable resource kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    Package,
    File,
    Directory,
    Service,
    User,
    ConfigPatch,
}

impl ResourceKind {
    /// All kinds, in display order
    pub const ALL: [Self; 6] = [
        Self::Package,
        Self::File,
        Self::Directory,
        Self::Service,
        Self::User,
        Self::ConfigPatch,
    ];

    /// Canonical text form, as used in resource ids
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Package => "package",
            Self::File => "file",
            Self::Directory => "directory",
            Self::Service => "service",
            Self::User => "user",
            Self::ConfigPatch => "config-patch",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "package" => Ok(Self::Package),
            "file" => Ok(Self::File),
            "directory" => Ok(Self::Directory),
            "service" => Ok(Self::Service),
            "user" => Ok(Self::User),
            "config-patch" | "config_patch" | "augeas" => Ok(Self::ConfigPatch),
            other => Err(ParseError::UnknownKind(other.to_string())),
        }
    }
}

/// Unique identifier of a declared resource: `kind:title`
///
/// The title may itself contain `:`; only the first separator splits.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct ResourceId {
    kind: ResourceKind,
    title: String,
}

impl ResourceId {
    pub fn new(kind: ResourceKind, title: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
        }
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn title(&self) -> &str {
        &self.title
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.title)
    }
}

impl FromStr for ResourceId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, title) = s
            .split_once(':')
            .ok_or_else(|| ParseError::MalformedId(s.to_string()))?;
        if title.is_empty() {
            return Err(ParseError::MalformedId(s.to_string()));
        }
        Ok(Self::new(kind.parse()?, title))
    }
}

impl From<ResourceId> for String {
    fn from(id: ResourceId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for ResourceId {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Why a resource ended up failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cause", content = "detail", rename_all = "snake_case")]
pub enum Failure {
    /// Observing or materializing the resource itself errored
    Apply(String),
    /// Skipped because a dependency failed
    Dependency(ResourceId),
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Apply(message) => f.write_str(message),
            Self::Dependency(id) => write!(f, "skipped: dependency {} failed", id),
        }
    }
}

/// Outcome of one resource's apply step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ApplyResult {
    /// Observed state already matched the desired state
    Unchanged,
    /// Desired state was materialized (or would be, in a dry run)
    Changed,
    /// Resource was not converged
    Failed { failure: Failure },
}

impl ApplyResult {
    pub fn failed(failure: Failure) -> Self {
        Self::Failed { failure }
    }

    /// Check if the result represents a change
    pub fn is_change(&self) -> bool {
        matches!(self, Self::Changed)
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Outcome of a notification-triggered refresh
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "error", rename_all = "snake_case")]
pub enum RefreshOutcome {
    Refreshed,
    Failed(String),
    /// Would refresh; dry run
    Pending,
}

/// A refresh fired on one resource by the notification router
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshRecord {
    pub id: ResourceId,
    /// Changed resources that notified `id`, in apply order
    pub triggered_by: Vec<ResourceId>,
    pub outcome: RefreshOutcome,
}

/// Options for one convergence run
#[derive(Debug, Clone)]
pub struct ExecuteOptions {
    /// Observe and compare only; nothing is materialized or refreshed
    pub dry_run: bool,
    /// Number of parallel jobs for independent resources
    pub jobs: usize,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            jobs: 1,
        }
    }
}
