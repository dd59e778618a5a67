//! Declarations for one run: resources, groups and relationships

use crate::error::ParseError;
use crate::resource::Resource;
use crate::types::ResourceId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Prefix that marks a group reference in target text
pub const GROUP_PREFIX: &str = "class";

/// One end of a relationship: a resource or every member of a group
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Target {
    Resource(ResourceId),
    Group(String),
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resource(id) => id.fmt(f),
            Self::Group(name) => write!(f, "{}:{}", GROUP_PREFIX, name),
        }
    }
}

impl FromStr for Target {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((GROUP_PREFIX, name)) if !name.is_empty() => Ok(Self::Group(name.to_string())),
            Some((GROUP_PREFIX, _)) => Err(ParseError::MalformedTarget(s.to_string())),
            _ => Ok(Self::Resource(s.parse()?)),
        }
    }
}

impl From<ResourceId> for Target {
    fn from(id: ResourceId) -> Self {
        Self::Resource(id)
    }
}

impl From<Target> for String {
    fn from(target: Target) -> Self {
        target.to_string()
    }
}

impl TryFrom<String> for Target {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// A declared relationship, in any of the four accepted shapes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relationship {
    /// `subject` is applied before `object`
    Before { subject: Target, object: Target },
    /// `subject` requires `object` (object applied first)
    Requires { subject: Target, object: Target },
    /// `subject` is applied before `object`, and refreshes it on change
    Notifies { subject: Target, object: Target },
    /// `subject` subscribes to `object` (object applied first, refreshes subject)
    Subscribes { subject: Target, object: Target },
}

impl Relationship {
    pub fn before(subject: impl Into<Target>, object: impl Into<Target>) -> Self {
        Self::Before {
            subject: subject.into(),
            object: object.into(),
        }
    }

    pub fn requires(subject: impl Into<Target>, object: impl Into<Target>) -> Self {
        Self::Requires {
            subject: subject.into(),
            object: object.into(),
        }
    }

    pub fn notifies(subject: impl Into<Target>, object: impl Into<Target>) -> Self {
        Self::Notifies {
            subject: subject.into(),
            object: object.into(),
        }
    }

    pub fn subscribes(subject: impl Into<Target>, object: impl Into<Target>) -> Self {
        Self::Subscribes {
            subject: subject.into(),
            object: object.into(),
        }
    }

    /// Normalize to `(from, to, notify)`: `from` is applied before `to`
    pub fn endpoints(&self) -> (&Target, &Target, bool) {
        match self {
            Self::Before { subject, object } => (subject, object, false),
            Self::Requires { subject, object } => (object, subject, false),
            Self::Notifies { subject, object } => (subject, object, true),
            Self::Subscribes { subject, object } => (object, subject, true),
        }
    }

    pub fn subject(&self) -> &Target {
        match self {
            Self::Before { subject, .. }
            | Self::Requires { subject, .. }
            | Self::Notifies { subject, .. }
            | Self::Subscribes { subject, .. } => subject,
        }
    }
}

impl fmt::Display for Relationship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Before { subject, object } => write!(f, "{} before {}", subject, object),
            Self::Requires { subject, object } => write!(f, "{} requires {}", subject, object),
            Self::Notifies { subject, object } => write!(f, "{} notifies {}", subject, object),
            Self::Subscribes { subject, object } => {
                write!(f, "{} subscribes to {}", subject, object)
            }
        }
    }
}

/// The complete desired state for one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Declaration {
    /// Resources in declaration order
    pub resources: Vec<Resource>,
    /// Groups declared without members of their own yet
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
}

impl Declaration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resource(mut self, resource: Resource) -> Self {
        self.resources.push(resource);
        self
    }

    pub fn group(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !self.groups.contains(&name) {
            self.groups.push(name);
        }
        self
    }

    pub fn relationship(mut self, relationship: Relationship) -> Self {
        self.relationships.push(relationship);
        self
    }

    /// Whether a group is known, either declared or named by a member
    pub fn has_group(&self, name: &str) -> bool {
        self.groups.iter().any(|g| g == name)
            || self
                .resources
                .iter()
                .any(|r| r.group.as_deref() == Some(name))
    }

    /// Members of a group, in declaration order
    pub fn members(&self, name: &str) -> impl Iterator<Item = &Resource> {
        self.resources
            .iter()
            .filter(move |r| r.group.as_deref() == Some(name))
    }
}
