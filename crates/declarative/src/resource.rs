//! Resource declarations and the resource-type collaborator contract
//!
//! A [`Resource`] is a declared unit of desired state. The engine never
//! touches the host itself: every kind has one [`ResourceProvider`] that
//! knows how to observe, materialize and refresh resources of that kind.

use crate::types::{Attributes, ResourceId, ResourceKind};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A declared resource: identity plus desired attributes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub id: ResourceId,
    pub attributes: Attributes,
    /// Group ("class") this resource belongs to, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
}

impl Resource {
    pub fn new(kind: ResourceKind, title: impl Into<String>) -> Self {
        Self {
            id: ResourceId::new(kind, title),
            attributes: Attributes::new(),
            group: None,
        }
    }

    /// Set a desired attribute
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Place the resource in a group
    pub fn in_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn kind(&self) -> ResourceKind {
        self.id.kind()
    }

    pub fn title(&self) -> &str {
        self.id.title()
    }

    /// Desired value of an attribute
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

/// Collaborator for one resource kind
///
/// Implementations own all host interaction for their kind. The engine
/// calls `read_observed`, compares attributes with `in_sync`, and calls
/// `materialize` only when something differs.
pub trait ResourceProvider: Send + Sync + fmt::Debug {
    /// The kind this provider manages
    fn kind(&self) -> ResourceKind;

    /// Read the current state of the resource from the host
    ///
    /// Only attributes the resource declares need to be reported. A missing
    /// attribute is treated as out of sync.
    fn read_observed(&self, resource: &Resource) -> Result<Attributes>;

    /// Whether an observed attribute value satisfies the desired one
    fn in_sync(&self, _attribute: &str, desired: &str, observed: &str) -> bool {
        desired == observed
    }

    /// Change the host so the resource reaches its desired state
    fn materialize(&self, resource: &Resource) -> Result<()>;

    /// Whether `refresh` does anything for this kind
    fn supports_refresh(&self) -> bool {
        false
    }

    /// Notification-triggered action, e.g. a service restart
    fn refresh(&self, _resource: &Resource) -> Result<()> {
        Ok(())
    }
}

/// A boxed provider for type-erased storage
pub type BoxedProvider = Box<dyn ResourceProvider>;

/// Exactly one provider per resource kind
#[derive(Debug)]
pub struct Providers {
    pub package: BoxedProvider,
    pub file: BoxedProvider,
    pub directory: BoxedProvider,
    pub service: BoxedProvider,
    pub user: BoxedProvider,
    pub config_patch: BoxedProvider,
}

impl Providers {
    /// Provider responsible for a kind
    pub fn for_kind(&self, kind: ResourceKind) -> &dyn ResourceProvider {
        match kind {
            ResourceKind::Package => self.package.as_ref(),
            ResourceKind::File => self.file.as_ref(),
            ResourceKind::Directory => self.directory.as_ref(),
            ResourceKind::Service => self.service.as_ref(),
            ResourceKind::User => self.user.as_ref(),
            ResourceKind::ConfigPatch => self.config_patch.as_ref(),
        }
    }

    /// Provider responsible for a resource
    pub fn for_resource(&self, resource: &Resource) -> &dyn ResourceProvider {
        self.for_kind(resource.kind())
    }
}
