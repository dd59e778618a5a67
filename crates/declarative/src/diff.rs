//! Attribute-by-attribute comparison of desired and observed state

use crate::resource::{Resource, ResourceProvider};
use crate::types::{Attributes, ResourceId};
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// One attribute whose observed value does not satisfy the desired one
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeChange {
    pub name: String,
    pub desired: String,
    /// `None` when the provider did not report the attribute
    pub observed: Option<String>,
}

/// Differences between observed and desired state of one resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceDiff {
    pub resource_id: ResourceId,
    pub changes: Vec<AttributeChange>,
}

impl ResourceDiff {
    /// Read observed state through the provider and compare
    pub fn observe(provider: &dyn ResourceProvider, resource: &Resource) -> Result<Self> {
        let observed = provider.read_observed(resource)?;
        Ok(Self::compare(provider, resource, &observed))
    }

    /// Compare a resource's desired attributes against observed ones
    pub fn compare(
        provider: &dyn ResourceProvider,
        resource: &Resource,
        observed: &Attributes,
    ) -> Self {
        let changes = resource
            .attributes
            .iter()
            .filter_map(|(name, desired)| {
                let current = observed.get(name);
                let in_sync = current.is_some_and(|value| provider.in_sync(name, desired, value));
                (!in_sync).then(|| AttributeChange {
                    name: name.clone(),
                    desired: desired.clone(),
                    observed: current.cloned(),
                })
            })
            .collect();

        Self {
            resource_id: resource.id.clone(),
            changes,
        }
    }

    /// Check if observed state satisfies every desired attribute
    pub fn is_in_sync(&self) -> bool {
        self.changes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ResourceKind;

    #[derive(Debug)]
    struct Lenient;

    impl ResourceProvider for Lenient {
        fn kind(&self) -> ResourceKind {
            ResourceKind::Package
        }

        fn read_observed(&self, _resource: &Resource) -> Result<Attributes> {
            Ok(Attributes::from([
                ("ensure".to_string(), "present".to_string()),
                ("arch".to_string(), "amd64".to_string()),
            ]))
        }

        fn in_sync(&self, attribute: &str, desired: &str, observed: &str) -> bool {
            match attribute {
                "ensure" => desired == observed || (desired == "installed" && observed == "present"),
                _ => desired == observed,
            }
        }

        fn materialize(&self, _resource: &Resource) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_in_sync_uses_provider_comparison() {
        let r = Resource::new(ResourceKind::Package, "burp").with("ensure", "installed");
        let diff = ResourceDiff::observe(&Lenient, &r).unwrap();
        assert!(diff.is_in_sync());
    }

    #[test]
    fn test_extra_observed_attributes_are_ignored() {
        let r = Resource::new(ResourceKind::Package, "burp").with("ensure", "present");
        assert!(ResourceDiff::observe(&Lenient, &r).unwrap().is_in_sync());
    }

    #[test]
    fn test_missing_and_different_attributes_are_changes() {
        let r = Resource::new(ResourceKind::Package, "burp")
            .with("ensure", "absent")
            .with("version", "2.4");
        let diff = ResourceDiff::observe(&Lenient, &r).unwrap();
        assert_eq!(
            diff.changes,
            vec![
                AttributeChange {
                    name: "ensure".into(),
                    desired: "absent".into(),
                    observed: Some("present".into()),
                },
                AttributeChange {
                    name: "version".into(),
                    desired: "2.4".into(),
                    observed: None,
                },
            ]
        );
    }
}
