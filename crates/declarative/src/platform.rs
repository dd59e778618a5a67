//! Platform gate - validates host facts against a support policy
//!
//! The gate runs exactly once per run, before the graph is built and before
//! any collaborator is consulted. An unsupported host rejects the whole run.
//!
//! # Example
//!
//! ```
//! use declarative::{Facts, PlatformGate, PlatformPolicy};
//!
//! let gate = PlatformGate::new(PlatformPolicy::default());
//! let err = gate
//!     .validate(&Facts::new("Solaris").with_operating_system("Nexenta"))
//!     .unwrap_err();
//! assert_eq!(err.to_string(), "Nexenta not supported");
//! ```

use crate::error::UnsupportedPlatformError;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Support level of a platform in a policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Support {
    Supported,
    Unsupported,
}

/// Host facts consulted by the gate
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Facts {
    /// OS family, e.g. "Debian", "RedHat", "Solaris"
    pub os_family: Option<String>,
    /// Finer-grained operating system name, e.g. "Ubuntu", "Nexenta"
    pub operating_system: Option<String>,
}

impl Facts {
    pub fn new(os_family: impl Into<String>) -> Self {
        Self {
            os_family: Some(os_family.into()),
            operating_system: None,
        }
    }

    pub fn with_operating_system(mut self, operating_system: impl Into<String>) -> Self {
        self.operating_system = Some(operating_system.into());
        self
    }

    /// Trimmed copy; blank values count as unknown
    pub fn normalized(&self) -> Self {
        fn clean(value: Option<&String>) -> Option<String> {
            value
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        }
        Self {
            os_family: clean(self.os_family.as_ref()),
            operating_system: clean(self.operating_system.as_ref()),
        }
    }
}

/// Source of host facts; queried once at the start of a run
pub trait FactsProvider {
    fn facts(&self) -> Result<Facts>;
}

impl FactsProvider for Facts {
    fn facts(&self) -> Result<Facts> {
        Ok(self.clone())
    }
}

/// Which families and operating systems a declaration supports
///
/// An operating-system entry takes precedence over its family entry, so a
/// policy can reject one distribution of a supported family or admit one
/// distribution of an ambiguous family. Anything absent is unsupported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformPolicy {
    #[serde(default)]
    pub families: BTreeMap<String, Support>,
    #[serde(default)]
    pub operating_systems: BTreeMap<String, Support>,
}

impl Default for PlatformPolicy {
    /// Debian and RedHat families
    fn default() -> Self {
        Self::empty()
            .family("Debian", Support::Supported)
            .family("RedHat", Support::Supported)
    }
}

impl PlatformPolicy {
    /// A policy that supports nothing
    pub fn empty() -> Self {
        Self {
            families: BTreeMap::new(),
            operating_systems: BTreeMap::new(),
        }
    }

    pub fn family(mut self, name: impl Into<String>, support: Support) -> Self {
        self.families.insert(name.into(), support);
        self
    }

    pub fn operating_system(mut self, name: impl Into<String>, support: Support) -> Self {
        self.operating_systems.insert(name.into(), support);
        self
    }

    /// Resolve the support level for a set of facts
    pub fn support_for(&self, facts: &Facts) -> Support {
        let by_os = facts
            .operating_system
            .as_deref()
            .and_then(|os| lookup(&self.operating_systems, os));
        if let Some(support) = by_os {
            return support;
        }

        facts
            .os_family
            .as_deref()
            .and_then(|family| lookup(&self.families, family))
            .unwrap_or(Support::Unsupported)
    }
}

/// Case-insensitive lookup; facts sources disagree on capitalization
fn lookup(map: &BTreeMap<String, Support>, key: &str) -> Option<Support> {
    map.get(key).copied().or_else(|| {
        map.iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(key))
            .map(|(_, support)| *support)
    })
}

/// A host that passed the gate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Platform {
    pub family: String,
    pub operating_system: Option<String>,
}

impl Platform {
    /// Most specific name of the platform
    pub fn name(&self) -> &str {
        self.operating_system.as_deref().unwrap_or(&self.family)
    }
}

/// Pre-flight check gating a run on host platform support
#[derive(Debug, Clone, Default)]
pub struct PlatformGate {
    policy: PlatformPolicy,
}

impl PlatformGate {
    pub fn new(policy: PlatformPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &PlatformPolicy {
        &self.policy
    }

    /// Validate host facts against the policy
    pub fn validate(&self, facts: &Facts) -> Result<Platform, UnsupportedPlatformError> {
        let facts = &facts.normalized();
        let name = facts
            .operating_system
            .as_deref()
            .or(facts.os_family.as_deref())
            .unwrap_or("unknown")
            .to_string();

        match (self.policy.support_for(facts), facts.os_family.as_deref()) {
            (Support::Supported, Some(family)) => Ok(Platform {
                family: family.to_string(),
                operating_system: facts.operating_system.clone(),
            }),
            // A known operating system without a family is still admitted
            // when it is explicitly listed.
            (Support::Supported, None) => Ok(Platform {
                family: name,
                operating_system: facts.operating_system.clone(),
            }),
            (Support::Unsupported, _) => {
                log::debug!("platform rejected: {:?}", facts);
                Err(UnsupportedPlatformError { name })
            }
        }
    }
}
