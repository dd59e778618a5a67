//! In-memory host for testing declarations without touching the system.
//!
//! [`Host`] hands out one provider per kind, all backed by the same
//! attribute store. Materializing a resource copies its desired attributes
//! into the store, so a second run observes converged state. Every call is
//! counted, and individual resources can be made to fail.
//!
//! # Example
//!
//! ```
//! use declarative::testing::Host;
//! use declarative::{
//!     Declaration, DependencyGraph, Engine, ExecuteOptions, NoProgress, Resource, ResourceKind,
//! };
//!
//! let decl = Declaration::new()
//!     .resource(Resource::new(ResourceKind::Package, "burp").with("ensure", "present"));
//! let graph = DependencyGraph::build(&decl).unwrap();
//!
//! let host = Host::new();
//! let providers = host.providers();
//! let engine = Engine::new(&providers, ExecuteOptions::default());
//!
//! assert!(engine.converge(&graph, &mut NoProgress).is_success());
//! assert_eq!(host.materialize_count(), 1);
//! ```

use crate::resource::{Providers, Resource, ResourceProvider};
use crate::summary::RunSummary;
use crate::types::{Attributes, ResourceId, ResourceKind};
use anyhow::{Result, bail};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct HostState {
    attributes: HashMap<ResourceId, Attributes>,
    observed: usize,
    materialized: Vec<String>,
    refreshed: Vec<String>,
    fail_observe: HashSet<String>,
    fail_materialize: HashSet<String>,
    fail_refresh: HashSet<String>,
}

/// Shared in-memory host state
#[derive(Debug, Clone, Default)]
pub struct Host {
    state: Arc<Mutex<HostState>>,
}

impl Host {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HostState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Providers for every kind, backed by this host
    ///
    /// Services support refresh; other kinds do not.
    pub fn providers(&self) -> Providers {
        let provider = |kind| -> Box<dyn ResourceProvider> {
            Box::new(MemoryProvider {
                kind,
                host: self.clone(),
            })
        };
        Providers {
            package: provider(ResourceKind::Package),
            file: provider(ResourceKind::File),
            directory: provider(ResourceKind::Directory),
            service: provider(ResourceKind::Service),
            user: provider(ResourceKind::User),
            config_patch: provider(ResourceKind::ConfigPatch),
        }
    }

    /// Pre-seed an observed attribute
    pub fn set(&self, id: &ResourceId, name: &str, value: &str) {
        self.lock()
            .attributes
            .entry(id.clone())
            .or_default()
            .insert(name.to_string(), value.to_string());
    }

    /// Observed attributes of a resource
    pub fn attributes(&self, id: &ResourceId) -> Attributes {
        self.lock().attributes.get(id).cloned().unwrap_or_default()
    }

    /// Make `read_observed` fail for a resource id (`kind:title`)
    pub fn fail_observe(&self, id: &str) {
        self.lock().fail_observe.insert(id.to_string());
    }

    /// Make `materialize` fail for a resource id
    pub fn fail_materialize(&self, id: &str) {
        self.lock().fail_materialize.insert(id.to_string());
    }

    /// Make `refresh` fail for a resource id
    pub fn fail_refresh(&self, id: &str) {
        self.lock().fail_refresh.insert(id.to_string());
    }

    pub fn observe_count(&self) -> usize {
        self.lock().observed
    }

    pub fn materialize_count(&self) -> usize {
        self.lock().materialized.len()
    }

    /// Ids materialized so far, in call order
    pub fn materialize_log(&self) -> Vec<String> {
        self.lock().materialized.clone()
    }

    pub fn refresh_count(&self, id: &str) -> usize {
        self.lock().refreshed.iter().filter(|r| *r == id).count()
    }

    pub fn total_refreshes(&self) -> usize {
        self.lock().refreshed.len()
    }
}

#[derive(Debug)]
struct MemoryProvider {
    kind: ResourceKind,
    host: Host,
}

impl ResourceProvider for MemoryProvider {
    fn kind(&self) -> ResourceKind {
        self.kind
    }

    fn read_observed(&self, resource: &Resource) -> Result<Attributes> {
        let mut state = self.host.lock();
        state.observed += 1;
        if state.fail_observe.contains(&resource.id.to_string()) {
            bail!("cannot observe {}", resource.id);
        }
        Ok(state
            .attributes
            .get(&resource.id)
            .cloned()
            .unwrap_or_default())
    }

    fn materialize(&self, resource: &Resource) -> Result<()> {
        let mut state = self.host.lock();
        let id = resource.id.to_string();
        if state.fail_materialize.contains(&id) {
            bail!("cannot materialize {}", id);
        }
        state.materialized.push(id);
        state
            .attributes
            .entry(resource.id.clone())
            .or_default()
            .extend(resource.attributes.clone());
        Ok(())
    }

    fn supports_refresh(&self) -> bool {
        self.kind == ResourceKind::Service
    }

    fn refresh(&self, resource: &Resource) -> Result<()> {
        let mut state = self.host.lock();
        let id = resource.id.to_string();
        if state.fail_refresh.contains(&id) {
            bail!("cannot refresh {}", id);
        }
        state.refreshed.push(id);
        Ok(())
    }
}

/// Ids of a summary in apply order, as strings
pub fn ids(summary: &RunSummary) -> Vec<String> {
    summary.ids().map(ToString::to_string).collect()
}
