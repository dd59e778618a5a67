//! # Declarative
//!
//! A convergence engine for declared system resources.
//!
//! A [`Declaration`] names resources (packages, files, services, users,
//! config patches) with their desired attributes, plus ordering and
//! notification relationships between them. The engine checks the host
//! platform, orders the resources, brings each one to its desired state
//! through a [`ResourceProvider`], and refreshes resources whose notifiers
//! changed.
//!
//! ## Core Concepts
//!
//! - **Resource**: A typed, titled object with desired attributes
//! - **Relationship**: `before`/`require` order; `notify`/`subscribe` also refresh
//! - **DependencyGraph**: Validated, acyclic order over all resources
//! - **Engine**: Applies the graph and collects a [`RunSummary`]
//!
//! ## Example
//!
//! ```
//! use declarative::testing::Host;
//! use declarative::{
//!     Declaration, Engine, ExecuteOptions, Facts, NoProgress, PlatformGate, PlatformPolicy,
//!     Relationship, Resource, ResourceKind, prepare,
//! };
//!
//! let conf = Resource::new(ResourceKind::File, "/etc/burp/burp.conf").with("ensure", "file");
//! let svc = Resource::new(ResourceKind::Service, "burp").with("ensure", "running");
//! let decl = Declaration::new()
//!     .resource(conf.clone())
//!     .resource(svc.clone())
//!     .relationship(Relationship::subscribes(svc.id.clone(), conf.id.clone()));
//!
//! let gate = PlatformGate::new(PlatformPolicy::default());
//! let prepared = prepare(&decl, &Facts::new("Debian"), &gate)?;
//!
//! let host = Host::new();
//! let providers = host.providers();
//! let summary = Engine::new(&providers, ExecuteOptions::default())
//!     .converge(&prepared.graph, &mut NoProgress);
//!
//! assert!(summary.is_success());
//! assert_eq!(host.refresh_count("service:burp"), 1);
//! # Ok::<(), declarative::RunError>(())
//! ```
//!
//! ## Provider Traits
//!
//! Everything that touches the host sits behind a trait:
//!
//! - [`FactsProvider`]: Reports the host's OS family and name
//! - [`ResourceProvider`]: Observes, materializes and refreshes one kind
//! - [`ProgressCallback`]: Receives progress updates
//!
//! This keeps the engine free of process spawning and terminal output.

pub mod context;
pub mod declaration;
pub mod diff;
pub mod error;
pub mod executor;
pub mod graph;
pub mod notify;
pub mod platform;
pub mod resource;
pub mod summary;
pub mod testing;
pub mod types;

// Re-export main types at crate root
pub use context::{NoProgress, ProgressCallback};
pub use declaration::{Declaration, GROUP_PREFIX, Relationship, Target};
pub use diff::{AttributeChange, ResourceDiff};
pub use error::{GraphError, ParseError, RunError, UnsupportedPlatformError};
pub use executor::{Engine, Prepared, prepare};
pub use graph::{DependencyGraph, Edge, EdgeKind};
pub use notify::NotificationRouter;
pub use platform::{Facts, FactsProvider, Platform, PlatformGate, PlatformPolicy, Support};
pub use resource::{BoxedProvider, Providers, Resource, ResourceProvider};
pub use summary::{RunStatus, RunSummary, SummaryCounts, SummaryEntry};
pub use types::{
    ApplyResult, Attributes, ExecuteOptions, Failure, RefreshOutcome, RefreshRecord, ResourceId,
    ResourceKind,
};
