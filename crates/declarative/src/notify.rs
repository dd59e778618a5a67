//! Notification router - refreshes resources whose notifiers changed
//!
//! Runs after the apply pass, in the same topological order. Every NOTIFY
//! edge whose source changed marks its target; each marked target gets at
//! most one refresh, no matter how many notifiers changed.

use crate::context::ProgressCallback;
use crate::graph::DependencyGraph;
use crate::resource::Providers;
use crate::summary::RunSummary;
use crate::types::{ApplyResult, RefreshOutcome, RefreshRecord, ResourceId};

pub struct NotificationRouter<'g> {
    graph: &'g DependencyGraph,
}

impl<'g> NotificationRouter<'g> {
    pub fn new(graph: &'g DependencyGraph) -> Self {
        Self { graph }
    }

    /// Resources that changed and notify `idx`, in apply order
    fn changed_notifiers(&self, idx: usize, summary: &RunSummary) -> Vec<ResourceId> {
        let mut sources: Vec<usize> = self
            .graph
            .notifiers(idx)
            .filter(|&from| {
                summary
                    .get(&self.graph.resource(from).id)
                    .is_some_and(ApplyResult::is_change)
            })
            .collect();
        sources.sort_by_key(|from| self.graph.order().iter().position(|o| o == from));
        sources
            .into_iter()
            .map(|from| self.graph.resource(from).id.clone())
            .collect()
    }

    /// Fire refreshes for this run; returns the number of refreshes recorded
    ///
    /// A failed target is never refreshed. A target whose provider has no
    /// refresh action counts as refreshed. Refresh errors are recorded and do
    /// not change any apply result.
    pub fn route<P: ProgressCallback>(
        &self,
        summary: &mut RunSummary,
        providers: &Providers,
        dry_run: bool,
        progress: &mut P,
    ) -> usize {
        let mut fired = 0;

        for &idx in self.graph.order() {
            let triggered_by = self.changed_notifiers(idx, summary);
            if triggered_by.is_empty() {
                continue;
            }

            let resource = self.graph.resource(idx);
            if summary
                .get(&resource.id)
                .is_none_or(ApplyResult::is_failure)
            {
                log::warn!("not refreshing {}: it did not converge", resource.id);
                continue;
            }

            let provider = providers.for_resource(resource);
            let outcome = if dry_run {
                RefreshOutcome::Pending
            } else if !provider.supports_refresh() {
                log::debug!("{} has no refresh action", resource.id);
                RefreshOutcome::Refreshed
            } else {
                match provider.refresh(resource) {
                    Ok(()) => {
                        log::info!("{} refreshed", resource.id);
                        RefreshOutcome::Refreshed
                    }
                    Err(e) => {
                        log::warn!("{}: refresh failed: {:#}", resource.id, e);
                        RefreshOutcome::Failed(format!("{:#}", e))
                    }
                }
            };

            let record = RefreshRecord {
                id: resource.id.clone(),
                triggered_by,
                outcome,
            };
            progress.on_refresh(&record);
            summary.push_refresh(record);
            fired += 1;
        }

        fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::NoProgress;
    use crate::declaration::{Declaration, Relationship};
    use crate::executor::Engine;
    use crate::resource::Resource;
    use crate::summary::RunStatus;
    use crate::testing::Host;
    use crate::types::{ExecuteOptions, Failure, ResourceKind};

    fn conf(path: &str) -> Resource {
        Resource::new(ResourceKind::File, path).with("ensure", "file")
    }

    fn service() -> Resource {
        Resource::new(ResourceKind::Service, "burp").with("ensure", "running")
    }

    fn run(decl: &Declaration, host: &Host) -> RunSummary {
        let graph = DependencyGraph::build(decl).unwrap();
        let providers = host.providers();
        Engine::new(&providers, ExecuteOptions::default()).converge(&graph, &mut NoProgress)
    }

    #[test]
    fn test_multiple_notifiers_collapse_to_one_refresh() {
        let a = conf("/etc/burp/burp-server.conf");
        let b = conf("/etc/burp/CA.cnf");
        let svc = service();
        let decl = Declaration::new()
            .resource(a.clone())
            .resource(b.clone())
            .resource(svc.clone())
            .relationship(Relationship::notifies(a.id.clone(), svc.id.clone()))
            .relationship(Relationship::subscribes(svc.id.clone(), b.id.clone()));
        let host = Host::new();

        let summary = run(&decl, &host);

        assert_eq!(host.refresh_count("service:burp"), 1);
        assert_eq!(summary.refreshes().len(), 1);
        assert_eq!(summary.refreshes()[0].triggered_by, vec![a.id, b.id]);
    }

    #[test]
    fn test_only_changed_notifiers_are_reported() {
        let a = conf("/etc/burp/burp-server.conf");
        let b = conf("/etc/burp/CA.cnf");
        let svc = service();
        let decl = Declaration::new()
            .resource(a.clone())
            .resource(b.clone())
            .resource(svc.clone())
            .relationship(Relationship::notifies(a.id.clone(), svc.id.clone()))
            .relationship(Relationship::notifies(b.id.clone(), svc.id.clone()));
        let host = Host::new();
        host.set(&a.id, "ensure", "file");
        host.set(&svc.id, "ensure", "running");

        let summary = run(&decl, &host);

        assert_eq!(summary.get(&svc.id), Some(&ApplyResult::Unchanged));
        assert_eq!(summary.refreshes()[0].triggered_by, vec![b.id]);
        assert_eq!(host.refresh_count("service:burp"), 1);
    }

    #[test]
    fn test_order_edges_never_refresh() {
        let a = conf("/etc/burp/burp.conf");
        let svc = service();
        let decl = Declaration::new()
            .resource(a.clone())
            .resource(svc.clone())
            .relationship(Relationship::before(a.id, svc.id));
        let host = Host::new();

        let summary = run(&decl, &host);

        assert!(summary.refreshes().is_empty());
        assert_eq!(host.total_refreshes(), 0);
    }

    #[test]
    fn test_failed_notifier_does_not_refresh() {
        let a = conf("/etc/burp/burp.conf");
        let b = conf("/etc/burp/CA.cnf");
        let svc = service();
        let decl = Declaration::new()
            .resource(a.clone())
            .resource(b.clone())
            .resource(svc.clone())
            .relationship(Relationship::notifies(a.id.clone(), svc.id.clone()));
        let host = Host::new();
        host.fail_materialize("file:/etc/burp/burp.conf");

        let summary = run(&decl, &host);

        assert_eq!(
            summary.get(&svc.id),
            Some(&ApplyResult::failed(Failure::Dependency(a.id)))
        );
        assert_eq!(summary.get(&b.id), Some(&ApplyResult::Changed));
        assert_eq!(host.total_refreshes(), 0);
    }

    #[test]
    fn test_refresh_failure_is_recorded_not_rolled_back() {
        let a = conf("/etc/burp/burp.conf");
        let svc = service();
        let decl = Declaration::new()
            .resource(a.clone())
            .resource(svc.clone())
            .relationship(Relationship::notifies(a.id.clone(), svc.id.clone()));
        let host = Host::new();
        host.fail_refresh("service:burp");

        let summary = run(&decl, &host);

        assert_eq!(summary.get(&a.id), Some(&ApplyResult::Changed));
        assert_eq!(summary.get(&svc.id), Some(&ApplyResult::Changed));
        assert!(matches!(
            summary.refreshes()[0].outcome,
            RefreshOutcome::Failed(_)
        ));
        assert_eq!(host.attributes(&a.id).get("ensure").map(String::as_str), Some("file"));
        assert_eq!(summary.status(), RunStatus::PartialFailure);
    }

    #[test]
    fn test_targets_without_refresh_support_succeed_as_noop() {
        let a = Resource::new(ResourceKind::Package, "burp").with("ensure", "present");
        let b = conf("/etc/burp/burp.conf");
        let decl = Declaration::new()
            .resource(a.clone())
            .resource(b.clone())
            .relationship(Relationship::notifies(a.id, b.id.clone()));
        let host = Host::new();

        let summary = run(&decl, &host);

        assert_eq!(summary.refreshes().len(), 1);
        assert_eq!(summary.refreshes()[0].id, b.id);
        assert_eq!(summary.refreshes()[0].outcome, RefreshOutcome::Refreshed);
        assert_eq!(host.total_refreshes(), 0);
        assert!(summary.is_success());
    }
}
