//! Service resource - systemd units, restarted on notification

use anyhow::{Result, bail};
use declarative::{Attributes, Resource, ResourceKind, ResourceProvider};
use std::sync::Arc;

use crate::runner::CommandRunner;

#[derive(Debug)]
pub struct ServiceProvider {
    runner: Arc<dyn CommandRunner>,
}

impl ServiceProvider {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    fn systemctl(&self, verb: &str, name: &str) -> Result<()> {
        self.runner.run("systemctl", &[verb, name])
    }

    fn query(&self, verb: &str, name: &str) -> Result<String> {
        Ok(self.runner.output("systemctl", &[verb, name])?.stdout)
    }
}

/// Normalize `ensure` values: running/true and stopped/false
fn running(value: &str) -> Option<bool> {
    match value {
        "running" | "true" => Some(true),
        "stopped" | "false" => Some(false),
        _ => None,
    }
}

fn flag(value: &str) -> Option<bool> {
    match value {
        "true" | "yes" | "1" => Some(true),
        "false" | "no" | "0" => Some(false),
        _ => None,
    }
}

impl ResourceProvider for ServiceProvider {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Service
    }

    fn read_observed(&self, resource: &Resource) -> Result<Attributes> {
        let name = resource.title();
        let mut observed = Attributes::new();

        let active = self.query("is-active", name)? == "active";
        observed.insert(
            "ensure".into(),
            if active { "running" } else { "stopped" }.into(),
        );

        if resource.attribute("enable").is_some() {
            let enabled = self.query("is-enabled", name)? == "enabled";
            observed.insert("enable".into(), enabled.to_string());
        }

        Ok(observed)
    }

    fn in_sync(&self, attribute: &str, desired: &str, observed: &str) -> bool {
        match attribute {
            "ensure" => running(desired).is_some() && running(desired) == running(observed),
            "enable" => flag(desired).is_some() && flag(desired) == flag(observed),
            _ => desired == observed,
        }
    }

    fn materialize(&self, resource: &Resource) -> Result<()> {
        let name = resource.title();

        if let Some(enable) = resource.attribute("enable") {
            match flag(enable) {
                Some(true) => self.systemctl("enable", name)?,
                Some(false) => self.systemctl("disable", name)?,
                None => bail!("Unsupported enable value for {}: {}", resource.id, enable),
            }
        }

        if let Some(ensure) = resource.attribute("ensure") {
            match running(ensure) {
                Some(true) => self.systemctl("start", name)?,
                Some(false) => self.systemctl("stop", name)?,
                None => bail!("Unsupported ensure value for {}: {}", resource.id, ensure),
            }
        }

        Ok(())
    }

    fn supports_refresh(&self) -> bool {
        true
    }

    fn refresh(&self, resource: &Resource) -> Result<()> {
        if resource.attribute("ensure").and_then(running) == Some(false) {
            log::debug!("{} is meant to be stopped; not restarting", resource.id);
            return Ok(());
        }
        self.systemctl("restart", resource.title())?;
        log::info!("Restarted {}", resource.title());
        Ok(())
    }
}
