//! Package resource - apt or yum, chosen by OS family

use anyhow::{Result, bail};
use declarative::{Attributes, Resource, ResourceKind, ResourceProvider};
use std::sync::Arc;

use crate::runner::CommandRunner;

/// Package manager for one OS family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Apt,
    Yum,
}

impl Backend {
    pub fn for_family(family: &str) -> Option<Self> {
        match family.to_ascii_lowercase().as_str() {
            "debian" => Some(Self::Apt),
            "redhat" => Some(Self::Yum),
            _ => None,
        }
    }

    fn is_installed(self, runner: &dyn CommandRunner, name: &str) -> Result<bool> {
        match self {
            Self::Apt => {
                let output = runner.output("dpkg-query", &["-W", "-f=${Status}", name])?;
                Ok(output.success && output.stdout.ends_with("install ok installed"))
            }
            Self::Yum => Ok(runner.output("rpm", &["-q", name])?.success),
        }
    }

    fn install(self, runner: &dyn CommandRunner, name: &str) -> Result<()> {
        match self {
            Self::Apt => runner.run("apt-get", &["install", "-y", "-q", name]),
            Self::Yum => runner.run("yum", &["install", "-y", "-q", name]),
        }
    }

    fn remove(self, runner: &dyn CommandRunner, name: &str) -> Result<()> {
        match self {
            Self::Apt => runner.run("apt-get", &["remove", "-y", "-q", name]),
            Self::Yum => runner.run("yum", &["remove", "-y", "-q", name]),
        }
    }
}

/// Desired package state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ensure {
    Present,
    Absent,
}

impl Ensure {
    fn parse(value: &str) -> Result<Self> {
        match value {
            "present" | "installed" => Ok(Self::Present),
            "absent" | "purged" => Ok(Self::Absent),
            other => bail!("Unsupported package ensure value: {}", other),
        }
    }
}

#[derive(Debug)]
pub struct PackageProvider {
    family: String,
    backend: Option<Backend>,
    runner: Arc<dyn CommandRunner>,
}

impl PackageProvider {
    pub fn new(family: &str, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            family: family.to_string(),
            backend: Backend::for_family(family),
            runner,
        }
    }

    fn backend(&self) -> Result<Backend> {
        match self.backend {
            Some(backend) => Ok(backend),
            None => bail!("No package manager known for the {} family", self.family),
        }
    }
}

impl ResourceProvider for PackageProvider {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Package
    }

    fn read_observed(&self, resource: &Resource) -> Result<Attributes> {
        let installed = self
            .backend()?
            .is_installed(self.runner.as_ref(), resource.title())?;
        log::debug!("{} installed: {}", resource.id, installed);
        Ok(Attributes::from([(
            "ensure".to_string(),
            if installed { "present" } else { "absent" }.to_string(),
        )]))
    }

    fn in_sync(&self, attribute: &str, desired: &str, observed: &str) -> bool {
        match attribute {
            "ensure" => match (Ensure::parse(desired), Ensure::parse(observed)) {
                (Ok(want), Ok(have)) => want == have,
                _ => false,
            },
            _ => desired == observed,
        }
    }

    fn materialize(&self, resource: &Resource) -> Result<()> {
        let backend = self.backend()?;
        let ensure = Ensure::parse(resource.attribute("ensure").unwrap_or("present"))?;
        match ensure {
            Ensure::Present => backend.install(self.runner.as_ref(), resource.title()),
            Ensure::Absent => backend.remove(self.runner.as_ref(), resource.title()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::mock::ScriptedRunner;
    use declarative::ResourceDiff;

    fn burp(ensure: &str) -> Resource {
        Resource::new(ResourceKind::Package, "burp").with("ensure", ensure)
    }

    #[test]
    fn test_backend_for_family() {
        assert_eq!(Backend::for_family("Debian"), Some(Backend::Apt));
        assert_eq!(Backend::for_family("redhat"), Some(Backend::Yum));
        assert_eq!(Backend::for_family("Solaris"), None);
    }

    #[test]
    fn test_installed_is_present() {
        let runner = Arc::new(
            ScriptedRunner::new().respond("dpkg-query", true, "install ok installed"),
        );
        let provider = PackageProvider::new("Debian", runner.clone());

        let diff = ResourceDiff::observe(&provider, &burp("installed")).unwrap();
        assert!(diff.is_in_sync());
        assert!(runner.calls().iter().all(|c| !c.starts_with("apt-get")));
    }

    #[test]
    fn test_missing_package_is_installed() {
        let runner = Arc::new(ScriptedRunner::new().respond("dpkg-query", false, ""));
        let provider = PackageProvider::new("Debian", runner.clone());

        let diff = ResourceDiff::observe(&provider, &burp("present")).unwrap();
        assert!(!diff.is_in_sync());

        provider.materialize(&burp("present")).unwrap();
        assert_eq!(
            runner.calls().last().map(String::as_str),
            Some("apt-get install -y -q burp")
        );
    }

    #[test]
    fn test_yum_remove() {
        let runner = Arc::new(ScriptedRunner::new().respond("rpm -q burp", true, "burp-2.4"));
        let provider = PackageProvider::new("RedHat", runner.clone());

        let observed = provider.read_observed(&burp("absent")).unwrap();
        assert_eq!(observed.get("ensure").map(String::as_str), Some("present"));

        provider.materialize(&burp("absent")).unwrap();
        assert_eq!(
            runner.calls().last().map(String::as_str),
            Some("yum remove -y -q burp")
        );
    }

    #[test]
    fn test_unknown_family_fails_locally() {
        let provider = PackageProvider::new("Suse", Arc::new(ScriptedRunner::new()));
        let err = provider.read_observed(&burp("present")).unwrap_err();
        assert!(err.to_string().contains("Suse"));
    }

    #[test]
    fn test_install_failure_is_reported() {
        let runner = Arc::new(ScriptedRunner::new().respond("apt-get install", false, ""));
        let provider = PackageProvider::new("Debian", runner);
        assert!(provider.materialize(&burp("present")).is_err());
    }
}
