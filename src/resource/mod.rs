//! Host collaborators for each resource kind
//!
//! Every kind is backed by one provider that observes the host, converges
//! it, and (for services) restarts on notification:
//! - `package` - apt on the Debian family, yum on the RedHat family
//! - `file` / `directory` - nodes under the filesystem root
//! - `service` - systemd units
//! - `user` - system accounts from `/etc/passwd`
//! - `config-patch` - `KEY=value` lines in shell-style config files

pub mod config_patch;
pub mod file;
pub mod package;
pub mod service;
pub mod user;

use declarative::{Platform, Providers};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::runner::CommandRunner;

pub use config_patch::ConfigPatchProvider;
pub use file::FileProvider;
pub use package::PackageProvider;
pub use service::ServiceProvider;
pub use user::UserProvider;

/// Build the provider set for a validated platform
pub fn providers(platform: &Platform, root: &Path, runner: Arc<dyn CommandRunner>) -> Providers {
    log::debug!(
        "Using providers for {} under {}",
        platform.name(),
        root.display()
    );
    Providers {
        package: Box::new(PackageProvider::new(&platform.family, Arc::clone(&runner))),
        file: Box::new(FileProvider::file(root)),
        directory: Box::new(FileProvider::directory(root)),
        service: Box::new(ServiceProvider::new(Arc::clone(&runner))),
        user: Box::new(UserProvider::new(root, runner)),
        config_patch: Box::new(ConfigPatchProvider::new(root)),
    }
}

/// Resolve an absolute host path under the filesystem root
pub fn host_path(root: &Path, path: &str) -> PathBuf {
    root.join(path.trim_start_matches('/'))
}

/// Whether providers act on the live system rather than a sandbox
pub fn is_live_root(root: &Path) -> bool {
    root == Path::new("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::mock::ScriptedRunner;
    use declarative::{ResourceKind, ResourceProvider};

    #[test]
    fn test_host_path() {
        let root = Path::new("/tmp/sandbox");
        assert_eq!(
            host_path(root, "/etc/burp/burp.conf"),
            PathBuf::from("/tmp/sandbox/etc/burp/burp.conf")
        );
        assert_eq!(host_path(Path::new("/"), "/etc/burp"), PathBuf::from("/etc/burp"));
    }

    #[test]
    fn test_providers_cover_every_kind() {
        let platform = Platform {
            family: "Debian".into(),
            operating_system: Some("Ubuntu".into()),
        };
        let providers = providers(&platform, Path::new("/"), Arc::new(ScriptedRunner::new()));
        for kind in ResourceKind::ALL {
            assert_eq!(providers.for_kind(kind).kind(), kind);
        }
        assert!(providers.service.supports_refresh());
        assert!(!providers.package.supports_refresh());
    }
}
