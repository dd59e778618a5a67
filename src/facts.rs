//! Host facts for the platform gate
//!
//! Facts come from `<root>/etc/os-release`, or from the command line when
//! `--os-family` is given. The gate sees one snapshot per run.

use anyhow::{Context, Result};
use declarative::{Facts, FactsProvider};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::cli::HostArgs;

/// Facts read from `/etc/os-release` under a filesystem root
#[derive(Debug, Clone)]
pub struct OsReleaseFacts {
    path: PathBuf,
}

impl OsReleaseFacts {
    pub fn new(root: &Path) -> Self {
        Self {
            path: root.join("etc").join("os-release"),
        }
    }

    /// Parse os-release text into facts
    pub fn parse(content: &str) -> Facts {
        let fields = parse_fields(content);

        let mut ids = Vec::new();
        if let Some(id) = fields.get("ID") {
            ids.push(id.as_str());
        }
        if let Some(like) = fields.get("ID_LIKE") {
            ids.extend(like.split_whitespace());
        }

        Facts {
            os_family: ids.into_iter().find_map(family_for).map(str::to_string),
            operating_system: nonblank(fields.get("NAME").map(String::as_str)),
        }
    }
}

impl FactsProvider for OsReleaseFacts {
    fn facts(&self) -> Result<Facts> {
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Could not read {}", self.path.display()))?;
        let facts = Self::parse(&content);
        log::debug!(
            "Detected os_family={:?} operating_system={:?}",
            facts.os_family,
            facts.operating_system
        );
        Ok(facts)
    }
}

/// Facts given on the command line; optionally merged over detected ones
#[derive(Debug, Clone)]
pub struct StaticFacts {
    os_family: Option<String>,
    operating_system: Option<String>,
    fallback: Option<OsReleaseFacts>,
}

impl StaticFacts {
    pub fn new(os_family: Option<String>, operating_system: Option<String>) -> Self {
        Self {
            os_family,
            operating_system,
            fallback: None,
        }
    }

    /// Fill fields not given from os-release
    pub fn with_fallback(mut self, fallback: OsReleaseFacts) -> Self {
        self.fallback = Some(fallback);
        self
    }
}

impl FactsProvider for StaticFacts {
    fn facts(&self) -> Result<Facts> {
        let detected = match &self.fallback {
            Some(fallback) if self.os_family.is_none() || self.operating_system.is_none() => {
                fallback.facts()?
            }
            _ => Facts::default(),
        };
        Ok(Facts {
            os_family: self.os_family.clone().or(detected.os_family),
            operating_system: self.operating_system.clone().or(detected.operating_system),
        })
    }
}

/// Facts source for a command: overrides when given, os-release otherwise
pub fn provider(host: &HostArgs) -> Box<dyn FactsProvider> {
    let detected = OsReleaseFacts::new(&host.root);
    let os_family = nonblank(host.os_family.as_deref());
    let operating_system = nonblank(host.operating_system.as_deref());
    if os_family.is_some() {
        // An explicit family never consults the host
        Box::new(StaticFacts::new(os_family, operating_system))
    } else if operating_system.is_some() {
        Box::new(StaticFacts::new(None, operating_system).with_fallback(detected))
    } else {
        Box::new(detected)
    }
}

fn nonblank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn family_for(id: &str) -> Option<&'static str> {
    match id.to_ascii_lowercase().as_str() {
        "debian" | "ubuntu" | "raspbian" => Some("Debian"),
        "rhel" | "centos" | "fedora" | "rocky" | "almalinux" | "ol" => Some("RedHat"),
        "sles" | "opensuse" | "suse" => Some("Suse"),
        "arch" => Some("Archlinux"),
        "alpine" => Some("Alpine"),
        _ => None,
    }
}

fn parse_fields(content: &str) -> HashMap<String, String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| {
            let value = value.trim().trim_matches('"').trim_matches('\'');
            (key.trim().to_string(), value.to_string())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const UBUNTU: &str = r#"
PRETTY_NAME="Ubuntu 24.04 LTS"
NAME="Ubuntu"
VERSION_ID="24.04"
ID=ubuntu
ID_LIKE=debian
"#;

    #[test]
    fn test_parse_ubuntu() {
        let facts = OsReleaseFacts::parse(UBUNTU);
        assert_eq!(facts.os_family.as_deref(), Some("Debian"));
        assert_eq!(facts.operating_system.as_deref(), Some("Ubuntu"));
    }

    #[test]
    fn test_parse_id_like_fallback() {
        let facts = OsReleaseFacts::parse("NAME=\"Linux Mint\"\nID=linuxmint\nID_LIKE=\"ubuntu debian\"\n");
        assert_eq!(facts.os_family.as_deref(), Some("Debian"));

        let facts = OsReleaseFacts::parse("NAME=\"Rocky Linux\"\nID=\"rocky\"\nID_LIKE=\"rhel centos fedora\"\n");
        assert_eq!(facts.os_family.as_deref(), Some("RedHat"));
    }

    #[test]
    fn test_parse_unknown_family() {
        let facts = OsReleaseFacts::parse("NAME=\"Nexenta\"\nID=nexenta\n");
        assert_eq!(facts.os_family, None);
        assert_eq!(facts.operating_system.as_deref(), Some("Nexenta"));
    }

    #[test]
    fn test_blank_name_is_unknown() {
        let facts = OsReleaseFacts::parse("NAME=\"\"\nID=nexenta\n");
        assert_eq!(facts.operating_system, None);
    }

    #[test]
    fn test_blank_override_falls_back_to_os_release() {
        let root = TempDir::new().unwrap();
        std::fs::create_dir_all(root.path().join("etc")).unwrap();
        std::fs::write(root.path().join("etc/os-release"), UBUNTU).unwrap();
        let host = HostArgs {
            root: root.path().to_path_buf(),
            os_family: Some(String::new()),
            operating_system: Some(" ".into()),
        };

        let facts = provider(&host).facts().unwrap();
        assert_eq!(facts.os_family.as_deref(), Some("Debian"));
        assert_eq!(facts.operating_system.as_deref(), Some("Ubuntu"));
    }

    #[test]
    fn test_reads_under_root() {
        let root = TempDir::new().unwrap();
        std::fs::create_dir_all(root.path().join("etc")).unwrap();
        std::fs::write(root.path().join("etc/os-release"), UBUNTU).unwrap();

        let facts = OsReleaseFacts::new(root.path()).facts().unwrap();
        assert_eq!(facts.os_family.as_deref(), Some("Debian"));
    }

    #[test]
    fn test_missing_os_release_is_an_error() {
        let root = TempDir::new().unwrap();
        assert!(OsReleaseFacts::new(root.path()).facts().is_err());
    }

    #[test]
    fn test_static_facts_override() {
        let root = TempDir::new().unwrap();
        let facts = StaticFacts::new(Some("Solaris".into()), Some("Nexenta".into()))
            .with_fallback(OsReleaseFacts::new(root.path()))
            .facts()
            .unwrap();
        assert_eq!(facts.os_family.as_deref(), Some("Solaris"));
        assert_eq!(facts.operating_system.as_deref(), Some("Nexenta"));
    }

    #[test]
    fn test_static_facts_fill_from_os_release() {
        let root = TempDir::new().unwrap();
        std::fs::create_dir_all(root.path().join("etc")).unwrap();
        std::fs::write(root.path().join("etc/os-release"), UBUNTU).unwrap();

        let facts = StaticFacts::new(None, Some("Debian".into()))
            .with_fallback(OsReleaseFacts::new(root.path()))
            .facts()
            .unwrap();
        assert_eq!(facts.os_family.as_deref(), Some("Debian"));
        assert_eq!(facts.operating_system.as_deref(), Some("Debian"));
    }
}
