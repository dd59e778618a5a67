//! Config patch resource - `KEY=value` assignments in shell-style files
//!
//! The title is the file; every attribute is one assignment. Matching lines
//! are rewritten in place, missing keys are appended, and everything else
//! in the file is left alone.

use anyhow::{Context, Result, anyhow};
use declarative::{Attributes, Resource, ResourceKind, ResourceProvider};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use super::host_path;

/// `[export] KEY=value`; groups: export prefix, key, raw value
fn assignment_pattern() -> Result<&'static Regex> {
    static PATTERN: LazyLock<Result<Regex, regex::Error>> = LazyLock::new(|| {
        Regex::new(r"^\s*(export\s+)?([A-Za-z_][A-Za-z0-9_]*)\s*=\s*(.*?)\s*$")
    });
    PATTERN
        .as_ref()
        .map_err(|e| anyhow!("invalid assignment pattern: {}", e))
}

/// Shell value as the shell would see it
fn unquote(value: &str) -> String {
    let value = value.trim();
    if let Some(inner) = value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')) {
        return inner.to_string();
    }
    let Some(inner) = value.strip_prefix('"').and_then(|v| v.strip_suffix('"')) else {
        return value.to_string();
    };

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(next @ ('"' | '\\' | '$' | '`')) => out.push(next),
                Some(next) => {
                    out.push('\\');
                    out.push(next);
                }
                None => out.push('\\'),
            },
            _ => out.push(c),
        }
    }
    out
}

/// Render a value so the shell reads it back unchanged
fn quote(value: &str) -> String {
    let plain = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_-./:,+=@%".contains(c));
    if plain {
        return value.to_string();
    }

    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        if matches!(c, '"' | '\\' | '$' | '`') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

fn assignment(export: bool, key: &str, value: &str) -> String {
    let prefix = if export { "export " } else { "" };
    format!("{}{}={}", prefix, key, quote(value))
}

/// Every assignment in a file; the last one for a key wins
fn assignments(pattern: &Regex, content: &str) -> Attributes {
    content
        .lines()
        .filter_map(|line| pattern.captures(line))
        .map(|caps| (caps[2].to_string(), unquote(&caps[3])))
        .collect()
}

/// Rewrite `content` so every desired key has its desired value
fn patch(pattern: &Regex, content: &str, desired: &Attributes) -> String {
    let mut written: Vec<&str> = Vec::new();
    let mut lines: Vec<String> = content
        .lines()
        .map(|line| {
            if let Some(caps) = pattern.captures(line)
                && let Some((key, value)) = desired.get_key_value(&caps[2])
            {
                written.push(key.as_str());
                assignment(caps.get(1).is_some(), key, &unquote(value))
            } else {
                line.to_string()
            }
        })
        .collect();

    for (key, value) in desired {
        if !written.contains(&key.as_str()) {
            lines.push(assignment(false, key, &unquote(value)));
        }
    }

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

#[derive(Debug, Clone)]
pub struct ConfigPatchProvider {
    root: PathBuf,
}

impl ConfigPatchProvider {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    fn read(&self, path: &Path) -> Result<String> {
        match std::fs::read_to_string(path) {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
        }
    }
}

impl ResourceProvider for ConfigPatchProvider {
    fn kind(&self) -> ResourceKind {
        ResourceKind::ConfigPatch
    }

    fn read_observed(&self, resource: &Resource) -> Result<Attributes> {
        let path = host_path(&self.root, resource.title());
        Ok(assignments(assignment_pattern()?, &self.read(&path)?))
    }

    fn in_sync(&self, _attribute: &str, desired: &str, observed: &str) -> bool {
        unquote(desired) == unquote(observed)
    }

    fn materialize(&self, resource: &Resource) -> Result<()> {
        let path = host_path(&self.root, resource.title());
        let patched = patch(
            assignment_pattern()?,
            &self.read(&path)?,
            &resource.attributes,
        );

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }
        std::fs::write(&path, patched)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        log::info!(
            "Patched {} ({} keys)",
            path.display(),
            resource.attributes.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use declarative::ResourceDiff;
    use tempfile::TempDir;

    const DEFAULT_BURP: &str = "\
# Defaults for burp
RUN=no
DAEMON_ARGS=\"-c /etc/burp/burp-server.conf\"
";

    #[test]
    fn test_assignments() {
        let found = assignments(assignment_pattern().unwrap(), DEFAULT_BURP);
        assert_eq!(found.get("RUN").map(String::as_str), Some("no"));
        assert_eq!(
            found.get("DAEMON_ARGS").map(String::as_str),
            Some("-c /etc/burp/burp-server.conf")
        );
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn test_patch_rewrites_and_appends() {
        let desired = Attributes::from([
            ("RUN".to_string(), "yes".to_string()),
            ("NICE".to_string(), "10".to_string()),
        ]);
        let patched = patch(assignment_pattern().unwrap(), DEFAULT_BURP, &desired);
        assert_eq!(
            patched,
            "# Defaults for burp\nRUN=yes\nDAEMON_ARGS=\"-c /etc/burp/burp-server.conf\"\nNICE=10\n"
        );
    }

    #[test]
    fn test_converges_default_file() {
        let root = TempDir::new().unwrap();
        std::fs::create_dir_all(root.path().join("etc/default")).unwrap();
        std::fs::write(root.path().join("etc/default/burp"), DEFAULT_BURP).unwrap();

        let provider = ConfigPatchProvider::new(root.path());
        let r = Resource::new(ResourceKind::ConfigPatch, "/etc/default/burp").with("RUN", "yes");

        assert!(!ResourceDiff::observe(&provider, &r).unwrap().is_in_sync());
        provider.materialize(&r).unwrap();
        assert!(ResourceDiff::observe(&provider, &r).unwrap().is_in_sync());

        let content = std::fs::read_to_string(root.path().join("etc/default/burp")).unwrap();
        assert!(content.starts_with("# Defaults for burp\nRUN=yes\n"));
    }

    #[test]
    fn test_creates_missing_file() {
        let root = TempDir::new().unwrap();
        let provider = ConfigPatchProvider::new(root.path());
        let r = Resource::new(ResourceKind::ConfigPatch, "/etc/default/burp").with("RUN", "yes");

        provider.materialize(&r).unwrap();
        assert_eq!(
            std::fs::read_to_string(root.path().join("etc/default/burp")).unwrap(),
            "RUN=yes\n"
        );
    }

    #[test]
    fn test_values_with_spaces_stay_quoted() {
        let root = TempDir::new().unwrap();
        std::fs::create_dir_all(root.path().join("etc/default")).unwrap();
        std::fs::write(
            root.path().join("etc/default/burp"),
            "export DAEMON_ARGS=\"-c /etc/burp/burp.conf\"\n",
        )
        .unwrap();

        let provider = ConfigPatchProvider::new(root.path());
        let r = Resource::new(ResourceKind::ConfigPatch, "/etc/default/burp")
            .with("DAEMON_ARGS", "-c /etc/burp/burp-server.conf")
            .with("MOTD", "it's $HOME");

        provider.materialize(&r).unwrap();
        assert_eq!(
            std::fs::read_to_string(root.path().join("etc/default/burp")).unwrap(),
            "export DAEMON_ARGS=\"-c /etc/burp/burp-server.conf\"\nMOTD=\"it's \\$HOME\"\n"
        );
        assert!(ResourceDiff::observe(&provider, &r).unwrap().is_in_sync());
    }

    #[test]
    fn test_quote() {
        assert_eq!(quote("yes"), "yes");
        assert_eq!(quote("/etc/burp/burp.conf"), "/etc/burp/burp.conf");
        assert_eq!(quote(""), "\"\"");
        assert_eq!(quote("-c a b"), "\"-c a b\"");
        assert_eq!(unquote(&quote("say \"hi\" `now`")), "say \"hi\" `now`");
    }

    #[test]
    fn test_quotes_are_equivalent() {
        let provider = ConfigPatchProvider::new(Path::new("/"));
        assert!(provider.in_sync("RUN", "yes", "\"yes\""));
        assert!(!provider.in_sync("RUN", "yes", "no"));
    }
}
