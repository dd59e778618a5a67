//! File and directory resources under a filesystem root
//!
//! Attributes:
//! - `ensure`: `file`, `directory`, `present` (any existing node) or `absent`
//!
//! A symlink is managed through its target, so `mode` and `content` describe
//! the file it points to. With `ensure = absent` the other attributes are
//! ignored.
//! - `content`: exact file content, compared by blake3 digest
//! - `mode`: octal permission bits, e.g. `0755` (unix only)

use anyhow::{Context, Result, bail};
use declarative::{Attributes, Resource, ResourceKind, ResourceProvider};
use std::fs;
use std::path::{Path, PathBuf};

use super::host_path;

#[derive(Debug, Clone)]
pub struct FileProvider {
    kind: ResourceKind,
    root: PathBuf,
}

impl FileProvider {
    pub fn file(root: &Path) -> Self {
        Self {
            kind: ResourceKind::File,
            root: root.to_path_buf(),
        }
    }

    /// Directory kind: `ensure` defaults to `directory`
    pub fn directory(root: &Path) -> Self {
        Self {
            kind: ResourceKind::Directory,
            root: root.to_path_buf(),
        }
    }

    fn path(&self, resource: &Resource) -> PathBuf {
        host_path(&self.root, resource.title())
    }

    fn ensure<'r>(&self, resource: &'r Resource) -> &'r str {
        match (resource.attribute("ensure"), self.kind) {
            (Some(ensure), _) => ensure,
            (None, ResourceKind::Directory) => "directory",
            (None, _) => "file",
        }
    }
}

fn digest(content: &[u8]) -> String {
    blake3::hash(content).to_hex().to_string()
}

fn parse_mode(mode: &str) -> Option<u32> {
    u32::from_str_radix(mode.trim_start_matches("0o"), 8).ok()
}

impl ResourceProvider for FileProvider {
    fn kind(&self) -> ResourceKind {
        self.kind
    }

    fn read_observed(&self, resource: &Resource) -> Result<Attributes> {
        let path = self.path(resource);
        let mut observed = Attributes::new();

        let metadata = match node_metadata(&path)? {
            Node::Absent => {
                observed.insert("ensure".into(), "absent".into());
                // Nothing else can be wrong with a node that should not exist
                if self.ensure(resource) == "absent" {
                    for (name, value) in &resource.attributes {
                        observed.entry(name.clone()).or_insert_with(|| value.clone());
                    }
                }
                return Ok(observed);
            }
            Node::DanglingLink => {
                observed.insert("ensure".into(), "link".into());
                return Ok(observed);
            }
            Node::Present(metadata) => metadata,
        };

        let ensure = if metadata.is_dir() { "directory" } else { "file" };
        observed.insert("ensure".into(), ensure.into());

        if metadata.is_file() && resource.attribute("content").is_some() {
            let content =
                fs::read(&path).with_context(|| format!("Failed to read {}", path.display()))?;
            observed.insert("content".into(), digest(&content));
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = metadata.permissions().mode() & 0o7777;
            observed.insert("mode".into(), format!("{:04o}", mode));
        }

        Ok(observed)
    }

    fn in_sync(&self, attribute: &str, desired: &str, observed: &str) -> bool {
        match attribute {
            "ensure" => match desired {
                "present" => observed != "absent",
                _ => desired == observed,
            },
            // observed content is a digest
            "content" => digest(desired.as_bytes()) == observed,
            "mode" => parse_mode(desired).is_some() && parse_mode(desired) == parse_mode(observed),
            _ => desired == observed,
        }
    }

    fn materialize(&self, resource: &Resource) -> Result<()> {
        let path = self.path(resource);

        match self.ensure(resource) {
            "absent" => {
                let link = fs::symlink_metadata(&path).ok();
                if link.as_ref().is_some_and(|m| m.is_dir()) {
                    fs::remove_dir(&path).with_context(|| {
                        format!("Failed to remove directory {} (not empty?)", path.display())
                    })?;
                } else if link.is_some() {
                    fs::remove_file(&path)
                        .with_context(|| format!("Failed to remove {}", path.display()))?;
                }
                log::info!("Removed {}", path.display());
                return Ok(());
            }
            "directory" => {
                if path.exists() && !path.is_dir() {
                    bail!("{} exists and is not a directory", path.display());
                }
                fs::create_dir_all(&path)
                    .with_context(|| format!("Failed to create directory {}", path.display()))?;
            }
            "file" | "present" => {
                if path.is_dir() {
                    if self.ensure(resource) == "file" {
                        bail!("{} is a directory", path.display());
                    }
                } else {
                    write_file(&path, resource.attribute("content"))?;
                }
            }
            other => bail!("Unsupported ensure value for {}: {}", resource.id, other),
        }

        if let Some(mode) = resource.attribute("mode") {
            set_mode(&path, mode)?;
        }

        Ok(())
    }
}

/// What sits at a managed path; symlinks are followed to their target
enum Node {
    Absent,
    DanglingLink,
    Present(fs::Metadata),
}

fn node_metadata(path: &Path) -> Result<Node> {
    let link = match fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Node::Absent),
        Err(e) => return Err(e).with_context(|| format!("Failed to stat {}", path.display())),
    };
    if !link.file_type().is_symlink() {
        return Ok(Node::Present(link));
    }
    match fs::metadata(path) {
        Ok(target) => Ok(Node::Present(target)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Node::DanglingLink),
        Err(e) => Err(e).with_context(|| format!("Failed to stat {}", path.display())),
    }
}

fn write_file(path: &Path, content: Option<&str>) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }

    match content {
        Some(content) => {
            fs::write(path, content)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            log::info!("Wrote {}", path.display());
        }
        None if !path.exists() => {
            fs::write(path, "").with_context(|| format!("Failed to create {}", path.display()))?;
            log::info!("Created {}", path.display());
        }
        None => {}
    }
    Ok(())
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: &str) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let Some(bits) = parse_mode(mode) else {
        bail!("Invalid mode '{}' for {}", mode, path.display());
    };
    fs::set_permissions(path, fs::Permissions::from_mode(bits))
        .with_context(|| format!("Failed to set mode {} on {}", mode, path.display()))
}

#[cfg(not(unix))]
fn set_mode(path: &Path, mode: &str) -> Result<()> {
    log::warn!("Ignoring mode {} for {} on this platform", mode, path.display());
    Ok(())
}
