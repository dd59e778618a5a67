//! Manifest schema - TOML declarations for one convergence run
//!
//! ```toml
//! [platform.families]
//! Debian = "supported"
//!
//! [[class]]
//! name = "burp::service"
//! subscribe = ["class:burp::config"]
//!
//! [[resource]]
//! type = "service"
//! title = "burp"
//! class = "burp::service"
//! [resource.attributes]
//! ensure = "running"
//! ```

use anyhow::{Context, Result, bail};
use declarative::{
    Attributes, Declaration, PlatformPolicy, Relationship, Resource, ResourceKind, Target,
};
use serde::Deserialize;
use std::collections::HashSet;

/// A parsed manifest file
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    /// Replaces the default policy (Debian and RedHat) when present
    #[serde(default)]
    pub platform: Option<PlatformPolicy>,

    #[serde(default, rename = "class")]
    pub classes: Vec<ClassDecl>,

    #[serde(default, rename = "resource")]
    pub resources: Vec<ResourceDecl>,
}

/// A named group; its relationships apply to every member
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClassDecl {
    pub name: String,
    #[serde(default)]
    pub before: Vec<String>,
    #[serde(default)]
    pub require: Vec<String>,
    #[serde(default)]
    pub notify: Vec<String>,
    #[serde(default)]
    pub subscribe: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResourceDecl {
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    #[serde(default)]
    pub class: Option<String>,
    #[serde(default)]
    pub before: Vec<String>,
    #[serde(default)]
    pub require: Vec<String>,
    #[serde(default)]
    pub notify: Vec<String>,
    #[serde(default)]
    pub subscribe: Vec<String>,
    #[serde(default)]
    pub attributes: Attributes,
}

impl Manifest {
    /// Load a manifest; `~` and environment variables in the path are expanded
    pub fn load(path: &str) -> Result<Self> {
        let path = crate::paths::expand(path);
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Could not read manifest: {}", path.display()))?;
        let manifest = Self::parse(&content)
            .with_context(|| format!("Invalid manifest: {}", path.display()))?;
        log::debug!(
            "Loaded {} resources and {} classes from {}",
            manifest.resources.len(),
            manifest.classes.len(),
            path.display()
        );
        Ok(manifest)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let manifest: Self = toml::from_str(content).context("Invalid TOML format")?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Check shape only; references and cycles are checked by the graph
    pub fn validate(&self) -> Result<()> {
        let mut names = HashSet::new();
        for class in &self.classes {
            if class.name.trim().is_empty() {
                bail!("Class name cannot be empty");
            }
            if !names.insert(class.name.as_str()) {
                bail!("Class '{}' is declared more than once", class.name);
            }
        }

        for resource in &self.resources {
            resource
                .validate()
                .with_context(|| format!("Invalid resource '{}'", resource.title))?;
        }

        Ok(())
    }

    pub fn policy(&self) -> PlatformPolicy {
        self.platform.clone().unwrap_or_default()
    }

    /// Build the run's declaration
    pub fn declaration(&self) -> Result<Declaration> {
        let mut declaration = Declaration::new();

        for class in &self.classes {
            declaration = declaration.group(class.name.as_str());
            let subject = Target::Group(class.name.clone());
            for relationship in relationships(
                &subject,
                &class.before,
                &class.require,
                &class.notify,
                &class.subscribe,
            )
            .with_context(|| format!("Invalid relationship on class '{}'", class.name))?
            {
                declaration = declaration.relationship(relationship);
            }
        }

        for decl in &self.resources {
            let resource = decl.to_resource()?;
            let subject = Target::Resource(resource.id.clone());
            let links = relationships(
                &subject,
                &decl.before,
                &decl.require,
                &decl.notify,
                &decl.subscribe,
            )
            .with_context(|| format!("Invalid relationship on {}", resource.id))?;

            declaration = declaration.resource(resource);
            for relationship in links {
                declaration = declaration.relationship(relationship);
            }
        }

        Ok(declaration)
    }
}

impl ResourceDecl {
    fn validate(&self) -> Result<()> {
        self.kind.parse::<ResourceKind>()?;
        if self.title.trim().is_empty() {
            bail!("Resource title cannot be empty");
        }
        if let Some(class) = &self.class
            && class.trim().is_empty()
        {
            bail!("Class name cannot be empty");
        }
        Ok(())
    }

    fn to_resource(&self) -> Result<Resource> {
        let kind: ResourceKind = self.kind.parse()?;
        let mut resource = Resource::new(kind, self.title.as_str());
        resource.attributes = self.attributes.clone();
        if kind == ResourceKind::Directory && !resource.attributes.contains_key("ensure") {
            resource = resource.with("ensure", "directory");
        }
        if let Some(class) = &self.class {
            resource = resource.in_group(class.as_str());
        }
        Ok(resource)
    }
}

fn relationships(
    subject: &Target,
    before: &[String],
    require: &[String],
    notify: &[String],
    subscribe: &[String],
) -> Result<Vec<Relationship>> {
    let mut out = Vec::new();
    let shapes: [(&[String], fn(Target, Target) -> Relationship); 4] = [
        (before, |s, o| Relationship::before(s, o)),
        (require, |s, o| Relationship::requires(s, o)),
        (notify, |s, o| Relationship::notifies(s, o)),
        (subscribe, |s, o| Relationship::subscribes(s, o)),
    ];
    for (targets, make) in shapes {
        for target in targets {
            let object: Target = target.parse()?;
            out.push(make(subject.clone(), object));
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use declarative::{DependencyGraph, EdgeKind, ResourceId, Support};

    const CLIENT: &str = r#"
[[class]]
name = "burp::config"

[[class]]
name = "burp::service"
subscribe = ["class:burp::config"]

[[resource]]
type = "package"
title = "burp"
before = ["class:burp::config"]
[resource.attributes]
ensure = "present"

[[resource]]
type = "file"
title = "/etc/burp"
class = "burp::config"
[resource.attributes]
ensure = "directory"

[[resource]]
type = "service"
title = "burp"
class = "burp::service"
[resource.attributes]
ensure = "running"
"#;

    #[test]
    fn test_parse_client_manifest() {
        let manifest = Manifest::parse(CLIENT).unwrap();
        assert_eq!(manifest.classes.len(), 2);
        assert_eq!(manifest.resources.len(), 3);
        assert_eq!(manifest.policy(), PlatformPolicy::default());

        let decl = manifest.declaration().unwrap();
        assert_eq!(decl.resources.len(), 3);
        assert_eq!(decl.relationships.len(), 2);
        assert!(decl.has_group("burp::service"));
    }

    #[test]
    fn test_declaration_builds_graph() {
        let decl = Manifest::parse(CLIENT).unwrap().declaration().unwrap();
        let graph = DependencyGraph::build(&decl).unwrap();

        let order: Vec<String> = graph.ordered().map(|r| r.id.to_string()).collect();
        assert_eq!(order, vec!["package:burp", "file:/etc/burp", "service:burp"]);

        let notify = graph
            .edges()
            .iter()
            .filter(|e| e.kind == EdgeKind::Notify)
            .count();
        assert_eq!(notify, 1);
    }

    #[test]
    fn test_platform_section_replaces_default() {
        let manifest = Manifest::parse(
            r#"
[platform.families]
Debian = "supported"

[platform.operating_systems]
Nexenta = "unsupported"
"#,
        )
        .unwrap();
        let policy = manifest.policy();
        assert_eq!(policy.families.get("Debian"), Some(&Support::Supported));
        assert!(!policy.families.contains_key("RedHat"));
        assert_eq!(
            policy.operating_systems.get("Nexenta"),
            Some(&Support::Unsupported)
        );
    }

    #[test]
    fn test_augeas_alias_maps_to_config_patch() {
        let manifest = Manifest::parse(
            r#"
[[resource]]
type = "augeas"
title = "/etc/default/burp"
[resource.attributes]
RUN = "yes"
"#,
        )
        .unwrap();
        let decl = manifest.declaration().unwrap();
        assert_eq!(
            decl.resources[0].id,
            ResourceId::new(ResourceKind::ConfigPatch, "/etc/default/burp")
        );
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        let err = Manifest::parse(
            r#"
[[resource]]
type = "cron"
title = "nightly"
"#,
        )
        .unwrap_err();
        assert!(format!("{:#}", err).contains("cron"));
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        assert!(
            Manifest::parse(
                r#"
[[resource]]
type = "package"
title = "burp"
requires = ["file:/etc/burp"]
"#,
            )
            .is_err()
        );
    }

    #[test]
    fn test_duplicate_class_is_rejected() {
        let err = Manifest::parse(
            r#"
[[class]]
name = "burp::config"

[[class]]
name = "burp::config"
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn test_malformed_target_is_rejected() {
        let manifest = Manifest::parse(
            r#"
[[resource]]
type = "package"
title = "burp"
before = ["nonsense"]
"#,
        )
        .unwrap();
        assert!(manifest.declaration().is_err());
    }

    #[test]
    fn test_load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("burp.toml");
        std::fs::write(&path, CLIENT).unwrap();

        let manifest = Manifest::load(path.to_str().unwrap()).unwrap();
        assert_eq!(manifest.resources.len(), 3);
        assert!(Manifest::load("/nonexistent/burp.toml").is_err());
    }
}
