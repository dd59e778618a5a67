//! User resource - system accounts
//!
//! Observed from `<root>/etc/passwd`; changed with the shadow-utils tools,
//! which are pointed at the same root via `--root`.

use anyhow::{Context, Result, bail};
use declarative::{Attributes, Resource, ResourceKind, ResourceProvider};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::{host_path, is_live_root};
use crate::runner::CommandRunner;

/// One `/etc/passwd` entry
#[derive(Debug, Clone, PartialEq, Eq)]
struct PasswdEntry {
    home: String,
    shell: String,
}

fn find_entry(passwd: &str, name: &str) -> Option<PasswdEntry> {
    passwd.lines().find_map(|line| {
        let fields: Vec<&str> = line.split(':').collect();
        (fields.len() >= 7 && fields[0] == name).then(|| PasswdEntry {
            home: fields[5].to_string(),
            shell: fields[6].to_string(),
        })
    })
}

#[derive(Debug)]
pub struct UserProvider {
    root: PathBuf,
    runner: Arc<dyn CommandRunner>,
}

impl UserProvider {
    pub fn new(root: &Path, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            root: root.to_path_buf(),
            runner,
        }
    }

    fn lookup(&self, name: &str) -> Result<Option<PasswdEntry>> {
        let path = host_path(&self.root, "/etc/passwd");
        let passwd = match std::fs::read_to_string(&path) {
            Ok(passwd) => passwd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", path.display()));
            }
        };
        Ok(find_entry(&passwd, name))
    }

    /// `--root` for sandboxed runs
    fn base_args(&self) -> Vec<String> {
        if is_live_root(&self.root) {
            Vec::new()
        } else {
            vec!["--root".to_string(), self.root.display().to_string()]
        }
    }

    fn exec(&self, cmd: &str, args: Vec<String>) -> Result<()> {
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        self.runner.run(cmd, &args)
    }
}

impl ResourceProvider for UserProvider {
    fn kind(&self) -> ResourceKind {
        ResourceKind::User
    }

    fn read_observed(&self, resource: &Resource) -> Result<Attributes> {
        let mut observed = Attributes::new();
        match self.lookup(resource.title())? {
            Some(entry) => {
                observed.insert("ensure".into(), "present".into());
                observed.insert("home".into(), entry.home);
                observed.insert("shell".into(), entry.shell);
            }
            None => {
                observed.insert("ensure".into(), "absent".into());
            }
        }
        Ok(observed)
    }

    fn materialize(&self, resource: &Resource) -> Result<()> {
        let name = resource.title();
        let exists = self.lookup(name)?.is_some();
        let mut args = self.base_args();

        match resource.attribute("ensure").unwrap_or("present") {
            "absent" => {
                if exists {
                    args.push(name.to_string());
                    self.exec("userdel", args)?;
                    log::info!("Removed user {}", name);
                }
            }
            "present" => {
                let home_flag = if exists { "--home" } else { "--home-dir" };
                if let Some(home) = resource.attribute("home") {
                    args.extend([home_flag.to_string(), home.to_string()]);
                }
                if let Some(shell) = resource.attribute("shell") {
                    args.extend(["--shell".to_string(), shell.to_string()]);
                }

                if exists {
                    args.push(name.to_string());
                    self.exec("usermod", args)?;
                    log::info!("Updated user {}", name);
                } else {
                    args.push("--system".to_string());
                    args.push(name.to_string());
                    self.exec("useradd", args)?;
                    log::info!("Created user {}", name);
                }
            }
            other => bail!("Unsupported ensure value for {}: {}", resource.id, other),
        }

        Ok(())
    }
}
