//! Privilege check before touching the live system

use anyhow::{Result, bail};
use std::path::Path;

use crate::resource::is_live_root;

#[cfg(unix)]
pub fn is_root() -> bool {
    // SAFETY: geteuid has no preconditions and cannot fail
    unsafe { libc::geteuid() == 0 }
}

#[cfg(not(unix))]
pub fn is_root() -> bool {
    false
}

/// Refuse a real apply against `/` without root privileges
///
/// Dry runs and sandboxed roots are always allowed.
pub fn check(root: &Path, dry_run: bool) -> Result<()> {
    check_with(root, dry_run, is_root())
}

fn check_with(root: &Path, dry_run: bool, privileged: bool) -> Result<()> {
    if dry_run || privileged || !is_live_root(root) {
        return Ok(());
    }
    bail!("Applying to / requires root; re-run with sudo, use --dry-run, or pass --root")
}
