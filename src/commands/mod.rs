//! Subcommand implementations

pub mod apply;
pub mod facts;
pub mod plan;

use anyhow::Result;
use declarative::{PlatformGate, Prepared, prepare};

use crate::cli::HostArgs;
use crate::schema::Manifest;

/// Exit status for a rejected run (unsupported platform or invalid graph)
pub const EXIT_REJECTED: u8 = 3;

/// Exit status for a run where some resources or refreshes failed
pub const EXIT_PARTIAL_FAILURE: u8 = 4;

/// Load a manifest and validate it against the host
///
/// Nothing on the host is changed; facts are read once.
pub fn load(manifest_path: &str, host: &HostArgs) -> Result<Prepared> {
    let manifest = Manifest::load(manifest_path)?;
    let declaration = manifest.declaration()?;
    let gate = PlatformGate::new(manifest.policy());
    let facts = crate::facts::provider(host);
    Ok(prepare(&declaration, facts.as_ref(), &gate)?)
}
