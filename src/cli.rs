use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

const EXIT_STATUS_HELP: &str = "\
Exit status:
  0  every resource unchanged or changed, every refresh succeeded
  1  unexpected error (unreadable manifest, I/O, aborted)
  2  usage error
  3  run rejected: unsupported platform or invalid graph (nothing applied)
  4  partial failure: some resources or refreshes failed";

#[derive(Parser)]
#[command(name = "converge")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Converge a host to a declared set of resources", long_about = None)]
#[command(after_help = EXIT_STATUS_HELP)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Bring the host to the state declared in a manifest
    #[command(after_help = EXIT_STATUS_HELP)]
    Apply(ApplyArgs),

    /// Validate a manifest and show the apply order without touching the host
    Plan(PlanArgs),

    /// Show the host facts the platform gate would see
    Facts(FactsArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Where facts come from and which filesystem root collaborators use
#[derive(Args, Debug, Clone)]
pub struct HostArgs {
    /// Filesystem root for all managed paths
    #[arg(long, default_value = "/", env = "CONVERGE_ROOT")]
    pub root: PathBuf,

    /// Override the detected OS family (e.g. Debian, RedHat)
    #[arg(long)]
    pub os_family: Option<String>,

    /// Override the detected operating system (e.g. Ubuntu, Nexenta)
    #[arg(long)]
    pub operating_system: Option<String>,
}

#[derive(Args, Debug)]
pub struct ApplyArgs {
    /// Path to the TOML manifest
    pub manifest: String,

    /// Show what would change without making changes
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Number of resources to apply in parallel
    #[arg(short, long, default_value = "1")]
    pub jobs: u16,

    /// Print the run summary as JSON
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub host: HostArgs,
}

#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Path to the TOML manifest
    pub manifest: String,

    #[command(flatten)]
    pub host: HostArgs,
}

#[derive(Args, Debug)]
pub struct FactsArgs {
    #[command(flatten)]
    pub host: HostArgs,

    /// Print facts as JSON
    #[arg(long)]
    pub json: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_apply_defaults() {
        let cli = Cli::parse_from(["converge", "apply", "manifests/burp.toml"]);
        let Command::Apply(args) = cli.command else {
            panic!("expected apply");
        };
        assert_eq!(args.manifest, "manifests/burp.toml");
        assert_eq!(args.jobs, 1);
        assert!(!args.dry_run);
        assert_eq!(args.host.root, PathBuf::from("/"));
        assert!(args.host.os_family.is_none());
    }

    #[test]
    fn test_apply_overrides() {
        let cli = Cli::parse_from([
            "converge",
            "-vv",
            "apply",
            "burp.toml",
            "--dry-run",
            "--jobs",
            "4",
            "--root",
            "/tmp/sandbox",
            "--os-family",
            "Solaris",
            "--operating-system",
            "Nexenta",
        ]);
        assert_eq!(cli.verbose, 2);
        let Command::Apply(args) = cli.command else {
            panic!("expected apply");
        };
        assert!(args.dry_run);
        assert_eq!(args.jobs, 4);
        assert_eq!(args.host.root, PathBuf::from("/tmp/sandbox"));
        assert_eq!(args.host.os_family.as_deref(), Some("Solaris"));
        assert_eq!(args.host.operating_system.as_deref(), Some("Nexenta"));
    }
}
