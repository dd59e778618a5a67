//! Error types for the declarative crate

use crate::types::ResourceId;
use thiserror::Error;

/// Malformed resource kind or id text
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("unknown resource kind '{0}'")]
    UnknownKind(String),

    #[error("malformed resource id '{0}' (expected kind:title)")]
    MalformedId(String),

    #[error("malformed relationship target '{0}' (expected kind:title or class:name)")]
    MalformedTarget(String),
}

/// The host platform is not supported by the policy
///
/// Carries the most specific platform name known (operating system, else
/// family, else "unknown").
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{name} not supported")]
pub struct UnsupportedPlatformError {
    pub name: String,
}

/// Invalid resource graph; detected before any side effect
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("duplicate declaration of {0}")]
    DuplicateResource(ResourceId),

    #[error("{subject} references undeclared {missing}")]
    DanglingReference { subject: String, missing: String },

    #[error("dependency cycle: {}", format_path(.path))]
    Cycle { path: Vec<ResourceId> },
}

fn format_path(path: &[ResourceId]) -> String {
    path.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Fatal errors that reject a whole run before anything is applied
#[derive(Error, Debug)]
pub enum RunError {
    #[error("failed to gather host facts: {0:#}")]
    Facts(anyhow::Error),

    #[error(transparent)]
    Platform(#[from] UnsupportedPlatformError),

    #[error(transparent)]
    Graph(#[from] GraphError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ResourceKind;

    #[test]
    fn test_unsupported_platform_message() {
        let err = UnsupportedPlatformError {
            name: "Nexenta".to_string(),
        };
        assert_eq!(err.to_string(), "Nexenta not supported");
    }

    #[test]
    fn test_cycle_message_lists_path() {
        let a = ResourceId::new(ResourceKind::Package, "a");
        let b = ResourceId::new(ResourceKind::File, "/b");
        let err = GraphError::Cycle {
            path: vec![a.clone(), b, a],
        };
        assert_eq!(
            err.to_string(),
            "dependency cycle: package:a -> file:/b -> package:a"
        );
    }

    #[test]
    fn test_run_error_is_transparent() {
        let err: RunError = UnsupportedPlatformError {
            name: "Solaris".to_string(),
        }
        .into();
        assert_eq!(err.to_string(), "Solaris not supported");
    }
}
