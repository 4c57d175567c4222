//! Error taxonomy for the module bridge.
//!
//! Every failure is synchronous and surfaces to the immediate caller. The
//! only silent degradation in the crate is documentation parsing, which
//! reports through `ParseReport` instead of erroring.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while resolving, bootstrapping, or driving the module tool.
#[derive(Debug, Error)]
pub enum ModuleError {
    /// The module home could not be determined.
    #[error(
        "Cannot determine the module home directory: environment variable {var} is unset. Pass the module home directory explicitly."
    )]
    Config { var: &'static str },

    /// A required file or directory is missing.
    #[error("{what} not found: {}", path.display())]
    NotFound { what: &'static str, path: PathBuf },

    /// More than one init script matched and none was requested explicitly.
    #[error("Multiple possible module initialisation files found: {}", join_paths(candidates))]
    Ambiguous { candidates: Vec<PathBuf> },

    /// The init script ran but did not provide a usable dispatcher.
    #[error("The module environment could not be initialised from {}: {detail}", init_file.display())]
    Initialization { init_file: PathBuf, detail: String },

    /// A forwarded call named something outside the current capability set.
    #[error("Module has no such sub-command '{name}'")]
    UnknownSubCommand { name: String },

    /// The init-script glob could not be turned into a matcher.
    #[error("Invalid init script pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
}

impl ModuleError {
    pub(crate) fn io(context: impl Into<String>, source: io::Error) -> Self {
        ModuleError::Io {
            context: context.into(),
            source,
        }
    }
}

fn join_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result alias used throughout the library.
pub type Result<T> = std::result::Result<T, ModuleError>;
