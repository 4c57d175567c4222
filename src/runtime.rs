//! Executable lookup shared by the dispatcher and the CLI.
//!
//! Lookups consult the bridge's environment store rather than the process
//! table so a `MemoryEnv`-backed module resolves its shell from the same
//! `PATH` its child processes will see.

use crate::environment::EnvStore;
use crate::error::{ModuleError, Result};
use std::env;
use std::path::{Path, PathBuf};

/// Environment variable overriding the shell used to evaluate init scripts.
pub const SHELL_ENV_VAR: &str = "MODULEBRIDGE_SHELL";

/// Shell used when neither the caller nor `MODULEBRIDGE_SHELL` names one.
pub const DEFAULT_SHELL: &str = "bash";

/// Whether `path` names a regular file the shell could be launched from.
#[cfg(unix)]
pub fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .is_ok_and(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
pub fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Find an executable by name on the `PATH` held in `env`.
pub fn find_on_path(name: &str, env: &dyn EnvStore) -> Option<PathBuf> {
    let paths = env.var("PATH")?;
    env::split_paths(&paths)
        .map(|dir| dir.join(name))
        .find(|candidate| is_executable(candidate))
}

/// Resolve the shell program.
///
/// Explicit choice first, then `MODULEBRIDGE_SHELL`, then `bash`. Values
/// containing a path separator are used as paths; bare names go through
/// `PATH`.
pub fn resolve_shell(explicit: Option<&Path>, env: &dyn EnvStore) -> Result<PathBuf> {
    let requested = match explicit {
        Some(path) => path.to_path_buf(),
        None => env
            .var(SHELL_ENV_VAR)
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SHELL)),
    };

    if requested.components().count() > 1 || requested.is_absolute() {
        if is_executable(&requested) {
            return Ok(requested);
        }
    } else if let Some(found) = requested
        .to_str()
        .and_then(|name| find_on_path(name, env))
    {
        return Ok(found);
    }

    Err(ModuleError::NotFound {
        what: "Shell executable",
        path: requested,
    })
}
