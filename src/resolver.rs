//! Module home and init script resolution.
//!
//! Resolution is strict: the home must be named explicitly or through
//! `MODULESHOME`, and the init script search must land on exactly one file.
//! Several matches are reported back in full so the caller can pick one
//! explicitly; the resolver never chooses on their behalf.

use crate::environment::EnvStore;
use crate::error::{ModuleError, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Environment variable naming the module installation root.
pub const HOME_ENV_VAR: &str = "MODULESHOME";

/// Directory name that holds the tool's per-shell init scripts.
pub const INIT_DIR_NAME: &str = "init";

/// Init script flavour evaluated by `ShellDispatcher`.
pub const DEFAULT_INIT_PATTERN: &str = "bash";

#[derive(Clone, Debug, PartialEq, Eq)]
/// File-name glob (`*` and `?`) matched against files inside any `init/`
/// directory under the module home.
pub struct InitPattern(String);

impl Default for InitPattern {
    fn default() -> Self {
        InitPattern(DEFAULT_INIT_PATTERN.to_string())
    }
}

impl InitPattern {
    pub fn new(glob: impl Into<String>) -> Self {
        InitPattern(glob.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn matcher(&self) -> Result<Regex> {
        let mut source = String::from("^");
        for ch in self.0.chars() {
            match ch {
                '*' => source.push_str(".*"),
                '?' => source.push('.'),
                other => source.push_str(&regex::escape(&other.to_string())),
            }
        }
        source.push('$');
        Regex::new(&source).map_err(|source| ModuleError::InvalidPattern {
            pattern: self.0.clone(),
            source,
        })
    }
}

/// Determine the module home.
///
/// An explicit path wins; otherwise `MODULESHOME` is read from `env`. The
/// variable check happens before any filesystem access.
pub fn resolve_home(explicit: Option<&Path>, env: &dyn EnvStore) -> Result<PathBuf> {
    let home = match explicit {
        Some(path) => path.to_path_buf(),
        None => match env.var(HOME_ENV_VAR) {
            Some(value) if !value.trim().is_empty() => PathBuf::from(value),
            _ => return Err(ModuleError::Config { var: HOME_ENV_VAR }),
        },
    };
    if !home.is_dir() {
        return Err(ModuleError::NotFound {
            what: "Module home directory",
            path: home,
        });
    }
    log::debug!("module home resolved to {}", home.display());
    Ok(home)
}

/// Every file under `home` that lives in an `init/` directory and matches
/// `pattern`, sorted for stable reporting.
pub fn find_init_candidates(home: &Path, pattern: &InitPattern) -> Result<Vec<PathBuf>> {
    let matcher = pattern.matcher()?;
    let mut candidates = Vec::new();
    for entry in WalkDir::new(home) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                log::debug!("skipping unreadable entry while searching for init scripts: {err}");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let in_init_dir = entry
            .path()
            .parent()
            .and_then(Path::file_name)
            .is_some_and(|name| name == INIT_DIR_NAME);
        if !in_init_dir {
            continue;
        }
        if entry
            .file_name()
            .to_str()
            .is_some_and(|name| matcher.is_match(name))
        {
            candidates.push(entry.into_path());
        }
    }
    candidates.sort();
    Ok(candidates)
}

/// Pick the init script: the explicit path if given, else the single search
/// result under `home`.
pub fn resolve_init_file(
    home: &Path,
    explicit: Option<&Path>,
    pattern: &InitPattern,
) -> Result<PathBuf> {
    if let Some(path) = explicit {
        if !path.exists() {
            return Err(ModuleError::NotFound {
                what: "Module initialisation file",
                path: path.to_path_buf(),
            });
        }
        return Ok(path.to_path_buf());
    }

    let mut candidates = find_init_candidates(home, pattern)?;
    match candidates.len() {
        0 => Err(ModuleError::NotFound {
            what: "Module initialisation file",
            path: home.join("**").join(INIT_DIR_NAME).join(pattern.as_str()),
        }),
        1 => {
            let init_file = candidates.remove(0);
            log::debug!("init script resolved to {}", init_file.display());
            Ok(init_file)
        }
        _ => Err(ModuleError::Ambiguous { candidates }),
    }
}
