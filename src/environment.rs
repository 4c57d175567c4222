//! Environment stores and the module environment view.
//!
//! The module tool communicates through environment variables, so the bridge
//! treats the environment as an explicit dependency: `ProcessEnv` reads and
//! writes the real process table, `MemoryEnv` keeps an isolated copy that
//! tests (or callers juggling several independent module setups) can use.

use std::collections::BTreeMap;
use std::env;

/// Live mapping from module variable name to its current value.
pub type EnvironmentSnapshot = BTreeMap<String, String>;

/// Mutable key/value table the bridge reads from and writes back to.
pub trait EnvStore {
    fn var(&self, name: &str) -> Option<String>;

    /// Every variable currently set, used to seed child processes.
    fn vars(&self) -> Vec<(String, String)>;

    fn set_var(&mut self, name: &str, value: &str);

    fn remove_var(&mut self, name: &str);
}

/// The process-wide environment table.
///
/// Writes go through `std::env::set_var`/`remove_var`, which are only sound
/// while no other thread touches the environment. Construct and drive
/// `ProcessEnv`-backed modules from one thread at a time.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProcessEnv;

impl EnvStore for ProcessEnv {
    fn var(&self, name: &str) -> Option<String> {
        env::var(name).ok()
    }

    fn vars(&self) -> Vec<(String, String)> {
        env::vars_os()
            .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
            .collect()
    }

    fn set_var(&mut self, name: &str, value: &str) {
        // SAFETY: ProcessEnv documents that callers serialize environment access.
        unsafe { env::set_var(name, value) }
    }

    fn remove_var(&mut self, name: &str) {
        // SAFETY: see `set_var`.
        unsafe { env::remove_var(name) }
    }
}

/// In-memory environment, isolated from the process table.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MemoryEnv {
    vars: BTreeMap<String, String>,
}

impl MemoryEnv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy the current process environment.
    pub fn from_process() -> Self {
        ProcessEnv.vars().into_iter().collect()
    }

    pub fn with_var(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(name.into(), value.into());
        self
    }
}

impl FromIterator<(String, String)> for MemoryEnv {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            vars: iter.into_iter().collect(),
        }
    }
}

impl EnvStore for MemoryEnv {
    fn var(&self, name: &str) -> Option<String> {
        self.vars.get(name).cloned()
    }

    fn vars(&self) -> Vec<(String, String)> {
        self.vars
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    fn set_var(&mut self, name: &str, value: &str) {
        self.vars.insert(name.to_string(), value.to_string());
    }

    fn remove_var(&mut self, name: &str) {
        self.vars.remove(name);
    }
}

/// Build a fresh view restricted to `names`, omitting unset variables.
pub fn snapshot(env: &dyn EnvStore, names: &[String]) -> EnvironmentSnapshot {
    names
        .iter()
        .filter_map(|name| env.var(name).map(|value| (name.clone(), value)))
        .collect()
}
