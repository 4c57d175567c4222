//! Bootstraps and drives the module tool's dispatcher.
//!
//! The tool's init script defines a `module` shell function that knows how
//! to reach the real command (usually `modulecmd` or `lmod`) and how to apply
//! its output to the environment. The bridge never evaluates that script in
//! its own process. Bootstrap sources it exactly once, inside a fresh
//! non-interactive shell seeded from the bridge's environment store, then
//! keeps two things: the environment the script exported (written back into
//! the store) and the shell functions it defined (`declare -f`). Dispatches
//! replay only those function definitions in a new shell, so top-level side
//! effects of the init script never run again.
//!
//! Environment exchange uses a NUL-separated dump written by the child into
//! a private temp file. The dump starts with a fixed header record so an
//! early exit (missing dispatcher, broken init script) cannot be mistaken
//! for an empty environment.

use crate::environment::EnvStore;
use crate::error::{ModuleError, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tempfile::NamedTempFile;

/// Name of the function the init script must define.
pub const DISPATCHER_FUNCTION: &str = "module";

const DUMP_HEADER: &str = "modulebridge-env-v1";

// Shell bookkeeping that changes on every run and must not leak back.
const IGNORED_VARS: &[&str] = &["_", "SHLVL", "PWD", "OLDPWD"];

// $1 env dump, $2 init script, $3 function dump.
const BOOTSTRAP_SCRIPT: &str = r#"__mb_dump=$1
__mb_init=$2
__mb_funcs=$3
set --
. "$__mb_init"
if ! type module >/dev/null 2>&1; then
    echo "init script did not define 'module'" >&2
    exit 127
fi
declare -f > "$__mb_funcs"
{
    printf '%s\0' "modulebridge-env-v1"
    for __mb_name in $(compgen -e); do
        printf '%s=%s\0' "$__mb_name" "${!__mb_name}"
    done
} > "$__mb_dump"
"#;

// $1 env dump, $2 captured function definitions, remaining args go to
// `module`. The dump is written from the EXIT trap so a dispatcher that
// calls `exit` still reports its environment and status.
const DISPATCH_SCRIPT: &str = r#"__mb_dump=$1
eval "$2"
shift 2
if ! type module >/dev/null 2>&1; then
    echo "dispatcher 'module' is no longer defined" >&2
    exit 127
fi
__mb_write_dump() {
    {
        printf '%s\0' "modulebridge-env-v1"
        for __mb_name in $(compgen -e); do
            printf '%s=%s\0' "$__mb_name" "${!__mb_name}"
        done
    } > "$__mb_dump"
}
trap __mb_write_dump EXIT
module "$@"
"#;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
/// What a dispatched sub-command produced, passed back verbatim.
pub struct DispatchOutput {
    /// Exit code, `None` when the child was killed by a signal.
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl DispatchOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }
}

/// Invokes the module tool for one sub-command.
///
/// Implementations receive the environment store so changes made by the tool
/// (loaded modules, `MODULEPATH` edits) become visible to later calls.
pub trait Dispatcher {
    fn dispatch(
        &mut self,
        sub_command: &str,
        args: &[String],
        env: &mut dyn EnvStore,
    ) -> Result<DispatchOutput>;
}

#[derive(Clone, Debug)]
/// Dispatcher backed by the functions the tool's shell init script defines.
pub struct ShellDispatcher {
    shell: PathBuf,
    init_file: PathBuf,
    functions: String,
}

impl ShellDispatcher {
    /// Source `init_file` once, check that it defines `module`, capture its
    /// shell functions, and apply the environment changes sourcing made.
    pub fn bootstrap(init_file: &Path, shell: &Path, env: &mut dyn EnvStore) -> Result<Self> {
        let script = fs::read_to_string(init_file)
            .map_err(|err| ModuleError::io(format!("reading {}", init_file.display()), err))?;
        log::debug!(
            "bootstrapping module dispatcher from {} ({} bytes) with {}",
            init_file.display(),
            script.len(),
            shell.display()
        );

        let functions_dump = NamedTempFile::new()
            .map_err(|err| ModuleError::io("creating function dump file", err))?;
        let leading = [init_file.as_os_str(), functions_dump.path().as_os_str()];
        let run = spawn(shell, BOOTSTRAP_SCRIPT, &leading, &[], env)?;
        let output = run.into_output(init_file)?;
        if !output.stdout.trim().is_empty() || !output.stderr.trim().is_empty() {
            log::debug!(
                "init script output:\nstdout: {}\nstderr: {}",
                output.stdout.trim(),
                output.stderr.trim()
            );
        }

        let functions = fs::read_to_string(functions_dump.path())
            .map_err(|err| ModuleError::io("reading function dump", err))?;
        log::info!("module dispatcher ready from {}", init_file.display());
        Ok(Self {
            shell: shell.to_path_buf(),
            init_file: init_file.to_path_buf(),
            functions,
        })
    }

    pub fn init_file(&self) -> &Path {
        &self.init_file
    }

    pub fn shell(&self) -> &Path {
        &self.shell
    }

    /// Shell function definitions captured at bootstrap.
    pub fn functions(&self) -> &str {
        &self.functions
    }
}

impl Dispatcher for ShellDispatcher {
    fn dispatch(
        &mut self,
        sub_command: &str,
        args: &[String],
        env: &mut dyn EnvStore,
    ) -> Result<DispatchOutput> {
        log::debug!("module {sub_command} {}", args.join(" "));
        let mut argv: Vec<&str> = Vec::with_capacity(args.len() + 1);
        argv.push(sub_command);
        argv.extend(args.iter().map(String::as_str));

        let leading = [OsStr::new(&self.functions)];
        let run = spawn(&self.shell, DISPATCH_SCRIPT, &leading, &argv, env)?;
        run.into_output(&self.init_file)
    }
}

/// Result of one child shell run, before the dump has been checked.
struct ShellRun {
    output: DispatchOutput,
    dumped: bool,
}

impl ShellRun {
    fn into_output(self, init_file: &Path) -> Result<DispatchOutput> {
        if !self.dumped {
            return Err(ModuleError::Initialization {
                init_file: init_file.to_path_buf(),
                detail: failure_detail(&self.output),
            });
        }
        Ok(self.output)
    }
}

/// Run `script` as `shell -c script modulebridge <dump> <leading...> <args...>`
/// with the store as its whole environment, and apply the dumped environment
/// back to the store when the child wrote one.
fn spawn(
    shell: &Path,
    script: &str,
    leading: &[&OsStr],
    args: &[&str],
    env: &mut dyn EnvStore,
) -> Result<ShellRun> {
    let dump = NamedTempFile::new()
        .map_err(|err| ModuleError::io("creating environment dump file", err))?;

    let mut command = Command::new(shell);
    command
        .arg("--noprofile")
        .arg("--norc")
        .arg("-c")
        .arg(script)
        .arg("modulebridge")
        .arg(dump.path())
        .args(leading)
        .args(args)
        .env_clear()
        .envs(env.vars())
        .stdin(Stdio::null());

    let output = command
        .output()
        .map_err(|err| ModuleError::io(format!("running {}", shell.display()), err))?;
    let result = DispatchOutput {
        status: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    };

    let raw =
        fs::read(dump.path()).map_err(|err| ModuleError::io("reading environment dump", err))?;
    let Some(child_env) = parse_env_dump(&raw) else {
        return Ok(ShellRun {
            output: result,
            dumped: false,
        });
    };
    let changed = apply_env(env, &child_env);
    log::debug!("{changed} environment variable(s) updated by the module tool");
    Ok(ShellRun {
        output: result,
        dumped: true,
    })
}

fn failure_detail(output: &DispatchOutput) -> String {
    let stderr = output.stderr.trim();
    match (output.status, stderr.is_empty()) {
        (Some(code), true) => format!("shell exited with status {code}"),
        (Some(code), false) => format!("shell exited with status {code}: {stderr}"),
        (None, _) => "shell terminated by signal".to_string(),
    }
}

/// Decode a dump written by a driver script, `None` if the header is missing.
fn parse_env_dump(raw: &[u8]) -> Option<BTreeMap<String, String>> {
    let mut records = raw.split(|byte| *byte == 0);
    if records.next()? != DUMP_HEADER.as_bytes() {
        return None;
    }
    let vars = records
        .filter(|record| !record.is_empty())
        .filter_map(|record| std::str::from_utf8(record).ok())
        .filter_map(|record| record.split_once('='))
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect();
    Some(vars)
}

/// Make `env` match `child_env`, returning how many variables changed.
///
/// Only names a shell can export are removed; anything else in the store was
/// invisible to the child and is left alone.
fn apply_env(env: &mut dyn EnvStore, child_env: &BTreeMap<String, String>) -> usize {
    let mut changed = 0;
    for (name, value) in child_env {
        if IGNORED_VARS.contains(&name.as_str()) {
            continue;
        }
        if env.var(name).as_deref() != Some(value.as_str()) {
            env.set_var(name, value);
            changed += 1;
        }
    }

    let removed: Vec<String> = env
        .vars()
        .into_iter()
        .map(|(name, _)| name)
        .filter(|name| {
            is_shell_identifier(name)
                && !IGNORED_VARS.contains(&name.as_str())
                && !child_env.contains_key(name)
        })
        .collect();
    for name in &removed {
        env.remove_var(name);
    }
    changed + removed.len()
}

fn is_shell_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|first| first == '_' || first.is_ascii_alphabetic())
        && chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::MemoryEnv;

    #[test]
    fn dump_without_header_is_rejected() {
        assert_eq!(parse_env_dump(b""), None);
        assert_eq!(parse_env_dump(b"A=1\0"), None);
    }

    #[test]
    fn dump_keeps_values_with_equals_and_newlines() {
        let raw = b"modulebridge-env-v1\0A=x=y\0B=line1\nline2\0";
        let vars = parse_env_dump(raw).expect("header present");
        assert_eq!(vars.get("A").map(String::as_str), Some("x=y"));
        assert_eq!(vars.get("B").map(String::as_str), Some("line1\nline2"));
    }

    #[test]
    fn driver_scripts_share_the_dump_header() {
        assert!(BOOTSTRAP_SCRIPT.contains(DUMP_HEADER));
        assert!(DISPATCH_SCRIPT.contains(DUMP_HEADER));
        assert!(!DISPATCH_SCRIPT.contains("__mb_init"));
    }

    #[test]
    fn apply_env_sets_changes_and_removes_unset_names() {
        let mut env = MemoryEnv::new()
            .with_var("KEEP", "same")
            .with_var("GONE", "old")
            .with_var("PWD", "/somewhere")
            .with_var("weird-name", "kept");
        let child: BTreeMap<String, String> = [
            ("KEEP", "same"),
            ("LOADEDMODULES", "gcc/12"),
            ("SHLVL", "2"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let changed = apply_env(&mut env, &child);
        assert_eq!(changed, 2);
        assert_eq!(env.var("LOADEDMODULES").as_deref(), Some("gcc/12"));
        assert_eq!(env.var("GONE"), None);
        assert_eq!(env.var("PWD").as_deref(), Some("/somewhere"));
        assert_eq!(env.var("SHLVL"), None);
        assert_eq!(env.var("weird-name").as_deref(), Some("kept"));
    }

    #[test]
    fn shell_identifiers() {
        assert!(is_shell_identifier("_LMFILES_"));
        assert!(is_shell_identifier("MODULEPATH"));
        assert!(!is_shell_identifier("1ABC"));
        assert!(!is_shell_identifier("BASH_FUNC_module%%"));
        assert!(!is_shell_identifier(""));
    }

    #[test]
    fn failure_detail_includes_stderr() {
        let output = DispatchOutput {
            status: Some(127),
            stdout: String::new(),
            stderr: "init script did not define 'module'\n".to_string(),
        };
        assert_eq!(
            failure_detail(&output),
            "shell exited with status 127: init script did not define 'module'"
        );
    }
}
