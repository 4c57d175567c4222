use anyhow::{Context, Result, bail};
use modulebridge::{HOME_ENV_VAR, MemoryEnv};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

// Minimal stand-in for a module tool's bash integration: `module` edits
// LOADEDMODULES the way the real tool would and echoes its arguments for
// `show` so tests can check they arrive verbatim.
const FAKE_INIT_SCRIPT: &str = r#"export MODULEPATH="${MODULEPATH:-@HOME@/modulefiles}"
export MODULES_CMD="@HOME@/libexec/modulecmd.tcl"

module() {
    local cmd=$1
    shift
    case "$cmd" in
        load)
            local m
            for m in "$@"; do
                LOADEDMODULES="${LOADEDMODULES:+$LOADEDMODULES:}$m"
            done
            export LOADEDMODULES
            ;;
        unload)
            local remaining="" entry target skip
            local IFS=:
            for entry in ${LOADEDMODULES:-}; do
                skip=0
                for target in "$@"; do
                    if [ "$entry" = "$target" ]; then skip=1; fi
                done
                if [ "$skip" = 0 ]; then remaining="${remaining:+$remaining:}$entry"; fi
            done
            if [ -n "$remaining" ]; then
                export LOADEDMODULES="$remaining"
            else
                unset LOADEDMODULES
            fi
            ;;
        purge)
            unset LOADEDMODULES
            ;;
        list)
            if [ -z "${LOADEDMODULES:-}" ]; then
                echo "No Modulefiles Currently Loaded." >&2
            else
                echo "Currently Loaded Modulefiles: $LOADEDMODULES" >&2
            fi
            ;;
        show)
            printf '%s\n' "$@"
            ;;
        *)
            echo "ERROR: Invalid command '$cmd'" >&2
            return 1
            ;;
    esac
}
"#;

pub const FAKE_MAN_PAGE: &str = r#".TH MODULE 1 "2019-09-23" "4.3.0" "Environment Modules"
.SH NAME
.sp
module \- command interface to the Modules package
.SH OPTIONS
.sp
\fB\-\-debug\fP
.SS Module Sub\-Commands
.sp
\fBload\fP [\-\-auto] modulefile...
.sp
\fBlist\fP [\-t|\-l]
.sp
\fBshow\fP modulefile...
.sp
\fBis\-loaded\fP [modulefile...]
.SS Modulefiles
.sp
\fBnot\-a\-command\fP
.SH ENVIRONMENT
.sp
\fBLOADEDMODULES\fP
.sp
\fBMODULEPATH\fP
.SH SEE ALSO
.sp
\fBNOT_A_VAR\fP
"#;

/// Temporary module installation with one bash init script.
pub struct FakeHome {
    pub dir: TempDir,
}

impl FakeHome {
    pub fn new() -> Result<Self> {
        let dir = TempDir::new().context("failed to allocate fake module home")?;
        let home = Self { dir };
        home.write_init("4.3.0/init/bash", FAKE_INIT_SCRIPT)?;
        Ok(home)
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn write_init(&self, relative: &str, contents: &str) -> Result<PathBuf> {
        let path = self.path().join(relative);
        write_file(
            &path,
            &contents.replace("@HOME@", &self.path().to_string_lossy()),
        )?;
        Ok(path)
    }

    pub fn write_man_page(&self, contents: &str) -> Result<PathBuf> {
        let path = self.path().join("share/man/man1/module.1");
        write_file(&path, contents)?;
        Ok(path)
    }

    /// Isolated environment pointing MODULESHOME at this home.
    pub fn env(&self) -> MemoryEnv {
        base_env().with_var(HOME_ENV_VAR, self.path().to_string_lossy())
    }
}

/// Isolated environment carrying only the host PATH.
pub fn base_env() -> MemoryEnv {
    MemoryEnv::new().with_var("PATH", env::var("PATH").unwrap_or_default())
}

pub fn write_file(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))
}

/// Run a modulectl invocation that is expected to exit cleanly.
pub fn run_modulectl(mut cmd: Command) -> Result<Output> {
    let output = cmd.output().context("spawn modulectl")?;
    if !output.status.success() {
        bail!(
            "modulectl exited with {:?}: {}",
            output.status.code(),
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(output)
}
