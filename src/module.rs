//! The `Module` facade.
//!
//! A `Module` ties together the resolved home and init script, the
//! bootstrapped dispatcher, the environment store, and the current
//! capability set. Sub-commands are looked up by name in the capability set
//! and forwarded to the dispatcher with their arguments untouched; the typed
//! helpers (`load`, `list`, ...) go through the same lookup.

use crate::capabilities::CapabilitySet;
use crate::dispatcher::{DispatchOutput, Dispatcher, ShellDispatcher};
use crate::environment::{EnvStore, EnvironmentSnapshot, ProcessEnv, snapshot};
use crate::error::{ModuleError, Result};
use crate::manpage::{self, ParseReport, SectionStatus};
use crate::resolver::{InitPattern, resolve_home, resolve_init_file};
use crate::runtime::resolve_shell;
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Clone, Debug, Default)]
/// Construction overrides. Anything left `None` is discovered.
pub struct ModuleOptions {
    /// Module installation root; defaults to `MODULESHOME`.
    pub home: Option<PathBuf>,
    /// Init script; defaults to the single match of `init_pattern`.
    pub init_file: Option<PathBuf>,
    pub init_pattern: InitPattern,
    /// Shell evaluating the init script; defaults to `MODULEBRIDGE_SHELL`
    /// or `bash`.
    pub shell: Option<PathBuf>,
}

impl ModuleOptions {
    pub fn with_home(mut self, home: impl Into<PathBuf>) -> Self {
        self.home = Some(home.into());
        self
    }

    pub fn with_init_file(mut self, init_file: impl Into<PathBuf>) -> Self {
        self.init_file = Some(init_file.into());
        self
    }

    pub fn with_init_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.init_pattern = InitPattern::new(pattern);
        self
    }

    pub fn with_shell(mut self, shell: impl Into<PathBuf>) -> Self {
        self.shell = Some(shell.into());
        self
    }
}

/// Programmatic handle on the `module` command.
///
/// Each instance owns its dispatcher. With the default `ProcessEnv` store,
/// sub-commands write to the process environment, so instances must be
/// created and driven from one thread at a time; use `Module::with_env` and
/// a `MemoryEnv` to keep an instance isolated.
pub struct Module {
    home: PathBuf,
    init_file: PathBuf,
    capabilities: CapabilitySet,
    dispatcher: Box<dyn Dispatcher>,
    env: Box<dyn EnvStore>,
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("home", &self.home)
            .field("init_file", &self.init_file)
            .field("capabilities", &self.capabilities)
            .finish_non_exhaustive()
    }
}

impl Module {
    /// Resolve, bootstrap, and bind to the process environment.
    pub fn new(options: ModuleOptions) -> Result<Self> {
        Self::with_env(options, ProcessEnv)
    }

    /// Like `new`, reading and writing `env` instead of the process table.
    pub fn with_env(options: ModuleOptions, env: impl EnvStore + 'static) -> Result<Self> {
        let mut env: Box<dyn EnvStore> = Box::new(env);
        let home = resolve_home(options.home.as_deref(), env.as_ref())?;
        let init_file =
            resolve_init_file(&home, options.init_file.as_deref(), &options.init_pattern)?;
        let shell = resolve_shell(options.shell.as_deref(), env.as_ref())?;
        let dispatcher = ShellDispatcher::bootstrap(&init_file, &shell, env.as_mut())?;
        Ok(Self::from_parts(home, init_file, Box::new(dispatcher), env))
    }

    /// Assemble a module from already resolved pieces, skipping bootstrap.
    pub fn from_parts(
        home: PathBuf,
        init_file: PathBuf,
        dispatcher: Box<dyn Dispatcher>,
        env: Box<dyn EnvStore>,
    ) -> Self {
        Self {
            home,
            init_file,
            capabilities: CapabilitySet::default(),
            dispatcher,
            env,
        }
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    pub fn init_file(&self) -> &Path {
        &self.init_file
    }

    pub fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    /// The environment store the module reads and writes.
    pub fn env(&self) -> &dyn EnvStore {
        self.env.as_ref()
    }

    /// Current values of the known module variables, recomputed on each call.
    pub fn environ(&self) -> EnvironmentSnapshot {
        snapshot(self.env.as_ref(), self.capabilities.environment_variables())
    }

    /// Look up a sub-command by name.
    pub fn command(&mut self, name: &str) -> Result<SubCommand<'_>> {
        if !self.capabilities.has_sub_command(name) {
            return Err(ModuleError::UnknownSubCommand {
                name: name.to_string(),
            });
        }
        Ok(SubCommand {
            name: name.to_string(),
            module: self,
        })
    }

    /// Run sub-command `name` with `args`, forwarded verbatim.
    pub fn call<I, S>(&mut self, name: &str, args: I) -> Result<DispatchOutput>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.command(name)?.call(args)
    }

    pub fn load<I, S>(&mut self, modules: I) -> Result<DispatchOutput>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.call("load", modules)
    }

    pub fn unload<I, S>(&mut self, modules: I) -> Result<DispatchOutput>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.call("unload", modules)
    }

    pub fn swap(&mut self, from: &str, to: &str) -> Result<DispatchOutput> {
        self.call("swap", [from, to])
    }

    pub fn avail<I, S>(&mut self, patterns: I) -> Result<DispatchOutput>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.call("avail", patterns)
    }

    pub fn list(&mut self) -> Result<DispatchOutput> {
        self.call("list", Vec::<String>::new())
    }

    pub fn purge(&mut self) -> Result<DispatchOutput> {
        self.call("purge", Vec::<String>::new())
    }

    /// Refresh both vocabularies from the manual page.
    ///
    /// `man_file` defaults to `share/man/man1/module.1` under the home. A
    /// missing file is an error; a missing section is not, and is reported
    /// as `SectionStatus::FellBack`.
    pub fn parse_man_file(&mut self, man_file: Option<&Path>) -> Result<ParseReport> {
        let man = self.read_man(man_file)?;
        let report = ParseReport {
            sub_commands: manpage::apply_sub_commands(&mut self.capabilities, &man),
            environment_variables: manpage::apply_environment_variables(
                &mut self.capabilities,
                &man,
            ),
        };
        log::info!("parsed module manual: {report:?}");
        Ok(report)
    }

    pub fn parse_sub_commands(&mut self, man_file: Option<&Path>) -> Result<SectionStatus> {
        let man = self.read_man(man_file)?;
        Ok(manpage::apply_sub_commands(&mut self.capabilities, &man))
    }

    pub fn parse_environment_variables(&mut self, man_file: Option<&Path>) -> Result<SectionStatus> {
        let man = self.read_man(man_file)?;
        Ok(manpage::apply_environment_variables(
            &mut self.capabilities,
            &man,
        ))
    }

    fn read_man(&self, man_file: Option<&Path>) -> Result<String> {
        let path = man_file
            .map(Path::to_path_buf)
            .unwrap_or_else(|| manpage::default_man_path(&self.home));
        manpage::read_man_page(&path)
    }
}

/// A resolved sub-command, ready to be called.
pub struct SubCommand<'a> {
    name: String,
    module: &'a mut Module,
}

impl SubCommand<'_> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invoke the dispatcher with this sub-command followed by `args`.
    pub fn call<I, S>(self, args: I) -> Result<DispatchOutput>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let args: Vec<String> = args.into_iter().map(Into::into).collect();
        let module = self.module;
        module
            .dispatcher
            .dispatch(&self.name, &args, module.env.as_mut())
    }
}
