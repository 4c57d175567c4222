//! Programmatic bridge to the environment modules `module` command.
//!
//! The crate resolves the module installation (`MODULESHOME`), bootstraps the
//! tool's shell init script into a dispatcher, and forwards sub-commands to
//! it by name. Environment changes the tool makes are written back into an
//! environment store, and `Module::environ` exposes the module-related part
//! of that store as a fresh snapshot on every call.
//!
//! ```no_run
//! use modulebridge::{Module, ModuleOptions};
//!
//! let mut module = Module::new(ModuleOptions::default())?;
//! module.load(["openmpi/4.1.5"])?;
//! let listing = module.list()?;
//! eprint!("{}", listing.stderr);
//! println!("{:?}", module.environ().get("LOADEDMODULES"));
//! # Ok::<(), modulebridge::ModuleError>(())
//! ```
//!
//! The default store is the process environment. Writes to it are not
//! thread-safe, so `ProcessEnv`-backed modules must be constructed and used
//! from one thread at a time; `MemoryEnv` keeps an instance fully isolated.

pub mod capabilities;
pub mod dispatcher;
pub mod environment;
pub mod error;
pub mod manpage;
pub mod module;
pub mod resolver;
pub mod runtime;

pub use capabilities::{CapabilitySet, DEFAULT_ENVIRONMENT_VARIABLES, DEFAULT_SUB_COMMANDS};
pub use dispatcher::{DISPATCHER_FUNCTION, DispatchOutput, Dispatcher, ShellDispatcher};
pub use environment::{EnvStore, EnvironmentSnapshot, MemoryEnv, ProcessEnv};
pub use error::{ModuleError, Result};
pub use manpage::{ParseReport, SectionStatus};
pub use module::{Module, ModuleOptions, SubCommand};
pub use resolver::{HOME_ENV_VAR, InitPattern, resolve_home, resolve_init_file};
pub use runtime::{SHELL_ENV_VAR, resolve_shell};
