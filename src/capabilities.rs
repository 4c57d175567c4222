//! Known vocabulary of the module tool.
//!
//! The defaults below are the sub-commands and environment variables shipped
//! with Environment Modules v4.3.0. They act as the fallback whenever the
//! manual page is unavailable or its layout does not match what the parser
//! expects; `Module::parse_man_file` replaces them with the authoritative
//! lists of the installed tool.

use serde::Serialize;

/// Sub-commands understood by Modules v4.3.0.
pub const DEFAULT_SUB_COMMANDS: &[&str] = &[
    "help",
    "add",
    "load",
    "rm",
    "unload",
    "swap",
    "switch",
    "show",
    "display",
    "list",
    "avail",
    "aliases",
    "use",
    "unuse",
    "refresh",
    "reload",
    "purge",
    "clear",
    "source",
    "whatis",
    "apropos",
    "keyword",
    "search",
    "test",
    "save",
    "restore",
    "saverm",
    "saveshow",
    "savelist",
    "initadd",
    "initprepend",
    "initrm",
    "initswitch",
    "initlist",
    "initclear",
    "path",
    "paths",
    "config",
];

/// Environment variables read or written by Modules v4.3.0.
pub const DEFAULT_ENVIRONMENT_VARIABLES: &[&str] = &[
    "LOADEDMODULES",
    "MODULECONTACT",
    "MODULEPATH",
    "MODULERCFILE",
    "MODULESHOME",
    "MODULES_AUTO_HANDLING",
    "MODULES_AVAIL_INDEPTH",
    "MODULES_CMD",
    "MODULES_COLLECTION_PIN_VERSION",
    "MODULES_COLLECTION_TARGET",
    "MODULES_COLOR",
    "CLICOLOR",
    "MODULES_COLORS",
    "MODULES_IMPLICIT_DEFAULT",
    "MODULES_LMALTNAME",
    "MODULES_LMCONFLICT",
    "MODULES_LMNOTUASKED",
    "MODULES_LMPREREQ",
    "MODULES_PAGER",
    "MODULES_RUN_QUARANTINE",
    "MODULES_SEARCH_MATCH",
    "MODULES_SET_SHELL_STARTUP",
    "MODULES_SILENT_SHELL_DEBUG",
    "MODULES_SITECONFIG",
    "MODULES_TERM_BACKGROUND",
    "MODULES_UNLOAD_MATCH_ORDER",
    "MODULES_USE_COMPAT_VERSION",
    "MODULES_VERBOSITY",
    "_LMFILES_",
];

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
/// Current sub-command and environment-variable vocabulary.
///
/// Each sequence is replaced wholesale; order is document order when parsed
/// from the manual, declaration order for the defaults.
pub struct CapabilitySet {
    sub_commands: Vec<String>,
    environment_variables: Vec<String>,
}

impl Default for CapabilitySet {
    fn default() -> Self {
        Self {
            sub_commands: to_owned_list(DEFAULT_SUB_COMMANDS),
            environment_variables: to_owned_list(DEFAULT_ENVIRONMENT_VARIABLES),
        }
    }
}

impl CapabilitySet {
    pub fn new(sub_commands: Vec<String>, environment_variables: Vec<String>) -> Self {
        Self {
            sub_commands,
            environment_variables,
        }
    }

    pub fn sub_commands(&self) -> &[String] {
        &self.sub_commands
    }

    pub fn environment_variables(&self) -> &[String] {
        &self.environment_variables
    }

    /// Whether `name` is a known sub-command.
    pub fn has_sub_command(&self, name: &str) -> bool {
        self.sub_commands.iter().any(|known| known == name)
    }

    pub fn replace_sub_commands(&mut self, sub_commands: Vec<String>) {
        self.sub_commands = sub_commands;
    }

    pub fn replace_environment_variables(&mut self, environment_variables: Vec<String>) {
        self.environment_variables = environment_variables;
    }
}

fn to_owned_list(items: &[&str]) -> Vec<String> {
    items.iter().map(|item| item.to_string()).collect()
}
