//! Extracts the module tool's vocabulary from its roff manual page.
//!
//! Parsing leans on the markup conventions of `module.1`: sub-commands live
//! under the `.SS Module Sub\-Commands` subsection and environment variables
//! under `.SH ENVIRONMENT`, each entry introduced by a `.sp` line followed by
//! the name in bold (`\fBname\fP`). Layouts differ across tool versions, so
//! extraction is best effort: a missing section header reports a fallback
//! instead of failing and the caller keeps its previous vocabulary.

use crate::capabilities::CapabilitySet;
use crate::error::{ModuleError, Result};
use regex::Regex;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Manual page location relative to the module home.
pub const MAN_PAGE_RELATIVE_PATH: &str = "share/man/man1/module.1";

struct SectionMarkers {
    header: &'static str,
    terminators: &'static [&'static str],
}

const SUB_COMMANDS_SECTION: SectionMarkers = SectionMarkers {
    header: ".SS Module Sub\\-Commands",
    terminators: &["\n.SS", "\n.SH"],
};

const ENVIRONMENT_SECTION: SectionMarkers = SectionMarkers {
    header: ".SH ENVIRONMENT",
    terminators: &["\n.S"],
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "count", rename_all = "snake_case")]
/// Outcome of parsing one section of the manual.
pub enum SectionStatus {
    /// The section was found; the sequence was replaced with this many names
    /// (possibly zero when the section matched no entries).
    Parsed(usize),
    /// The section header was missing; the previous sequence was kept.
    FellBack,
}

impl SectionStatus {
    pub fn is_parsed(&self) -> bool {
        matches!(self, SectionStatus::Parsed(_))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
/// Per-section outcome of `Module::parse_man_file`.
pub struct ParseReport {
    pub sub_commands: SectionStatus,
    pub environment_variables: SectionStatus,
}

impl ParseReport {
    /// True when both sections were taken from the manual.
    pub fn fully_parsed(&self) -> bool {
        self.sub_commands.is_parsed() && self.environment_variables.is_parsed()
    }
}

/// Conventional manual page path under `home`.
pub fn default_man_path(home: &Path) -> PathBuf {
    home.join(MAN_PAGE_RELATIVE_PATH)
}

/// Read manual text, mapping a missing file to `ModuleError::NotFound`.
pub fn read_man_page(path: &Path) -> Result<String> {
    if !path.is_file() {
        return Err(ModuleError::NotFound {
            what: "Module manual file",
            path: path.to_path_buf(),
        });
    }
    fs::read_to_string(path)
        .map_err(|err| ModuleError::io(format!("reading {}", path.display()), err))
}

/// Sub-command names in document order, or `None` when the section is absent.
pub fn extract_sub_commands(man: &str) -> Option<Vec<String>> {
    let section = section_text(man, &SUB_COMMANDS_SECTION)?;
    Some(collect_names(sub_command_pattern(), section))
}

/// Environment variable names in document order, or `None` when the section
/// is absent.
pub fn extract_environment_variables(man: &str) -> Option<Vec<String>> {
    let section = section_text(man, &ENVIRONMENT_SECTION)?;
    Some(collect_names(environment_pattern(), section))
}

/// Replace the sub-command sequence of `caps` from `man`.
///
/// The sequence is replaced whenever the section header exists, even with an
/// empty list; only a missing header keeps the current sequence.
pub fn apply_sub_commands(caps: &mut CapabilitySet, man: &str) -> SectionStatus {
    match extract_sub_commands(man) {
        Some(names) => {
            let count = names.len();
            if count == 0 {
                log::warn!("sub-command section of the manual lists no entries");
            }
            caps.replace_sub_commands(names);
            SectionStatus::Parsed(count)
        }
        None => {
            log::warn!("manual has no sub-command section; keeping current sub-commands");
            SectionStatus::FellBack
        }
    }
}

/// Replace the environment-variable sequence of `caps` from `man`, with the
/// same header rule as `apply_sub_commands`.
pub fn apply_environment_variables(caps: &mut CapabilitySet, man: &str) -> SectionStatus {
    match extract_environment_variables(man) {
        Some(names) => {
            let count = names.len();
            if count == 0 {
                log::warn!("environment section of the manual lists no entries");
            }
            caps.replace_environment_variables(names);
            SectionStatus::Parsed(count)
        }
        None => {
            log::warn!("manual has no environment section; keeping current environment variables");
            SectionStatus::FellBack
        }
    }
}

/// Slice from the header up to the next terminating header (or end of text).
fn section_text<'a>(man: &'a str, markers: &SectionMarkers) -> Option<&'a str> {
    let start = man.find(markers.header)?;
    let body_start = start + markers.header.len();
    let rest = &man[body_start..];
    let end = markers
        .terminators
        .iter()
        .filter_map(|terminator| rest.find(terminator))
        .min()
        .map(|offset| body_start + offset)
        .unwrap_or(man.len());
    Some(&man[start..end])
}

fn collect_names(pattern: Option<&Regex>, section: &str) -> Vec<String> {
    let Some(pattern) = pattern else {
        return Vec::new();
    };
    pattern
        .captures_iter(section)
        .filter_map(|caps| caps.get(1))
        .map(|name| name.as_str().replace("\\-", "-"))
        .collect()
}

fn sub_command_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"\.sp\n\\fB((?:\\-|[\w-])+)\\fP").ok())
        .as_ref()
}

fn environment_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"\.sp\n\\fB((?:\\-|[A-Z_-])+)\\fP").ok())
        .as_ref()
}
