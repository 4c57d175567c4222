//! Runs one `module` sub-command through the bridge.
//!
//! Responsibilities:
//! - resolve the module home and init script (flags, then `MODULESHOME`)
//! - optionally refresh the vocabulary from the manual page
//! - replay the sub-command's stdout/stderr and exit with its status
//! - `env` and `capabilities` inspect the bridge instead of running the tool
//!
//! A child process cannot change its parent's environment, so `--json` is
//! the way to see what a sub-command did to the module variables.

use anyhow::{Context, Result};
use modulebridge::{InitPattern, Module, ModuleOptions, ParseReport};
use serde_json::json;
use std::env;
use std::io::{self, Write};
use std::path::PathBuf;

fn main() {
    env_logger::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let args = CliArgs::parse()?;
    let mut module =
        Module::new(args.options.clone()).context("Unable to set up module bridge")?;

    let report = if args.parse_man {
        Some(
            module
                .parse_man_file(args.man_file.as_deref())
                .context("Unable to parse module manual")?,
        )
    } else {
        None
    };

    match args.command.as_str() {
        "env" => {
            print_json(&json!(module.environ()))?;
            Ok(0)
        }
        "capabilities" => {
            print_json(&json!({
                "capabilities": module.capabilities(),
                "man_parse": report,
            }))?;
            Ok(0)
        }
        sub_command => run_sub_command(&mut module, sub_command, &args, report),
    }
}

fn run_sub_command(
    module: &mut Module,
    sub_command: &str,
    args: &CliArgs,
    report: Option<ParseReport>,
) -> Result<i32> {
    let output = module
        .call(sub_command, args.rest.iter().cloned())
        .with_context(|| format!("module {sub_command} failed"))?;

    if args.json {
        print_json(&json!({
            "sub_command": sub_command,
            "args": args.rest,
            "status": output.status,
            "stdout": output.stdout,
            "stderr": output.stderr,
            "environ": module.environ(),
            "man_parse": report,
        }))?;
    } else {
        io::stdout().write_all(output.stdout.as_bytes())?;
        io::stderr().write_all(output.stderr.as_bytes())?;
    }
    Ok(output.status.unwrap_or(1))
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value)?;
    writeln!(stdout)?;
    Ok(())
}

struct CliArgs {
    options: ModuleOptions,
    man_file: Option<PathBuf>,
    parse_man: bool,
    json: bool,
    command: String,
    rest: Vec<String>,
}

impl CliArgs {
    fn parse() -> Result<Self> {
        let mut args_iter = env::args().skip(1);
        let mut options = ModuleOptions::default();
        let mut man_file = None;
        let mut parse_man = false;
        let mut json = false;
        let mut positionals = Vec::new();

        while let Some(arg) = args_iter.next() {
            if let Some((flag, value)) = arg.split_once('=') {
                if flag.starts_with("--")
                    && apply_valued_flag(flag, value, &mut options, &mut man_file)
                {
                    continue;
                }
            }

            match arg.as_str() {
                "--home" | "--init-file" | "--init-pattern" | "--shell" | "--man-file" => {
                    let value = args_iter.next().unwrap_or_else(|| {
                        eprintln!("Missing value for {arg}");
                        usage();
                    });
                    apply_valued_flag(&arg, &value, &mut options, &mut man_file);
                }
                "--parse-man" => parse_man = true,
                "--json" => json = true,
                "-h" | "--help" => usage(),
                _ if arg.starts_with("--") => {
                    eprintln!("Unknown option: {arg}");
                    usage();
                }
                _ => {
                    positionals.push(arg);
                    positionals.extend(args_iter);
                    break;
                }
            }
        }

        if positionals.is_empty() {
            usage();
        }
        // An explicit manual path implies parsing it.
        parse_man |= man_file.is_some();

        let command = positionals.remove(0);
        Ok(Self {
            options,
            man_file,
            parse_man,
            json,
            command,
            rest: positionals,
        })
    }
}

fn apply_valued_flag(
    flag: &str,
    value: &str,
    options: &mut ModuleOptions,
    man_file: &mut Option<PathBuf>,
) -> bool {
    match flag {
        "--home" => options.home = Some(PathBuf::from(value)),
        "--init-file" => options.init_file = Some(PathBuf::from(value)),
        "--init-pattern" => options.init_pattern = InitPattern::new(value),
        "--shell" => options.shell = Some(PathBuf::from(value)),
        "--man-file" => *man_file = Some(PathBuf::from(value)),
        _ => return false,
    }
    true
}

fn usage() -> ! {
    eprintln!(
        "Usage: modulectl [OPTIONS] SUBCOMMAND [ARGS...]\n       modulectl [OPTIONS] env|capabilities\n\nOptions:\n  --home PATH           Module installation root (defaults to MODULESHOME).\n  --init-file PATH      Init script to bootstrap (skips the search under home).\n  --init-pattern GLOB   File name searched for in init/ directories (default: bash).\n  --shell PATH          Shell used to evaluate the init script (or set MODULEBRIDGE_SHELL).\n  --man-file PATH       Manual page to parse (implies --parse-man).\n  --parse-man           Refresh sub-commands and variables from share/man/man1/module.1.\n  --json                Print the result and resulting module environment as JSON.\n\nEnvironment:\n  MODULESHOME           Module installation root when --home is not given.\n  RUST_LOG              Log verbosity (e.g. RUST_LOG=modulebridge=debug)."
    );
    std::process::exit(1);
}
