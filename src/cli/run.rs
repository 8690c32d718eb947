use std::{ffi::OsString, path::PathBuf, process::ExitCode};

use anyhow::{anyhow, Context, Result};
use clap::Parser;

use lunepack::{
    utils::{
        env::{split_path_var, ENV_SEARCH_PATH},
        Label,
    },
    InterpreterOptions, Runtime,
};

/// Run a Lua script
#[derive(Debug, Clone, Parser)]
pub struct RunCommand {
    /// Adds a directory to the module search path
    #[clap(short = 'I', long = "include", value_name = "DIR")]
    pub(super) include: Vec<PathBuf>,
    /// Writes a report of every module the script loads to this file
    #[clap(long, value_name = "REPORT")]
    pub(super) trace: Option<PathBuf>,
    /// Path to the script to run
    pub(super) script_path: PathBuf,
    /// Arguments to pass to the script, stored in `arg`
    #[clap(trailing_var_arg = true, allow_hyphen_values = true)]
    pub(super) script_args: Vec<OsString>,
}

impl RunCommand {
    /**
        Parses the arguments following `run`.

        Options are only accepted before the script path, everything after
        it is passed along as is. Returns `None` for anything that is not
        understood here, so that clap can report it properly.
    */
    pub(super) fn from_args(args: &[OsString]) -> Option<Self> {
        let mut include = Vec::new();
        let mut trace = None;
        let mut script_path = None;

        let mut args = args.iter();
        while let Some(arg) = args.next() {
            let Some(flag) = arg.to_str() else {
                script_path = Some(PathBuf::from(arg));
                break;
            };
            if flag == "--" {
                script_path = Some(PathBuf::from(args.next()?));
                break;
            } else if flag == "-I" || flag == "--include" {
                include.push(PathBuf::from(args.next()?));
            } else if let Some(dir) = flag.strip_prefix("-I") {
                include.push(PathBuf::from(dir));
            } else if flag == "--trace" {
                trace = Some(PathBuf::from(args.next()?));
            } else if flag.starts_with('-') && flag != "-" {
                return None;
            } else {
                script_path = Some(PathBuf::from(arg));
                break;
            }
        }

        Some(Self {
            include,
            trace,
            script_path: script_path?,
            script_args: args.cloned().collect(),
        })
    }

    pub async fn run(self) -> Result<ExitCode> {
        let options =
            InterpreterOptions::from_env().context("failed to read interpreter options")?;

        // Flags first, then options, then the environment
        let mut search_paths = self.include;
        search_paths.extend(options.include_dirs.iter().cloned());
        search_paths.extend(split_path_var(ENV_SEARCH_PATH));

        let mut rt = Runtime::new()
            .with_args(unicode_args(self.script_args)?)
            .with_search_paths(search_paths)
            .with_options(options);
        if let Some(report) = self.trace {
            rt = rt.with_trace_report(report);
        }

        Ok(match rt.run_file(&self.script_path) {
            Err(err) => {
                eprintln!("{} {err}", Label::Error);
                ExitCode::FAILURE
            }
            Ok(()) => ExitCode::SUCCESS,
        })
    }
}

/**
    Converts script arguments into strings, refusing to silently
    alter any argument that is not valid unicode.
*/
fn unicode_args(args: Vec<OsString>) -> Result<Vec<String>> {
    args.into_iter()
        .map(|arg| {
            arg.into_string()
                .map_err(|arg| anyhow!("script argument {arg:?} is not valid unicode"))
        })
        .collect()
}
