use std::{env::args_os, process::ExitCode};

use anyhow::Result;
use clap::{Parser, Subcommand};

pub(crate) mod build;
pub(crate) mod run;

pub use self::{build::BuildCommand, run::RunCommand};

#[derive(Debug, Clone, Subcommand)]
pub enum CliSubcommand {
    Run(RunCommand),
    Build(BuildCommand),
}

/// Lunepack, packs Lua programs into standalone executables
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[clap(subcommand)]
    subcommand: CliSubcommand,
}

impl Cli {
    pub fn new() -> Self {
        // Script arguments must reach the script untouched, even
        // when they look like flags, so `run` is parsed by hand
        let args = args_os().collect::<Vec<_>>();
        if args
            .get(1)
            .is_some_and(|arg| arg.eq_ignore_ascii_case("run"))
        {
            if let Some(cmd) = RunCommand::from_args(&args[2..]) {
                return Self {
                    subcommand: CliSubcommand::Run(cmd),
                };
            }
        }
        Self::parse() // Shows help or an error for anything unusual
    }

    pub async fn run(self) -> Result<ExitCode> {
        match self.subcommand {
            CliSubcommand::Run(cmd) => cmd.run().await,
            CliSubcommand::Build(cmd) => cmd.run().await,
        }
    }
}
