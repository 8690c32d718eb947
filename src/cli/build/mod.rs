use std::{
    env::{self, consts::EXE_EXTENSION},
    fmt::Display,
    path::PathBuf,
    process::ExitCode,
};

use anyhow::{bail, Context, Result};
use clap::Parser;
use console::style;
use tokio::fs;

use lunepack::utils::{
    env::{split_path_var, ENV_SEARCH_PATH},
    files::write_executable_file_to,
    path::{clean_path_and_make_absolute, get_current_exe},
};

mod bundle;
mod classify;
mod files;
mod link;
mod result;
mod tracer;

use self::bundle::bundle;
use self::classify::{classify, locate_resource};
use self::files::remove_source_file_ext;
use self::link::link;
use self::result::{BuildError, BuildResult};
use self::tracer::Tracer;

/// Build a standalone executable
#[derive(Debug, Clone, Parser)]
pub struct BuildCommand {
    /// The path to the input script
    pub input: PathBuf,

    /// The path to the output file - defaults to the
    /// input file path with an executable extension
    #[clap(short, long)]
    pub output: Option<PathBuf>,

    /// Do not print progress, or anything the traced program prints
    #[clap(short, long)]
    pub quiet: bool,

    /// Store the payload without compressing it
    #[clap(long)]
    pub no_compress: bool,

    /// An extra file to include, such as a shared library -
    /// found using the same directories the dynamic loader uses
    #[clap(short, long = "resource", value_name = "NAME")]
    pub resources: Vec<PathBuf>,

    /// A directory to search for modules, before any in LUNEPACK_PATH
    #[clap(short = 'I', long = "include", value_name = "DIR")]
    pub include: Vec<PathBuf>,
}

impl BuildCommand {
    pub async fn run(self) -> Result<ExitCode> {
        let cwd = env::current_dir().context("failed to read current directory")?;

        // Derive paths to use, and make sure the output path is
        // not the same as the input, so that we don't overwrite it
        let input = clean_path_and_make_absolute(&self.input, &cwd);
        let output_path = self.output.clone().unwrap_or_else(|| {
            remove_source_file_ext(&self.input).with_extension(EXE_EXTENSION)
        });
        let output_path = clean_path_and_make_absolute(output_path, &cwd);
        if output_path == input {
            return Err(BuildError::SameInputOutput(output_path).into());
        }
        if !fs::metadata(&input)
            .await
            .with_context(|| format!("failed to read input file '{}'", input.display()))?
            .is_file()
        {
            bail!("input path '{}' is not a file", input.display());
        }

        let interpreter = get_current_exe().context("failed to locate the lunepack executable")?;
        let search_paths = self
            .include
            .iter()
            .cloned()
            .chain(split_path_var(ENV_SEARCH_PATH))
            .map(|dir| clean_path_and_make_absolute(dir, &cwd))
            .collect::<Vec<_>>();

        self.status(format_args!(
            "Tracing {}",
            style(self.input.display()).green()
        ));
        let trace = Tracer::new(&interpreter)
            .with_search_paths(search_paths)
            .with_quiet(self.quiet)
            .trace(&input)
            .await
            .context("failed to trace program")?;

        let interpreter_dir = interpreter.parent().unwrap_or(cwd.as_path());
        let resources = self
            .resources
            .iter()
            .map(|name| locate_resource(name, &trace, interpreter_dir))
            .collect::<BuildResult<Vec<_>>>()?;
        let classification = classify(&trace, &resources)?;

        self.status(format_args!(
            "Packing {} files{}",
            classification.files.len(),
            if self.no_compress {
                ""
            } else {
                " with compression"
            }
        ));
        let archive = bundle(&classification, &interpreter, !self.no_compress)
            .await
            .context("failed to create archive")?;

        let stub = fs::read(&interpreter)
            .await
            .context("failed to read the lunepack executable")?;
        let image = link(&stub, &archive.to_bytes()?);

        // And finally write the standalone binary to the output file
        self.status(format_args!(
            "Writing standalone binary to {}",
            style(output_path.display()).blue()
        ));
        if let Some(parent) = output_path.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create '{}'", parent.display()))?;
        }
        write_executable_file_to(&output_path, image)
            .await
            .with_context(|| format!("failed to write '{}'", output_path.display()))?;

        Ok(ExitCode::SUCCESS)
    }

    fn status(&self, message: impl Display) {
        if !self.quiet {
            println!("{message}");
        }
    }
}
