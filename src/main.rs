#![allow(clippy::cargo_common_metadata)]

use std::process::{self, ExitCode};

use tracing_subscriber::{filter::LevelFilter, EnvFilter};

use lunepack::utils::Label;

pub(crate) mod cli;
pub(crate) mod standalone;

#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    // Standard output belongs to the program being run
    tracing_subscriber::fmt()
        .compact()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::WARN.into())
                .from_env_lossy(),
        )
        .with_target(true)
        .with_timer(tracing_subscriber::fmt::time::uptime())
        .with_level(true)
        .with_writer(std::io::stderr)
        .init();

    if let Some((exe, footer)) = standalone::check().await {
        let code = standalone::run(exe, footer).await;
        process::exit(code);
    }

    match cli::Cli::new().run().await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{} {err:#}", Label::Error);
            ExitCode::FAILURE
        }
    }
}
