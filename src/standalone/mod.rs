use std::{
    env,
    io::{self, SeekFrom},
    path::{Path, PathBuf},
};

use tokio::{
    fs::File,
    io::{AsyncReadExt, AsyncSeekExt},
};
use tracing::debug;

use lunepack::{
    archive::{Archive, Footer, PayloadError, PayloadResult, FOOTER_LEN},
    utils::{path::get_current_exe, Label},
};

pub(crate) mod extract;
pub(crate) mod launch;
pub(crate) mod result;

use self::extract::ExtractionDir;
use self::result::LaunchResult;

/// Exit code used when the embedded archive can not be read or extracted.
pub const EXIT_PAYLOAD_FAILURE: i32 = 250;

/// Exit code used when the embedded interpreter can not be started.
pub const EXIT_LAUNCH_FAILURE: i32 = 251;

/**
    Returns the path and footer of the currently executing
    binary, if it is a standalone executable.
*/
pub async fn check() -> Option<(PathBuf, Footer)> {
    let exe = get_current_exe().ok()?;
    match read_footer(&exe).await {
        Ok(footer) => footer.map(|footer| (exe, footer)),
        Err(e) => {
            debug!("failed to read footer of current executable: {e}");
            None
        }
    }
}

async fn read_footer(exe: &Path) -> io::Result<Option<Footer>> {
    let mut file = File::open(exe).await?;
    if file.metadata().await?.len() < FOOTER_LEN as u64 {
        return Ok(None);
    }
    file.seek(SeekFrom::End(-(FOOTER_LEN as i64))).await?;
    let mut bytes = [0u8; FOOTER_LEN];
    file.read_exact(&mut bytes).await?;
    Ok(Footer::from_bytes(&bytes))
}

async fn read_archive(exe: &Path, footer: Footer) -> PayloadResult<Archive> {
    let mut file = File::open(exe).await?;
    let archive_end = file.metadata().await?.len().saturating_sub(FOOTER_LEN as u64);
    let archive_len = archive_end
        .checked_sub(footer.archive_offset)
        .and_then(|len| usize::try_from(len).ok())
        .ok_or(PayloadError::InvalidFooter {
            offset: footer.archive_offset,
            len: archive_end,
        })?;

    file.seek(SeekFrom::Start(footer.archive_offset)).await?;
    let mut bytes = vec![0u8; archive_len];
    file.read_exact(&mut bytes).await?;

    Archive::from_bytes(&bytes)
}

/**
    Extracts and runs the program contained in a standalone executable,
    passing along all arguments, and returns the exit code to exit with.
*/
pub async fn run(exe: PathBuf, footer: Footer) -> i32 {
    let archive = match read_archive(&exe, footer).await {
        Ok(archive) => archive,
        Err(e) => {
            eprintln!("{} failed to read embedded program: {e}", Label::Error);
            return EXIT_PAYLOAD_FAILURE;
        }
    };

    let dir = match ExtractionDir::create() {
        Ok(dir) => dir,
        Err(e) => {
            eprintln!("{} failed to create extraction directory: {e}", Label::Error);
            return EXIT_PAYLOAD_FAILURE;
        }
    };
    if let Err(e) = dir.extract(&archive).await {
        eprintln!("{} failed to extract embedded program: {e}", Label::Error);
        return EXIT_PAYLOAD_FAILURE;
    }

    let code = launch_program(&dir, archive, &exe).await.unwrap_or_else(|e| {
        eprintln!("{} {e}", Label::Error);
        EXIT_LAUNCH_FAILURE
    });

    drop(dir);
    code
}

async fn launch_program(dir: &ExtractionDir, archive: Archive, exe: &Path) -> LaunchResult<i32> {
    // The first argument is the path to the current executable
    let args = env::args_os().skip(1);
    let mut command = launch::command(dir.path(), archive.manifest(), exe, args)?;

    // Everything is on disk now, no need to hold onto the payload
    drop(archive);

    let child = launch::spawn(&mut command)?;
    launch::wait(child).await
}
