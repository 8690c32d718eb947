use std::{io, path::Path};

use tokio::{fs, io::AsyncWriteExt as _};

/**
    Writes the given bytes to a file at the specified path,
    and makes sure it has permissions to be executed.
*/
pub async fn write_executable_file_to(
    path: impl AsRef<Path>,
    bytes: impl AsRef<[u8]>,
) -> io::Result<()> {
    write_file_to(path, bytes, true).await
}

/**
    Writes the given bytes to a file at the specified path, creating
    or truncating it. The file is made executable for everyone when
    `executable` is set, which only has an effect on unix systems.
*/
pub async fn write_file_to(
    path: impl AsRef<Path>,
    bytes: impl AsRef<[u8]>,
    executable: bool,
) -> io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);

    #[cfg(unix)]
    {
        options.mode(if executable { 0o755 } else { 0o644 }); // Read & execute for all, write for owner
    }
    #[cfg(not(unix))]
    {
        let _ = executable;
    }

    let mut file = options.open(path).await?;
    file.write_all(bytes.as_ref()).await?;
    file.flush().await?;

    Ok(())
}

/**
    Returns whether the file at the given path is marked as executable.

    Always `false` on platforms without an executable permission bit.
*/
pub async fn is_executable(path: impl AsRef<Path>) -> io::Result<bool> {
    let metadata = fs::metadata(path).await?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        Ok(metadata.permissions().mode() & 0o111 != 0)
    }
    #[cfg(not(unix))]
    {
        let _ = metadata;
        Ok(false)
    }
}
