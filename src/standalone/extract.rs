use std::{
    io,
    path::{Path, PathBuf},
    process,
};

use tempfile::TempDir;
use tokio::fs;
use tracing::{debug, warn};

use lunepack::{
    archive::{Archive, PayloadError, PayloadResult},
    utils::{files::write_file_to, path::join_archive_path},
};

/**
    A process-private temporary directory that the archive of
    a standalone executable is extracted to.

    The directory, and everything in it, is removed when this is dropped.
*/
#[derive(Debug)]
pub struct ExtractionDir {
    dir: Option<TempDir>,
}

impl ExtractionDir {
    /**
        Creates a new, empty extraction directory in the system temporary directory.

        The name contains the id of the current process and a random suffix,
        so concurrently running executables never share a directory.
    */
    pub fn create() -> io::Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix(&format!("lunepack-{}-", process::id()))
            .tempdir()?;
        debug!(path = %dir.path().display(), "created extraction directory");
        Ok(Self { dir: Some(dir) })
    }

    pub fn path(&self) -> &Path {
        self.dir.as_ref().map_or(Path::new(""), TempDir::path)
    }

    /**
        Joins an archive path onto the extraction directory.
    */
    pub fn resolve(&self, archive_path: &str) -> PayloadResult<PathBuf> {
        join_archive_path(self.path(), archive_path)
            .ok_or_else(|| PayloadError::InvalidPath(archive_path.to_string()))
    }

    /**
        Writes every file in the archive to the extraction directory, and
        creates every directory that the manifest refers to, even empty ones.
    */
    pub async fn extract(&self, archive: &Archive) -> PayloadResult<()> {
        for entry in archive.entries() {
            let path = self.resolve(&entry.path)?;
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).await?;
            }
            write_file_to(&path, archive.contents(entry), entry.executable).await?;
        }

        let manifest = archive.manifest();
        for dir in manifest.search_paths.iter().chain(&manifest.library_paths) {
            fs::create_dir_all(self.resolve(dir)?).await?;
        }

        Ok(())
    }
}

impl Drop for ExtractionDir {
    fn drop(&mut self) {
        let Some(dir) = self.dir.take() else {
            return;
        };
        let path = dir.path().to_path_buf();
        match dir.close() {
            Ok(()) => debug!(path = %path.display(), "removed extraction directory"),
            Err(e) => warn!(
                path = %path.display(),
                "failed to remove extraction directory: {e}"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use lunepack::archive::{ArchiveBuilder, Manifest};

    use super::*;

    fn archive() -> Archive {
        let mut builder = ArchiveBuilder::new();
        builder
            .add_file("bin/lunepack", b"interpreter", true)
            .unwrap()
            .add_file("app/main.lua", b"print('hi')", false)
            .unwrap();
        builder.finish(Manifest {
            entry_script: "app/main.lua".to_string(),
            interpreter: "bin/lunepack".to_string(),
            search_paths: vec!["app".to_string(), "lib/0".to_string()],
            library_paths: vec!["native".to_string()],
            ..Manifest::default()
        })
    }

    #[tokio::test]
    async fn extracts_files_and_removes_them_on_drop() {
        let dir = ExtractionDir::create().unwrap();
        let root = dir.path().to_path_buf();
        assert!(root
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with(&format!("lunepack-{}-", process::id())));

        dir.extract(&archive()).await.unwrap();
        assert_eq!(
            std::fs::read(root.join("app").join("main.lua")).unwrap(),
            b"print('hi')"
        );
        assert!(root.join("lib").join("0").is_dir());
        assert!(root.join("native").is_dir());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(root.join("bin").join("lunepack"))
                .unwrap()
                .permissions()
                .mode();
            assert_ne!(mode & 0o111, 0);
        }

        drop(dir);
        assert!(!root.exists());
    }

    #[test]
    fn concurrent_directories_are_distinct() {
        let first = ExtractionDir::create().unwrap();
        let second = ExtractionDir::create().unwrap();
        assert_ne!(first.path(), second.path());
    }
}
