/*!
    Utilities for working with Rust standard library paths.
*/

use std::{
    env::current_exe,
    ffi::OsStr,
    io,
    path::{Component, Path, PathBuf},
};

use path_clean::PathClean;

/**
    Gets the path to the current executable as an absolute path.

    This absolute path is canonicalized and does not contain any `.` or `..`
    components, and it is also in a friendly (non-UNC) format.
*/
pub fn get_current_exe() -> io::Result<PathBuf> {
    dunce::canonicalize(current_exe()?)
}

/**
    Cleans a path.

    See the [`path_clean`] crate for more information on what cleaning a path does.
*/
#[must_use]
pub fn clean_path(path: impl AsRef<Path>) -> PathBuf {
    path.as_ref().clean()
}

/**
    Makes a path absolute, if it is relative, and then cleans it.

    Relative paths are resolved against the given base directory.
*/
#[must_use]
pub fn clean_path_and_make_absolute(path: impl AsRef<Path>, base: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    if path.is_relative() {
        base.as_ref().join(path).clean()
    } else {
        path.clean()
    }
}

/**
    Appends the given extension to the path.

    Does not replace or modify any existing extension(s).
*/
#[must_use]
pub fn append_extension(path: impl AsRef<Path>, ext: impl AsRef<OsStr>) -> PathBuf {
    let path = path.as_ref();
    match path.extension() {
        None => path.with_extension(ext),
        Some(curr_ext) => {
            let mut new_ext = curr_ext.to_os_string();
            new_ext.push(".");
            new_ext.push(ext);
            path.with_extension(new_ext)
        }
    }
}

/**
    Returns the deepest directory that contains both of the given absolute paths.
*/
#[must_use]
pub fn common_ancestor(a: impl AsRef<Path>, b: impl AsRef<Path>) -> PathBuf {
    a.as_ref()
        .components()
        .zip(b.as_ref().components())
        .take_while(|(left, right)| left == right)
        .map(|(left, _)| left)
        .collect()
}

/**
    Converts a relative path into the `/`-separated form used inside archives.

    Returns `None` if the path is absolute, climbs out of its root
    using `..`, or is not valid UTF-8. An empty path yields an empty string.
*/
#[must_use]
pub fn to_archive_path(path: impl AsRef<Path>) -> Option<String> {
    let mut parts = Vec::new();
    for component in path.as_ref().components() {
        match component {
            Component::Normal(part) => parts.push(part.to_str()?),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(parts.join("/"))
}

/**
    Joins an archive path onto a filesystem directory.

    Returns `None` if the archive path is not a plain relative path,
    meaning that it would escape the given directory once joined.
*/
#[must_use]
pub fn join_archive_path(root: impl AsRef<Path>, archive_path: &str) -> Option<PathBuf> {
    let mut joined = root.as_ref().to_path_buf();
    for part in archive_path.split('/') {
        match part {
            "" | "." => {}
            ".." => return None,
            part => {
                let mut components = Path::new(part).components();
                match (components.next(), components.next()) {
                    (Some(Component::Normal(_)), None) => joined.push(part),
                    _ => return None,
                }
            }
        }
    }
    Some(joined)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn common_ancestor_of_siblings() {
        let root = if cfg!(windows) { "C:\\work" } else { "/work" };
        let a = Path::new(root).join("proj").join("src");
        let b = Path::new(root).join("proj").join("lib");
        assert_eq!(common_ancestor(&a, &b), Path::new(root).join("proj"));
        assert_eq!(common_ancestor(&a, &a), a);
    }

    #[test]
    fn archive_paths_reject_escapes() {
        assert_eq!(
            to_archive_path(Path::new("lib").join("foo.lua")).as_deref(),
            Some("lib/foo.lua")
        );
        assert_eq!(to_archive_path(Path::new("..").join("foo.lua")), None);
        assert!(join_archive_path("/tmp/x", "app/../../etc/passwd").is_none());
        assert!(join_archive_path("/tmp/x", "/etc/passwd").is_some_and(|p| p.starts_with("/tmp/x")));
        assert_eq!(
            join_archive_path("/tmp/x", "app/main.lua"),
            Some(Path::new("/tmp/x").join("app").join("main.lua"))
        );
    }
}
