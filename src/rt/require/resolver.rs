use std::path::{Path, PathBuf};

use crate::{
    trace::{LoadOrigin, SearchPathEntry},
    utils::path::{append_extension, clean_path, clean_path_and_make_absolute},
};

/**
    A module file found by [`resolve`], along with how it was found.
*/
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Resolved {
    pub(crate) path: PathBuf,
    pub(crate) origin: LoadOrigin,
}

/**
    Returns `true` if the module name is a path relative to the requiring file.
*/
pub(crate) fn is_relative_name(name: &str) -> bool {
    name.starts_with("./") || name.starts_with("../")
}

/**
    Converts a module name into the path it is looked up at, relative
    to a search path entry. Names ending in `.lua` are used as is,
    other names use `.` as their path separator.
*/
pub(crate) fn module_base(name: &str) -> PathBuf {
    if Path::new(name)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("lua"))
    {
        PathBuf::from(name)
    } else {
        name.split('.').collect()
    }
}

/**
    Finds the first existing file out of `base`, `base.lua` and `base/init.lua`.
*/
pub(crate) fn find_file(base: &Path) -> Option<PathBuf> {
    if base.is_file() {
        return Some(base.to_path_buf());
    }
    [append_extension(base, "lua"), base.join("init.lua")]
        .into_iter()
        .find(|candidate| candidate.is_file())
}

/**
    Resolves a search path entry into an absolute directory.

    Relative entries are relative to the entry script's directory.
*/
pub(crate) fn resolve_entry(entry: &str, entry_dir: &Path) -> SearchPathEntry {
    SearchPathEntry {
        entry: entry.to_string(),
        dir: clean_path_and_make_absolute(entry, entry_dir),
    }
}

/**
    Resolves a module name into the file that should be loaded for it.

    - `./name` and `../name` are relative to `caller_dir`
    - absolute paths are used directly
    - anything else is looked up in each search path entry, in order
*/
pub(crate) fn resolve(
    name: &str,
    caller_dir: &Path,
    search_paths: &[SearchPathEntry],
) -> Option<Resolved> {
    if is_relative_name(name) {
        let path = find_file(&caller_dir.join(name))?;
        return Some(Resolved {
            path: clean_path(path),
            origin: LoadOrigin::Relative,
        });
    }

    if Path::new(name).is_absolute() {
        let path = find_file(Path::new(name))?;
        return Some(Resolved {
            path: clean_path(path),
            origin: LoadOrigin::Absolute,
        });
    }

    let base = module_base(name);
    search_paths.iter().enumerate().find_map(|(rank, entry)| {
        let path = find_file(&entry.dir.join(&base))?;
        Some(Resolved {
            path: clean_path(path),
            origin: LoadOrigin::SearchPath {
                rank,
                entry: entry.entry.clone(),
                root: entry.dir.clone(),
            },
        })
    })
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn module_names_map_dots_to_directories() {
        assert_eq!(
            module_base("net.http"),
            Path::new("net").join("http")
        );
        assert_eq!(module_base("net/http.lua"), PathBuf::from("net/http.lua"));
    }

    #[test]
    fn resolves_in_search_path_order() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("first");
        let second = dir.path().join("second");
        fs::create_dir_all(second.join("pkg")).unwrap();
        fs::create_dir_all(&first).unwrap();
        fs::write(second.join("pkg").join("init.lua"), "return 2").unwrap();
        fs::write(second.join("util.lua"), "return 2").unwrap();
        fs::write(first.join("util.lua"), "return 1").unwrap();

        let search = vec![
            resolve_entry("first", dir.path()),
            resolve_entry("second", dir.path()),
        ];

        let util = resolve("util", dir.path(), &search).unwrap();
        assert_eq!(util.path, first.join("util.lua"));
        assert!(matches!(util.origin, LoadOrigin::SearchPath { rank: 0, .. }));

        let pkg = resolve("pkg", dir.path(), &search).unwrap();
        assert_eq!(pkg.path, second.join("pkg").join("init.lua"));
        assert_eq!(
            pkg.origin,
            LoadOrigin::SearchPath {
                rank: 1,
                entry: "second".to_string(),
                root: second.clone(),
            }
        );

        assert!(resolve("missing", dir.path(), &search).is_none());
    }

    #[test]
    fn relative_names_ignore_search_paths() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        fs::create_dir_all(&src).unwrap();
        fs::write(dir.path().join("shared.lua"), "").unwrap();

        let resolved = resolve("../shared", &src, &[]).unwrap();
        assert_eq!(resolved.path, dir.path().join("shared.lua"));
        assert_eq!(resolved.origin, LoadOrigin::Relative);
        assert!(resolve("./shared", &src, &[]).is_none());
    }
}
