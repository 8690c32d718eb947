use std::{
    collections::{HashMap, HashSet},
    env,
    path::{Path, PathBuf},
};

use tracing::{debug, warn};

use lunepack::{
    trace::LoadOrigin,
    utils::{
        env::{split_path_var, DYLIB_PATH_VAR},
        path::{clean_path_and_make_absolute, common_ancestor, to_archive_path},
    },
};

use super::{
    result::{BuildError, BuildResult},
    tracer::TraceOutput,
};

/// Archive directory holding files from the application's own source tree.
pub const APP_DIR: &str = "app";
/// Archive directory holding search path roots outside of the application.
pub const LIB_DIR: &str = "lib";
/// Archive directory holding extra native resources.
pub const NATIVE_DIR: &str = "native";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileCategory {
    App,
    SearchPathLib,
    ExtraResource,
}

/**
    The search path entry a file was found through.
*/
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchPathOrigin {
    pub rank: usize,
    pub root: PathBuf,
}

/**
    A file that goes into the archive, and where it goes.
*/
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TracedFile {
    pub source_path: PathBuf,
    pub archive_path: String,
    pub category: FileCategory,
    pub origin: Option<SearchPathOrigin>,
}

/**
    The result of classifying a trace, ready to be turned into an archive.
*/
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub app_root: PathBuf,
    pub entry_script: String,
    pub files: Vec<TracedFile>,
    /// Archive directories to search for modules, in order.
    pub search_paths: Vec<String>,
}

impl Classification {
    pub fn has_resources(&self) -> bool {
        self.files
            .iter()
            .any(|file| file.category == FileCategory::ExtraResource)
    }
}

/**
    Finds the deepest directory that contains the entry script's
    directory, every relative search path entry and every file that
    was loaded using a relative path.

    Everything under this directory keeps its layout inside of the
    archive, so relative paths work the same after extraction.
*/
pub fn application_root(trace: &TraceOutput) -> PathBuf {
    let relative_entries = trace
        .search_paths
        .iter()
        .filter(|entry| Path::new(&entry.entry).is_relative())
        .map(|entry| entry.dir.as_path());
    let relative_loads = trace
        .loads
        .iter()
        .filter(|load| load.origin == LoadOrigin::Relative)
        .filter_map(|load| load.path.parent());

    relative_entries
        .chain(relative_loads)
        .fold(trace.entry_dir.clone(), |root, dir| {
            common_ancestor(&root, dir)
        })
}

/**
    Decides where each traced file, and each of the given
    already located resources, is stored inside of the archive.

    Files outside of the application root that were not found through
    a search path can not be found again at run time, those are left
    out with a warning.

    # Errors

    Errors if two files would be stored at the same archive path, or
    if any path can not be represented in the archive.
*/
pub fn classify(trace: &TraceOutput, resources: &[PathBuf]) -> BuildResult<Classification> {
    let app_root = application_root(trace);
    debug!(app_root = %app_root.display(), "classifying traced files");

    // External roots are numbered in final search path order,
    // roots that were removed from the search path come after
    let mut external_roots = Vec::<PathBuf>::new();
    let search_roots = trace.search_paths.iter().map(|entry| &entry.dir);
    let load_roots = trace.loads.iter().filter_map(|load| match &load.origin {
        LoadOrigin::SearchPath { root, .. } => Some(root),
        _ => None,
    });
    for root in search_roots.chain(load_roots) {
        if !root.starts_with(&app_root) && !external_roots.contains(root) {
            external_roots.push(root.clone());
        }
    }

    // Nested roots are stored inside of their outermost root, so
    // a file reachable through several of them is only stored once
    let lib_roots = external_roots
        .iter()
        .filter(|root| {
            !external_roots
                .iter()
                .any(|other| other != *root && root.starts_with(other))
        })
        .cloned()
        .collect::<Vec<_>>();

    let mut files = Vec::new();
    for load in &trace.loads {
        let external = match &load.origin {
            LoadOrigin::SearchPath { rank, root, .. } if external_roots.contains(root) => {
                lib_location(&lib_roots, &load.path).map(|(index, rel)| (index, rel, *rank, root))
            }
            _ => None,
        };

        let file = if let Some((index, rel, rank, root)) = external {
            TracedFile {
                source_path: load.path.clone(),
                archive_path: archive_path(&format!("{LIB_DIR}/{index}"), rel, &load.path)?,
                category: FileCategory::SearchPathLib,
                origin: Some(SearchPathOrigin {
                    rank,
                    root: root.clone(),
                }),
            }
        } else if let Ok(rel) = load.path.strip_prefix(&app_root) {
            let origin = match &load.origin {
                LoadOrigin::SearchPath { rank, root, .. } => Some(SearchPathOrigin {
                    rank: *rank,
                    root: root.clone(),
                }),
                _ => None,
            };
            TracedFile {
                source_path: load.path.clone(),
                archive_path: archive_path(APP_DIR, rel, &load.path)?,
                category: FileCategory::App,
                origin,
            }
        } else {
            warn!(
                path = %load.path.display(),
                "'{}' is outside of the application and every search path, leaving it out",
                load.name
            );
            continue;
        };
        files.push(file);
    }

    for binding in trace.deferred.iter().filter(|binding| !binding.triggered) {
        debug!(
            name = %binding.name,
            module = %binding.module,
            "autoload was never triggered, leaving it out"
        );
    }

    for resource in resources {
        let Some(name) = resource.file_name() else {
            return Err(BuildError::ResourceNotFound(resource.clone()));
        };
        files.push(TracedFile {
            source_path: resource.clone(),
            archive_path: archive_path(NATIVE_DIR, Path::new(name), resource)?,
            category: FileCategory::ExtraResource,
            origin: None,
        });
    }

    let mut stored = HashMap::new();
    for file in &files {
        if let Some(first) = stored.insert(file.archive_path.as_str(), &file.source_path) {
            return Err(BuildError::DuplicateArchivePath {
                path: file.archive_path.clone(),
                first: first.clone(),
                second: file.source_path.clone(),
            });
        }
    }

    // The application root always contains the entry script
    let entry_rel = trace
        .entry
        .strip_prefix(&app_root)
        .unwrap_or(trace.entry.as_path());
    let entry_script = archive_path(APP_DIR, entry_rel, &trace.entry)?;

    let mut search_paths = Vec::new();
    let mut seen = HashSet::new();
    for entry in &trace.search_paths {
        let path = if let Ok(rel) = entry.dir.strip_prefix(&app_root) {
            archive_path(APP_DIR, rel, &entry.dir)?
        } else if let Some((index, rel)) = lib_location(&lib_roots, &entry.dir) {
            archive_path(&format!("{LIB_DIR}/{index}"), rel, &entry.dir)?
        } else {
            continue;
        };
        if seen.insert(path.clone()) {
            search_paths.push(path);
        }
    }

    Ok(Classification {
        app_root,
        entry_script,
        files,
        search_paths,
    })
}

/**
    Finds the `lib/<k>` directory a path outside of the application is
    stored under, along with the path relative to that directory.
*/
fn lib_location<'a>(lib_roots: &[PathBuf], path: &'a Path) -> Option<(usize, &'a Path)> {
    lib_roots
        .iter()
        .enumerate()
        .find_map(|(index, root)| Some((index, path.strip_prefix(root).ok()?)))
}

fn archive_path(prefix: &str, rel: &Path, source: &Path) -> BuildResult<String> {
    let rel = to_archive_path(rel).ok_or_else(|| BuildError::NonUtf8Path(source.to_path_buf()))?;
    Ok(if rel.is_empty() {
        prefix.to_string()
    } else {
        format!("{prefix}/{rel}")
    })
}

/**
    Finds an extra resource, such as a shared library, to include in the archive.

    Names that are not found as given are looked for in the directories the
    dynamic loader searches, next to the entry script, in every search path,
    next to the interpreter, and finally in the standard system directories.

    # Errors

    Errors if the resource can not be found anywhere.
*/
pub fn locate_resource(
    name: &Path,
    trace: &TraceOutput,
    interpreter_dir: &Path,
) -> BuildResult<PathBuf> {
    if name.is_file() {
        return Ok(clean_path_and_make_absolute(name, env::current_dir()?));
    }
    if name.is_absolute() {
        return Err(BuildError::ResourceNotFound(name.to_path_buf()));
    }

    let dirs = split_path_var(DYLIB_PATH_VAR)
        .into_iter()
        .chain([trace.entry_dir.clone()])
        .chain(trace.search_paths.iter().map(|entry| entry.dir.clone()))
        .chain([interpreter_dir.to_path_buf()])
        .chain(system_library_dirs());

    for dir in dirs {
        let candidate = dir.join(name);
        if candidate.is_file() {
            debug!(resource = %candidate.display(), "located resource");
            return Ok(candidate);
        }
    }

    Err(BuildError::ResourceNotFound(name.to_path_buf()))
}

#[cfg(windows)]
fn system_library_dirs() -> Vec<PathBuf> {
    env::var_os("SystemRoot")
        .map(PathBuf::from)
        .map(|root| vec![root.join("System32"), root])
        .unwrap_or_default()
}

#[cfg(not(windows))]
fn system_library_dirs() -> Vec<PathBuf> {
    ["/usr/local/lib", "/usr/lib", "/lib", "/usr/lib64", "/lib64"]
        .into_iter()
        .map(PathBuf::from)
        .collect()
}
