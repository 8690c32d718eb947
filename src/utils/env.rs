use std::{
    env::{self, JoinPathsError},
    ffi::OsString,
    path::PathBuf,
};

/// Ordered list of extra module search directories, delimited like `PATH`.
pub const ENV_SEARCH_PATH: &str = "LUNEPACK_PATH";

/// Extra interpreter options, see [`crate::InterpreterOptions`].
pub const ENV_OPTIONS: &str = "LUNEPACK_OPTS";

/// Set by the launcher of a standalone executable to the path of that executable.
pub const ENV_EXECUTABLE: &str = "LUNEPACK_EXECUTABLE";

/// The variable the host's dynamic loader consults for shared libraries.
#[cfg(windows)]
pub const DYLIB_PATH_VAR: &str = "PATH";

/// The variable the host's dynamic loader consults for shared libraries.
#[cfg(target_os = "macos")]
pub const DYLIB_PATH_VAR: &str = "DYLD_LIBRARY_PATH";

/// The variable the host's dynamic loader consults for shared libraries.
#[cfg(not(any(windows, target_os = "macos")))]
pub const DYLIB_PATH_VAR: &str = "LD_LIBRARY_PATH";

/**
    Splits the path list stored in the given environment variable.

    Missing and empty variables both yield an empty list.
*/
#[must_use]
pub fn split_path_var(var: &str) -> Vec<PathBuf> {
    env::var_os(var)
        .map(|value| {
            env::split_paths(&value)
                .filter(|path| !path.as_os_str().is_empty())
                .collect()
        })
        .unwrap_or_default()
}

/**
    Builds a new value for the path list variable `var`, with the
    given directories placed in front of its current contents.
*/
pub fn prepend_path_var<I>(var: &str, dirs: I) -> Result<OsString, JoinPathsError>
where
    I: IntoIterator<Item = PathBuf>,
{
    env::join_paths(dirs.into_iter().chain(split_path_var(var)))
}
