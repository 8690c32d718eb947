use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/**
    Describes how to run the program stored in an archive.

    Every path in the manifest is archive-relative and `/`-separated,
    the launcher joins them onto its extraction directory at run time.
*/
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// The script the interpreter is started with.
    pub entry_script: String,
    /// The interpreter binary to launch.
    pub interpreter: String,
    /// Module search directories, in resolution order.
    pub search_paths: Vec<String>,
    /// Directories prepended to the host's dynamic library search variable.
    pub library_paths: Vec<String>,
    /// Environment adjustments, `None` removes the variable.
    pub environment: BTreeMap<String, Option<String>>,
    /// Whether the payload is compressed as a single unit.
    pub compressed: bool,
}
