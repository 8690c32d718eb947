/*!
    Trace reports, written by the interpreter when running with `--trace`
    and read back by the build command to find out what a program loads.

    A report is a sequence of JSON objects, one per line, each flushed
    to disk as soon as it happens so that a program that exits abruptly
    still leaves behind everything it did up to that point.
*/

use std::{
    fs::File,
    io::{self, Write},
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

/**
    A single entry of the module search path.
*/
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchPathEntry {
    /// The entry exactly as the program sees it in `package.loadpath`.
    pub entry: String,
    /// The absolute directory the entry resolves to.
    pub dir: PathBuf,
}

/**
    How the interpreter found a loaded file.
*/
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LoadOrigin {
    /// The script the interpreter was started with.
    Entry,
    /// A `./` or `../` path, relative to the requiring file.
    Relative,
    /// An absolute path.
    Absolute,
    /// The search path entry at position `rank`.
    SearchPath {
        rank: usize,
        entry: String,
        root: PathBuf,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TraceEvent {
    Started {
        entry: PathBuf,
        entry_dir: PathBuf,
        search_paths: Vec<SearchPathEntry>,
    },
    Loaded {
        name: String,
        path: PathBuf,
        origin: LoadOrigin,
    },
    Deferred {
        name: String,
        module: String,
        candidate: Option<PathBuf>,
    },
    Triggered {
        name: String,
        module: String,
    },
    SearchPaths {
        entries: Vec<SearchPathEntry>,
    },
}

/**
    Appends trace events to a report file.
*/
#[derive(Debug)]
pub struct TraceWriter {
    file: File,
}

impl TraceWriter {
    /**
        Creates a new, empty report at the given path.

        # Errors

        Errors if the file can not be created.
    */
    pub fn create(path: impl AsRef<Path>) -> io::Result<Self> {
        Ok(Self {
            file: File::create(path)?,
        })
    }

    /**
        Writes a single event and flushes it to disk.

        # Errors

        Errors if the event could not be written.
    */
    pub fn emit(&mut self, event: &TraceEvent) -> io::Result<()> {
        let mut line = serde_json::to_vec(event)?;
        line.push(b'\n');
        self.file.write_all(&line)?;
        self.file.flush()
    }
}

/**
    Parses the contents of a trace report, skipping blank lines.

    # Errors

    Errors if any non-blank line is not a valid event.
*/
pub fn parse_report(contents: &str) -> Result<Vec<TraceEvent>, serde_json::Error> {
    contents
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(serde_json::from_str)
        .collect()
}
