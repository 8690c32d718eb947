use std::{
    collections::HashSet,
    io::ErrorKind,
    path::{Path, PathBuf},
    process::Stdio,
};

use tokio::{fs, process::Command};
use tracing::debug;

use lunepack::{
    trace::{parse_report, LoadOrigin, SearchPathEntry, TraceEvent},
    utils::env::{ENV_OPTIONS, ENV_SEARCH_PATH},
};

use super::result::{BuildError, BuildResult};

/**
    A file the traced program loaded, eagerly or through a triggered autoload.
*/
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TracedLoad {
    pub name: String,
    pub path: PathBuf,
    pub origin: LoadOrigin,
}

/**
    A lazy binding the traced program declared using `autoload`.
*/
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeferredBinding {
    pub name: String,
    pub module: String,
    pub candidate: Option<PathBuf>,
    pub triggered: bool,
}

/**
    Everything observed during a single traced run of a program.
*/
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceOutput {
    pub entry: PathBuf,
    pub entry_dir: PathBuf,
    /// Loaded files in load order, each only once.
    pub loads: Vec<TracedLoad>,
    pub deferred: Vec<DeferredBinding>,
    /// The search path as it was when the program finished.
    pub search_paths: Vec<SearchPathEntry>,
}

/**
    Runs a program once, using the interpreter in trace mode,
    and collects everything that the program loaded.
*/
#[derive(Debug, Clone)]
pub struct Tracer {
    interpreter: PathBuf,
    search_paths: Vec<PathBuf>,
    quiet: bool,
}

impl Tracer {
    pub fn new(interpreter: impl Into<PathBuf>) -> Self {
        Self {
            interpreter: interpreter.into(),
            search_paths: Vec::new(),
            quiet: false,
        }
    }

    /**
        Sets the directories to search for modules, in order.
    */
    #[must_use]
    pub fn with_search_paths(mut self, search_paths: Vec<PathBuf>) -> Self {
        self.search_paths = search_paths;
        self
    }

    /**
        Discards anything the traced program writes to stdout and stderr.
    */
    #[must_use]
    pub fn with_quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /**
        Runs the given script to completion and collects its trace.

        The exit code of the program is ignored, programs commonly
        exit with an error when they are run without any arguments.
    */
    pub async fn trace(&self, script: &Path) -> BuildResult<TraceOutput> {
        let dir = tempfile::tempdir()?;
        let report = dir.path().join("trace.jsonl");

        let mut command = Command::new(&self.interpreter);
        command.arg("run");
        for search_path in &self.search_paths {
            command.arg("-I").arg(search_path);
        }
        command
            .arg("--trace")
            .arg(&report)
            .arg("--")
            .arg(script)
            .env_remove(ENV_OPTIONS)
            .env_remove(ENV_SEARCH_PATH)
            .stdin(Stdio::null());
        if self.quiet {
            command.stdout(Stdio::null()).stderr(Stdio::null());
        }

        debug!(?command, "running traced program");
        let status = command.status().await.map_err(BuildError::TraceSpawn)?;
        let Some(code) = status.code() else {
            return Err(BuildError::TraceCrashed(status));
        };
        debug!(code, "traced program exited");

        let contents = match fs::read_to_string(&report).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e.into()),
        };

        collect(parse_report(&contents)?)
    }
}

/**
    Folds trace events into a [`TraceOutput`].

    # Errors

    Errors if the events do not contain a `started` event.
*/
pub fn collect(events: Vec<TraceEvent>) -> BuildResult<TraceOutput> {
    let mut started = None;
    let mut loads = Vec::new();
    let mut seen = HashSet::new();
    let mut deferred: Vec<DeferredBinding> = Vec::new();
    let mut snapshot = None;

    for event in events {
        match event {
            TraceEvent::Started {
                entry,
                entry_dir,
                search_paths,
            } => started = Some((entry, entry_dir, search_paths)),
            TraceEvent::Loaded { name, path, origin } => {
                if seen.insert(path.clone()) {
                    loads.push(TracedLoad { name, path, origin });
                }
            }
            TraceEvent::Deferred {
                name,
                module,
                candidate,
            } => deferred.push(DeferredBinding {
                name,
                module,
                candidate,
                triggered: false,
            }),
            TraceEvent::Triggered { name, .. } => {
                if let Some(binding) = deferred
                    .iter_mut()
                    .rev()
                    .find(|binding| binding.name == name && !binding.triggered)
                {
                    binding.triggered = true;
                }
            }
            TraceEvent::SearchPaths { entries } => snapshot = Some(entries),
        }
    }

    let Some((entry, entry_dir, initial)) = started else {
        return Err(BuildError::TraceNotStarted);
    };

    Ok(TraceOutput {
        entry,
        entry_dir,
        loads,
        deferred,
        search_paths: snapshot.unwrap_or(initial),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn started(search_paths: Vec<SearchPathEntry>) -> TraceEvent {
        TraceEvent::Started {
            entry: PathBuf::from("/app/main.lua"),
            entry_dir: PathBuf::from("/app"),
            search_paths,
        }
    }

    fn loaded(path: &str) -> TraceEvent {
        TraceEvent::Loaded {
            name: path.to_string(),
            path: PathBuf::from(path),
            origin: LoadOrigin::Absolute,
        }
    }

    #[test]
    fn deduplicates_loads_and_marks_triggered_bindings() {
        let output = collect(vec![
            started(Vec::new()),
            loaded("/app/main.lua"),
            TraceEvent::Deferred {
                name: "Foo".to_string(),
                module: "foo".to_string(),
                candidate: Some(PathBuf::from("/app/foo.lua")),
            },
            TraceEvent::Deferred {
                name: "Bar".to_string(),
                module: "bar".to_string(),
                candidate: None,
            },
            TraceEvent::Triggered {
                name: "Foo".to_string(),
                module: "foo".to_string(),
            },
            loaded("/app/foo.lua"),
            loaded("/app/foo.lua"),
        ])
        .unwrap();

        assert_eq!(output.loads.len(), 2);
        assert!(output.deferred[0].triggered);
        assert!(!output.deferred[1].triggered);
    }

    #[test]
    fn prefers_the_final_search_path_snapshot() {
        let initial = vec![SearchPathEntry {
            entry: "/lib".to_string(),
            dir: PathBuf::from("/lib"),
        }];
        let output = collect(vec![started(initial.clone())]).unwrap();
        assert_eq!(output.search_paths, initial);

        let output = collect(vec![
            started(initial),
            TraceEvent::SearchPaths {
                entries: Vec::new(),
            },
        ])
        .unwrap();
        assert!(output.search_paths.is_empty());
    }

    #[test]
    fn requires_a_started_event() {
        assert!(matches!(
            collect(vec![loaded("/app/main.lua")]),
            Err(BuildError::TraceNotStarted)
        ));
    }
}
