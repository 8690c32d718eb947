use std::{
    cell::RefCell,
    env,
    path::{Path, PathBuf},
};

use mlua::prelude::*;
use tracing::debug;

use crate::{
    trace::{LoadOrigin, TraceEvent, TraceWriter},
    utils::{path::clean_path_and_make_absolute, Label, TableBuilder},
};

use super::{
    autoload, events,
    options::InterpreterOptions,
    require::{self, RequireContext, LOADPATH_KEY},
    RuntimeResult,
};

const OS_EXIT_REGISTRY_KEY: &str = "lunepack.os.exit";

/**
    An embedded Lua 5.4 interpreter that runs a single script.
*/
#[derive(Debug)]
pub struct Runtime {
    lua: Lua,
    args: Vec<String>,
    search_paths: Vec<PathBuf>,
    options: InterpreterOptions,
    trace_report: Option<PathBuf>,
}

impl Runtime {
    /**
        Creates a new runtime, with a new Lua VM.
    */
    #[must_use]
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self {
            lua: Lua::new(),
            args: Vec::new(),
            search_paths: Vec::new(),
            options: InterpreterOptions::default(),
            trace_report: None,
        }
    }

    /**
        Sets arguments to give to the script, in `arg` and as `...`.
    */
    #[must_use]
    pub fn with_args<V>(mut self, args: V) -> Self
    where
        V: Into<Vec<String>>,
    {
        self.args = args.into();
        self
    }

    /**
        Sets the initial contents of `package.loadpath`.

        Relative directories are made absolute against the current working directory.
    */
    #[must_use]
    pub fn with_search_paths<V>(mut self, paths: V) -> Self
    where
        V: Into<Vec<PathBuf>>,
    {
        self.search_paths = paths.into();
        self
    }

    /**
        Sets interpreter options, usually read from `LUNEPACK_OPTS`.

        Note that include directories given in the options are not
        added to the search path here, see [`Runtime::with_search_paths`].
    */
    #[must_use]
    pub fn with_options(mut self, options: InterpreterOptions) -> Self {
        self.options = options;
        self
    }

    /**
        Makes the runtime write a trace report of every
        module it loads to the file at the given path.
    */
    #[must_use]
    pub fn with_trace_report(mut self, path: impl Into<PathBuf>) -> Self {
        self.trace_report = Some(path.into());
        self
    }

    /**
        Runs a Lua script file inside of the current runtime.

        Note that `os.exit` exits the process directly, in which case this never returns.

        # Errors

        This function will return an error if the script fails to load or run.
    */
    pub fn run_file(&mut self, script: impl AsRef<Path>) -> RuntimeResult<()> {
        let script = script.as_ref();
        let cwd = env::current_dir()
            .map_err(|e| LuaError::runtime(format!("cannot read current directory: {e}")))?;
        let entry = clean_path_and_make_absolute(script, &cwd);
        let context = RequireContext::new(&entry);
        let entry_dir = context.entry_dir().to_path_buf();

        self.lua.set_app_data(context);
        if let Some(report) = &self.trace_report {
            let writer = TraceWriter::create(report).map_err(|e| {
                LuaError::runtime(format!(
                    "cannot create trace report '{}': {e}",
                    report.display()
                ))
            })?;
            self.lua.set_app_data(writer);
        }

        self.inject_globals(script, &cwd)?;
        if self.options.warnings {
            self.enable_warnings();
        }

        events::emit(
            &self.lua,
            TraceEvent::Started {
                entry: entry.clone(),
                entry_dir,
                search_paths: require::search_paths(&self.lua)?,
            },
        )?;
        events::emit(
            &self.lua,
            TraceEvent::Loaded {
                name: script.display().to_string(),
                path: entry.clone(),
                origin: LoadOrigin::Entry,
            },
        )?;

        let result = self.run_main(&entry);
        let snapshot = events::emit_search_paths(&self.lua);
        result?;
        snapshot?;

        Ok(())
    }

    fn run_main(&self, entry: &Path) -> LuaResult<()> {
        let globals = self.lua.globals();

        let require: LuaFunction = globals.get("require")?;
        for module in &self.options.require_modules {
            debug!(module = %module, "requiring module from interpreter options");
            let value: LuaValue = require.call(module.as_str())?;
            globals.set(module.as_str(), value)?;
        }

        let main = require::load_chunk(&self.lua, entry)?;
        main.call::<()>(LuaVariadic::from_iter(self.args.iter().cloned()))
    }

    fn inject_globals(&self, script: &Path, cwd: &Path) -> LuaResult<()> {
        let lua = &self.lua;
        let globals = lua.globals();

        globals.set("require", require::create(lua)?)?;
        globals.set("autoload", autoload::create(lua)?)?;

        let loadpath = TableBuilder::new(lua)?
            .with_sequential_values(self.search_paths.iter().map(|path| {
                clean_path_and_make_absolute(path, cwd)
                    .display()
                    .to_string()
            }))?
            .build()?;
        globals
            .get::<LuaTable>("package")?
            .set(LOADPATH_KEY, loadpath)?;

        let arg = TableBuilder::new(lua)?
            .with_value(0, script.display().to_string())?
            .with_sequential_values(self.args.clone())?
            .build()?;
        globals.set("arg", arg)?;

        // The original function is kept in the registry, a
        // reference from the wrapper itself would never be freed
        let os: LuaTable = globals.get("os")?;
        lua.set_named_registry_value(OS_EXIT_REGISTRY_KEY, os.get::<LuaFunction>("exit")?)?;
        os.set(
            "exit",
            lua.create_function(|lua, code: LuaValue| {
                events::emit_search_paths(lua)?;
                let exit: LuaFunction = lua.named_registry_value(OS_EXIT_REGISTRY_KEY)?;
                exit.call::<()>(code)
            })?,
        )?;

        Ok(())
    }

    fn enable_warnings(&self) {
        let pending = RefCell::new(String::new());
        self.lua.set_warning_function(move |_, message, incomplete| {
            let mut pending = pending.borrow_mut();
            pending.push_str(message);
            if !incomplete {
                let message = std::mem::take(&mut *pending);
                // Control messages such as "@on" are not warnings
                if !message.starts_with('@') {
                    eprintln!("{} {message}", Label::Warn);
                }
            }
            Ok(())
        });
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use crate::trace::parse_report;

    use super::*;

    struct Fixture {
        dir: tempfile::TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                dir: tempfile::tempdir().unwrap(),
            }
        }

        fn path(&self, rel: &str) -> PathBuf {
            self.dir.path().join(rel)
        }

        fn write(&self, rel: &str, contents: &str) -> PathBuf {
            let path = self.path(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, contents).unwrap();
            path
        }

        fn run(&self, runtime: Runtime, script: &str) -> (RuntimeResult<()>, Vec<TraceEvent>) {
            let report = self.path("trace.jsonl");
            let result = runtime
                .with_trace_report(&report)
                .run_file(self.path(script));
            let events = parse_report(&fs::read_to_string(&report).unwrap()).unwrap();
            (result, events)
        }
    }

    fn loaded_paths(events: &[TraceEvent]) -> Vec<PathBuf> {
        events
            .iter()
            .filter_map(|event| match event {
                TraceEvent::Loaded { path, .. } => Some(path.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn requires_through_search_paths() {
        let fx = Fixture::new();
        fx.write("lib/util.lua", "return { answer = 42 }");
        fx.write("lib/net/init.lua", "return 'net'");
        fx.write(
            "app/main.lua",
            "local util = require('util')\n\
             assert(util.answer == 42)\n\
             assert(require('util') == util)\n\
             assert(require('net') == 'net')\n\
             assert(package.loaded.util == util)\n",
        );

        let runtime = Runtime::new().with_search_paths(vec![fx.path("lib")]);
        let (result, events) = fx.run(runtime, "app/main.lua");
        result.unwrap();

        assert!(matches!(events.first(), Some(TraceEvent::Started { .. })));
        assert_eq!(
            loaded_paths(&events),
            vec![
                fx.path("app/main.lua"),
                fx.path("lib/util.lua"),
                fx.path("lib/net/init.lua"),
            ]
        );
        assert!(events.iter().any(|event| matches!(
            event,
            TraceEvent::Loaded {
                origin: LoadOrigin::SearchPath { rank: 0, .. },
                ..
            }
        )));
        assert!(matches!(events.last(), Some(TraceEvent::SearchPaths { .. })));
    }

    #[test]
    fn relative_requires_load_each_file_once() {
        let fx = Fixture::new();
        fx.write("src/helpers/fmt.lua", "count = (count or 0) + 1\nreturn {}");
        fx.write("src/helpers/init.lua", "return require('./fmt')");
        fx.write(
            "src/main.lua",
            "local a = require('./helpers')\n\
             local b = require('./helpers/fmt.lua')\n\
             assert(a == b and count == 1)\n",
        );

        let (result, events) = fx.run(Runtime::new(), "src/main.lua");
        result.unwrap();
        assert_eq!(
            loaded_paths(&events),
            vec![
                fx.path("src/main.lua"),
                fx.path("src/helpers/init.lua"),
                fx.path("src/helpers/fmt.lua"),
            ]
        );
    }

    #[test]
    fn runtime_search_paths_are_relative_to_the_entry_script() {
        let fx = Fixture::new();
        fx.write("proj/vendor/json.lua", "return 'json'");
        fx.write(
            "proj/main.lua",
            "table.insert(package.loadpath, 'vendor')\n\
             assert(require('json') == 'json')\n",
        );

        let (result, events) = fx.run(Runtime::new(), "proj/main.lua");
        result.unwrap();

        let Some(TraceEvent::SearchPaths { entries }) = events.last() else {
            panic!("missing search path snapshot");
        };
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].entry, "vendor");
        assert_eq!(entries[0].dir, fx.path("proj/vendor"));
    }

    #[test]
    fn autoload_defers_until_first_access() {
        let fx = Fixture::new();
        fx.write("lib/foo.lua", "Foo = { name = 'foo' }");
        fx.write("lib/bar.lua", "return { name = 'bar' }");
        fx.write(
            "main.lua",
            "autoload('Foo', 'foo')\n\
             local ns = {}\n\
             autoload(ns, 'Bar', 'bar')\n\
             autoload('Never', 'does.not.exist')\n\
             assert(rawget(_G, 'Foo') == nil)\n\
             assert(Foo.name == 'foo')\n\
             assert(ns.Bar.name == 'bar')\n",
        );

        let runtime = Runtime::new().with_search_paths(vec![fx.path("lib")]);
        let (result, events) = fx.run(runtime, "main.lua");
        result.unwrap();

        let deferred = events
            .iter()
            .filter_map(|event| match event {
                TraceEvent::Deferred {
                    name, candidate, ..
                } => Some((name.as_str(), candidate.clone())),
                _ => None,
            })
            .collect::<Vec<_>>();
        assert_eq!(
            deferred,
            vec![
                ("Foo", Some(fx.path("lib/foo.lua"))),
                ("Bar", Some(fx.path("lib/bar.lua"))),
                ("Never", None),
            ]
        );

        let triggered = events
            .iter()
            .filter(|event| matches!(event, TraceEvent::Triggered { .. }))
            .count();
        assert_eq!(triggered, 2);
        assert_eq!(loaded_paths(&events).len(), 3);
    }

    #[test]
    fn relative_autoloads_resolve_against_the_declaring_file() {
        let fx = Fixture::new();
        fx.write("shared/thing.lua", "return { x = 42 }");
        fx.write("src/util/init.lua", "autoload('Shared', '../../shared/thing')");
        fx.write(
            "src/main.lua",
            "require('./util')\n\
             assert(Shared.x == 42)\n",
        );

        let (result, events) = fx.run(Runtime::new(), "src/main.lua");
        result.unwrap();

        let thing = events.iter().find_map(|event| match event {
            TraceEvent::Loaded { path, origin, .. } if *path == fx.path("shared/thing.lua") => {
                Some(origin.clone())
            }
            _ => None,
        });
        assert_eq!(thing, Some(LoadOrigin::Relative));
    }

    #[test]
    fn passes_arguments_to_the_script() {
        let fx = Fixture::new();
        fx.write(
            "main.lua",
            "#!/usr/bin/env lunepack\n\
             local a, b = ...\n\
             assert(a == 'foo' and b == 'bar baz')\n\
             assert(arg[1] == 'foo' and arg[2] == 'bar baz' and #arg == 2)\n",
        );

        let runtime =
            Runtime::new().with_args(vec!["foo".to_string(), "bar baz".to_string()]);
        let (result, _) = fx.run(runtime, "main.lua");
        result.unwrap();
    }

    #[test]
    fn cyclic_requires_fail() {
        let fx = Fixture::new();
        fx.write("a.lua", "return require('./b')");
        fx.write("b.lua", "return require('./a')");
        fx.write("main.lua", "require('./a')");

        let (result, events) = fx.run(Runtime::new(), "main.lua");
        let error = result.unwrap_err().to_string();
        assert!(error.contains("cyclic require"), "{error}");
        assert!(matches!(events.last(), Some(TraceEvent::SearchPaths { .. })));
    }

    #[test]
    fn requires_modules_from_options() {
        let fx = Fixture::new();
        fx.write("lib/strict.lua", "return { on = true }");
        fx.write("main.lua", "assert(strict.on)");

        let options = InterpreterOptions::parse("-l strict").unwrap();
        let runtime = Runtime::new()
            .with_search_paths(vec![fx.path("lib")])
            .with_options(options);
        let (result, _) = fx.run(runtime, "main.lua");
        result.unwrap();
    }
}
