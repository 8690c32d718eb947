use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use mlua::prelude::*;

/**
    Bookkeeping for `require`, stored in the app data of the Lua VM.

    Keeps track of the chain of files currently being executed,
    so that relative requires resolve against the requiring file,
    and of every module loaded so far, keyed by absolute path.
*/
#[derive(Debug)]
pub(crate) struct RequireContext {
    entry_dir: PathBuf,
    stack: Vec<PathBuf>,
    loaded: HashMap<PathBuf, LuaRegistryKey>,
}

impl RequireContext {
    pub(crate) fn new(entry: &Path) -> Self {
        Self {
            entry_dir: entry.parent().map(Path::to_path_buf).unwrap_or_default(),
            stack: vec![entry.to_path_buf()],
            loaded: HashMap::new(),
        }
    }

    pub(crate) fn entry_dir(&self) -> &Path {
        &self.entry_dir
    }

    /**
        Returns the directory of the file that is currently executing.
    */
    pub(crate) fn caller_dir(&self) -> PathBuf {
        self.stack
            .last()
            .and_then(|path| path.parent())
            .unwrap_or(&self.entry_dir)
            .to_path_buf()
    }

    pub(crate) fn is_loading(&self, path: &Path) -> bool {
        self.stack.iter().any(|p| p == path)
    }

    pub(crate) fn push(&mut self, path: PathBuf) {
        self.stack.push(path);
    }

    pub(crate) fn pop(&mut self) {
        self.stack.pop();
    }

    pub(crate) fn get_loaded(&self, lua: &Lua, path: &Path) -> LuaResult<Option<LuaValue>> {
        self.loaded
            .get(path)
            .map(|key| lua.registry_value::<LuaValue>(key))
            .transpose()
    }

    pub(crate) fn set_loaded(&mut self, path: PathBuf, key: LuaRegistryKey) {
        self.loaded.insert(path, key);
    }
}
