use std::{
    fs,
    path::{Path, PathBuf},
};

use mlua::prelude::*;
use tracing::debug;

use crate::trace::{SearchPathEntry, TraceEvent};

use super::events;

mod context;
mod resolver;

pub(crate) use self::context::RequireContext;
pub(crate) use self::resolver::{is_relative_name, resolve, resolve_entry};

/// Key of the search path table inside of the global `package` table.
pub(crate) const LOADPATH_KEY: &str = "loadpath";

pub(crate) fn create(lua: &Lua) -> LuaResult<LuaFunction> {
    lua.create_function(require)
}

/**
    Creates a `require` that takes the directory to resolve relative
    names against as its second argument, instead of using the directory
    of the file that is currently executing.
*/
pub(crate) fn create_from(lua: &Lua) -> LuaResult<LuaFunction> {
    lua.create_function(|lua, (name, dir): (String, Option<String>)| {
        let caller_dir = match dir {
            Some(dir) => PathBuf::from(dir),
            None => caller_dir(lua)?,
        };
        require_from(lua, name, &caller_dir)
    })
}

fn context_missing() -> LuaError {
    LuaError::runtime("require context is missing from the lua app data")
}

/**
    Returns the directory of the file that is currently executing.
*/
pub(crate) fn caller_dir(lua: &Lua) -> LuaResult<PathBuf> {
    let ctx = lua
        .app_data_ref::<RequireContext>()
        .ok_or_else(context_missing)?;
    Ok(ctx.caller_dir())
}

/**
    Reads the current contents of `package.loadpath`, with every entry resolved.

    Entries that are not strings are ignored.
*/
pub(crate) fn search_paths(lua: &Lua) -> LuaResult<Vec<SearchPathEntry>> {
    let entry_dir = lua
        .app_data_ref::<RequireContext>()
        .ok_or_else(context_missing)?
        .entry_dir()
        .to_path_buf();

    let package: LuaTable = lua.globals().get("package")?;
    let LuaValue::Table(loadpath) = package.get::<LuaValue>(LOADPATH_KEY)? else {
        return Err(LuaError::runtime("package.loadpath must be a table"));
    };

    let mut entries = Vec::new();
    for value in loadpath.sequence_values::<LuaValue>() {
        match value? {
            LuaValue::String(s) => entries.push(resolve_entry(&s.to_str()?, &entry_dir)),
            other => debug!(kind = other.type_name(), "ignoring non-string search path entry"),
        }
    }
    Ok(entries)
}

/**
    Loads a Lua source file into a function, without running it.

    A leading `#` line is skipped, so that scripts may start with a shebang.
*/
pub(crate) fn load_chunk(lua: &Lua, path: &Path) -> LuaResult<LuaFunction> {
    let mut source = fs::read(path)
        .map_err(|e| LuaError::runtime(format!("cannot read '{}': {e}", path.display())))?;
    if source.first() == Some(&b'#') {
        let end = source
            .iter()
            .position(|b| *b == b'\n')
            .unwrap_or(source.len());
        source.drain(..end);
    }
    lua.load(source)
        .set_name(format!("@{}", path.display()))
        .into_function()
}

fn require(lua: &Lua, name: String) -> LuaResult<LuaValue> {
    let caller_dir = caller_dir(lua)?;
    require_from(lua, name, &caller_dir)
}

fn require_from(lua: &Lua, name: String, caller_dir: &Path) -> LuaResult<LuaValue> {
    // Relative names mean different files depending on the
    // requiring file, so those are only ever cached by path
    let by_name = !is_relative_name(&name);

    let loaded: LuaTable = lua.globals().get::<LuaTable>("package")?.get("loaded")?;
    if by_name {
        let existing: LuaValue = loaded.get(name.as_str())?;
        if !matches!(existing, LuaValue::Nil | LuaValue::Boolean(false)) {
            return Ok(existing);
        }
    }

    let search = search_paths(lua)?;
    let Some(resolved) = resolve(&name, caller_dir, &search) else {
        return Err(LuaError::runtime(not_found_message(&name, &search)));
    };

    let cached = {
        let ctx = lua
            .app_data_ref::<RequireContext>()
            .ok_or_else(context_missing)?;
        if ctx.is_loading(&resolved.path) {
            return Err(LuaError::runtime(format!(
                "cyclic require of '{name}' at '{}'",
                resolved.path.display()
            )));
        }
        ctx.get_loaded(lua, &resolved.path)?
    };
    if let Some(value) = cached {
        if by_name {
            loaded.set(name.as_str(), value.clone())?;
        }
        return Ok(value);
    }

    debug!(name = %name, path = %resolved.path.display(), "loading module");
    events::emit(
        lua,
        TraceEvent::Loaded {
            name: name.clone(),
            path: resolved.path.clone(),
            origin: resolved.origin,
        },
    )?;

    let chunk = load_chunk(lua, &resolved.path)?;
    lua.app_data_mut::<RequireContext>()
        .ok_or_else(context_missing)?
        .push(resolved.path.clone());
    let result = chunk.call::<LuaValue>((name.as_str(), resolved.path.display().to_string()));
    lua.app_data_mut::<RequireContext>()
        .ok_or_else(context_missing)?
        .pop();

    // Modules may also register themselves in package.loaded
    let mut value = result?;
    if value.is_nil() && by_name {
        value = loaded.get(name.as_str())?;
    }
    if value.is_nil() {
        value = LuaValue::Boolean(true);
    }

    if by_name {
        loaded.set(name.as_str(), value.clone())?;
    }
    let key = lua.create_registry_value(value.clone())?;
    lua.app_data_mut::<RequireContext>()
        .ok_or_else(context_missing)?
        .set_loaded(resolved.path, key);

    Ok(value)
}

fn not_found_message(name: &str, search: &[SearchPathEntry]) -> String {
    let mut message = format!("module '{name}' not found");
    if !is_relative_name(name) && !Path::new(name).is_absolute() {
        for entry in search {
            message.push_str(&format!("\n\tno module in '{}'", entry.dir.display()));
        }
    }
    message
}
