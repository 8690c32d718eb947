use mlua::prelude::*;

use crate::{trace::TraceEvent, utils::TableBuilder};

use super::{
    events,
    require::{self, is_relative_name},
};

const AUTOLOAD_IMPL_LUA: &str = r#"
local pending = setmetatable({}, { __mode = "k" })

local function resolve(tbl, key)
    local bindings = pending[tbl]
    local binding = bindings and bindings[key]
    if binding == nil then
        return nil, false
    end
    bindings[key] = nil
    trigger(key, binding.module)
    local result = require(binding.module, binding.dir)
    local value = rawget(tbl, key)
    if value == nil then
        value = result
        rawset(tbl, key, value)
    end
    return value, true
end

return function(tbl, name, module)
    if type(tbl) ~= "table" then
        tbl, name, module = globals, tbl, name
    end
    if type(name) ~= "string" or type(module) ~= "string" then
        error("autoload expects a name and a module name", 2)
    end
    if rawget(tbl, name) ~= nil then
        return
    end
    local bindings = pending[tbl]
    if bindings == nil then
        bindings = {}
        pending[tbl] = bindings
        local meta = getmetatable(tbl)
        if meta == nil then
            meta = {}
            setmetatable(tbl, meta)
        end
        local previous = meta.__index
        meta.__index = function(self, key)
            local value, found = resolve(self, key)
            if found then
                return value
            elseif type(previous) == "function" then
                return previous(self, key)
            elseif previous ~= nil then
                return previous[key]
            end
            return nil
        end
    end
    bindings[name] = { module = module, dir = declare(name, module) }
end
"#;

/**
    Creates the `autoload` function.

    Lazy bindings hook into the `__index` metamethod of the target table,
    which we can only do from Lua, so most of the work happens in a Lua chunk
    that calls back into `declare` and `trigger` for trace events.
*/
pub(crate) fn create(lua: &Lua) -> LuaResult<LuaFunction> {
    let env = TableBuilder::new(lua)?
        .with_globals(&[
            "type",
            "error",
            "rawget",
            "rawset",
            "getmetatable",
            "setmetatable",
        ])?
        .with_value("globals", lua.globals())?
        .with_value("require", require::create_from(lua)?)?
        .with_function("declare", declare)?
        .with_function("trigger", trigger)?
        .build()?;

    lua.load(AUTOLOAD_IMPL_LUA)
        .set_name("=autoload")
        .set_environment(env)
        .call(())
}

/**
    Records a lazy binding. For relative module names, returns the directory
    of the declaring file, which the binding resolves against once it triggers,
    since that may happen long after the declaring file has finished running.
*/
fn declare(lua: &Lua, (name, module): (String, String)) -> LuaResult<Option<String>> {
    let caller_dir = require::caller_dir(lua)?;
    let search = require::search_paths(lua)?;
    let candidate = require::resolve(&module, &caller_dir, &search).map(|resolved| resolved.path);

    let dir = if is_relative_name(&module) {
        let dir = caller_dir.to_str().ok_or_else(|| {
            LuaError::runtime(format!(
                "cannot autoload '{module}' from '{}', the path is not valid unicode",
                caller_dir.display()
            ))
        })?;
        Some(dir.to_string())
    } else {
        None
    };

    events::emit(
        lua,
        TraceEvent::Deferred {
            name,
            module,
            candidate,
        },
    )?;

    Ok(dir)
}

fn trigger(lua: &Lua, (name, module): (String, String)) -> LuaResult<()> {
    events::emit(lua, TraceEvent::Triggered { name, module })
}
