use mlua::prelude::*;

/**
    Chained construction of Lua tables, used for the globals that
    the runtime injects and for environments of internal chunks.

    All writes are raw, metatables are never consulted.
*/
pub struct TableBuilder {
    lua: Lua,
    tab: LuaTable,
}

impl TableBuilder {
    pub fn new(lua: &Lua) -> LuaResult<Self> {
        Ok(Self {
            lua: lua.clone(),
            tab: lua.create_table()?,
        })
    }

    pub fn with_value<K, V>(self, key: K, value: V) -> LuaResult<Self>
    where
        K: IntoLua,
        V: IntoLua,
    {
        self.tab.raw_set(key, value)?;
        Ok(self)
    }

    /**
        Pushes values onto the end of the array part, starting at `#t + 1`.
    */
    pub fn with_sequential_values<V>(self, values: impl IntoIterator<Item = V>) -> LuaResult<Self>
    where
        V: IntoLua,
    {
        for value in values {
            self.tab.raw_push(value)?;
        }
        Ok(self)
    }

    pub fn with_function<K, A, R, F>(self, key: K, func: F) -> LuaResult<Self>
    where
        K: IntoLua,
        A: FromLuaMulti,
        R: IntoLuaMulti,
        F: Fn(&Lua, A) -> LuaResult<R> + 'static,
    {
        let function = self.lua.create_function(func)?;
        self.with_value(key, function)
    }

    /**
        Copies the given globals into the table, under the same names.
    */
    pub fn with_globals(self, names: &[&str]) -> LuaResult<Self> {
        let globals = self.lua.globals();
        for name in names {
            self.tab.raw_set(*name, globals.raw_get::<LuaValue>(*name)?)?;
        }
        Ok(self)
    }

    pub fn build(self) -> LuaResult<LuaTable> {
        Ok(self.tab)
    }
}
