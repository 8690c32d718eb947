use mlua::prelude::*;
use tracing::trace;

use crate::trace::{TraceEvent, TraceWriter};

use super::require;

/**
    Writes an event to the trace report, if the runtime is tracing.
*/
pub(crate) fn emit(lua: &Lua, event: TraceEvent) -> LuaResult<()> {
    let Some(mut writer) = lua.app_data_mut::<TraceWriter>() else {
        return Ok(());
    };
    trace!(?event, "trace event");
    writer.emit(&event).map_err(LuaError::external)
}

/**
    Writes a snapshot of the current search path to the trace report.

    Does nothing, including reading the search path, if the runtime is not tracing.
*/
pub(crate) fn emit_search_paths(lua: &Lua) -> LuaResult<()> {
    if lua.app_data_ref::<TraceWriter>().is_none() {
        return Ok(());
    }
    let entries = require::search_paths(lua)?;
    emit(lua, TraceEvent::SearchPaths { entries })
}
