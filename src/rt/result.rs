use std::{
    error::Error,
    fmt::{Debug, Display, Formatter, Result as FmtResult},
    sync::Arc,
};

use console::style;
use mlua::prelude::*;
use once_cell::sync::Lazy;

pub type RuntimeResult<T, E = RuntimeError> = Result<T, E>;

static STYLED_STACK_BEGIN: Lazy<String> = Lazy::new(|| {
    format!(
        "{}{}{}",
        style("[").dim(),
        style("Stack Begin").blue(),
        style("]").dim()
    )
});

static STYLED_STACK_END: Lazy<String> = Lazy::new(|| {
    format!(
        "{}{}{}",
        style("[").dim(),
        style("Stack End").blue(),
        style("]").dim()
    )
});

// NOTE: Errors are mostly shown in terminals, where tabs render badly
const STACK_TRACE_INDENT: &str = "    ";

/**
    An opaque error type for formatted lua errors.
*/
#[derive(Debug, Clone)]
pub struct RuntimeError {
    error: LuaError,
}

impl RuntimeError {
    /**
        Returns the error messages and the stack traceback, if any,
        with context messages added using [`LuaError::WithContext`] first.
    */
    fn components(&self) -> (Vec<String>, Option<String>) {
        fn message_of(e: &LuaError) -> String {
            if let LuaError::RuntimeError(s) = e {
                s.to_string()
            } else {
                e.to_string()
            }
        }

        let mut error = Arc::new(self.error.clone());
        let mut messages = Vec::new();
        while let LuaError::WithContext {
            ref context,
            ref cause,
        } = *error
        {
            messages.push(context.to_string());
            error = cause.clone();
        }

        let traceback = match &*error {
            LuaError::CallbackError { traceback, cause } => {
                messages.push(message_of(cause));
                Some(traceback.clone())
            }
            LuaError::RuntimeError(s) => {
                // Tracebacks of runtime errors are joined with the message
                if let Some(pos) = s.find("stack traceback:") {
                    let (message, traceback) = s.split_at(pos);
                    messages.push(message.trim().to_string());
                    Some(traceback.to_string())
                } else {
                    messages.push(s.to_string());
                    None
                }
            }
            other => {
                messages.push(message_of(other));
                None
            }
        };

        (messages, traceback)
    }
}

impl From<LuaError> for RuntimeError {
    fn from(value: LuaError) -> Self {
        Self { error: value }
    }
}

impl Display for RuntimeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let (messages, traceback) = self.components();
        for message in messages {
            writeln!(f, "{message}")?;
        }
        let lines = traceback
            .iter()
            .flat_map(|t| t.lines())
            .map(str::trim)
            .filter(|line| !line.is_empty() && *line != "stack traceback:")
            .collect::<Vec<_>>();
        if !lines.is_empty() {
            writeln!(f, "{}", *STYLED_STACK_BEGIN)?;
            for line in lines {
                writeln!(f, "{STACK_TRACE_INDENT}{line}")?;
            }
            write!(f, "{}", *STYLED_STACK_END)?;
        }
        Ok(())
    }
}

impl Error for RuntimeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.error)
    }
}
