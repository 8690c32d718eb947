use std::fmt;

use console::{style, Color};

/**
    Prefix for diagnostics that lunepack itself prints to stderr,
    as opposed to anything printed by the program being run.

    ```rs
    eprintln!("{} failed to read embedded program", Label::Error);
    // [ERROR] failed to read embedded program
    ```
*/
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Label {
    Warn,
    Error,
}

impl Label {
    fn parts(self) -> (&'static str, Color) {
        match self {
            Self::Warn => ("WARN", Color::Yellow),
            Self::Error => ("ERROR", Color::Red),
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (name, color) = self.parts();
        write!(
            f,
            "{}{}{}",
            style("[").dim(),
            style(name).fg(color),
            style("]").dim()
        )
    }
}
