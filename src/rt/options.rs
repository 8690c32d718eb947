use std::{env, path::PathBuf};

use thiserror::Error;

use crate::utils::env::ENV_OPTIONS;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OptionsError {
    #[error("interpreter option '{0}' requires an argument")]
    MissingArgument(String),
    #[error("unknown interpreter option '{0}'")]
    UnknownOption(String),
    #[error("LUNEPACK_OPTS is not valid unicode")]
    NotUnicode,
}

/**
    Extra interpreter options, given as whitespace separated
    flags in the `LUNEPACK_OPTS` environment variable.

    - `-I DIR` / `-IDIR` adds a module search directory
    - `-l MODULE` / `-lMODULE` requires a module before the script runs
    - `-W` turns on Lua warnings
*/
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InterpreterOptions {
    pub include_dirs: Vec<PathBuf>,
    pub require_modules: Vec<String>,
    pub warnings: bool,
}

impl InterpreterOptions {
    /**
        Parses interpreter options from a string.

        # Errors

        Errors on unknown options, and on options missing their argument.
    */
    pub fn parse(options: &str) -> Result<Self, OptionsError> {
        let mut parsed = Self::default();
        let mut words = options.split_whitespace();
        while let Some(word) = words.next() {
            if word == "-W" {
                parsed.warnings = true;
            } else if let Some(rest) = word.strip_prefix("-I") {
                let dir = take_argument(word, rest, &mut words)?;
                parsed.include_dirs.push(PathBuf::from(dir));
            } else if let Some(rest) = word.strip_prefix("-l") {
                let module = take_argument(word, rest, &mut words)?;
                parsed.require_modules.push(module.to_string());
            } else {
                return Err(OptionsError::UnknownOption(word.to_string()));
            }
        }
        Ok(parsed)
    }

    /**
        Reads interpreter options from the `LUNEPACK_OPTS` environment variable.

        A missing variable means no options.

        # Errors

        Errors if the variable is set but can not be parsed.
    */
    pub fn from_env() -> Result<Self, OptionsError> {
        match env::var(ENV_OPTIONS) {
            Ok(options) => Self::parse(&options),
            Err(env::VarError::NotPresent) => Ok(Self::default()),
            Err(env::VarError::NotUnicode(_)) => Err(OptionsError::NotUnicode),
        }
    }
}

fn take_argument<'a>(
    option: &str,
    attached: &'a str,
    words: &mut impl Iterator<Item = &'a str>,
) -> Result<&'a str, OptionsError> {
    if attached.is_empty() {
        words
            .next()
            .ok_or_else(|| OptionsError::MissingArgument(option.to_string()))
    } else {
        Ok(attached)
    }
}
