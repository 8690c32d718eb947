mod autoload;
mod events;
mod options;
mod require;
mod result;
mod runtime;

pub use self::options::{InterpreterOptions, OptionsError};
pub use self::result::{RuntimeError, RuntimeResult};
pub use self::runtime::Runtime;
