#![allow(clippy::cargo_common_metadata)]

mod rt;

pub mod archive;
pub mod trace;
pub mod utils;

pub use crate::rt::{InterpreterOptions, OptionsError, Runtime, RuntimeError, RuntimeResult};
