mod label;
mod table_builder;

pub mod env;
pub mod files;
pub mod path;

pub use self::label::Label;
pub use self::table_builder::TableBuilder;
