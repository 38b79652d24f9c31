pub mod ast;
pub mod cli;
pub mod config;
pub mod convert;
pub mod cursor;
pub mod diagnostic;
pub mod format;
pub mod interpreter;
pub mod logging;
pub mod stack;
pub mod value;

pub use config::EngineConfig;
pub use interpreter::{Engine, Error, Program};
pub use value::{Context, Value};
