//! The scripting engine: parsing, evaluation and the state they share.

pub mod builtins;
pub mod control_flow;
pub mod dispatch;
pub mod environment;
pub mod error;
pub mod evaluator;
mod expr_parser;
pub mod host;
pub mod include;
pub mod object;
pub mod parser;
pub(crate) mod resolve;
pub mod symbols;
pub mod task;
pub mod value_utils;

use std::fmt;
use std::sync::Arc;

pub use control_flow::ControlFlow;
pub use dispatch::{CallSite, Resolved};
pub use environment::Environment;
pub use error::{Error, InterpreterError, ParseError};
pub use evaluator::Interpreter;
pub use host::{HostRef, HostType, Reflector};
pub use symbols::Symbols;

use crate::ast::Node;
use crate::config::EngineConfig;
use crate::value::{Context, Value};

/// A parsed document, ready to evaluate any number of times.
#[derive(Debug, Clone)]
pub struct Program {
    root: Arc<Node>,
    template: bool,
}

impl Program {
    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn is_template(&self) -> bool {
        self.template
    }
}

/// Source text equivalent to the program. A template renders in code mode
/// wrapped in `<% %>`, so it parses back with [`Engine::parse_template`].
impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.template {
            write!(f, "<% {} %>", self.root)
        } else {
            write!(f, "{}", self.root)
        }
    }
}

/// One engine instance. Declarations, the `Static` table, persisted slots
/// and registered host types live as long as the engine.
#[derive(Clone, Default)]
pub struct Engine {
    symbols: Arc<Symbols>,
}

impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self { symbols: Arc::new(Symbols::new(config)) }
    }

    pub fn config(&self) -> &EngineConfig {
        self.symbols.config()
    }

    pub fn symbols(&self) -> &Arc<Symbols> {
        &self.symbols
    }

    /// The `Static` table, shared by every evaluation on this engine.
    pub fn statics(&self) -> &Context {
        self.symbols.statics()
    }

    pub fn register_type(&self, host_type: HostType) {
        self.symbols.register_type(host_type);
    }

    /// Parses a script. Classes and functions it declares become visible
    /// to every later evaluation on this engine.
    pub fn parse(&self, source: &str) -> Result<Program, ParseError> {
        self.parse_mode(source, false)
    }

    /// Parses a template: text with `<% code %>` blocks and `<%= expr %>`
    /// output tags.
    pub fn parse_template(&self, source: &str) -> Result<Program, ParseError> {
        self.parse_mode(source, true)
    }

    fn parse_mode(&self, source: &str, template: bool) -> Result<Program, ParseError> {
        let root = parser::parse_document(&self.symbols, source, template)?;
        Ok(Program { root: Arc::new(root), template })
    }

    /// Evaluates `program` against `context` for its value.
    pub fn evaluate(&self, program: &Program, context: &Context) -> Result<Value, InterpreterError> {
        self.interpreter(context).run(&program.root)
    }

    /// Evaluates `program` against `context`, appending its output to `out`.
    pub fn evaluate_to(&self, program: &Program, out: &mut String, context: &Context) -> Result<(), InterpreterError> {
        self.interpreter(context).render(&program.root, out)
    }

    /// Parses and evaluates a script.
    pub fn run(&self, source: &str, context: &Context) -> Result<Value, Error> {
        let program = self.parse(source)?;
        Ok(self.evaluate(&program, context)?)
    }

    /// Parses and renders a template.
    pub fn render(&self, source: &str, context: &Context) -> Result<String, Error> {
        let program = self.parse_template(source)?;
        let mut out = String::new();
        self.evaluate_to(&program, &mut out, context)?;
        Ok(out)
    }

    fn interpreter(&self, context: &Context) -> Interpreter {
        Interpreter::new(self.symbols.clone(), context.clone())
    }
}
