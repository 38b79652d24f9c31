use thiserror::Error;

use crate::diagnostic::{Diagnostic, Label, Span};
use crate::value::Value;

/// An exception raised while evaluating. A `try` turns it into a value.
#[derive(Debug, Clone, Error)]
pub enum InterpreterError {
    #[error("type error: {message}")]
    TypeError { message: String, span: Span },

    #[error("division by zero")]
    DivisionByZero { span: Span },

    #[error("invalid operation: {message}")]
    InvalidOperation { message: String, span: Span },

    #[error("call depth exceeded {depth}")]
    RecursionLimit { depth: usize, span: Span },

    #[error("{value}")]
    Thrown { value: Value, span: Span },

    #[error("include `{path}` failed: {message}")]
    Include { path: String, message: String, span: Span },

    #[error("host call failed: {message}")]
    Host { message: String, span: Span },

    #[error("evaluation cancelled")]
    Cancelled,
}

impl InterpreterError {
    pub fn type_error(message: impl Into<String>) -> Self {
        Self::TypeError { message: message.into(), span: Span::dummy() }
    }

    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation { message: message.into(), span: Span::dummy() }
    }

    pub fn host(message: impl Into<String>) -> Self {
        Self::Host { message: message.into(), span: Span::dummy() }
    }

    pub fn division_by_zero_at(span: Span) -> Self {
        Self::DivisionByZero { span }
    }

    pub fn span(&self) -> Span {
        match self {
            Self::TypeError { span, .. }
            | Self::DivisionByZero { span }
            | Self::InvalidOperation { span, .. }
            | Self::RecursionLimit { span, .. }
            | Self::Thrown { span, .. }
            | Self::Include { span, .. }
            | Self::Host { span, .. } => *span,
            Self::Cancelled => Span::dummy(),
        }
    }

    /// Attaches `span` unless the error already carries a location.
    pub fn at(mut self, at: Span) -> Self {
        match &mut self {
            Self::TypeError { span, .. }
            | Self::DivisionByZero { span }
            | Self::InvalidOperation { span, .. }
            | Self::RecursionLimit { span, .. }
            | Self::Thrown { span, .. }
            | Self::Include { span, .. }
            | Self::Host { span, .. } => {
                if span.is_dummy() {
                    *span = at;
                }
            }
            Self::Cancelled => {}
        }
        self
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::TypeError { .. } => "E0201",
            Self::DivisionByZero { .. } => "E0202",
            Self::InvalidOperation { .. } => "E0203",
            Self::RecursionLimit { .. } => "E0204",
            Self::Thrown { .. } => "E0205",
            Self::Include { .. } => "E0206",
            Self::Host { .. } => "E0207",
            Self::Cancelled => "E0208",
        }
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        let label = match self {
            Self::DivisionByZero { .. } => "divisor is zero",
            Self::RecursionLimit { .. } => "while calling this",
            Self::Thrown { .. } => "thrown here",
            _ => "",
        };
        let mut diagnostic = Diagnostic::error(self.to_string()).with_code(self.code());
        let span = self.span();
        if !span.is_dummy() {
            diagnostic = diagnostic.with_label(Label::primary(span, label));
        }
        match self {
            Self::Thrown { .. } => {
                diagnostic = diagnostic.with_help("wrap the statement in `try` to capture the exception as a value");
            }
            Self::RecursionLimit { .. } => {
                diagnostic = diagnostic.with_note("the limit is set by `--max-depth` or `EngineConfig::with_max_call_depth`");
            }
            _ => {}
        }
        diagnostic
    }
}

/// A syntax error in a construct whose leading keyword was recognized.
#[derive(Debug, Clone, Error)]
pub enum ParseError {
    #[error("expected {expected} {context}")]
    Expected { expected: &'static str, context: String, span: Span },

    #[error("unmatched `{bracket}`")]
    Unmatched { bracket: char, span: Span },

    #[error("unterminated {what}")]
    Unterminated { what: &'static str, span: Span },

    #[error("unexpected input `{found}`")]
    Unexpected { found: String, span: Span },

    #[error("cannot include `{path}`: {message}")]
    Include { path: String, message: String, span: Span },
}

impl ParseError {
    pub fn expected(expected: &'static str, context: impl Into<String>, span: Span) -> Self {
        Self::Expected { expected, context: context.into(), span }
    }

    pub fn span(&self) -> Span {
        match self {
            Self::Expected { span, .. }
            | Self::Unmatched { span, .. }
            | Self::Unterminated { span, .. }
            | Self::Unexpected { span, .. }
            | Self::Include { span, .. } => *span,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Expected { .. } => "E0101",
            Self::Unmatched { .. } => "E0102",
            Self::Unterminated { .. } => "E0103",
            Self::Unexpected { .. } => "E0104",
            Self::Include { .. } => "E0105",
        }
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        let label = match self {
            Self::Expected { expected, .. } => format!("expected {} here", expected),
            Self::Unmatched { .. } => "no matching close".to_string(),
            Self::Unterminated { .. } => "starts here".to_string(),
            Self::Unexpected { .. } => "not a statement".to_string(),
            Self::Include { .. } => "included here".to_string(),
        };
        Diagnostic::error(self.to_string())
            .with_code(self.code())
            .with_label(Label::primary(self.span(), label))
    }
}

/// Either stage of running source text.
#[derive(Debug, Clone, Error)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Runtime(#[from] InterpreterError),
}

impl Error {
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            Error::Parse(e) => e.to_diagnostic(),
            Error::Runtime(e) => e.to_diagnostic(),
        }
    }
}
