//! Executable syntax tree.
//!
//! Nodes are immutable once parsed. The only interior state is the
//! per-call-site dispatch cache held by [`Call`].

use std::fmt::{self, Write as _};
use std::sync::Arc;

use crate::cursor::{is_ident_char, is_ident_start};
use crate::diagnostic::Span;
use crate::interpreter::dispatch::CallSite;
use crate::interpreter::object::{Class, Function};
use crate::value::{format_number, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    NotEq,
    Less,
    LessEq,
    Greater,
    GreaterEq,
    And,
    Or,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::Less => "<",
            BinaryOp::LessEq => "<=",
            BinaryOp::Greater => ">",
            BinaryOp::GreaterEq => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

/// Where a variable path starts.
#[derive(Debug)]
pub enum Root {
    /// The active frame; the first step names the variable.
    Scope,
    /// The engine-wide `Static` table.
    Static,
    /// The value of an arbitrary primary expression, e.g. `f().x`.
    Expr(Box<Node>),
}

#[derive(Debug)]
pub enum Step {
    Key(String),
    Computed(Box<Node>),
    /// `_`, the current scope itself.
    Current,
}

/// A dotted/indexed access chain, compiled once at parse time.
#[derive(Debug)]
pub struct Variable {
    pub root: Root,
    pub steps: Vec<Step>,
    /// `as TypeName` hint used to pick the reflected host type.
    pub type_hint: Option<String>,
}

impl Variable {
    pub fn named(name: impl Into<String>) -> Self {
        Self { root: Root::Scope, steps: vec![Step::Key(name.into())], type_hint: None }
    }

    /// The single bare name this path consists of, if any.
    pub fn simple_name(&self) -> Option<&str> {
        match (&self.root, self.steps.as_slice()) {
            (Root::Scope, [Step::Key(name)]) => Some(name),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct Arg {
    pub name: Option<String>,
    pub value: Node,
}

#[derive(Debug)]
pub struct Call {
    pub path: Variable,
    pub args: Vec<Arg>,
    pub site: CallSite,
}

/// A switch arm; `guard` compares the switch subject against the arm value.
#[derive(Debug)]
pub struct Case {
    pub guard: Node,
    pub body: Node,
}

#[derive(Debug)]
pub struct Node {
    pub kind: NodeKind,
    pub span: Span,
}

impl Node {
    pub fn new(kind: NodeKind, span: Span) -> Self {
        Self { kind, span }
    }
}

#[derive(Debug)]
pub enum NodeKind {
    Literal(Value),
    Variable(Variable),
    Assign {
        target: Variable,
        op: Option<BinaryOp>,
        value: Box<Node>,
    },
    Binary {
        left: Box<Node>,
        op: BinaryOp,
        right: Box<Node>,
    },
    Unary {
        op: UnaryOp,
        expr: Box<Node>,
    },
    Ternary {
        condition: Box<Node>,
        then_branch: Box<Node>,
        else_branch: Box<Node>,
    },
    Group(Box<Node>),
    Array(Vec<Node>),
    Map(Vec<(String, Node)>),
    Call(Call),
    New {
        class: String,
        args: Vec<Arg>,
    },
    Lambda(Arc<Function>),
    /// The value under test inside a `switch`.
    Subject,
    Sequence(Vec<Node>),
    Block(Vec<Node>),
    If {
        condition: Box<Node>,
        then_branch: Box<Node>,
        else_branch: Option<Box<Node>>,
    },
    While {
        condition: Box<Node>,
        body: Box<Node>,
    },
    DoWhile {
        body: Box<Node>,
        condition: Box<Node>,
    },
    For {
        init: Option<Box<Node>>,
        condition: Option<Box<Node>>,
        step: Option<Box<Node>>,
        body: Box<Node>,
    },
    Foreach {
        var: String,
        iterable: Box<Node>,
        body: Box<Node>,
    },
    Switch {
        subject: Box<Node>,
        cases: Vec<Case>,
        default: Option<Box<Node>>,
    },
    Try(Box<Node>),
    Return(Option<Box<Node>>),
    Break,
    Continue,
    Throw(Box<Node>),
    ClassDecl(Arc<Class>),
    FunctionDecl(Arc<Function>),
    Async {
        max_wait: Option<Box<Node>>,
        body: Arc<Node>,
    },
    Await(Box<Node>),
    Include {
        path: String,
        body: Box<Node>,
    },
    IncludeLive {
        path: String,
        template: bool,
    },
    Reload,
    Using(String),
    Persist {
        slot: String,
        var: String,
    },
    /// Literal template text.
    Text(Arc<str>),
    /// `<%= expr %>`
    Emit(Box<Node>),
}

impl NodeKind {
    /// Nodes that render as statements and need no trailing `;`.
    fn is_compound(&self) -> bool {
        matches!(
            self,
            NodeKind::Sequence(_)
                | NodeKind::Block(_)
                | NodeKind::If { .. }
                | NodeKind::While { .. }
                | NodeKind::DoWhile { .. }
                | NodeKind::For { .. }
                | NodeKind::Foreach { .. }
                | NodeKind::Switch { .. }
                | NodeKind::Try(_)
                | NodeKind::Return(_)
                | NodeKind::Break
                | NodeKind::Continue
                | NodeKind::Throw(_)
                | NodeKind::ClassDecl(_)
                | NodeKind::FunctionDecl(_)
                | NodeKind::Include { .. }
                | NodeKind::IncludeLive { .. }
                | NodeKind::Reload
                | NodeKind::Using(_)
                | NodeKind::Persist { .. }
                | NodeKind::Text(_)
                | NodeKind::Emit(_)
        )
    }

    /// Assignments and declarations stream nothing in template mode.
    pub fn is_silent(&self) -> bool {
        matches!(
            self,
            NodeKind::Assign { .. }
                | NodeKind::ClassDecl(_)
                | NodeKind::FunctionDecl(_)
                | NodeKind::Using(_)
                | NodeKind::Persist { .. }
                | NodeKind::Reload
                | NodeKind::Break
                | NodeKind::Continue
                | NodeKind::Return(_)
        )
    }
}

pub(crate) fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for ch in s.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\0' => out.push_str("\\0"),
            other => out.push(other),
        }
    }
    out.push('"');
    out
}

fn is_plain_key(key: &str) -> bool {
    let mut chars = key.chars();
    matches!(chars.next(), Some(c) if is_ident_start(c)) && chars.all(is_ident_char)
}

fn write_statement(f: &mut fmt::Formatter<'_>, node: &Node) -> fmt::Result {
    write!(f, "{}", node)?;
    if !node.kind.is_compound() {
        f.write_char(';')?;
    }
    Ok(())
}

fn write_statements(f: &mut fmt::Formatter<'_>, nodes: &[Node]) -> fmt::Result {
    for (i, node) in nodes.iter().enumerate() {
        if i > 0 {
            f.write_char(' ')?;
        }
        write_statement(f, node)?;
    }
    Ok(())
}

fn write_args(f: &mut fmt::Formatter<'_>, args: &[Arg]) -> fmt::Result {
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        if let Some(name) = &arg.name {
            write!(f, "{}: ", name)?;
        }
        write!(f, "{}", arg.value)?;
    }
    Ok(())
}

pub(crate) fn write_function(f: &mut fmt::Formatter<'_>, keyword: Option<&str>, func: &Function) -> fmt::Result {
    if let Some(keyword) = keyword {
        write!(f, "{} {}", keyword, func.name)?;
    }
    write!(f, "({})", func.params.join(", "))?;
    if keyword.is_none() {
        f.write_str(" =>")?;
    }
    write!(f, " {}", func.body)
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        match &self.root {
            Root::Scope => {}
            Root::Static => {
                f.write_str("Static")?;
                first = false;
            }
            Root::Expr(node) => {
                write!(f, "{}", node)?;
                first = false;
            }
        }
        for step in &self.steps {
            match step {
                Step::Key(key) if first => f.write_str(key)?,
                Step::Key(key) if is_plain_key(key) || key.chars().all(|c| c.is_ascii_digit()) => {
                    write!(f, ".{}", key)?
                }
                Step::Key(key) => write!(f, "[{}]", quote(key))?,
                Step::Computed(node) => write!(f, "[{}]", node)?,
                Step::Current if first => f.write_char('_')?,
                Step::Current => f.write_str("._")?,
            }
            first = false;
        }
        if let Some(hint) = &self.type_hint {
            write!(f, " as {}", hint)?;
        }
        Ok(())
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            NodeKind::Literal(Value::String(s)) => f.write_str(&quote(s)),
            NodeKind::Literal(Value::Number(n, is_float)) => {
                let text = format_number(*n, *is_float);
                if *is_float && !text.contains('.') && !text.contains('e') {
                    write!(f, "{}.0", text)
                } else {
                    f.write_str(&text)
                }
            }
            NodeKind::Literal(value) => write!(f, "{}", value),
            NodeKind::Variable(var) => write!(f, "{}", var),
            NodeKind::Assign { target, op, value } => {
                let op = op.map(|o| o.symbol()).unwrap_or("");
                write!(f, "{} {}= {}", target, op, value)
            }
            NodeKind::Binary { left, op, right } => write!(f, "{} {} {}", left, op.symbol(), right),
            NodeKind::Unary { op: UnaryOp::Not, expr } => write!(f, "!{}", expr),
            NodeKind::Unary { op: UnaryOp::Neg, expr } => write!(f, "-{}", expr),
            NodeKind::Ternary { condition, then_branch, else_branch } => {
                write!(f, "{} ? {} : {}", condition, then_branch, else_branch)
            }
            NodeKind::Group(inner) => write!(f, "({})", inner),
            NodeKind::Array(items) => {
                f.write_char('[')?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_char(']')
            }
            NodeKind::Map(entries) => {
                f.write_char('{')?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_char(',')?;
                    }
                    if is_plain_key(key) {
                        write!(f, " {}: {}", key, value)?;
                    } else {
                        write!(f, " {}: {}", quote(key), value)?;
                    }
                }
                f.write_str(" }")
            }
            NodeKind::Call(call) => {
                write!(f, "{}(", call.path)?;
                write_args(f, &call.args)?;
                f.write_char(')')
            }
            NodeKind::New { class, args } => {
                write!(f, "new {}(", class)?;
                write_args(f, args)?;
                f.write_char(')')
            }
            NodeKind::Lambda(func) => write_function(f, None, func),
            NodeKind::Subject => f.write_char('_'),
            NodeKind::Sequence(nodes) => write_statements(f, nodes),
            NodeKind::Block(nodes) => {
                f.write_str("{ ")?;
                write_statements(f, nodes)?;
                f.write_str(" }")
            }
            NodeKind::If { condition, then_branch, else_branch } => {
                write!(f, "if ({}) ", condition)?;
                write_statement(f, then_branch)?;
                if let Some(else_branch) = else_branch {
                    f.write_str(" else ")?;
                    write_statement(f, else_branch)?;
                }
                Ok(())
            }
            NodeKind::While { condition, body } => {
                write!(f, "while ({}) ", condition)?;
                write_statement(f, body)
            }
            NodeKind::DoWhile { body, condition } => {
                f.write_str("do ")?;
                write_statement(f, body)?;
                write!(f, " while ({});", condition)
            }
            NodeKind::For { init, condition, step, body } => {
                f.write_str("for (")?;
                if let Some(init) = init {
                    write!(f, "{}", init)?;
                }
                f.write_str("; ")?;
                if let Some(condition) = condition {
                    write!(f, "{}", condition)?;
                }
                f.write_str("; ")?;
                if let Some(step) = step {
                    write!(f, "{}", step)?;
                }
                f.write_str(") ")?;
                write_statement(f, body)
            }
            NodeKind::Foreach { var, iterable, body } => {
                write!(f, "foreach ({} in {}) ", var, iterable)?;
                write_statement(f, body)
            }
            NodeKind::Switch { subject, cases, default } => {
                write!(f, "switch ({}) {{", subject)?;
                for case in cases {
                    match &case.guard.kind {
                        NodeKind::Binary { op: BinaryOp::Eq, right, .. } => write!(f, " case {}:", right)?,
                        NodeKind::Binary { op, right, .. } => write!(f, " case {} {}:", op.symbol(), right)?,
                        _ => write!(f, " case {}:", case.guard)?,
                    }
                    f.write_char(' ')?;
                    write_statement(f, &case.body)?;
                }
                if let Some(default) = default {
                    f.write_str(" default: ")?;
                    write_statement(f, default)?;
                }
                f.write_str(" }")
            }
            NodeKind::Try(body) if body.kind.is_compound() => {
                f.write_str("try ")?;
                write_statement(f, body)
            }
            // Parenthesized so the form also parses back in expression position.
            NodeKind::Try(body) => write!(f, "try ({})", body),
            NodeKind::Return(Some(value)) => write!(f, "return {};", value),
            NodeKind::Return(None) => f.write_str("return;"),
            NodeKind::Break => f.write_str("break;"),
            NodeKind::Continue => f.write_str("continue;"),
            NodeKind::Throw(value) => write!(f, "throw {};", value),
            NodeKind::ClassDecl(class) => write!(f, "{}", class),
            NodeKind::FunctionDecl(func) => write_function(f, Some("function"), func),
            NodeKind::Async { max_wait, body } => {
                f.write_str("async ")?;
                if let Some(max_wait) = max_wait {
                    write!(f, "({}) ", max_wait)?;
                }
                write!(f, "{}", body)
            }
            NodeKind::Await(value) => write!(f, "await {}", value),
            NodeKind::Include { path, .. } => write!(f, "include {};", quote(path)),
            NodeKind::IncludeLive { path, .. } => write!(f, "include_live {};", quote(path)),
            NodeKind::Reload => f.write_str("reload;"),
            NodeKind::Using(name) => write!(f, "using {};", name),
            NodeKind::Persist { slot, var } => write!(f, "persist {} -> {};", slot, var),
            NodeKind::Text(text) => write!(f, "%>{}<%", text),
            NodeKind::Emit(value) => write!(f, "%><%= {} %><%", value),
        }
    }
}
