//! Tree-walking evaluation.
//!
//! Every node executes through [`Interpreter::exec`], which takes an
//! optional output sink. Without a sink a node produces a value; with one,
//! structural nodes forward the sink to their children, template text is
//! appended verbatim and any other statement appends the rendered text of
//! its value.

use std::sync::Arc;
use std::time::Duration;

use super::control_flow::ControlFlow;
use super::environment::{Environment, Frame};
use super::error::InterpreterError;
use super::include;
use super::parser;
use super::symbols::Symbols;
use super::task::{CancelToken, FutureHandle};
use super::value_utils::{binary_op, unary_op};
use crate::ast::{BinaryOp, Node, NodeKind};
use crate::stack;
use crate::value::{Context, Value};

/// Where streamed output goes, if anywhere.
pub type Sink<'a> = Option<&'a mut String>;

/// A `persist` statement's binding, written back when evaluation ends.
struct PersistBinding {
    slot: String,
    scope: Context,
    var: String,
}

pub struct Interpreter {
    pub(crate) symbols: Arc<Symbols>,
    pub(crate) env: Environment,
    /// Values under test of the enclosing `switch` statements.
    pub(crate) subjects: Vec<Value>,
    cancel: Option<CancelToken>,
    persisted: Vec<PersistBinding>,
    /// `include_live` bodies currently executing.
    live_includes: usize,
}

impl Interpreter {
    pub fn new(symbols: Arc<Symbols>, root: Context) -> Self {
        Self {
            symbols,
            env: Environment::new(root),
            subjects: Vec::new(),
            cancel: None,
            persisted: Vec::new(),
            live_includes: 0,
        }
    }

    pub fn symbols(&self) -> &Arc<Symbols> {
        &self.symbols
    }

    /// Evaluates a whole program for its value.
    pub fn run(&mut self, program: &Node) -> Result<Value, InterpreterError> {
        let result = self.exec(program, None).map(ControlFlow::into_value);
        self.write_back_persisted();
        result
    }

    /// Evaluates a whole program, streaming its output into `out`.
    pub fn render(&mut self, program: &Node, out: &mut String) -> Result<(), InterpreterError> {
        let result = self.exec(program, Some(out)).map(|_| ());
        self.write_back_persisted();
        result
    }

    pub(crate) fn check_cancelled(&self) -> Result<(), InterpreterError> {
        match &self.cancel {
            Some(token) if token.is_cancelled() => Err(InterpreterError::Cancelled),
            _ => Ok(()),
        }
    }

    /// Value-mode evaluation.
    pub fn eval(&mut self, node: &Node) -> Result<Value, InterpreterError> {
        Ok(self.exec(node, None)?.into_value())
    }

    pub fn exec(&mut self, node: &Node, mut out: Sink<'_>) -> Result<ControlFlow, InterpreterError> {
        stack::ensure_sufficient_stack(|| {
            match &node.kind {
                NodeKind::Sequence(nodes) | NodeKind::Block(nodes) => {
                    let mut last = Value::Null;
                    for child in nodes {
                        self.check_cancelled()?;
                        match self.exec(child, out.as_deref_mut())? {
                            ControlFlow::Value(v) => last = v,
                            flow => return Ok(flow),
                        }
                    }
                    Ok(ControlFlow::Value(last))
                }
                NodeKind::If { condition, then_branch, else_branch } => {
                    self.exec_if(condition, then_branch, else_branch.as_deref(), out)
                }
                NodeKind::While { condition, body } => self.exec_while(condition, body, out),
                NodeKind::DoWhile { body, condition } => self.exec_do_while(body, condition, out),
                NodeKind::For { init, condition, step, body } => {
                    self.exec_for(init.as_deref(), condition.as_deref(), step.as_deref(), body, out)
                }
                NodeKind::Foreach { var, iterable, body } => self.exec_foreach(var, iterable, body, out),
                NodeKind::Switch { subject, cases, default } => self.exec_switch(subject, cases, default.as_deref(), out),
                NodeKind::Try(body) => self.exec_try(body, out),
                NodeKind::Return(value) => {
                    let value = match value {
                        Some(value) => self.eval(value)?,
                        None => Value::Null,
                    };
                    Ok(ControlFlow::Return(value))
                }
                NodeKind::Break => Ok(ControlFlow::Break),
                NodeKind::Continue => Ok(ControlFlow::Continue),
                NodeKind::Throw(value) => {
                    let value = self.eval(value)?;
                    Err(InterpreterError::Thrown { value, span: node.span })
                }
                NodeKind::ClassDecl(class) => {
                    self.symbols.define_class(class.clone());
                    Ok(ControlFlow::null())
                }
                NodeKind::FunctionDecl(function) => {
                    self.symbols.define_function(function.clone());
                    Ok(ControlFlow::null())
                }
                NodeKind::Include { body, .. } => self.exec(body, out),
                NodeKind::IncludeLive { path, template } => {
                    if self.live_includes >= include::MAX_INCLUDE_DEPTH {
                        return Err(InterpreterError::Include {
                            path: path.clone(),
                            message: format!("includes nested deeper than {}", include::MAX_INCLUDE_DEPTH),
                            span: node.span,
                        });
                    }
                    let body = self.load_live_include(path, *template).map_err(|e| e.at(node.span))?;
                    self.live_includes += 1;
                    let result = self.exec(&body, out);
                    self.live_includes -= 1;
                    result
                }
                NodeKind::Reload => {
                    self.symbols.includes().clear();
                    Ok(ControlFlow::null())
                }
                NodeKind::Using(prefix) => {
                    self.symbols.add_using(prefix);
                    Ok(ControlFlow::null())
                }
                NodeKind::Persist { slot, var } => {
                    self.persist(slot, var);
                    Ok(ControlFlow::null())
                }
                NodeKind::Text(text) => {
                    if let Some(out) = out {
                        out.push_str(text);
                    }
                    Ok(ControlFlow::null())
                }
                NodeKind::Emit(value) => {
                    let value = self.eval(value)?;
                    if let Some(out) = out {
                        out.push_str(&value.render());
                    }
                    Ok(ControlFlow::null())
                }
                NodeKind::Call(call) => self.eval_call(call, node.span, out).map(ControlFlow::Value),
                _ => {
                    let value = self.eval_expr(node)?;
                    if let Some(out) = out {
                        if !node.kind.is_silent() {
                            out.push_str(&value.render());
                        }
                    }
                    Ok(ControlFlow::Value(value))
                }
            }
        })
    }

    fn eval_expr(&mut self, node: &Node) -> Result<Value, InterpreterError> {
        match &node.kind {
            NodeKind::Literal(value) => Ok(value.clone()),
            NodeKind::Variable(var) => self.resolve(var),
            NodeKind::Assign { target, op, value } => {
                let mut value = self.eval(value)?;
                if let Some(op) = op {
                    let current = self.resolve(target)?;
                    value = binary_op(*op, current, value).map_err(|e| e.at(node.span))?;
                }
                self.assign(target, value.clone()).map_err(|e| e.at(node.span))?;
                Ok(value)
            }
            NodeKind::Binary { left, op: BinaryOp::And, right } => {
                let left = self.eval(left)?;
                Ok(Value::Bool(left.is_truthy() && self.eval(right)?.is_truthy()))
            }
            NodeKind::Binary { left, op: BinaryOp::Or, right } => {
                let left = self.eval(left)?;
                Ok(Value::Bool(left.is_truthy() || self.eval(right)?.is_truthy()))
            }
            NodeKind::Binary { left, op, right } => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                binary_op(*op, left, right).map_err(|e| e.at(node.span))
            }
            NodeKind::Unary { op, expr } => Ok(unary_op(*op, self.eval(expr)?)),
            NodeKind::Ternary { condition, then_branch, else_branch } => {
                if self.eval(condition)?.is_truthy() {
                    self.eval(then_branch)
                } else {
                    self.eval(else_branch)
                }
            }
            NodeKind::Group(inner) => self.eval(inner),
            NodeKind::Array(items) => {
                let values = items.iter().map(|item| self.eval(item)).collect::<Result<Vec<_>, _>>()?;
                Ok(Value::Context(Context::from_values(values)))
            }
            NodeKind::Map(entries) => {
                let map = Context::new();
                for (key, value) in entries {
                    let value = self.eval(value)?;
                    map.set(key.clone(), value);
                }
                Ok(Value::Context(map))
            }
            NodeKind::New { class, args } => {
                let args = self.eval_args(args)?;
                match self.symbols.class(class) {
                    Some(class) => self.instantiate(&class, args).map_err(|e| e.at(node.span)),
                    None => {
                        tracing::debug!(class = %class, "`new` names an unknown class");
                        Ok(Value::Null)
                    }
                }
            }
            NodeKind::Lambda(function) => {
                let frame = self.env.current();
                let mut closure = function.capture(frame.locals.clone());
                if !frame.this.is_null() {
                    closure = closure.bind(frame.this.clone());
                }
                Ok(Value::Function(closure))
            }
            NodeKind::Subject => Ok(self.subjects.last().cloned().unwrap_or_default()),
            NodeKind::Async { max_wait, body } => self.spawn_async(max_wait.as_deref(), body.clone()),
            NodeKind::Await(value) => match self.eval(value)? {
                Value::Future(handle) => handle.wait().map_err(|e| e.at(node.span)),
                _ => Ok(Value::Null),
            },
            _ => Ok(self.exec(node, None)?.into_value()),
        }
    }

    fn spawn_async(&mut self, max_wait: Option<&Node>, body: Arc<Node>) -> Result<Value, InterpreterError> {
        let max_wait = match max_wait {
            Some(node) => self
                .eval(node)?
                .as_number()
                .filter(|ms| *ms >= 0.0)
                .map(|ms| Duration::from_millis(ms as u64)),
            None => None,
        };
        let symbols = self.symbols.clone();
        let env = self.env.clone();
        let subjects = self.subjects.clone();
        let live_includes = self.live_includes;
        let handle = FutureHandle::spawn(max_wait, move |cancel| {
            let mut worker = Interpreter {
                symbols,
                env,
                subjects,
                cancel: Some(cancel),
                persisted: Vec::new(),
                live_includes,
            };
            worker.exec(&body, None).map(ControlFlow::into_value)
        })?;
        Ok(Value::Future(handle))
    }

    fn persist(&mut self, slot: &str, var: &str) {
        let slots = self.symbols.persisted();
        match slots.get(slot) {
            Some(saved) => self.env.set(var, saved),
            None => slots.set(slot, self.env.get(var).unwrap_or_default()),
        }
        let scope = self.env.locals().clone();
        if !self.persisted.iter().any(|b| b.slot == slot && b.scope.ptr_eq(&scope)) {
            self.persisted.push(PersistBinding { slot: slot.to_string(), scope, var: var.to_string() });
        }
    }

    fn write_back_persisted(&mut self) {
        let slots = self.symbols.persisted();
        for binding in self.persisted.drain(..) {
            let value = binding.scope.get(&binding.var).unwrap_or_default();
            slots.set(binding.slot, value);
        }
    }

    fn load_live_include(&mut self, path: &str, template: bool) -> Result<Arc<Node>, InterpreterError> {
        let include_error = |message: String| InterpreterError::Include {
            path: path.to_string(),
            message,
            span: Default::default(),
        };
        let full = include::resolve_path(&self.symbols.config().include_root, path);
        let modified = include::modified(&full).map_err(|e| include_error(e.to_string()))?;
        if let Some(body) = self.symbols.includes().get(&full, modified) {
            return Ok(body);
        }

        tracing::debug!(path = %full.display(), "loading live include");
        let source = std::fs::read_to_string(&full).map_err(|e| include_error(e.to_string()))?;
        let body = parser::parse_document(&self.symbols, &source, template).map_err(|e| include_error(e.to_string()))?;
        let body = Arc::new(body);
        self.symbols.includes().insert(full, modified, body.clone());
        Ok(body)
    }

    /// Pushes a call frame, enforcing the configured depth.
    pub(crate) fn push_frame(&mut self, frame: Frame) -> Result<(), InterpreterError> {
        let limit = self.symbols.config().max_call_depth;
        if self.env.depth() >= limit {
            return Err(InterpreterError::RecursionLimit { depth: limit, span: Default::default() });
        }
        self.env.push(frame);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{BinaryOp, Variable};
    use crate::diagnostic::Span;

    fn node(kind: NodeKind) -> Node {
        Node::new(kind, Span::dummy())
    }

    fn int(n: i64) -> Node {
        node(NodeKind::Literal(Value::int(n)))
    }

    fn interpreter() -> (Interpreter, Context) {
        let root = Context::new();
        (Interpreter::new(Arc::new(Symbols::default()), root.clone()), root)
    }

    #[test]
    fn test_sequence_yields_last_value() {
        let (mut interp, _) = interpreter();
        let program = node(NodeKind::Sequence(vec![int(1), int(2)]));
        assert_eq!(interp.run(&program).unwrap(), Value::int(2));
    }

    #[test]
    fn test_return_short_circuits_siblings() {
        let (mut interp, root) = interpreter();
        let assign = node(NodeKind::Assign {
            target: Variable::named("x"),
            op: None,
            value: Box::new(int(5)),
        });
        let program = node(NodeKind::Sequence(vec![node(NodeKind::Return(Some(Box::new(int(1))))), assign]));
        assert_eq!(interp.run(&program).unwrap(), Value::int(1));
        assert!(root.get("x").is_none());
    }

    #[test]
    fn test_stream_mode_skips_assignments() {
        let (mut interp, _) = interpreter();
        let program = node(NodeKind::Sequence(vec![
            node(NodeKind::Text(Arc::from("a"))),
            node(NodeKind::Assign { target: Variable::named("x"), op: None, value: Box::new(int(5)) }),
            node(NodeKind::Binary { left: Box::new(int(1)), op: BinaryOp::Add, right: Box::new(int(2)) }),
        ]));
        let mut out = String::new();
        interp.render(&program, &mut out).unwrap();
        assert_eq!(out, "a3");
    }

    #[test]
    fn test_cancelled_interpreter_stops() {
        let (mut interp, _) = interpreter();
        let token = CancelToken::new();
        token.cancel();
        interp.cancel = Some(token);
        let program = node(NodeKind::Sequence(vec![int(1)]));
        assert!(matches!(interp.run(&program), Err(InterpreterError::Cancelled)));
    }
}
