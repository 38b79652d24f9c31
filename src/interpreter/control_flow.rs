//! Loop, branch, switch and try evaluation.

use std::sync::Arc;

use super::error::InterpreterError;
use super::evaluator::{Interpreter, Sink};
use crate::ast::{Case, Node};
use crate::value::{Context, Value};

/// Outcome of executing a node. Non-local exits travel alongside values
/// rather than through the error channel.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlFlow {
    Value(Value),
    Break,
    Continue,
    Return(Value),
}

impl ControlFlow {
    pub fn null() -> Self {
        ControlFlow::Value(Value::Null)
    }

    /// The carried value; loop exits carry nothing.
    pub fn into_value(self) -> Value {
        match self {
            ControlFlow::Value(v) | ControlFlow::Return(v) => v,
            ControlFlow::Break | ControlFlow::Continue => Value::Null,
        }
    }
}

/// What a loop does after running its body once.
enum Next {
    Iterate,
    Exit,
    Propagate(ControlFlow),
}

fn after_body(flow: ControlFlow) -> Next {
    match flow {
        ControlFlow::Break => Next::Exit,
        ControlFlow::Continue | ControlFlow::Value(_) => Next::Iterate,
        ret @ ControlFlow::Return(_) => Next::Propagate(ret),
    }
}

impl Interpreter {
    pub(crate) fn exec_if(
        &mut self,
        condition: &Node,
        then_branch: &Node,
        else_branch: Option<&Node>,
        out: Sink<'_>,
    ) -> Result<ControlFlow, InterpreterError> {
        if self.eval(condition)?.is_truthy() {
            self.exec(then_branch, out)
        } else if let Some(else_branch) = else_branch {
            self.exec(else_branch, out)
        } else {
            Ok(ControlFlow::null())
        }
    }

    pub(crate) fn exec_while(&mut self, condition: &Node, body: &Node, mut out: Sink<'_>) -> Result<ControlFlow, InterpreterError> {
        loop {
            self.check_cancelled()?;
            if !self.eval(condition)?.is_truthy() {
                break;
            }
            match after_body(self.exec(body, out.as_deref_mut())?) {
                Next::Iterate => {}
                Next::Exit => break,
                Next::Propagate(flow) => return Ok(flow),
            }
        }
        Ok(ControlFlow::null())
    }

    pub(crate) fn exec_do_while(&mut self, body: &Node, condition: &Node, mut out: Sink<'_>) -> Result<ControlFlow, InterpreterError> {
        loop {
            self.check_cancelled()?;
            match after_body(self.exec(body, out.as_deref_mut())?) {
                Next::Iterate => {}
                Next::Exit => break,
                Next::Propagate(flow) => return Ok(flow),
            }
            if !self.eval(condition)?.is_truthy() {
                break;
            }
        }
        Ok(ControlFlow::null())
    }

    pub(crate) fn exec_for(
        &mut self,
        init: Option<&Node>,
        condition: Option<&Node>,
        step: Option<&Node>,
        body: &Node,
        mut out: Sink<'_>,
    ) -> Result<ControlFlow, InterpreterError> {
        if let Some(init) = init {
            self.eval(init)?;
        }
        loop {
            self.check_cancelled()?;
            if let Some(condition) = condition {
                if !self.eval(condition)?.is_truthy() {
                    break;
                }
            }
            match after_body(self.exec(body, out.as_deref_mut())?) {
                Next::Iterate => {}
                Next::Exit => break,
                Next::Propagate(flow) => return Ok(flow),
            }
            if let Some(step) = step {
                self.eval(step)?;
            }
        }
        Ok(ControlFlow::null())
    }

    /// Key/value pairs a `foreach` walks over. Values that cannot be
    /// enumerated produce no iterations.
    fn iteration_items(&mut self, iterable: Value) -> Result<Vec<(Value, Value)>, InterpreterError> {
        let indexed = |values: Vec<Value>| {
            values
                .into_iter()
                .enumerate()
                .map(|(i, v)| (Value::int(i as i64), v))
                .collect::<Vec<_>>()
        };
        let items = match iterable {
            Value::String(s) => indexed(s.chars().map(|ch| Value::string(ch.to_string())).collect()),
            Value::Context(ctx) if ctx.is_array() => indexed(ctx.values()),
            Value::Context(ctx) => ctx.entries().into_iter().map(|(k, v)| (Value::from(k), v)).collect(),
            Value::Instance(instance) => instance
                .fields
                .entries()
                .into_iter()
                .map(|(k, v)| (Value::from(k), v))
                .collect(),
            Value::Host(host) => match self.symbols.reflector().enumerate(host.type_name(), &host) {
                Some(items) => indexed(items?),
                None => Vec::new(),
            },
            other => {
                tracing::debug!(kind = other.type_name(), "foreach over a value that is not enumerable");
                Vec::new()
            }
        };
        Ok(items)
    }

    pub(crate) fn exec_foreach(&mut self, var: &str, iterable: &Node, body: &Node, out: Sink<'_>) -> Result<ControlFlow, InterpreterError> {
        let iterable = self.eval(iterable)?;
        let items = self.iteration_items(iterable)?;
        let locals = self.env.locals().clone();
        let result = self.foreach_items(&locals, var, items, body, out);
        locals.remove(var);
        result
    }

    fn foreach_items(
        &mut self,
        locals: &Context,
        var: &str,
        items: Vec<(Value, Value)>,
        body: &Node,
        mut out: Sink<'_>,
    ) -> Result<ControlFlow, InterpreterError> {
        for (key, value) in items {
            self.check_cancelled()?;
            let binding = Context::new();
            binding.set("Key", key);
            binding.set("Value", value);
            locals.set(var, Value::Context(binding));
            match after_body(self.exec(body, out.as_deref_mut())?) {
                Next::Iterate => {}
                Next::Exit => break,
                Next::Propagate(flow) => return Ok(flow),
            }
        }
        Ok(ControlFlow::null())
    }

    pub(crate) fn exec_switch(
        &mut self,
        subject: &Node,
        cases: &[Case],
        default: Option<&Node>,
        out: Sink<'_>,
    ) -> Result<ControlFlow, InterpreterError> {
        let subject = self.eval(subject)?;
        self.subjects.push(subject);
        let result = self.select_case(cases, default, out);
        self.subjects.pop();
        Ok(match result? {
            ControlFlow::Break => ControlFlow::null(),
            flow => flow,
        })
    }

    fn select_case(&mut self, cases: &[Case], default: Option<&Node>, out: Sink<'_>) -> Result<ControlFlow, InterpreterError> {
        for case in cases {
            if self.eval(&case.guard)?.is_truthy() {
                return self.exec(&case.body, out);
            }
        }
        match default {
            Some(default) => self.exec(default, out),
            None => Ok(ControlFlow::null()),
        }
    }

    /// Runs `body`, turning any raised error into an exception value.
    /// Cancellation is not caught.
    pub(crate) fn exec_try(&mut self, body: &Node, out: Sink<'_>) -> Result<ControlFlow, InterpreterError> {
        match self.exec(body, out) {
            Err(InterpreterError::Cancelled) => Err(InterpreterError::Cancelled),
            Err(err) => {
                tracing::debug!(error = %err, "exception caught by try");
                Ok(ControlFlow::Value(Value::Exception(Arc::new(err))))
            }
            flow => flow,
        }
    }
}
