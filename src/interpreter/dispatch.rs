//! Call dispatch.
//!
//! A call tries a fixed cascade of strategies and stops at the first one
//! that finds a target:
//!
//! 1. a callable value held at the called path (functions in variables,
//!    bound methods, classes stored in variables);
//! 2. an instance or static method of the receiver, or of `this` for bare
//!    calls;
//! 3. a declared script function, then a declared class, then a builtin;
//! 4. a reflected host method matching the argument kinds;
//! 5. an ambient operation on the receiver map or the current scope.
//!
//! The winning strategy is remembered on the call site together with the
//! [`Shape`] of the call it won for. A callable value at the called path is
//! always looked for first; after that the remembered strategy is tried
//! when the shape matches. A different shape, or a remembered strategy that
//! no longer applies, runs the full cascade.

use std::hash::{Hash, Hasher};
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHasher;

use super::builtins::{self, context::ambient};
use super::control_flow::ControlFlow;
use super::environment::{Frame, ARGUMENTS};
use super::error::InterpreterError;
use super::evaluator::{Interpreter, Sink};
use super::object::{Class, ClassInstance, Function};
use super::resolve::Key;
use crate::ast::{Arg, Call, NodeKind, Root, Step, Variable};
use crate::diagnostic::Span;
use crate::value::{Context, Value, ValueKind};

/// The strategy that resolved a call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolved {
    Value,
    Method,
    Function,
    Class,
    /// Index into the builtin table.
    Builtin(usize),
    Host,
    Ambient,
}

const CASCADE: [Resolved; 7] = [
    Resolved::Value,
    Resolved::Method,
    Resolved::Function,
    Resolved::Class,
    Resolved::Builtin(usize::MAX),
    Resolved::Host,
    Resolved::Ambient,
];

/// What a remembered strategy was chosen for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shape {
    /// Kind of the receiver; `None` for bare calls.
    receiver: Option<ValueKind>,
    /// Class of an instance or class receiver (of `this` for bare calls), or
    /// the host type.
    type_key: u64,
    /// Declaration generation of the engine.
    generation: u64,
}

/// Per-call-site memo of the winning strategy.
#[derive(Debug, Default)]
pub struct CallSite {
    resolved: RwLock<Option<(Resolved, Shape)>>,
}

impl CallSite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolved(&self) -> Option<Resolved> {
        self.resolved.read().map(|(strategy, _)| strategy)
    }

    fn remembered(&self, shape: &Shape) -> Option<Resolved> {
        match *self.resolved.read() {
            Some((strategy, seen)) if seen == *shape => Some(strategy),
            _ => None,
        }
    }

    fn remember(&self, strategy: Resolved, shape: Shape) {
        let mut resolved = self.resolved.write();
        if *resolved != Some((strategy, shape)) {
            tracing::trace!(?strategy, "call site resolved");
            *resolved = Some((strategy, shape));
        }
    }
}

fn type_key(name: &str) -> u64 {
    let mut hasher = FxHasher::default();
    name.hash(&mut hasher);
    hasher.finish()
}

/// An evaluated argument.
#[derive(Debug, Clone)]
pub struct CallArg {
    pub name: Option<String>,
    pub value: Value,
}

/// What a call refers to once the receiver has been evaluated.
struct Target {
    /// `None` for bare calls such as `f(x)`.
    receiver: Option<Value>,
    /// Called member; `None` when the callee is a computed value.
    name: Option<String>,
    /// Callee value when there is no member name.
    value: Value,
    /// `A.B.f` as one dotted name, when `A.B` did not resolve.
    dotted: Option<String>,
}

fn positional(args: &[CallArg]) -> Vec<Value> {
    args.iter().map(|a| a.value.clone()).collect()
}

impl Interpreter {
    pub(crate) fn eval_args(&mut self, args: &[Arg]) -> Result<Vec<CallArg>, InterpreterError> {
        let this = self.env.this().clone();
        args.iter()
            .map(|arg| {
                let value = match self.eval(&arg.value)? {
                    // Callables passed along keep the caller's `this`.
                    Value::Function(f) if f.receiver.is_none() && matches!(this, Value::Instance(_)) => {
                        Value::Function(f.bind(this.clone()))
                    }
                    value => value,
                };
                Ok(CallArg { name: arg.name.clone(), value })
            })
            .collect()
    }

    fn call_target(&mut self, path: &Variable) -> Result<Target, InterpreterError> {
        let steps = path.steps.len();
        let Some(last) = path.steps.last() else {
            let value = self.walk(path, 0, false)?.unwrap_or_default();
            return Ok(Target { receiver: None, name: None, value, dotted: None });
        };

        let bare = steps == 1 && matches!(path.root, Root::Scope);
        let receiver = if bare {
            None
        } else {
            Some(self.walk(path, steps - 1, false)?.unwrap_or_default())
        };

        let name = match self.key_of(last)? {
            Some(Key::Name(name)) => name,
            Some(Key::Current) => {
                let value = self.walk(path, steps, false)?.unwrap_or_default();
                return Ok(Target { receiver: None, name: None, value, dotted: None });
            }
            None => return Ok(Target { receiver, name: None, value: Value::Null, dotted: None }),
        };

        let dotted = match (&receiver, &path.root) {
            (Some(Value::Null), Root::Scope) => path
                .steps
                .iter()
                .map(|s| match s {
                    Step::Key(k) => Some(k.as_str()),
                    _ => None,
                })
                .collect::<Option<Vec<_>>>()
                .map(|parts| parts.join(".")),
            _ => None,
        };

        Ok(Target { receiver, name: Some(name), value: Value::Null, dotted })
    }

    pub(crate) fn eval_call(&mut self, call: &Call, span: Span, mut out: Sink<'_>) -> Result<Value, InterpreterError> {
        let args = self.eval_args(&call.args)?;
        let target = self.call_target(&call.path)?;
        let hint = call.path.type_hint.as_deref();

        let shape = self.shape(&target);
        let remembered = call.site.remembered(&shape);

        // Whether the path holds a callable depends on data, not on shape.
        if remembered != Some(Resolved::Value) {
            if let Some((value, resolved)) = self.try_strategy(Resolved::Value, &target, &args, hint, out.as_deref_mut())? {
                call.site.remember(resolved, shape);
                return Ok(value);
            }
        }
        if let Some(strategy) = remembered {
            if let Some((value, _)) = self.try_strategy(strategy, &target, &args, hint, out.as_deref_mut())? {
                return Ok(value);
            }
            tracing::trace!(call = %call.path, ?strategy, "remembered strategy missed");
        }

        for strategy in CASCADE.into_iter().skip(1) {
            if Some(strategy) == remembered {
                continue;
            }
            if let Some((value, resolved)) = self.try_strategy(strategy, &target, &args, hint, out.as_deref_mut())? {
                call.site.remember(resolved, shape);
                return Ok(value);
            }
        }

        tracing::debug!(call = %call.path, span = ?span, "no call target found");
        Ok(Value::Null)
    }

    fn shape(&self, target: &Target) -> Shape {
        let typed = target.receiver.as_ref().unwrap_or_else(|| self.env.this());
        let type_key = match typed {
            Value::Instance(instance) => type_key(instance.class_name()),
            Value::Class(class) => type_key(&class.name),
            Value::Host(host) => type_key(host.type_name()),
            _ => 0,
        };
        Shape {
            receiver: target.receiver.as_ref().map(Value::kind),
            type_key,
            generation: self.symbols.generation(),
        }
    }

    /// Runs one cascade strategy. `Ok(None)` means it does not apply.
    fn try_strategy(
        &mut self,
        strategy: Resolved,
        target: &Target,
        args: &[CallArg],
        hint: Option<&str>,
        out: Sink<'_>,
    ) -> Result<Option<(Value, Resolved)>, InterpreterError> {
        let caller_this = self.env.this().clone();
        let name = target.name.as_deref();

        let value = match strategy {
            Resolved::Value => {
                let callee = match (&target.receiver, name) {
                    (Some(receiver), Some(name)) => self.member(receiver, &Key::Name(name.to_string()), hint)?,
                    (None, Some(name)) => self.env.get(name).unwrap_or_default(),
                    (_, None) => target.value.clone(),
                };
                match callee {
                    Value::Function(function) => {
                        let this = match &target.receiver {
                            Some(receiver @ Value::Instance(_)) if function.receiver.is_none() => receiver.clone(),
                            _ => function.receiver.clone().unwrap_or(caller_this),
                        };
                        self.invoke(&function, args.to_vec(), this, out)?
                    }
                    Value::Class(class) => self.instantiate(&class, args.to_vec())?,
                    _ => return Ok(None),
                }
            }
            Resolved::Method => {
                let Some(name) = name else { return Ok(None) };
                let (method, this) = match target.receiver.as_ref().unwrap_or(&caller_this) {
                    Value::Instance(instance) => {
                        let method = instance.class().and_then(|class| self.symbols.find_method(&class, name));
                        let this = Value::Instance(instance.clone());
                        (method, this)
                    }
                    Value::Class(class) if target.receiver.is_some() => (self.symbols.find_static(class, name), Value::Null),
                    _ => return Ok(None),
                };
                let Some(method) = method else { return Ok(None) };
                self.invoke(&method, args.to_vec(), this, out)?
            }
            Resolved::Function => {
                let Some(function) = self.declared(target, |symbols, n| symbols.function(n)) else {
                    return Ok(None);
                };
                self.invoke(&function, args.to_vec(), caller_this, out)?
            }
            Resolved::Class => {
                let Some(class) = self.declared(target, |symbols, n| symbols.class(n)) else {
                    return Ok(None);
                };
                self.instantiate(&class, args.to_vec())?
            }
            Resolved::Builtin(remembered) => {
                let Some(name) = name else { return Ok(None) };
                let index = match builtins::BUILTINS.get(remembered) {
                    Some(builtin) if builtin.name == name => remembered,
                    _ => match builtins::lookup(name) {
                        Some(index) => index,
                        None => return Ok(None),
                    },
                };
                let mut values = Vec::with_capacity(args.len() + 1);
                match &target.receiver {
                    None => {}
                    Some(Value::Null) => return Ok(None),
                    Some(receiver) => values.push(receiver.clone()),
                }
                values.extend(positional(args));
                let builtin = &builtins::BUILTINS[index];
                if values.len() < builtin.min_args {
                    return Ok(None);
                }
                let value = (builtin.call)(&values)?;
                emit(out, &value);
                return Ok(Some((value, Resolved::Builtin(index))));
            }
            Resolved::Host => {
                let (Some(name), Some(Value::Host(host))) = (name, &target.receiver) else {
                    return Ok(None);
                };
                let values = positional(args);
                let kinds: Vec<ValueKind> = values.iter().map(Value::kind).collect();
                let type_name = self.host_type_name(host.type_name(), hint);
                let Some(invoke) = self.symbols.reflector().method(&type_name, name, &kinds) else {
                    return Ok(None);
                };
                let value = invoke(host, &values)?;
                emit(out, &value);
                value
            }
            Resolved::Ambient => {
                let Some(name) = name else { return Ok(None) };
                let scope = match &target.receiver {
                    None => self.env.locals().clone(),
                    Some(Value::Context(ctx)) => ctx.clone(),
                    Some(Value::Instance(instance)) => instance.fields.clone(),
                    Some(_) => return Ok(None),
                };
                let Some(result) = ambient(name, &scope, &positional(args)) else {
                    return Ok(None);
                };
                let value = result?;
                emit(out, &value);
                value
            }
        };
        Ok(Some((value, strategy)))
    }

    /// Looks a bare or dotted call name up in a symbol table.
    fn declared<T>(&self, target: &Target, find: impl Fn(&super::symbols::Symbols, &str) -> Option<T>) -> Option<T> {
        match (&target.receiver, &target.name, &target.dotted) {
            (None, Some(name), _) => find(&self.symbols, name),
            (Some(Value::Null), _, Some(dotted)) => find(&self.symbols, dotted),
            _ => None,
        }
    }

    /// Calls a script function in a fresh frame.
    pub(crate) fn invoke(&mut self, function: &Arc<Function>, args: Vec<CallArg>, this: Value, out: Sink<'_>) -> Result<Value, InterpreterError> {
        let locals = Context::new();
        locals.set(ARGUMENTS, Value::Context(Context::from_values(positional(&args))));

        let mut unnamed = args.iter().filter(|a| a.name.is_none()).map(|a| a.value.clone());
        for param in &function.params {
            let value = match args.iter().find(|a| a.name.as_deref() == Some(param.as_str())) {
                Some(named) => named.value.clone(),
                None => unnamed.next().unwrap_or_default(),
            };
            locals.set(param.clone(), value);
        }

        self.push_frame(Frame::new(locals, this, function.captured.clone()))?;
        let result = self.exec(&function.body, out);
        self.env.pop();

        Ok(match result? {
            ControlFlow::Return(value) => value,
            // Expression-bodied lambdas yield their expression.
            ControlFlow::Value(value) if !matches!(function.body.kind, NodeKind::Block(_)) => value,
            _ => Value::Null,
        })
    }

    /// Creates an instance: field initializers from the root base class
    /// down, then the most-derived constructor.
    pub(crate) fn instantiate(&mut self, class: &Arc<Class>, args: Vec<CallArg>) -> Result<Value, InterpreterError> {
        let instance = Arc::new(ClassInstance::new(class));
        let this = Value::Instance(instance.clone());
        let chain = self.symbols.class_chain(class);

        self.push_frame(Frame::new(Context::new(), this.clone(), None))?;
        let initialized = self.init_fields(&chain, &instance);
        self.env.pop();
        initialized?;

        if let Some(constructor) = self.symbols.find_constructor(class) {
            self.invoke(&constructor, args, this.clone(), None)?;
        }
        Ok(this)
    }

    fn init_fields(&mut self, chain: &[Arc<Class>], instance: &ClassInstance) -> Result<(), InterpreterError> {
        for class in chain.iter().rev() {
            for field in &class.fields {
                let value = match &field.value {
                    Some(init) => self.eval(init)?,
                    None => Value::Null,
                };
                instance.fields.set(field.name.clone(), value);
            }
        }
        Ok(())
    }
}

fn emit(out: Sink<'_>, value: &Value) {
    if let Some(out) = out {
        out.push_str(&value.render());
    }
}
