//! Variable paths: reading, writing and member access.

use super::error::InterpreterError;
use super::evaluator::Interpreter;
use crate::ast::{Root, Step, Variable};
use crate::value::{format_number, Context, Value};

/// A path step after its key expression has been evaluated.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Key {
    Name(String),
    Current,
}

impl Interpreter {
    /// Evaluates a step's key. `None` when a computed key yields nothing,
    /// which short-circuits the whole lookup.
    pub(crate) fn key_of(&mut self, step: &Step) -> Result<Option<Key>, InterpreterError> {
        Ok(match step {
            Step::Key(name) => Some(Key::Name(name.clone())),
            Step::Current => Some(Key::Current),
            Step::Computed(node) => match self.eval(node)? {
                Value::Null => None,
                Value::Number(n, is_float) => Some(Key::Name(format_number(n, is_float))),
                other => Some(Key::Name(other.render())),
            },
        })
    }

    /// Value of a bare name at the start of a path: the frame chain first,
    /// then the longest dotted prefix of literal steps naming a class or a
    /// declared function. Returns the value and the number of steps
    /// consumed.
    fn lookup_root(&self, steps: &[Step]) -> (Value, usize) {
        let Some(Step::Key(first)) = steps.first() else {
            return (Value::Null, 1);
        };
        if let Some(value) = self.env.get(first) {
            return (value, 1);
        }
        let literal: Vec<&str> = steps
            .iter()
            .map_while(|s| match s {
                Step::Key(k) => Some(k.as_str()),
                _ => None,
            })
            .collect();
        for len in (1..=literal.len()).rev() {
            let name = literal[..len].join(".");
            if let Some(class) = self.symbols.class(&name) {
                return (Value::Class(class), len);
            }
            if let Some(function) = self.symbols.function(&name) {
                return (Value::Function(function), len);
            }
        }
        (Value::Null, 1)
    }

    /// Walks the first `upto` steps of `var`. `Ok(None)` means the path has
    /// no value yet: a scope-rooted path with `upto == 0`, or a lookup cut
    /// short by a computed key that evaluated to nothing.
    ///
    /// With `materialize` set, missing intermediate entries are created as
    /// empty maps so an assignment can proceed.
    pub(crate) fn walk(&mut self, var: &Variable, upto: usize, materialize: bool) -> Result<Option<Value>, InterpreterError> {
        let steps = &var.steps[..upto.min(var.steps.len())];
        let (mut current, mut index) = match &var.root {
            Root::Static => (Value::Context(self.symbols.statics().clone()), 0),
            Root::Expr(node) => (self.eval(node)?, 0),
            Root::Scope => match steps.first() {
                None => return Ok(None),
                Some(Step::Current) => (Value::Context(self.env.locals().clone()), 1),
                Some(Step::Computed(_)) => {
                    let Some(key) = self.key_of(&steps[0])? else {
                        return Ok(None);
                    };
                    let locals = Value::Context(self.env.locals().clone());
                    (self.member(&locals, &key, var.type_hint.as_deref())?, 1)
                }
                Some(Step::Key(name)) => {
                    let (value, consumed) = self.lookup_root(steps);
                    if value.is_null() && materialize {
                        let created = Value::Context(Context::new());
                        self.env.set(name, created.clone());
                        (created, 1)
                    } else {
                        (value, consumed)
                    }
                }
            },
        };

        while index < steps.len() {
            let Some(key) = self.key_of(&steps[index])? else {
                return Ok(None);
            };
            let mut next = self.member(&current, &key, var.type_hint.as_deref())?;
            if next.is_null() && materialize {
                if let Key::Name(name) = &key {
                    let created = Value::Context(Context::new());
                    if self.set_member(&current, name, created.clone(), var.type_hint.as_deref()).is_ok() {
                        next = created;
                    }
                }
            }
            current = next;
            index += 1;
        }
        Ok(Some(current))
    }

    pub(crate) fn resolve(&mut self, var: &Variable) -> Result<Value, InterpreterError> {
        Ok(self.walk(var, var.steps.len(), false)?.unwrap_or_default())
    }

    pub(crate) fn assign(&mut self, var: &Variable, value: Value) -> Result<(), InterpreterError> {
        if let Some(name) = var.simple_name() {
            self.env.set(name, value);
            return Ok(());
        }
        let Some(last) = var.steps.last() else {
            return Err(InterpreterError::invalid_operation(format!("cannot assign to `{}`", var)));
        };
        let Some(container) = self.walk(var, var.steps.len() - 1, true)? else {
            return Ok(());
        };
        match self.key_of(last)? {
            Some(Key::Name(name)) => self.set_member(&container, &name, value, var.type_hint.as_deref()),
            Some(Key::Current) => Err(InterpreterError::invalid_operation("cannot assign to `_`")),
            None => Ok(()),
        }
    }

    /// One step of member access on an already-resolved value.
    pub(crate) fn member(&self, value: &Value, key: &Key, hint: Option<&str>) -> Result<Value, InterpreterError> {
        let name = match key {
            Key::Current => return Ok(value.clone()),
            Key::Name(name) => name,
        };
        Ok(match value {
            Value::Context(ctx) => ctx.get(name).unwrap_or_default(),
            Value::Instance(instance) => match instance.fields.get(name) {
                Some(field) => field,
                None => instance
                    .class()
                    .and_then(|class| self.symbols.find_method(&class, name))
                    .map(|method| Value::Function(method.bind(value.clone())))
                    .unwrap_or_default(),
            },
            Value::Class(class) => self
                .symbols
                .find_static(class, name)
                .map(Value::Function)
                .unwrap_or_default(),
            Value::String(s) => name
                .parse::<usize>()
                .ok()
                .and_then(|i| s.chars().nth(i))
                .map(|ch| Value::string(ch.to_string()))
                .unwrap_or_default(),
            Value::Host(host) => {
                let type_name = self.host_type_name(host.type_name(), hint);
                match self.symbols.reflector().getter(&type_name, name) {
                    Some(get) => get(host)?,
                    None => Value::Null,
                }
            }
            Value::Exception(err) => match name.as_str() {
                "message" => Value::string(err.to_string()),
                "code" => Value::string(err.code()),
                "value" => match err.as_ref() {
                    InterpreterError::Thrown { value, .. } => value.clone(),
                    _ => Value::Null,
                },
                _ => Value::Null,
            },
            _ => Value::Null,
        })
    }

    pub(crate) fn set_member(&self, container: &Value, name: &str, value: Value, hint: Option<&str>) -> Result<(), InterpreterError> {
        match container {
            Value::Context(ctx) => ctx.set(name, value),
            Value::Instance(instance) => instance.fields.set(name, value),
            Value::Host(host) => {
                let type_name = self.host_type_name(host.type_name(), hint);
                match self.symbols.reflector().setter(&type_name, name) {
                    Some(set) => set(host, value)?,
                    None => tracing::debug!(type_name = %type_name, member = name, "host member has no setter"),
                }
            }
            other => {
                return Err(InterpreterError::type_error(format!(
                    "cannot set `{}` on a {} value",
                    name,
                    other.type_name()
                )))
            }
        }
        Ok(())
    }

    /// The reflected type to use for a host value: the `as` hint when it
    /// names a registered type, otherwise the value's own type.
    pub(crate) fn host_type_name(&self, own: &str, hint: Option<&str>) -> String {
        match hint {
            Some(hint) if self.symbols.reflector().is_registered(hint) => hint.to_string(),
            _ => own.to_string(),
        }
    }
}
