//! Runtime values and the `Context` map that doubles as variable scope.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::{RwLock, RwLockReadGuard};

use crate::interpreter::error::InterpreterError;
use crate::interpreter::host::HostRef;
use crate::interpreter::object::{Class, ClassInstance, Function};
use crate::interpreter::task::FutureHandle;

/// A dynamically typed script value. `Null` is the language's "nothing".
#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    /// Numeric value and whether it was written or computed as a float.
    Number(f64, bool),
    String(Arc<str>),
    Context(Context),
    Function(Arc<Function>),
    Class(Arc<Class>),
    Instance(Arc<ClassInstance>),
    Future(FutureHandle),
    Host(HostRef),
    Exception(Arc<InterpreterError>),
}

/// Coarse runtime type tag, used for host method signatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Null,
    Bool,
    Number,
    String,
    Context,
    Function,
    Class,
    Instance,
    Future,
    Host,
    Exception,
}

impl Value {
    pub fn int(n: i64) -> Self {
        Value::Number(n as f64, false)
    }

    pub fn float(n: f64) -> Self {
        Value::Number(n, true)
    }

    pub fn string(s: impl AsRef<str>) -> Self {
        Value::String(Arc::from(s.as_ref()))
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Bool,
            Value::Number(..) => ValueKind::Number,
            Value::String(_) => ValueKind::String,
            Value::Context(_) => ValueKind::Context,
            Value::Function(_) => ValueKind::Function,
            Value::Class(_) => ValueKind::Class,
            Value::Instance(_) => ValueKind::Instance,
            Value::Future(_) => ValueKind::Future,
            Value::Host(_) => ValueKind::Host,
            Value::Exception(_) => ValueKind::Exception,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(..) => "number",
            Value::String(_) => "string",
            Value::Context(c) if c.is_array() => "array",
            Value::Context(_) => "map",
            Value::Function(_) => "function",
            Value::Class(_) => "class",
            Value::Instance(_) => "instance",
            Value::Future(_) => "future",
            Value::Host(_) => "host",
            Value::Exception(_) => "exception",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Zero, the empty string, empty maps, `false` and `null` are false.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n, _) => *n != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::Context(c) => !c.is_empty(),
            _ => true,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n, _) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_context(&self) -> Option<&Context> {
        match self {
            Value::Context(c) => Some(c),
            _ => None,
        }
    }

    /// Text used when the value is streamed into template output.
    pub fn render(&self) -> String {
        match self {
            Value::Null => String::new(),
            other => other.to_string(),
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}

pub(crate) fn format_number(n: f64, is_float: bool) -> String {
    if !is_float && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{:.0}", n)
    } else {
        n.to_string()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n, is_float) => f.write_str(&format_number(*n, *is_float)),
            Value::String(s) => f.write_str(s),
            Value::Context(_) => f.write_str(&crate::format::value_to_json_string(self, true)),
            Value::Function(func) => write!(f, "<function {}>", func.name),
            Value::Class(class) => write!(f, "<class {}>", class.name),
            Value::Instance(instance) => write!(f, "<{} instance>", instance.class_name()),
            Value::Future(_) => f.write_str("<future>"),
            Value::Host(host) => write!(f, "<{}>", host.type_name()),
            Value::Exception(err) => write!(f, "{}", err),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("Null"),
            Value::Bool(b) => write!(f, "Bool({})", b),
            Value::Number(n, is_float) => write!(f, "Number({}, {})", n, is_float),
            Value::String(s) => write!(f, "String({:?})", s),
            Value::Context(c) => c.fmt(f),
            Value::Exception(err) => write!(f, "Exception({:?})", err),
            other => write!(f, "{}", other),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        crate::interpreter::value_utils::deep_equals(self, other)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::int(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::float(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Arc::from(s))
    }
}

impl From<Context> for Value {
    fn from(c: Context) -> Self {
        Value::Context(c)
    }
}

#[derive(Default)]
struct ContextData {
    entries: IndexMap<String, Value>,
    array: bool,
}

/// Ordered, string-keyed, shared dynamic map.
///
/// Cloning a `Context` clones the handle, not the entries. Array-shaped
/// contexts keep their elements under the keys `"0"`, `"1"`, ...
#[derive(Clone, Default)]
pub struct Context(Arc<RwLock<ContextData>>);

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_array() -> Self {
        Self(Arc::new(RwLock::new(ContextData { entries: IndexMap::new(), array: true })))
    }

    pub fn from_map(entries: IndexMap<String, Value>) -> Self {
        Self(Arc::new(RwLock::new(ContextData { entries, array: false })))
    }

    pub fn from_values(values: impl IntoIterator<Item = Value>) -> Self {
        let entries = values
            .into_iter()
            .enumerate()
            .map(|(i, v)| (i.to_string(), v))
            .collect();
        Self(Arc::new(RwLock::new(ContextData { entries, array: true })))
    }

    pub fn is_array(&self) -> bool {
        self.0.read().array
    }

    pub fn len(&self) -> usize {
        self.0.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.read().entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.0.read().entries.get(key).cloned()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.read().entries.contains_key(key)
    }

    pub fn set(&self, key: impl Into<String>, value: Value) {
        self.0.write().entries.insert(key.into(), value);
    }

    /// Removes a key, keeping the order of the remaining entries. Array
    /// contexts are re-indexed so their keys stay dense.
    pub fn remove(&self, key: &str) -> Option<Value> {
        let mut data = self.0.write();
        let removed = data.entries.shift_remove(key)?;
        if data.array {
            let values: Vec<Value> = data.entries.drain(..).map(|(_, v)| v).collect();
            data.entries = values.into_iter().enumerate().map(|(i, v)| (i.to_string(), v)).collect();
        }
        Some(removed)
    }

    pub fn push(&self, value: Value) {
        let mut data = self.0.write();
        let key = data.entries.len().to_string();
        data.entries.insert(key, value);
    }

    pub fn clear(&self) {
        self.0.write().entries.clear();
    }

    pub fn keys(&self) -> Vec<String> {
        self.0.read().entries.keys().cloned().collect()
    }

    pub fn values(&self) -> Vec<Value> {
        self.0.read().entries.values().cloned().collect()
    }

    /// Snapshot of the entries in insertion order.
    pub fn entries(&self) -> Vec<(String, Value)> {
        self.0
            .read()
            .entries
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn ptr_eq(&self, other: &Context) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn read(&self) -> ContextRef<'_> {
        ContextRef(self.0.read())
    }
}

/// Read guard over a context's entries.
pub(crate) struct ContextRef<'a>(RwLockReadGuard<'a, ContextData>);

impl ContextRef<'_> {
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.entries.iter()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.entries.len()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.0.read();
        let name = if data.array { "Array" } else { "Context" };
        write!(f, "{}(", name)?;
        for (i, (k, v)) in data.entries.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            // Nested contexts are summarized to keep cyclic graphs printable.
            match v {
                Value::Context(inner) => write!(f, "{}: <{} entries>", k, inner.len())?,
                other => write!(f, "{}: {:?}", k, other)?,
            }
        }
        f.write_str(")")
    }
}
