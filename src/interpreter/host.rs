//! Host objects and the reflection table used to reach into them.
//!
//! Rust values are exposed to scripts as [`HostRef`] handles. What a script
//! can do with a handle is described by a [`HostType`] registered with the
//! engine: named properties, plain fields, methods keyed by argument kinds,
//! and an optional enumeration used by `foreach`.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use super::error::InterpreterError;
use crate::value::{Value, ValueKind};

pub type Getter = Arc<dyn Fn(&HostRef) -> Result<Value, InterpreterError> + Send + Sync>;
pub type Setter = Arc<dyn Fn(&HostRef, Value) -> Result<(), InterpreterError> + Send + Sync>;
pub type Invoker = Arc<dyn Fn(&HostRef, &[Value]) -> Result<Value, InterpreterError> + Send + Sync>;
type Enumerator = Arc<dyn Fn(&HostRef) -> Result<Vec<Value>, InterpreterError> + Send + Sync>;

/// Shared handle to a host value.
#[derive(Clone)]
pub struct HostRef {
    type_name: Arc<str>,
    object: Arc<dyn Any + Send + Sync>,
}

impl HostRef {
    pub fn new<T: Any + Send + Sync>(type_name: impl Into<Arc<str>>, object: T) -> Self {
        Self { type_name: type_name.into(), object: Arc::new(object) }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.object.downcast_ref::<T>()
    }

    pub fn ptr_eq(&self, other: &HostRef) -> bool {
        Arc::ptr_eq(&self.object, &other.object)
    }
}

impl fmt::Debug for HostRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HostRef({})", self.type_name)
    }
}

fn downcast<'a, T: Any>(host: &'a HostRef) -> Result<&'a T, InterpreterError> {
    host.downcast_ref::<T>().ok_or_else(|| {
        InterpreterError::host(format!("`{}` handle does not hold the registered type", host.type_name()))
    })
}

#[derive(Clone)]
struct Accessor {
    get: Getter,
    set: Option<Setter>,
}

#[derive(Clone)]
struct HostMethod {
    name: String,
    /// `None` accepts any arguments.
    signature: Option<Vec<ValueKind>>,
    invoke: Invoker,
}

impl HostMethod {
    fn accepts(&self, kinds: &[ValueKind]) -> bool {
        match &self.signature {
            None => true,
            Some(sig) => sig.as_slice() == kinds,
        }
    }
}

/// Reflection description of one host type.
pub struct HostType {
    name: String,
    properties: IndexMap<String, Accessor>,
    fields: IndexMap<String, Accessor>,
    methods: Vec<HostMethod>,
    enumerate: Option<Enumerator>,
}

impl HostType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: IndexMap::new(),
            fields: IndexMap::new(),
            methods: Vec::new(),
            enumerate: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn accessor<T, G>(get: G) -> Accessor
    where
        T: Any,
        G: Fn(&T) -> Value + Send + Sync + 'static,
    {
        let get: Getter = Arc::new(move |host: &HostRef| -> Result<Value, InterpreterError> {
            Ok(get(downcast::<T>(host)?))
        });
        Accessor { get, set: None }
    }

    fn with_setter<T, S>(mut accessor: Accessor, set: S) -> Accessor
    where
        T: Any,
        S: Fn(&T, Value) + Send + Sync + 'static,
    {
        let setter: Setter = Arc::new(move |host: &HostRef, value: Value| -> Result<(), InterpreterError> {
            set(downcast::<T>(host)?, value);
            Ok(())
        });
        accessor.set = Some(setter);
        accessor
    }

    /// Read-only property.
    pub fn property<T, G>(mut self, name: &str, get: G) -> Self
    where
        T: Any,
        G: Fn(&T) -> Value + Send + Sync + 'static,
    {
        self.properties.insert(name.to_string(), Self::accessor(get));
        self
    }

    /// Property with a setter; the host type provides its own interior
    /// mutability.
    pub fn property_mut<T, G, S>(mut self, name: &str, get: G, set: S) -> Self
    where
        T: Any,
        G: Fn(&T) -> Value + Send + Sync + 'static,
        S: Fn(&T, Value) + Send + Sync + 'static,
    {
        let accessor = Self::with_setter(Self::accessor(get), set);
        self.properties.insert(name.to_string(), accessor);
        self
    }

    /// Field; consulted after properties of the same name.
    pub fn field<T, G>(mut self, name: &str, get: G) -> Self
    where
        T: Any,
        G: Fn(&T) -> Value + Send + Sync + 'static,
    {
        self.fields.insert(name.to_string(), Self::accessor(get));
        self
    }

    pub fn field_mut<T, G, S>(mut self, name: &str, get: G, set: S) -> Self
    where
        T: Any,
        G: Fn(&T) -> Value + Send + Sync + 'static,
        S: Fn(&T, Value) + Send + Sync + 'static,
    {
        let accessor = Self::with_setter(Self::accessor(get), set);
        self.fields.insert(name.to_string(), accessor);
        self
    }

    /// Method matched only when the argument kinds equal `signature`.
    pub fn method<T, F>(mut self, name: &str, signature: &[ValueKind], call: F) -> Self
    where
        T: Any,
        F: Fn(&T, &[Value]) -> Result<Value, InterpreterError> + Send + Sync + 'static,
    {
        self.methods.push(HostMethod {
            name: name.to_string(),
            signature: Some(signature.to_vec()),
            invoke: Arc::new(move |host: &HostRef, args: &[Value]| call(downcast::<T>(host)?, args)),
        });
        self
    }

    /// Method accepting any arguments. Typed overloads of the same name
    /// registered earlier take precedence.
    pub fn method_any<T, F>(mut self, name: &str, call: F) -> Self
    where
        T: Any,
        F: Fn(&T, &[Value]) -> Result<Value, InterpreterError> + Send + Sync + 'static,
    {
        self.methods.push(HostMethod {
            name: name.to_string(),
            signature: None,
            invoke: Arc::new(move |host: &HostRef, args: &[Value]| call(downcast::<T>(host)?, args)),
        });
        self
    }

    /// Items produced when the host value is the subject of a `foreach`.
    pub fn enumerable<T, F>(mut self, items: F) -> Self
    where
        T: Any,
        F: Fn(&T) -> Vec<Value> + Send + Sync + 'static,
    {
        let enumerate: Enumerator = Arc::new(move |host: &HostRef| -> Result<Vec<Value>, InterpreterError> {
            Ok(items(downcast::<T>(host)?))
        });
        self.enumerate = Some(enumerate);
        self
    }

    fn accessor_named(&self, member: &str) -> Option<&Accessor> {
        self.properties.get(member).or_else(|| self.fields.get(member))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct MemberKey {
    type_name: String,
    member: String,
    signature: Vec<ValueKind>,
}

/// Registered host types plus a method-resolution cache keyed by type,
/// member name and argument kinds. Misses are cached too.
#[derive(Default)]
pub struct Reflector {
    types: RwLock<FxHashMap<String, Arc<HostType>>>,
    methods: RwLock<FxHashMap<MemberKey, Option<Invoker>>>,
}

impl Reflector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, host_type: HostType) {
        let name = host_type.name.clone();
        tracing::debug!(type_name = %name, "registering host type");
        self.types.write().insert(name.clone(), Arc::new(host_type));
        self.methods.write().retain(|key, _| key.type_name != name);
    }

    pub fn is_registered(&self, type_name: &str) -> bool {
        self.types.read().contains_key(type_name)
    }

    fn host_type(&self, type_name: &str) -> Option<Arc<HostType>> {
        self.types.read().get(type_name).cloned()
    }

    /// Property getter, falling back to a field of the same name.
    pub fn getter(&self, type_name: &str, member: &str) -> Option<Getter> {
        let host_type = self.host_type(type_name)?;
        host_type.accessor_named(member).map(|a| a.get.clone())
    }

    pub fn setter(&self, type_name: &str, member: &str) -> Option<Setter> {
        let host_type = self.host_type(type_name)?;
        host_type.accessor_named(member).and_then(|a| a.set.clone())
    }

    pub fn method(&self, type_name: &str, member: &str, signature: &[ValueKind]) -> Option<Invoker> {
        let key = MemberKey {
            type_name: type_name.to_string(),
            member: member.to_string(),
            signature: signature.to_vec(),
        };
        if let Some(cached) = self.methods.read().get(&key) {
            return cached.clone();
        }

        let found = self.host_type(type_name).and_then(|host_type| {
            host_type
                .methods
                .iter()
                .filter(|m| m.name == member)
                .find(|m| m.accepts(signature))
                .map(|m| m.invoke.clone())
        });
        tracing::trace!(type_name, member, hit = found.is_some(), "host method lookup");
        self.methods.write().insert(key, found.clone());
        found
    }

    pub fn enumerate(&self, type_name: &str, host: &HostRef) -> Option<Result<Vec<Value>, InterpreterError>> {
        let host_type = self.host_type(type_name)?;
        host_type.enumerate.as_ref().map(|items| items(host))
    }

    pub fn cached_methods(&self) -> usize {
        self.methods.read().len()
    }
}
