//! Functions, classes and class instances.

use std::fmt;
use std::sync::{Arc, Weak};

use indexmap::IndexMap;

use crate::ast::{write_function, Node};
use crate::value::{Context, Value};

/// A script function. Methods, lambdas and top-level functions share this
/// shape; they differ only in the receiver and captured scope they carry.
pub struct Function {
    pub name: Arc<str>,
    pub params: Vec<String>,
    pub body: Arc<Node>,
    pub is_static: bool,
    /// Bound `this`, set when the function is read off an instance.
    pub receiver: Option<Value>,
    /// Frame a lambda was created in; bare names fall back to it.
    pub captured: Option<Context>,
}

impl Function {
    pub fn new(name: impl Into<Arc<str>>, params: Vec<String>, body: Node) -> Self {
        Self {
            name: name.into(),
            params,
            body: Arc::new(body),
            is_static: false,
            receiver: None,
            captured: None,
        }
    }

    /// A copy of this function with `receiver` bound as `this`.
    pub fn bind(&self, receiver: Value) -> Arc<Function> {
        Arc::new(Function {
            name: self.name.clone(),
            params: self.params.clone(),
            body: self.body.clone(),
            is_static: self.is_static,
            receiver: Some(receiver),
            captured: self.captured.clone(),
        })
    }

    pub fn capture(&self, scope: Context) -> Arc<Function> {
        Arc::new(Function {
            name: self.name.clone(),
            params: self.params.clone(),
            body: self.body.clone(),
            is_static: self.is_static,
            receiver: self.receiver.clone(),
            captured: Some(scope),
        })
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("bound", &self.receiver.is_some())
            .finish()
    }
}

#[derive(Debug)]
pub struct FieldInit {
    pub name: String,
    pub value: Option<Node>,
}

pub struct Class {
    pub name: String,
    pub base: Option<String>,
    pub fields: Vec<FieldInit>,
    pub methods: IndexMap<String, Arc<Function>>,
    pub statics: IndexMap<String, Arc<Function>>,
}

impl Class {
    /// Last dotted segment, `Circle` for `Shapes.Circle`.
    pub fn short_name(&self) -> &str {
        self.name.rsplit('.').next().unwrap_or(&self.name)
    }

    /// The method named after the class, if declared.
    pub fn constructor(&self) -> Option<&Arc<Function>> {
        self.methods.get(self.short_name())
    }
}

impl fmt::Debug for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Class")
            .field("name", &self.name)
            .field("base", &self.base)
            .field("fields", &self.fields.iter().map(|fi| &fi.name).collect::<Vec<_>>())
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .field("statics", &self.statics.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl fmt::Display for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "class {}", self.name)?;
        if let Some(base) = &self.base {
            write!(f, " : {}", base)?;
        }
        f.write_str(" {")?;
        for field in &self.fields {
            match &field.value {
                Some(value) => write!(f, " {} = {};", field.name, value)?,
                None => write!(f, " {};", field.name)?,
            }
        }
        for method in self.methods.values() {
            f.write_str(" ")?;
            write_function(f, Some("function"), method)?;
        }
        for method in self.statics.values() {
            f.write_str(" ")?;
            write_function(f, Some("static function"), method)?;
        }
        f.write_str(" }")
    }
}

/// An object created from a [`Class`]. The instance owns its fields; the
/// class is only referenced weakly and is kept alive by the symbol table.
pub struct ClassInstance {
    class: Weak<Class>,
    class_name: String,
    pub fields: Context,
}

impl ClassInstance {
    pub fn new(class: &Arc<Class>) -> Self {
        Self {
            class: Arc::downgrade(class),
            class_name: class.name.clone(),
            fields: Context::new(),
        }
    }

    pub fn class(&self) -> Option<Arc<Class>> {
        self.class.upgrade()
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }
}

impl fmt::Debug for ClassInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:?}", self.class_name, self.fields)
    }
}
