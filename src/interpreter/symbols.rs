//! Engine-wide state: declared functions and classes, `using` prefixes,
//! the `Static` table, persisted slots, host reflection and the live
//! include cache.
//!
//! Tables are written while parsing and read while evaluating.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;

use super::host::{HostType, Reflector};
use super::include::IncludeCache;
use super::object::{Class, Function};
use crate::config::EngineConfig;
use crate::value::Context;

/// Longest inheritance chain followed before giving up.
const MAX_CLASS_CHAIN: usize = 64;

#[derive(Default)]
pub struct Symbols {
    config: EngineConfig,
    functions: RwLock<IndexMap<String, Arc<Function>>>,
    classes: RwLock<IndexMap<String, Arc<Class>>>,
    usings: RwLock<Vec<String>>,
    statics: Context,
    persisted: Context,
    reflector: Reflector,
    includes: IncludeCache,
    /// Bumped whenever a declaration could change how a call resolves.
    generation: AtomicU64,
}

impl Symbols {
    pub fn new(config: EngineConfig) -> Self {
        Self { config, ..Self::default() }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn statics(&self) -> &Context {
        &self.statics
    }

    pub fn persisted(&self) -> &Context {
        &self.persisted
    }

    pub fn reflector(&self) -> &Reflector {
        &self.reflector
    }

    pub fn includes(&self) -> &IncludeCache {
        &self.includes
    }

    pub fn register_type(&self, host_type: HostType) {
        self.reflector.register(host_type);
        self.declarations_changed();
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    fn declarations_changed(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    pub fn define_function(&self, function: Arc<Function>) {
        tracing::trace!(name = %function.name, "function declared");
        self.functions.write().insert(function.name.to_string(), function);
        self.declarations_changed();
    }

    pub fn define_class(&self, class: Arc<Class>) {
        tracing::trace!(name = %class.name, "class declared");
        self.classes.write().insert(class.name.clone(), class);
        self.declarations_changed();
    }

    pub fn add_using(&self, prefix: &str) {
        let mut usings = self.usings.write();
        if !usings.iter().any(|u| u == prefix) {
            usings.push(prefix.to_string());
            self.declarations_changed();
        }
    }

    /// Looks `name` up as written, then under each `using` prefix.
    fn qualified<T: Clone>(&self, table: &RwLock<IndexMap<String, T>>, name: &str) -> Option<T> {
        let table = table.read();
        if let Some(found) = table.get(name) {
            return Some(found.clone());
        }
        self.usings
            .read()
            .iter()
            .find_map(|prefix| table.get(&format!("{}.{}", prefix, name)).cloned())
    }

    pub fn function(&self, name: &str) -> Option<Arc<Function>> {
        self.qualified(&self.functions, name)
    }

    pub fn class(&self, name: &str) -> Option<Arc<Class>> {
        self.qualified(&self.classes, name)
    }

    /// `class` followed by its bases, most-derived first. Stops at unknown
    /// base names and at cycles.
    pub fn class_chain(&self, class: &Arc<Class>) -> Vec<Arc<Class>> {
        let mut chain = vec![class.clone()];
        let mut current = class.clone();
        while let Some(base_name) = current.base.clone() {
            let Some(base) = self.class(&base_name) else {
                tracing::debug!(class = %current.name, base = %base_name, "unknown base class");
                break;
            };
            if chain.iter().any(|c| Arc::ptr_eq(c, &base)) || chain.len() >= MAX_CLASS_CHAIN {
                break;
            }
            chain.push(base.clone());
            current = base;
        }
        chain
    }

    pub fn find_method(&self, class: &Arc<Class>, name: &str) -> Option<Arc<Function>> {
        self.class_chain(class)
            .iter()
            .find_map(|c| c.methods.get(name).cloned())
    }

    pub fn find_static(&self, class: &Arc<Class>, name: &str) -> Option<Arc<Function>> {
        self.class_chain(class)
            .iter()
            .find_map(|c| c.statics.get(name).cloned())
    }

    /// Constructor of the most-derived class in the chain that declares one.
    pub fn find_constructor(&self, class: &Arc<Class>) -> Option<Arc<Function>> {
        self.class_chain(class)
            .iter()
            .find_map(|c| c.constructor().cloned())
    }
}
