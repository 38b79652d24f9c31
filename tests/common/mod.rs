#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use quill::{Context, Engine, EngineConfig, Error, Value};

pub fn run(source: &str) -> Value {
    run_with(source, &Context::new())
}

pub fn run_with(source: &str, ctx: &Context) -> Value {
    Engine::new()
        .run(source, ctx)
        .unwrap_or_else(|e| panic!("`{}` failed: {}", source, e))
}

pub fn run_err(source: &str) -> Error {
    match Engine::new().run(source, &Context::new()) {
        Ok(value) => panic!("`{}` should fail, got {:?}", source, value),
        Err(e) => e,
    }
}

pub fn render(source: &str, ctx: &Context) -> String {
    Engine::new()
        .render(source, ctx)
        .unwrap_or_else(|e| panic!("template failed: {}", e))
}

pub fn ints(values: &[i64]) -> Value {
    Value::Context(Context::from_values(values.iter().map(|n| Value::int(*n))))
}

/// `{ users: [{ name, age }, ...] }`
pub fn users_context() -> Context {
    let users = Context::new_array();
    for (name, age) in [("Alice", 25), ("Bob", 30), ("Charlie", 35)] {
        let user = Context::new();
        user.set("name", Value::from(name));
        user.set("age", Value::int(age));
        users.push(Value::Context(user));
    }
    let root = Context::new();
    root.set("users", Value::Context(users));
    root
}

/// A scratch directory removed on drop.
pub struct TempDir {
    path: PathBuf,
}

impl TempDir {
    pub fn new(name: &str) -> Self {
        static NEXT: AtomicUsize = AtomicUsize::new(0);
        let unique = format!(
            "quill_test_{}_{}_{}",
            name,
            std::process::id(),
            NEXT.fetch_add(1, Ordering::Relaxed)
        );
        let path = std::env::temp_dir().join(unique);
        fs::create_dir_all(&path).expect("create temp dir");
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write(&self, name: &str, content: &str) -> PathBuf {
        let file = self.path.join(name);
        if let Some(parent) = file.parent() {
            fs::create_dir_all(parent).expect("create parent dir");
        }
        fs::write(&file, content).expect("write temp file");
        file
    }

    pub fn engine(&self) -> Engine {
        Engine::with_config(EngineConfig::default().with_include_root(&self.path))
    }
}

impl Drop for TempDir {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.path);
    }
}
