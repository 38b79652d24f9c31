use crate::value::{Context, Value};

/// Name under which a function frame exposes its positional arguments.
pub const ARGUMENTS: &str = "arguments";
pub const THIS: &str = "this";

/// One function activation. Blocks and loops run in the frame of the
/// enclosing call; only calls push frames.
#[derive(Debug, Clone)]
pub struct Frame {
    pub locals: Context,
    pub this: Value,
    /// Scope a lambda closed over, searched after the locals.
    pub captured: Option<Context>,
}

impl Frame {
    pub fn new(locals: Context, this: Value, captured: Option<Context>) -> Self {
        Self { locals, this, captured }
    }

    fn this_fields(&self) -> Option<&Context> {
        match &self.this {
            Value::Instance(instance) => Some(&instance.fields),
            _ => None,
        }
    }
}

/// Stack of call frames. The bottom frame's locals are the caller-supplied
/// root context.
#[derive(Debug, Clone)]
pub struct Environment {
    frames: Vec<Frame>,
}

impl Environment {
    pub fn new(root: Context) -> Self {
        let mut frames = Vec::with_capacity(16);
        frames.push(Frame::new(root, Value::Null, None));
        Self { frames }
    }

    pub fn push(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    pub fn pop(&mut self) {
        if self.frames.len() > 1 {
            self.frames.pop();
        }
    }

    /// Number of active call frames, not counting the root.
    pub fn depth(&self) -> usize {
        self.frames.len() - 1
    }

    pub fn current(&self) -> &Frame {
        // The root frame is never popped.
        &self.frames[self.frames.len() - 1]
    }

    pub fn locals(&self) -> &Context {
        &self.current().locals
    }

    pub fn this(&self) -> &Value {
        &self.current().this
    }

    /// Bare-name lookup: locals, then the captured scope, then the fields
    /// of `this`.
    pub fn get(&self, name: &str) -> Option<Value> {
        let frame = self.current();
        if name == THIS {
            return Some(frame.this.clone());
        }
        if let Some(value) = frame.locals.get(name) {
            return Some(value);
        }
        if let Some(value) = frame.captured.as_ref().and_then(|c| c.get(name)) {
            return Some(value);
        }
        frame.this_fields().and_then(|fields| fields.get(name))
    }

    /// Bare-name assignment. Updates an existing captured variable or
    /// `this` field when the frame has no local of that name, otherwise
    /// sets a local.
    pub fn set(&self, name: &str, value: Value) {
        let frame = self.current();
        if !frame.locals.contains_key(name) {
            if let Some(captured) = frame.captured.as_ref().filter(|c| c.contains_key(name)) {
                captured.set(name, value);
                return;
            }
            if let Some(fields) = frame.this_fields().filter(|f| f.contains_key(name)) {
                fields.set(name, value);
                return;
            }
        }
        frame.locals.set(name, value);
    }

    /// Removes a local, returning its previous value.
    pub fn remove(&self, name: &str) -> Option<Value> {
        self.locals().remove(name)
    }
}
