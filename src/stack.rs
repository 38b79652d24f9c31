//! Stack growth for deeply nested source and deeply recursive scripts.
//!
//! The parser and the evaluator recurse once per nesting level and once per
//! script call. Both wrap their recursive entry points in
//! [`ensure_sufficient_stack`], so depth is bounded by the configured call
//! limit rather than by the size of the thread's stack.

/// Space that must remain before the closure runs.
const RED_ZONE: usize = 128 * 1024;

/// Size of each newly allocated stack segment.
const STACK_PER_RECURSION: usize = 1024 * 1024;

#[inline]
#[cfg(not(target_arch = "wasm32"))]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, f)
}

#[inline]
#[cfg(target_arch = "wasm32")]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    f()
}
