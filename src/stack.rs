//! Stack growth for the recursive passes.
//!
//! Parsing, resolving and evaluating all recurse once per nesting level of the
//! program. [`ensure_sufficient_stack`] switches to a fresh heap-allocated
//! segment when the current one runs low, so deep but valid programs never
//! hit the native stack limit.

/// Space that must remain before `f` runs on the current segment.
const RED_ZONE: usize = 128 * 1024;

/// Size of each newly allocated segment.
const STACK_PER_RECURSION: usize = 1024 * 1024;

/// Run `f`, growing the stack first if less than [`RED_ZONE`] is left.
#[inline]
#[cfg(not(target_arch = "wasm32"))]
pub(crate) fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, f)
}

#[inline]
#[cfg(target_arch = "wasm32")]
pub(crate) fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    f()
}
