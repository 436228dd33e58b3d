//! Stack growth for deeply recursive evaluation
//!
//! Nested calls and deeply nested expressions recurse on the native stack.
//! Growing it on demand lets the call depth limit fire as a `RecursionError`
//! instead of the process overflowing its stack.

/// Run `f`, first growing the stack when less than the red zone is left
#[inline]
#[cfg(not(target_arch = "wasm32"))]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    /// Stack kept free before descending (128KB)
    const RED_ZONE: usize = 128 * 1024;

    /// Size of each new segment (1MB)
    const STACK_PER_RECURSION: usize = 1024 * 1024;

    stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, f)
}

#[inline]
#[cfg(target_arch = "wasm32")]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    f()
}
