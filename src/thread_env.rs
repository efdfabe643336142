//! Per-thread execution guard.
//!
//! Any thread that invokes module exports must first enter a thread-local
//! execution scope. [`enter`] is idempotent per thread: the first call
//! registers the thread with the shared runtime and caches the outcome;
//! later calls reuse it. The scope unregisters itself on thread exit.
//!
//! When `enter` fails, callers report the "not ready" error shape instead
//! of touching the VM.

use crate::runtime::SharedRuntime;

struct ThreadEnv {
    active: bool,
}

impl ThreadEnv {
    fn acquire() -> Self {
        let active = SharedRuntime::register_thread();
        if !active {
            tracing::debug!("thread execution scope unavailable (no runtime constructed)");
        }
        Self { active }
    }
}

impl Drop for ThreadEnv {
    fn drop(&mut self) {
        if self.active {
            SharedRuntime::unregister_thread();
        }
    }
}

thread_local! {
    static ENV: ThreadEnv = ThreadEnv::acquire();
}

/// Enter (or re-enter) this thread's execution scope.
pub fn enter() -> bool {
    ENV.with(|env| env.active)
}
