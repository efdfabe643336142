//! Process-wide shared VM runtime.
//!
//! Every plugin instance in the host process shares one [`wasmtime::Engine`].
//! The engine is constructed on the 0→1 refcount transition and torn down on
//! 1→0, serialized by a single process-wide lock so construction and teardown
//! never race. Instances hold the engine through an RAII [`RuntimeRef`]
//! rather than reaching for ambient global state.

use parking_lot::Mutex;
use wasmtime::{Config, Engine};

use crate::error::{HostError, InitStage, Result};

/// Max WASM call stack per instance (bytes).
pub const WASM_STACK_SIZE: usize = 256 * 1024;

struct RuntimeSlot {
    engine: Option<Engine>,
    refs: usize,
    threads: usize,
}

static RUNTIME: Mutex<RuntimeSlot> = Mutex::new(RuntimeSlot {
    engine: None,
    refs: 0,
    threads: 0,
});

/// Handle to the shared runtime. Dropping the last handle tears the
/// underlying engine down.
pub struct RuntimeRef {
    engine: Engine,
}

impl RuntimeRef {
    pub fn engine(&self) -> &Engine {
        &self.engine
    }
}

impl Drop for RuntimeRef {
    fn drop(&mut self) {
        SharedRuntime::release();
    }
}

/// Acquire/release interface over the refcounted engine singleton.
pub struct SharedRuntime;

impl SharedRuntime {
    /// Increment the shared refcount, constructing the engine on first
    /// acquisition. Fails and leaves state unchanged if construction fails.
    pub fn acquire() -> Result<RuntimeRef> {
        let mut slot = RUNTIME.lock();

        let engine = match &slot.engine {
            Some(engine) => engine.clone(),
            None => {
                let mut config = Config::new();
                config.max_wasm_stack(WASM_STACK_SIZE);
                let engine =
                    Engine::new(&config).map_err(|e| HostError::init(InitStage::Runtime, e))?;
                tracing::info!("constructed shared WASM runtime");
                slot.engine = Some(engine.clone());
                engine
            }
        };

        slot.refs += 1;
        Ok(RuntimeRef { engine })
    }

    fn release() {
        let mut slot = RUNTIME.lock();
        if slot.refs == 0 {
            return;
        }
        slot.refs -= 1;
        if slot.refs == 0 {
            slot.engine = None;
            tracing::info!("tore down shared WASM runtime");
        }
    }

    /// Number of live [`RuntimeRef`] handles.
    pub fn ref_count() -> usize {
        RUNTIME.lock().refs
    }

    /// Whether the underlying engine is currently constructed.
    pub fn is_initialized() -> bool {
        RUNTIME.lock().engine.is_some()
    }

    /// Register the calling thread as a VM-calling thread. Fails when no
    /// runtime is constructed; the execution guard caches the outcome.
    pub(crate) fn register_thread() -> bool {
        let mut slot = RUNTIME.lock();
        if slot.engine.is_none() {
            return false;
        }
        slot.threads += 1;
        true
    }

    pub(crate) fn unregister_thread() {
        let mut slot = RUNTIME.lock();
        slot.threads = slot.threads.saturating_sub(1);
    }

    /// Number of threads currently registered for VM calls.
    pub fn thread_count() -> usize {
        RUNTIME.lock().threads
    }
}

/// Serializes unit tests that observe the process-global slot.
#[cfg(test)]
pub(crate) static TEST_SERIAL: Mutex<()> = Mutex::new(());
