//! Module host: loads the embedded bytecode, instantiates it into an
//! isolated sandbox, resolves exports, and owns the instance lifetime.
//!
//! One `ModuleHost` per plugin instance. Initialization walks
//! `Uninitialized → RuntimeAcquired → ModuleLoaded → Instantiated →
//! ExportsResolved → Ready`; a failure at any step unwinds every
//! partially-acquired resource (the session's RAII fields make the unwind a
//! plain drop) and returns to `Uninitialized` for a lazy retry on the next
//! `prepare`.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use wasmtime::{Instance, Memory, Module, Store, StoreLimits, StoreLimitsBuilder};

use crate::error::{HostError, InitStage, Result};
use crate::exports::ExportTable;
use crate::graph::{GraphConfig, GraphMailbox, GraphPayloadError};
use crate::processor::LINEAR_MEMORY_LIMIT;
use crate::runtime::{RuntimeRef, SharedRuntime};
use crate::thread_env;

/// Named bytecode resources embedded at build time.
///
/// `initialize` loads the first non-empty resource, mirroring how the
/// plugin shell embeds exactly one compiled DSP program per product.
#[derive(Debug, Clone, Default)]
pub struct HostConfig {
    pub resources: Vec<(String, Vec<u8>)>,
}

impl HostConfig {
    pub fn with_resource(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            resources: vec![(name.into(), bytes.into())],
        }
    }

    fn first_non_empty(&self) -> Option<(&str, &[u8])> {
        self.resources
            .iter()
            .find(|(_, bytes)| !bytes.is_empty())
            .map(|(name, bytes)| (name.as_str(), bytes.as_slice()))
    }
}

pub(crate) struct SessionState {
    pub limits: StoreLimits,
}

/// Everything owned by a live instance. Field order mirrors teardown:
/// export handles first, then the store (instance + module), then the
/// shared runtime reference.
pub(crate) struct VmSession {
    pub exports: ExportTable,
    pub memory: Memory,
    pub store: Store<SessionState>,
    _runtime: RuntimeRef,
}

/// Per-plugin-instance bridge to the sandboxed DSP program.
///
/// Shared between the audio thread and control threads behind `Arc`; all
/// methods take `&self`.
pub struct ModuleHost {
    config: HostConfig,
    pub(crate) session: Mutex<Option<VmSession>>,
    pub(crate) ready: AtomicBool,
    pub(crate) param_count: AtomicUsize,
    /// Host-side tracked parameter values, bit-cast f32 per slot. Replaced
    /// wholesale on (re)initialization so the audio thread never sees a
    /// half-sized bank.
    pub(crate) values: ArcSwap<Vec<AtomicU32>>,
    pub(crate) pending: GraphMailbox,
    pub(crate) output_level: AtomicU32,
    sample_rate: AtomicU64,
    block_size: AtomicUsize,
}

impl ModuleHost {
    pub fn new(config: HostConfig) -> Self {
        Self {
            config,
            session: Mutex::new(None),
            ready: AtomicBool::new(false),
            param_count: AtomicUsize::new(0),
            values: ArcSwap::from_pointee(Vec::new()),
            pending: GraphMailbox::default(),
            output_level: AtomicU32::new(0),
            sample_rate: AtomicU64::new(0),
            block_size: AtomicUsize::new(0),
        }
    }

    /// Whether the instance reached `Ready`.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Load, instantiate, resolve, and initialize the embedded module.
    /// Idempotent once `Ready`; fails closed otherwise.
    pub fn initialize(&self) -> Result<()> {
        if self.is_ready() {
            return Ok(());
        }

        let mut session = self.session.lock();
        if self.is_ready() {
            return Ok(());
        }

        let runtime = SharedRuntime::acquire()?;

        let (resource_name, bytes) = self
            .config
            .first_non_empty()
            .ok_or(HostError::NoModuleResource)?;

        let module = Module::new(runtime.engine(), bytes)
            .map_err(|e| HostError::init(InitStage::Module, e))?;

        // Isolated address space per instance: its own store and linear
        // memory, growth capped at the audio regions plus the module heap.
        let limits = StoreLimitsBuilder::new()
            .memory_size(LINEAR_MEMORY_LIMIT)
            .memories(1)
            .build();
        let mut store = Store::new(runtime.engine(), SessionState { limits });
        store.limiter(|state| &mut state.limits);

        let instance = Instance::new(&mut store, &module, &[])
            .map_err(|e| HostError::init(InitStage::Instance, e))?;

        let memory = instance
            .get_memory(&mut store, "memory")
            .ok_or(HostError::MissingExport("memory"))?;

        let exports = ExportTable::resolve(&mut store, &instance)?;

        if !thread_env::enter() {
            return Err(HostError::NotReady);
        }

        if let Some(init) = &exports.init {
            init.call(&mut store, ())
                .map_err(|e| HostError::init(InitStage::ModuleInit, e))?;
        }

        let count = exports
            .get_param_count
            .call(&mut store, ())
            .map_err(HostError::trap)?
            .max(0) as usize;

        // Seed the tracked bank from the module's current values (falling
        // back to its declared defaults) so the first block's sync does not
        // stomp module state with zeros.
        let mut seeded = Vec::with_capacity(count);
        for index in 0..count {
            let value = if let Some(get) = &exports.get_param {
                get.call(&mut store, index as i32).unwrap_or(0.0)
            } else if let Some(default) = &exports.get_param_default {
                default.call(&mut store, index as i32).unwrap_or(0.0)
            } else {
                0.0
            };
            seeded.push(AtomicU32::new(value.to_bits()));
        }

        *session = Some(VmSession {
            exports,
            memory,
            store,
            _runtime: runtime,
        });
        self.values.store(Arc::new(seeded));
        self.param_count.store(count, Ordering::Release);
        self.ready.store(true, Ordering::Release);
        tracing::info!(resource = resource_name, params = count, "DSP module ready");
        Ok(())
    }

    /// Host-driven stream setup. Retries a failed initialization lazily and
    /// records the stream format.
    pub fn prepare(&self, sample_rate: f64, block_size: usize) {
        if !self.is_ready() {
            if let Err(e) = self.initialize() {
                tracing::warn!("deferred DSP initialization failed: {e}");
            }
        }
        self.sample_rate.store(sample_rate.to_bits(), Ordering::Relaxed);
        self.block_size.store(block_size, Ordering::Relaxed);
    }

    /// Tear the instance down. Safe from any state, any number of times.
    pub fn shutdown(&self) {
        self.ready.store(false, Ordering::Release);
        self.param_count.store(0, Ordering::Release);
        self.values.store(Arc::new(Vec::new()));
        // Session drop releases exports, store, and the runtime reference.
        self.session.lock().take();
    }

    /// Stage a topology for the audio thread, replacing any unconsumed
    /// prior submission. Callable from any non-audio thread.
    pub fn submit_graph(&self, config: GraphConfig) -> std::result::Result<(), GraphPayloadError> {
        config.validate()?;
        self.pending.submit(config);
        Ok(())
    }

    /// Parse, validate, and stage a JSON payload from the control surface.
    pub fn submit_graph_payload(&self, payload: &str) -> std::result::Result<(), GraphPayloadError> {
        self.submit_graph(GraphConfig::from_json_payload(payload)?)
    }

    /// Sample rate recorded by the last `prepare`.
    pub fn sample_rate(&self) -> f64 {
        f64::from_bits(self.sample_rate.load(Ordering::Relaxed))
    }

    /// Block size recorded by the last `prepare`.
    pub fn block_size(&self) -> usize {
        self.block_size.load(Ordering::Relaxed)
    }

    /// Peak output level of the most recent processed block, clamped 0..1.
    pub fn output_level(&self) -> f32 {
        f32::from_bits(self.output_level.load(Ordering::Relaxed))
    }
}

impl Drop for ModuleHost {
    fn drop(&mut self) {
        self.shutdown();
    }
}
