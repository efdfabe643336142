//! Sandboxed WASM DSP hosting for real-time audio plugins.
//!
//! Hosts a pre-compiled signal-processing module inside a plugin shell,
//! executing it once per audio block on the hard real-time audio thread
//! while control threads read/write parameters and hot-swap the processing
//! topology.
//!
//! ## Guarantees
//!
//! - **Isolation**: each plugin instance gets its own linear-memory sandbox;
//!   addresses the module hands back are bounds-validated before any byte
//!   is copied out.
//! - **RT safety**: nothing on the block path blocks unbounded or panics; a
//!   trap, a missing export, or an unready instance costs at most one block
//!   of stale output.
//! - **Degraded modes**: optional exports that are absent turn their feature
//!   into a fixed fallback instead of an error.
//!
//! ## Usage
//!
//! ```ignore
//! use wasm_dsp_host::{AudioBlock, HostConfig, ModuleHost};
//!
//! let host = ModuleHost::new(HostConfig::with_resource("dsp.wasm", DSP_BYTES));
//! host.prepare(48_000.0, 512);
//!
//! // Control thread:
//! host.set_param(0, 0.75);
//!
//! // Audio thread, per callback:
//! host.process_block(&mut AudioBlock { channels, num_samples });
//! ```

pub mod error;
pub use error::{HostError, InitStage, Result};

mod runtime;
pub use runtime::{RuntimeRef, SharedRuntime, WASM_STACK_SIZE};

pub mod thread_env;

mod exports;

mod host;
pub use host::{HostConfig, ModuleHost};

mod params;
pub use params::{ParameterDescriptor, PARAM_NAME_MAX};

mod processor;
pub use processor::{
    AudioBlock, INPUT_LEFT_OFFSET, INPUT_RIGHT_OFFSET, MAX_BLOCK_SAMPLES, OUTPUT_LEFT_OFFSET,
    OUTPUT_RIGHT_OFFSET, REGION_SIZE,
};

mod graph;
pub use graph::{
    GraphConfig, GraphEdge, GraphNode, GraphPayloadError, GRAPH_SCHEMA_VERSION, MAX_GRAPH_EDGES,
    MAX_GRAPH_NODES,
};
