//! Error types for the WASM DSP bridge.

use thiserror::Error;

use crate::graph::GraphPayloadError;

/// Initialization stage at which a failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitStage {
    Runtime,
    Module,
    Instance,
    Exports,
    ModuleInit,
}

impl std::fmt::Display for InitStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InitStage::Runtime => write!(f, "acquiring runtime"),
            InitStage::Module => write!(f, "loading module"),
            InitStage::Instance => write!(f, "instantiating sandbox"),
            InitStage::Exports => write!(f, "resolving exports"),
            InitStage::ModuleInit => write!(f, "running module init"),
        }
    }
}

#[derive(Error, Debug)]
pub enum HostError {
    #[error("Initialization failed while {stage}: {reason}")]
    Init { stage: InitStage, reason: String },

    #[error("No non-empty embedded module resource available")]
    NoModuleResource,

    #[error("Module is missing export `{0}`")]
    MissingExport(&'static str),

    #[error("Execution context not available on this thread")]
    NotReady,

    #[error("Parameter index {index} out of range (count {count})")]
    InvalidIndex { index: usize, count: usize },

    #[error("Module returned invalid sandbox address: ptr={ptr:#x} len={len}")]
    UnsafeAddress { ptr: u32, len: u32 },

    #[error("Sandbox trap: {0}")]
    Trap(String),

    #[error("Block of {samples} samples exceeds the {max}-sample region capacity")]
    BlockTooLarge { samples: usize, max: usize },

    #[error("Graph payload rejected: {0}")]
    Graph(#[from] GraphPayloadError),
}

impl HostError {
    /// Wrap a failed VM invocation. Traps never cross into the host's
    /// real-time callback; callers map this to a per-block fallback.
    pub(crate) fn trap(err: wasmtime::Error) -> Self {
        HostError::Trap(err.to_string())
    }

    pub(crate) fn init(stage: InitStage, err: impl std::fmt::Display) -> Self {
        HostError::Init {
            stage,
            reason: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, HostError>;
