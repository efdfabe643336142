//! Processing-graph topology and the cross-thread reconfiguration channel.
//!
//! The control surface produces a [`GraphConfig`] (nodes, edges, contract
//! metadata) and submits it from a non-audio thread. The audio thread drains
//! the most recent submission at block start and applies it atomically: a
//! block sees either the whole staged topology or the previous one, never a
//! partial mix.
//!
//! Handoff is a single-slot mailbox, not a queue: each submission replaces
//! any unconsumed predecessor (last writer wins), matching the control
//! surface's semantics.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use thiserror::Error;

/// Payload schema understood by this bridge.
pub const GRAPH_SCHEMA_VERSION: i32 = 1;
/// Contract ceiling on node count.
pub const MAX_GRAPH_NODES: usize = 16;
/// Contract ceiling on edge count.
pub const MAX_GRAPH_EDGES: usize = 64;

/// One effect node: type tag, bypass flag, and up to four float parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphNode {
    pub effect_type: i32,
    pub bypass: bool,
    #[serde(default)]
    pub p1: f32,
    #[serde(default)]
    pub p2: f32,
    #[serde(default)]
    pub p3: f32,
    #[serde(default)]
    pub p4: f32,
}

/// Directed connection between two node indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub from: i32,
    pub to: i32,
}

/// Complete topology produced by the control surface, consumed exactly once
/// by the audio thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphConfig {
    pub schema_version: i32,
    pub nodes: SmallVec<[GraphNode; MAX_GRAPH_NODES]>,
    pub edges: SmallVec<[GraphEdge; MAX_GRAPH_EDGES]>,
    pub has_output_path: bool,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphPayloadError {
    #[error("unsupported schema version {0}")]
    UnsupportedSchemaVersion(i32),

    #[error("node count {0} exceeds limit of {MAX_GRAPH_NODES}")]
    TooManyNodes(usize),

    #[error("edge count {0} exceeds limit of {MAX_GRAPH_EDGES}")]
    TooManyEdges(usize),

    #[error("edge {index} references node out of range ({from} -> {to})")]
    EdgeOutOfRange { index: usize, from: i32, to: i32 },

    #[error("node {0} has a non-finite parameter")]
    NonFiniteParam(usize),

    #[error("malformed payload: {0}")]
    Malformed(String),
}

impl GraphConfig {
    /// Check the topology against the contract limits.
    pub fn validate(&self) -> Result<(), GraphPayloadError> {
        if self.schema_version != GRAPH_SCHEMA_VERSION {
            return Err(GraphPayloadError::UnsupportedSchemaVersion(
                self.schema_version,
            ));
        }
        if self.nodes.len() > MAX_GRAPH_NODES {
            return Err(GraphPayloadError::TooManyNodes(self.nodes.len()));
        }
        if self.edges.len() > MAX_GRAPH_EDGES {
            return Err(GraphPayloadError::TooManyEdges(self.edges.len()));
        }
        for (index, node) in self.nodes.iter().enumerate() {
            let finite = node.p1.is_finite()
                && node.p2.is_finite()
                && node.p3.is_finite()
                && node.p4.is_finite();
            if !finite {
                return Err(GraphPayloadError::NonFiniteParam(index));
            }
        }
        let node_count = self.nodes.len() as i32;
        for (index, edge) in self.edges.iter().enumerate() {
            let in_range = (0..node_count).contains(&edge.from) && (0..node_count).contains(&edge.to);
            if !in_range {
                return Err(GraphPayloadError::EdgeOutOfRange {
                    index,
                    from: edge.from,
                    to: edge.to,
                });
            }
        }
        Ok(())
    }

    /// Parse and validate a JSON payload from the control surface.
    pub fn from_json_payload(payload: &str) -> Result<Self, GraphPayloadError> {
        let config: GraphConfig = serde_json::from_str(payload)
            .map_err(|e| GraphPayloadError::Malformed(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}

/// Single-slot mailbox handing a staged [`GraphConfig`] to the audio thread.
///
/// `submit` may run on any non-audio thread, any number of times; `take`
/// runs on the audio thread at block start. The critical section is one
/// bounded struct copy.
#[derive(Default)]
pub(crate) struct GraphMailbox {
    slot: Mutex<Option<GraphConfig>>,
    dirty: AtomicBool,
}

impl GraphMailbox {
    /// Stage a config, replacing any unconsumed prior submission.
    pub fn submit(&self, config: GraphConfig) {
        *self.slot.lock() = Some(config);
        self.dirty.store(true, Ordering::Release);
    }

    /// Test-and-clear the dirty flag; if set, move the staged config out.
    pub fn take(&self) -> Option<GraphConfig> {
        if !self.dirty.swap(false, Ordering::AcqRel) {
            return None;
        }
        self.slot.lock().take()
    }
}
