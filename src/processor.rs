//! Audio block processing over the fixed linear-memory layout.
//!
//! The host and the bytecode program share a compile-time contract: four
//! 64 KiB-aligned regions of the module's linear memory carry the block's
//! samples (input left/right, output left/right). Each block the host
//! drains any staged graph reconfiguration, syncs the tracked parameters,
//! copies the inputs in, invokes `process_block(n)`, and copies the outputs
//! back. Every failure mode leaves the caller's buffer untouched for that
//! block; nothing propagates into the real-time callback.

use std::sync::atomic::Ordering;

use crate::error::{HostError, Result};
use crate::graph::GraphConfig;
use crate::host::{ModuleHost, VmSession};
use crate::thread_env;

/// Byte offset of the left input region.
pub const INPUT_LEFT_OFFSET: usize = 0x10000;
/// Byte offset of the right input region.
pub const INPUT_RIGHT_OFFSET: usize = 0x20000;
/// Byte offset of the left output region.
pub const OUTPUT_LEFT_OFFSET: usize = 0x30000;
/// Byte offset of the right output region.
pub const OUTPUT_RIGHT_OFFSET: usize = 0x40000;

/// Size of each audio region in bytes.
pub const REGION_SIZE: usize = 0x10000;
/// Largest block the regions can carry.
pub const MAX_BLOCK_SAMPLES: usize = REGION_SIZE / 4;

/// Linear memory the layout requires, plus roughly 1 MiB of module heap.
pub(crate) const LINEAR_MEMORY_LIMIT: usize = OUTPUT_RIGHT_OFFSET + REGION_SIZE + 1024 * 1024;

const LAYOUT_END: usize = OUTPUT_RIGHT_OFFSET + REGION_SIZE;

/// One block of channel buffers, processed in place. At most the first two
/// channels are routed through the sandbox.
pub struct AudioBlock<'a> {
    pub channels: &'a mut [&'a mut [f32]],
    pub num_samples: usize,
}

impl ModuleHost {
    /// Process one audio block in place.
    ///
    /// Not `Ready`, a trap, an oversized block, or a missing execution
    /// scope all leave the buffer exactly as the host provided it.
    pub fn process_block(&self, block: &mut AudioBlock<'_>) {
        if !self.is_ready() || !thread_env::enter() {
            return;
        }

        let mut guard = self.session.lock();
        let Some(session) = guard.as_mut() else {
            return;
        };

        // Staged topology is applied before parameter sync so a config and
        // its parameter values land in the same block.
        if let Some(config) = self.pending.take() {
            if let Err(e) = apply_graph(session, &config) {
                tracing::warn!("graph reconfiguration dropped: {e}");
            }
        }

        self.sync_params(session);

        if let Err(e) = run_block(session, block) {
            tracing::warn!("process_block fell back to passthrough: {e}");
            return;
        }

        self.record_output_level(block);
    }

    fn sync_params(&self, session: &mut VmSession) {
        let Some(set) = &session.exports.set_param else {
            return;
        };
        let bank = self.values.load();
        for (index, slot) in bank.iter().enumerate() {
            let value = f32::from_bits(slot.load(Ordering::Relaxed));
            if let Err(e) = set.call(&mut session.store, (index as i32, value)) {
                tracing::debug!("param sync {index} failed: {e}");
            }
        }
    }

    fn record_output_level(&self, block: &AudioBlock<'_>) {
        let mut peak = 0.0f32;
        for channel in block.channels.iter().take(2) {
            for &sample in channel.iter().take(block.num_samples) {
                peak = peak.max(sample.abs());
            }
        }
        self.output_level
            .store(peak.clamp(0.0, 1.0).to_bits(), Ordering::Relaxed);
    }
}

fn run_block(session: &mut VmSession, block: &mut AudioBlock<'_>) -> Result<()> {
    let n = block.num_samples;
    if n == 0 {
        return Ok(());
    }
    if n > MAX_BLOCK_SAMPLES {
        return Err(HostError::BlockTooLarge {
            samples: n,
            max: MAX_BLOCK_SAMPLES,
        });
    }

    {
        let data = session.memory.data_mut(&mut session.store);
        if data.len() < LAYOUT_END {
            return Err(HostError::UnsafeAddress {
                ptr: LAYOUT_END as u32,
                len: data.len() as u32,
            });
        }
        for (channel, offset) in [(0, INPUT_LEFT_OFFSET), (1, INPUT_RIGHT_OFFSET)] {
            if let Some(input) = block.channels.get(channel) {
                write_samples(&mut data[offset..offset + n * 4], &input[..n]);
            }
        }
    }

    session
        .exports
        .process_block
        .call(&mut session.store, n as i32)
        .map_err(HostError::trap)?;

    let data = session.memory.data(&session.store);
    for (channel, offset) in [(0, OUTPUT_LEFT_OFFSET), (1, OUTPUT_RIGHT_OFFSET)] {
        if let Some(output) = block.channels.get_mut(channel) {
            read_samples(&data[offset..offset + n * 4], &mut output[..n]);
        }
    }
    Ok(())
}

/// Push a staged topology into the module: clear, per-node and per-edge
/// setters, then the contract commit and output-routing mode. The module
/// adopts the new topology on commit, so one block sees all of it or none.
fn apply_graph(session: &mut VmSession, config: &GraphConfig) -> Result<()> {
    let commit = session
        .exports
        .graph_commit
        .as_ref()
        .ok_or(HostError::MissingExport("graph_commit"))?;

    if let Some(clear) = &session.exports.graph_clear {
        clear.call(&mut session.store, ()).map_err(HostError::trap)?;
    }

    if let Some(set_node) = &session.exports.graph_set_node {
        for (index, node) in config.nodes.iter().enumerate() {
            set_node
                .call(
                    &mut session.store,
                    (
                        index as i32,
                        node.effect_type,
                        node.bypass as i32,
                        node.p1,
                        node.p2,
                        node.p3,
                        node.p4,
                    ),
                )
                .map_err(HostError::trap)?;
        }
    }

    if let Some(set_edge) = &session.exports.graph_set_edge {
        for (index, edge) in config.edges.iter().enumerate() {
            set_edge
                .call(&mut session.store, (index as i32, edge.from, edge.to))
                .map_err(HostError::trap)?;
        }
    }

    commit
        .call(
            &mut session.store,
            (
                config.nodes.len() as i32,
                config.edges.len() as i32,
                config.schema_version,
            ),
        )
        .map_err(HostError::trap)?;

    if let Some(set_output) = &session.exports.graph_set_output {
        set_output
            .call(&mut session.store, config.has_output_path as i32)
            .map_err(HostError::trap)?;
    }

    Ok(())
}

fn write_samples(dst: &mut [u8], src: &[f32]) {
    for (bytes, &sample) in dst.chunks_exact_mut(4).zip(src) {
        bytes.copy_from_slice(&sample.to_le_bytes());
    }
}

fn read_samples(src: &[u8], dst: &mut [f32]) {
    for (bytes, sample) in src.chunks_exact(4).zip(dst.iter_mut()) {
        *sample = f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    }
}
