//! Graph reconfiguration channel integration tests.
//!
//! The fixture module records every graph export call; `get_param` reads
//! the recorded state back (0 = commit count, 1 = node count, 2 = edge
//! count, 3 = last node p1, 4 = output mode, 5 = clear count).

use wasm_dsp_host::{AudioBlock, GraphConfig, GraphEdge, GraphNode, GraphPayloadError};

mod helpers;
use helpers::*;

fn config(node_p1s: &[f32], edges: &[(i32, i32)], has_output_path: bool) -> GraphConfig {
    GraphConfig {
        schema_version: wasm_dsp_host::GRAPH_SCHEMA_VERSION,
        nodes: node_p1s
            .iter()
            .map(|&p1| GraphNode {
                effect_type: 1,
                bypass: false,
                p1,
                p2: 0.0,
                p3: 0.0,
                p4: 0.0,
            })
            .collect(),
        edges: edges
            .iter()
            .map(|&(from, to)| GraphEdge { from, to })
            .collect(),
        has_output_path,
    }
}

fn run_one_block(host: &wasm_dsp_host::ModuleHost) {
    let mut left = vec![0.0f32; 4];
    let mut channels: [&mut [f32]; 1] = [&mut left];
    let mut block = AudioBlock {
        channels: &mut channels,
        num_samples: 4,
    };
    host.process_block(&mut block);
}

#[test]
fn test_staged_config_applies_before_processing() {
    let host = ready_host(GRAPH_MODULE);

    host.submit_graph(config(&[0.4, 0.8], &[(0, 1)], true)).unwrap();
    run_one_block(&host);

    assert_eq!(host.get_param(0), 1.0); // one commit
    assert_eq!(host.get_param(1), 2.0); // two nodes
    assert_eq!(host.get_param(2), 1.0); // one edge
    assert_eq!(host.get_param(3), 0.8); // last node's p1
    assert_eq!(host.get_param(4), 1.0); // output path declared
    assert_eq!(host.get_param(5), 1.0); // cleared once before pushing
}

#[test]
fn test_last_writer_wins_before_block() {
    let host = ready_host(GRAPH_MODULE);

    host.submit_graph(config(&[1.0], &[], false)).unwrap();
    host.submit_graph(config(&[2.0, 2.5], &[(0, 1)], true)).unwrap();
    run_one_block(&host);

    // Exactly B applied, exactly once; A never partially visible.
    assert_eq!(host.get_param(0), 1.0);
    assert_eq!(host.get_param(1), 2.0);
    assert_eq!(host.get_param(3), 2.5);
    assert_eq!(host.get_param(4), 1.0);
}

#[test]
fn test_unchanged_topology_is_not_reapplied() {
    let host = ready_host(GRAPH_MODULE);

    host.submit_graph(config(&[0.1], &[], true)).unwrap();
    run_one_block(&host);
    run_one_block(&host);
    run_one_block(&host);

    assert_eq!(host.get_param(0), 1.0);
    assert_eq!(host.get_param(5), 1.0);
}

#[test]
fn test_invalid_config_is_rejected_at_submission() {
    let host = ready_host(GRAPH_MODULE);

    let err = host.submit_graph(config(&[0.1], &[(0, 9)], true)).unwrap_err();
    assert!(matches!(err, GraphPayloadError::EdgeOutOfRange { .. }));

    run_one_block(&host);
    // Nothing was staged.
    assert_eq!(host.get_param(0), 0.0);
}

#[test]
fn test_json_payload_submission() {
    let host = ready_host(GRAPH_MODULE);

    host.submit_graph_payload(
        r#"{
            "schemaVersion": 1,
            "nodes": [ { "effectType": 4, "bypass": false, "p1": 0.33 } ],
            "edges": [],
            "hasOutputPath": false
        }"#,
    )
    .unwrap();
    run_one_block(&host);

    assert_eq!(host.get_param(1), 1.0);
    assert_eq!(host.get_param(3), 0.33);
    assert_eq!(host.get_param(4), 0.0);

    let err = host.submit_graph_payload(r#"{ "schemaVersion": 99 }"#).unwrap_err();
    assert!(matches!(err, GraphPayloadError::Malformed(_)));
}

#[test]
fn test_module_without_graph_exports_degrades() {
    let host = ready_host(GAIN_MODULE);
    host.set_param(0, 1.0);

    host.submit_graph(config(&[0.5], &[], true)).unwrap();

    // The staged config is dropped, processing continues.
    let mut left = vec![1.0f32; 4];
    {
        let mut channels: [&mut [f32]; 1] = [&mut left];
        let mut block = AudioBlock {
            channels: &mut channels,
            num_samples: 4,
        };
        host.process_block(&mut block);
    }
    assert_eq!(left, vec![1.0; 4]);
    assert!(host.is_ready());
}
