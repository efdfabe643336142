//! Shared fixtures: WAT test modules and host constructors.
//!
//! Fixtures are written as WAT text; wasmtime compiles them directly, so
//! the tests exercise the same load path as a binary module resource.

#![allow(dead_code)]

use wasm_dsp_host::{HostConfig, ModuleHost};

/// Full-featured gain module: one parameter, complete reflection exports,
/// and a `process_block` that scales both channels through the fixed
/// region layout.
pub const GAIN_MODULE: &str = r#"
(module
  (memory (export "memory") 5)
  (data (i32.const 1024) "gain")
  (global $gain (mut f32) (f32.const 0.5))

  (func (export "init"))

  (func (export "get_param_count") (result i32)
    (i32.const 1))

  (func (export "get_param_name_len") (param i32) (result i32)
    (i32.const 4))

  (func (export "get_param_name") (param i32) (result i32)
    (i32.const 1024))

  (func (export "get_param_min") (param i32) (result f32)
    (f32.const 0))

  (func (export "get_param_max") (param i32) (result f32)
    (f32.const 1))

  (func (export "get_param_default") (param i32) (result f32)
    (f32.const 0.5))

  (func (export "set_param") (param i32 f32)
    (global.set $gain (local.get 1)))

  (func (export "get_param") (param i32) (result f32)
    (global.get $gain))

  (func (export "process_block") (param $n i32)
    (local $i i32)
    (local $byte i32)
    (block $done
      (loop $next
        (br_if $done (i32.ge_s (local.get $i) (local.get $n)))
        (local.set $byte (i32.shl (local.get $i) (i32.const 2)))
        (f32.store
          (i32.add (i32.const 0x30000) (local.get $byte))
          (f32.mul
            (f32.load (i32.add (i32.const 0x10000) (local.get $byte)))
            (global.get $gain)))
        (f32.store
          (i32.add (i32.const 0x40000) (local.get $byte))
          (f32.mul
            (f32.load (i32.add (i32.const 0x20000) (local.get $byte)))
            (global.get $gain)))
        (local.set $i (i32.add (local.get $i) (i32.const 1)))
        (br $next))))
)
"#;

/// Only the two mandatory exports; everything else degrades to fallbacks.
pub const MINIMAL_MODULE: &str = r#"
(module
  (memory (export "memory") 5)
  (func (export "get_param_count") (result i32) (i32.const 2))
  (func (export "process_block") (param i32))
)
"#;

/// Missing the mandatory `process_block` export; initialization must fail
/// closed.
pub const NO_PROCESS_MODULE: &str = r#"
(module
  (memory (export "memory") 5)
  (func (export "get_param_count") (result i32) (i32.const 0))
)
"#;

/// Traps on every `process_block` call.
pub const TRAP_MODULE: &str = r#"
(module
  (memory (export "memory") 5)
  (func (export "get_param_count") (result i32) (i32.const 0))
  (func (export "process_block") (param i32)
    (unreachable))
)
"#;

/// Lies about its parameter names: index 0 reports a length over the
/// 256-byte bound, index 1 reports a pointer far outside the sandbox.
pub const BAD_NAME_MODULE: &str = r#"
(module
  (memory (export "memory") 5)
  (data (i32.const 1024) "honest")
  (func (export "get_param_count") (result i32) (i32.const 2))
  (func (export "process_block") (param i32))
  (func (export "get_param_name_len") (param $i i32) (result i32)
    (if (result i32) (i32.eqz (local.get $i))
      (then (i32.const 300))
      (else (i32.const 6))))
  (func (export "get_param_name") (param $i i32) (result i32)
    (if (result i32) (i32.eqz (local.get $i))
      (then (i32.const 1024))
      (else (i32.const 0x7ffffff0))))
)
"#;

/// Reports a degenerate range (max == min) and a default outside it.
pub const DEGENERATE_RANGE_MODULE: &str = r#"
(module
  (memory (export "memory") 5)
  (func (export "get_param_count") (result i32) (i32.const 1))
  (func (export "process_block") (param i32))
  (func (export "get_param_min") (param i32) (result f32) (f32.const 2))
  (func (export "get_param_max") (param i32) (result f32) (f32.const 2))
  (func (export "get_param_default") (param i32) (result f32) (f32.const 9))
)
"#;

/// Records every graph call so tests can observe what was applied.
/// `get_param` readback: 0 = commit count, 1 = committed node count,
/// 2 = committed edge count, 3 = last node p1, 4 = output mode,
/// 5 = clear count.
pub const GRAPH_MODULE: &str = r#"
(module
  (memory (export "memory") 5)
  (global $commits (mut i32) (i32.const 0))
  (global $nodes (mut i32) (i32.const 0))
  (global $edges (mut i32) (i32.const 0))
  (global $last_p1 (mut f32) (f32.const 0))
  (global $output (mut i32) (i32.const 0))
  (global $cleared (mut i32) (i32.const 0))

  (func (export "get_param_count") (result i32) (i32.const 6))
  (func (export "process_block") (param i32))

  (func (export "graph_clear")
    (global.set $cleared (i32.add (global.get $cleared) (i32.const 1))))

  (func (export "graph_set_node") (param i32 i32 i32 f32 f32 f32 f32)
    (global.set $last_p1 (local.get 3)))

  (func (export "graph_set_edge") (param i32 i32 i32))

  (func (export "graph_commit") (param i32 i32 i32)
    (global.set $commits (i32.add (global.get $commits) (i32.const 1)))
    (global.set $nodes (local.get 0))
    (global.set $edges (local.get 1)))

  (func (export "graph_set_output") (param i32)
    (global.set $output (local.get 0)))

  (func (export "get_param") (param $i i32) (result f32)
    (if (result f32) (i32.eq (local.get $i) (i32.const 0))
      (then (f32.convert_i32_s (global.get $commits)))
      (else (if (result f32) (i32.eq (local.get $i) (i32.const 1))
        (then (f32.convert_i32_s (global.get $nodes)))
        (else (if (result f32) (i32.eq (local.get $i) (i32.const 2))
          (then (f32.convert_i32_s (global.get $edges)))
          (else (if (result f32) (i32.eq (local.get $i) (i32.const 3))
            (then (global.get $last_p1))
            (else (if (result f32) (i32.eq (local.get $i) (i32.const 4))
              (then (f32.convert_i32_s (global.get $output)))
              (else (f32.convert_i32_s (global.get $cleared)))))))))))))
)
"#;

/// Host over a single WAT resource.
pub fn host_from_wat(wat: &str) -> ModuleHost {
    ModuleHost::new(HostConfig::with_resource("test-module", wat.as_bytes().to_vec()))
}

/// Host over a WAT resource, initialized and asserted ready.
pub fn ready_host(wat: &str) -> ModuleHost {
    let host = host_from_wat(wat);
    host.initialize().expect("module should initialize");
    assert!(host.is_ready());
    host
}
