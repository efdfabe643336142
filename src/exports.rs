//! Export capability table.
//!
//! Entry points are resolved by name exactly once at load time into typed
//! handles; callers treat absent optional capabilities as a degraded but
//! defined mode. Only `process_block` and `get_param_count` are mandatory.

use wasmtime::{AsContextMut, Instance, TypedFunc, WasmParams, WasmResults};

use crate::error::{HostError, Result};

/// Resolved entry points of one module instance.
pub(crate) struct ExportTable {
    pub init: Option<TypedFunc<(), ()>>,
    pub process_block: TypedFunc<i32, ()>,
    pub get_param_count: TypedFunc<(), i32>,
    pub get_param_name: Option<TypedFunc<i32, i32>>,
    pub get_param_name_len: Option<TypedFunc<i32, i32>>,
    pub get_param_min: Option<TypedFunc<i32, f32>>,
    pub get_param_max: Option<TypedFunc<i32, f32>>,
    pub get_param_default: Option<TypedFunc<i32, f32>>,
    pub set_param: Option<TypedFunc<(i32, f32), ()>>,
    pub get_param: Option<TypedFunc<i32, f32>>,
    pub graph_clear: Option<TypedFunc<(), ()>>,
    pub graph_set_node: Option<TypedFunc<(i32, i32, i32, f32, f32, f32, f32), ()>>,
    pub graph_set_edge: Option<TypedFunc<(i32, i32, i32), ()>>,
    pub graph_commit: Option<TypedFunc<(i32, i32, i32), ()>>,
    pub graph_set_output: Option<TypedFunc<i32, ()>>,
}

fn optional<P, R>(
    store: &mut impl AsContextMut,
    instance: &Instance,
    name: &str,
) -> Option<TypedFunc<P, R>>
where
    P: WasmParams,
    R: WasmResults,
{
    instance.get_typed_func::<P, R>(&mut *store, name).ok()
}

fn mandatory<P, R>(
    store: &mut impl AsContextMut,
    instance: &Instance,
    name: &'static str,
) -> Result<TypedFunc<P, R>>
where
    P: WasmParams,
    R: WasmResults,
{
    instance
        .get_typed_func::<P, R>(&mut *store, name)
        .map_err(|_| HostError::MissingExport(name))
}

impl ExportTable {
    pub fn resolve(store: &mut impl AsContextMut, instance: &Instance) -> Result<Self> {
        // Older modules export the initializer as `dsp_init`.
        let init = optional(store, instance, "init")
            .or_else(|| optional(store, instance, "dsp_init"));

        Ok(Self {
            init,
            process_block: mandatory(store, instance, "process_block")?,
            get_param_count: mandatory(store, instance, "get_param_count")?,
            get_param_name: optional(store, instance, "get_param_name"),
            get_param_name_len: optional(store, instance, "get_param_name_len"),
            get_param_min: optional(store, instance, "get_param_min"),
            get_param_max: optional(store, instance, "get_param_max"),
            get_param_default: optional(store, instance, "get_param_default"),
            set_param: optional(store, instance, "set_param"),
            get_param: optional(store, instance, "get_param"),
            graph_clear: optional(store, instance, "graph_clear"),
            graph_set_node: optional(store, instance, "graph_set_node"),
            graph_set_edge: optional(store, instance, "graph_set_edge"),
            graph_commit: optional(store, instance, "graph_commit"),
            graph_set_output: optional(store, instance, "graph_set_output"),
        })
    }
}
