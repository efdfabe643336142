//! Parameter reflection facade.
//!
//! Uniform index-addressed access to the module's parameters, marshaled
//! through the export table. Every accessor degrades to a fixed fallback —
//! never an error, never a crash — when the instance is not ready, the
//! export is absent, the index is out of range, or the call traps.
//!
//! Names use a two-step protocol (length export + pointer export). The
//! returned sandbox address range is bounds-checked before a single byte is
//! copied out; an address from untrusted bytecode is never dereferenced
//! unvalidated.

use std::sync::atomic::Ordering;

use crate::error::{HostError, Result};
use crate::host::{ModuleHost, VmSession};
use crate::thread_env;

/// Longest accepted parameter name, in bytes.
pub const PARAM_NAME_MAX: i32 = 256;

const FALLBACK_MIN: f32 = 0.0;
const FALLBACK_MAX: f32 = 1.0;
const FALLBACK_DEFAULT: f32 = 0.0;
const FALLBACK_VALUE: f32 = 0.0;

/// Host-side view of one parameter's metadata, derived per query.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterDescriptor {
    pub index: usize,
    pub name: String,
    pub min: f32,
    pub max: f32,
    pub default: f32,
}

/// Normalize a module-reported range: a degenerate `max <= min` is replaced
/// by `[min, min + 1]`, and the default is clamped into the final range.
pub(crate) fn normalize_range(min: f32, max: f32, default: f32) -> (f32, f32, f32) {
    let max = if max <= min { min + 1.0 } else { max };
    (min, max, default.clamp(min, max))
}

impl ModuleHost {
    /// Number of parameters the module reports. Zero when not ready;
    /// never negative. Falls back to the count cached at initialization
    /// if the live call traps.
    pub fn param_count(&self) -> usize {
        if !self.is_ready() {
            return 0;
        }
        let cached = self.param_count.load(Ordering::Acquire);
        self.with_session(|s| {
            s.exports
                .get_param_count
                .call(&mut s.store, ())
                .map_err(HostError::trap)
        })
        .map(|count| count.max(0) as usize)
        .unwrap_or(cached)
    }

    /// Parameter name, or `""` on any failure.
    pub fn param_name(&self, index: usize) -> String {
        self.try_param_name(index).unwrap_or_else(|e| {
            tracing::debug!("param_name({index}) fell back: {e}");
            String::new()
        })
    }

    /// Lower bound of the parameter's range, or `0.0` on any failure.
    pub fn param_min(&self, index: usize) -> f32 {
        self.try_scalar(index, |s| {
            let f = s
                .exports
                .get_param_min
                .as_ref()
                .ok_or(HostError::MissingExport("get_param_min"))?;
            f.call(&mut s.store, index as i32).map_err(HostError::trap)
        })
        .unwrap_or(FALLBACK_MIN)
    }

    /// Upper bound of the parameter's range, or `1.0` on any failure.
    pub fn param_max(&self, index: usize) -> f32 {
        self.try_scalar(index, |s| {
            let f = s
                .exports
                .get_param_max
                .as_ref()
                .ok_or(HostError::MissingExport("get_param_max"))?;
            f.call(&mut s.store, index as i32).map_err(HostError::trap)
        })
        .unwrap_or(FALLBACK_MAX)
    }

    /// Default value, or `0.0` on any failure.
    pub fn param_default(&self, index: usize) -> f32 {
        self.try_scalar(index, |s| {
            let f = s
                .exports
                .get_param_default
                .as_ref()
                .ok_or(HostError::MissingExport("get_param_default"))?;
            f.call(&mut s.store, index as i32).map_err(HostError::trap)
        })
        .unwrap_or(FALLBACK_DEFAULT)
    }

    /// Full descriptor with the range normalized for host consumption.
    pub fn param_descriptor(&self, index: usize) -> ParameterDescriptor {
        let (min, max, default) = normalize_range(
            self.param_min(index),
            self.param_max(index),
            self.param_default(index),
        );
        ParameterDescriptor {
            index,
            name: self.param_name(index),
            min,
            max,
            default,
        }
    }

    /// Current value as reported by the module's getter export, or `0.0`.
    pub fn get_param(&self, index: usize) -> f32 {
        self.try_scalar(index, |s| {
            let f = s
                .exports
                .get_param
                .as_ref()
                .ok_or(HostError::MissingExport("get_param"))?;
            f.call(&mut s.store, index as i32).map_err(HostError::trap)
        })
        .unwrap_or(FALLBACK_VALUE)
    }

    /// Record a value in the tracked bank and pass it through to the
    /// module's setter export. No-op when the setter is absent; the bank
    /// write still lands so the next block's sync stays consistent.
    pub fn set_param(&self, index: usize, value: f32) {
        let bank = self.values.load();
        if let Some(slot) = bank.get(index) {
            slot.store(value.to_bits(), Ordering::Relaxed);
        }

        let result = self.try_scalar(index, |s| {
            let f = s
                .exports
                .set_param
                .as_ref()
                .ok_or(HostError::MissingExport("set_param"))?;
            f.call(&mut s.store, (index as i32, value))
                .map_err(HostError::trap)
        });
        if let Err(e) = result {
            tracing::debug!("set_param({index}, {value}) fell back: {e}");
        }
    }

    /// Host-side tracked value (the value the next block will sync).
    pub fn value(&self, index: usize) -> f32 {
        self.values
            .load()
            .get(index)
            .map(|slot| f32::from_bits(slot.load(Ordering::Relaxed)))
            .unwrap_or(FALLBACK_VALUE)
    }

    fn check_index(&self, index: usize) -> Result<()> {
        let count = self.param_count();
        if index < count {
            Ok(())
        } else {
            Err(HostError::InvalidIndex { index, count })
        }
    }

    pub(crate) fn with_session<T>(
        &self,
        f: impl FnOnce(&mut VmSession) -> Result<T>,
    ) -> Result<T> {
        if !self.is_ready() || !thread_env::enter() {
            return Err(HostError::NotReady);
        }
        let mut guard = self.session.lock();
        match guard.as_mut() {
            Some(session) => f(session),
            None => Err(HostError::NotReady),
        }
    }

    fn try_scalar<R>(
        &self,
        index: usize,
        f: impl FnOnce(&mut VmSession) -> Result<R>,
    ) -> Result<R> {
        self.check_index(index)?;
        self.with_session(f)
    }

    fn try_param_name(&self, index: usize) -> Result<String> {
        self.check_index(index)?;
        self.with_session(|s| {
            let len_fn = s
                .exports
                .get_param_name_len
                .as_ref()
                .ok_or(HostError::MissingExport("get_param_name_len"))?;
            let ptr_fn = s
                .exports
                .get_param_name
                .as_ref()
                .ok_or(HostError::MissingExport("get_param_name"))?;

            let len = len_fn
                .call(&mut s.store, index as i32)
                .map_err(HostError::trap)?;
            let ptr = ptr_fn
                .call(&mut s.store, index as i32)
                .map_err(HostError::trap)?;

            if ptr <= 0 || len <= 0 || len > PARAM_NAME_MAX {
                return Err(HostError::UnsafeAddress {
                    ptr: ptr as u32,
                    len: len as u32,
                });
            }

            let (ptr, len) = (ptr as u32, len as u32);
            let data = s.memory.data(&s.store);
            let start = ptr as usize;
            let end = start
                .checked_add(len as usize)
                .filter(|&end| end <= data.len())
                .ok_or(HostError::UnsafeAddress { ptr, len })?;

            Ok(String::from_utf8_lossy(&data[start..end]).into_owned())
        })
    }
}
