//! Environment-gated feature flags
//!
//! Every flag is an `ELMPM_*` environment variable with boolean `"0"`/`"1"`
//! semantics. Absent or invalid values fall back to the compile-time
//! default, so a stray `ELMPM_OFFLINE=yes` behaves like the flag being
//! unset rather than like an error.

use std::env;

/// Force offline mode: operations that would need the network fail
/// instead of fetching.
pub fn offline() -> bool {
    bool_flag("ELMPM_OFFLINE", false)
}

/// Use the network-backed v1 registry protocol instead of the local
/// v2 index file.
pub fn registry_v1() -> bool {
    bool_flag("ELMPM_REGISTRY_V1", false)
}

/// Maximum number of entries accepted per dependency map in elm.json.
pub fn max_dependency_entries() -> usize {
    numeric_flag("ELMPM_MAX_DEPS", 1000)
}

/// Maximum elm.json file size read into memory.
pub fn max_elm_json_bytes() -> u64 {
    numeric_flag("ELMPM_MAX_ELM_JSON_BYTES", 1024 * 1024) as u64
}

fn bool_flag(name: &str, default: bool) -> bool {
    match env::var(name) {
        Ok(value) => match value.as_str() {
            "1" => true,
            "0" => false,
            _ => default,
        },
        Err(_) => default,
    }
}

fn numeric_flag(name: &str, default: usize) -> usize {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
