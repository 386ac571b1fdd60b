//! Layered YAML configuration loading with a canonical hash.
//!
//! Config layers (a base file plus zero or more override files/strings) are
//! deep-merged in order, canonicalized to a key-sorted compact JSON string,
//! and SHA-256 hashed. The hash is stable under key reordering and changes
//! under any value change, so it can be logged at startup as an audit trail
//! of exactly which configuration a run executed under.
//!
//! Literal secret values are rejected during load — see [`scan_for_secrets`].
//! Config is expected to carry only the NAMES of environment variables that
//! hold credentials; [`secrets`] resolves those names against the process
//! environment at startup.

pub mod bot_config;
pub mod consumption;
pub mod secrets;
pub mod unused_keys;

pub use bot_config::BotConfig;
pub use consumption::{consumed_pointers, ConfigMode};
pub use unused_keys::{report_unused_keys, UnusedKeyPolicy, UnusedKeysReport};

use anyhow::{bail, Context, Result};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config_json: Value,
    pub canonical_json: String,
    pub config_hash: String,
}

/// Load and deep-merge YAML files from disk in order, then canonicalize and
/// hash the result. Later paths override earlier ones.
pub fn load_layered_yaml(paths: &[&str]) -> Result<LoadedConfig> {
    let mut contents = Vec::with_capacity(paths.len());
    for p in paths {
        contents.push(fs::read_to_string(p).with_context(|| format!("read config: {p}"))?);
    }
    let refs: Vec<&str> = contents.iter().map(String::as_str).collect();
    load_layered_yaml_from_strings(&refs)
}

/// Same as [`load_layered_yaml`] but takes already-loaded YAML text. Used
/// directly by tests and by callers that source layers from something other
/// than the filesystem (e.g. an embedded default plus a CLI-supplied
/// override string).
pub fn load_layered_yaml_from_strings(yamls: &[&str]) -> Result<LoadedConfig> {
    let mut merged = Value::Object(Default::default());

    for (i, s) in yamls.iter().enumerate() {
        let yaml_val: serde_yaml::Value =
            serde_yaml::from_str(s).with_context(|| format!("parse yaml layer {i}"))?;
        let json_val = serde_json::to_value(yaml_val).context("yaml->json conversion failed")?;
        deep_merge(&mut merged, json_val);
    }

    scan_for_secrets(&merged, "").context("secret scan failed")?;

    let canonical = canonicalize_json(&merged);

    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    let hash = hex::encode(hasher.finalize());

    Ok(LoadedConfig {
        config_json: serde_json::from_str(&canonical).context("canonical json parse failed")?,
        canonical_json: canonical,
        config_hash: hash,
    })
}

/// Deep-merge: objects merge recursively; arrays and scalars are replaced
/// wholesale by the overriding layer.
fn deep_merge(dst: &mut Value, src: Value) {
    match (dst, src) {
        (Value::Object(dst_map), Value::Object(src_map)) => {
            for (k, v) in src_map {
                match dst_map.get_mut(&k) {
                    Some(existing) => deep_merge(existing, v),
                    None => {
                        dst_map.insert(k, v);
                    }
                }
            }
        }
        (dst_slot, src_val) => {
            *dst_slot = src_val;
        }
    }
}

fn canonicalize_json(v: &Value) -> String {
    let sorted = sort_keys(v);
    serde_json::to_string(&sorted).expect("json serialization must not fail")
}

fn sort_keys(v: &Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut keys: Vec<_> = map.keys().cloned().collect();
            keys.sort();
            let mut new = serde_json::Map::new();
            for k in keys {
                new.insert(k.clone(), sort_keys(&map[&k]));
            }
            Value::Object(new)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(sort_keys).collect()),
        _ => v.clone(),
    }
}

/// Known prefixes/markers of a literal secret value landing in config YAML
/// where only an env var NAME belongs. Not exhaustive — a denylist can never
/// be — but it catches the common vendor key shapes.
const SECRET_MARKERS: &[&str] = &["sk-", "AKIA", "-----BEGIN"];

/// Recursively walk a JSON tree and bail if any string leaf looks like a
/// literal credential rather than an env var name.
fn scan_for_secrets(v: &Value, pointer: &str) -> Result<()> {
    match v {
        Value::Object(map) => {
            for (k, child) in map {
                scan_for_secrets(child, &format!("{pointer}/{k}"))?;
            }
        }
        Value::Array(arr) => {
            for (i, child) in arr.iter().enumerate() {
                scan_for_secrets(child, &format!("{pointer}/{i}"))?;
            }
        }
        Value::String(s) => {
            if SECRET_MARKERS.iter().any(|m| s.contains(m)) {
                bail!("CONFIG_SECRET_DETECTED: literal secret-like value at {pointer}");
            }
        }
        _ => {}
    }
    Ok(())
}

/// Recursively collect every leaf JSON pointer in a config tree, in
/// unspecified order. An empty object or array counts as its own leaf since
/// it holds no further pointers to collect.
pub(crate) fn leaf_pointers(v: &Value, pointer: &str, out: &mut Vec<String>) {
    match v {
        Value::Object(map) if !map.is_empty() => {
            for (k, child) in map {
                leaf_pointers(child, &format!("{pointer}/{k}"), out);
            }
        }
        Value::Array(arr) if !arr.is_empty() => {
            for (i, child) in arr.iter().enumerate() {
                leaf_pointers(child, &format!("{pointer}/{i}"), out);
            }
        }
        _ => out.push(pointer.to_string()),
    }
}
