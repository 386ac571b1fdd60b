//! Detects config keys present in a loaded layer stack but never read by
//! the run mode it was loaded for — usually a typo or a stale leftover
//! from a copy-pasted override file.

use crate::consumption::{consumed_pointers, ConfigMode};
use crate::leaf_pointers;
use anyhow::{bail, Result};
use serde_json::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnusedKeyPolicy {
    Warn,
    Fail,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UnusedKeysReport {
    pub unused_leaf_pointers: Vec<String>,
}

impl UnusedKeysReport {
    pub fn is_clean(&self) -> bool {
        self.unused_leaf_pointers.is_empty()
    }
}

fn is_consumed(pointer: &str, prefixes: &[&str]) -> bool {
    prefixes.iter().any(|p| pointer == *p || pointer.starts_with(&format!("{p}/")))
}

/// Report (or, under [`UnusedKeyPolicy::Fail`], reject) config leaves that
/// `mode` does not read. Matching is exact-leaf / subtree-prefix: a
/// registered prefix consumes itself and everything nested under it, never
/// a sibling that merely shares a prefix string.
pub fn report_unused_keys(mode: ConfigMode, config_json: &Value, policy: UnusedKeyPolicy) -> Result<UnusedKeysReport> {
    let prefixes = consumed_pointers(mode);
    let mut leaves = Vec::new();
    leaf_pointers(config_json, "", &mut leaves);

    let mut unused: Vec<String> = leaves.into_iter().filter(|p| !is_consumed(p, prefixes)).collect();
    unused.sort();
    unused.dedup();

    let report = UnusedKeysReport { unused_leaf_pointers: unused };

    if policy == UnusedKeyPolicy::Fail && !report.is_clean() {
        bail!("CONFIG_UNUSED_KEYS: {} unused key(s): {:?}", report.unused_leaf_pointers.len(), report.unused_leaf_pointers);
    }

    Ok(report)
}
