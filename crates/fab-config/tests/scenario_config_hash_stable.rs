//! Config hash stability: the canonical hash must be invariant under key
//! reordering and sensitive to any value change, across single-layer and
//! multi-layer loads.

use fab_config::load_layered_yaml_from_strings;

const BASE_YAML: &str = r#"
runtime:
  mode: "paper"
trading:
  desired_notional_usd: 1000
  max_open_trades: 3
risk:
  max_drawdown_pct: 0.18
  max_exposure_pct: 0.8
"#;

/// Same content as BASE_YAML but with keys in a different order.
const BASE_YAML_REORDERED: &str = r#"
risk:
  max_exposure_pct: 0.8
  max_drawdown_pct: 0.18
trading:
  max_open_trades: 3
  desired_notional_usd: 1000
runtime:
  mode: "paper"
"#;

const OVERLAY_YAML: &str = r#"
runtime:
  mode: "live"
trading:
  max_open_trades: 5
"#;

#[test]
fn same_input_produces_identical_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();

    assert_eq!(a.config_hash, b.config_hash, "same YAML input must produce identical hash");
    assert_eq!(a.canonical_json, b.canonical_json, "canonical JSON must be identical for same input");
}

#[test]
fn reordered_keys_produce_same_hash() {
    let original = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let reordered = load_layered_yaml_from_strings(&[BASE_YAML_REORDERED]).unwrap();

    assert_eq!(original.config_hash, reordered.config_hash, "reordering keys must not change the hash");
    assert_eq!(original.canonical_json, reordered.canonical_json);
}

#[test]
fn different_values_produce_different_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();

    let modified = r#"
runtime:
  mode: "paper"
trading:
  desired_notional_usd: 2500
  max_open_trades: 3
risk:
  max_drawdown_pct: 0.3
  max_exposure_pct: 0.8
"#;
    let b = load_layered_yaml_from_strings(&[modified]).unwrap();

    assert_ne!(a.config_hash, b.config_hash, "different config values must produce different hashes");
}

#[test]
fn merged_layers_produce_stable_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();

    assert_eq!(a.config_hash, b.config_hash, "same merge layers must produce identical hash");

    let mode = a.config_json.pointer("/runtime/mode").and_then(|v| v.as_str()).unwrap();
    assert_eq!(mode, "live", "overlay should override base runtime.mode");

    let max_open = a.config_json.pointer("/trading/max_open_trades").and_then(|v| v.as_u64()).unwrap();
    assert_eq!(max_open, 5, "overlay should override base max_open_trades");
}

#[test]
fn hash_is_64_hex_chars() {
    let loaded = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();

    assert_eq!(loaded.config_hash.len(), 64, "SHA-256 hash should be 64 hex chars");
    assert!(loaded.config_hash.chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn empty_config_produces_stable_hash() {
    let a = load_layered_yaml_from_strings(&["{}"]).unwrap();
    let b = load_layered_yaml_from_strings(&["{}"]).unwrap();

    assert_eq!(a.config_hash, b.config_hash, "empty configs must produce identical hash");
}
