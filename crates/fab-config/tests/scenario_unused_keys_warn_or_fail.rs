//! Unused-key detection: config leaves a given run mode never reads.
//!
//! 1. Unused keys are detected in WARN mode but do not error.
//! 2. Unused keys cause failure in FAIL mode.
//! 3. Keys known to be consumed in a mode are not flagged.
//! 4. Exact-leaf consumption does not accidentally consume sibling keys.
//! 5. Unused pointers are reported in deterministic (sorted) order.

use fab_config::{load_layered_yaml_from_strings, report_unused_keys, ConfigMode, UnusedKeyPolicy};

#[test]
fn warn_mode_reports_unused_keys_without_error() {
    let yaml = r#"
runtime:
  mode: "paper"
trading:
  max_open_trades: 3
risk:
  max_drawdown_pct: 0.18
unused_section:
  foo: 123
  bar: 456
"#;

    let loaded = load_layered_yaml_from_strings(&[yaml]).expect("config load must succeed");

    let report = report_unused_keys(ConfigMode::Paper, &loaded.config_json, UnusedKeyPolicy::Warn)
        .expect("warn mode must not error");

    assert!(!report.is_clean(), "report should detect unused keys");
    assert!(report.unused_leaf_pointers.contains(&"/unused_section/foo".to_string()));
    assert!(report.unused_leaf_pointers.contains(&"/unused_section/bar".to_string()));
}

#[test]
fn fail_mode_errors_on_unused_keys() {
    let yaml = r#"
runtime:
  mode: "live"
trading:
  max_open_trades: 3
risk:
  max_drawdown_pct: 0.18
unused_section:
  foo: 1
"#;

    let loaded = load_layered_yaml_from_strings(&[yaml]).expect("config load must succeed");

    let result = report_unused_keys(ConfigMode::Live, &loaded.config_json, UnusedKeyPolicy::Fail);

    assert!(result.is_err(), "fail policy must error when unused keys exist");
    let msg = format!("{:?}", result.err().unwrap());
    assert!(msg.contains("CONFIG_UNUSED_KEYS"), "error message should contain CONFIG_UNUSED_KEYS");
}

#[test]
fn only_consumed_keys_are_clean_in_paper_mode() {
    let yaml = r#"
runtime:
  mode: "paper"
trading:
  max_open_trades: 3
execution:
  lead_exchange: "venue_a"
risk:
  max_drawdown_pct: 0.18
websocket:
  ping_interval_seconds: 15
shutdown:
  timeout_seconds: 30
venues:
  venue_b:
    api_key_env: "VENUE_B_API_KEY"
"#;

    let loaded = load_layered_yaml_from_strings(&[yaml]).expect("config load must succeed");

    let report = report_unused_keys(ConfigMode::Paper, &loaded.config_json, UnusedKeyPolicy::Warn)
        .expect("warn mode must not error");

    assert!(report.is_clean(), "config should be clean when it only uses consumed keys");
}

#[test]
fn exact_leaf_consumption_does_not_consume_sibling_keys() {
    // PAPER consumes the /risk subtree, but "riskless" is a sibling key at
    // the root, not nested under /risk, so it must remain unused.
    let yaml = r#"
runtime:
  mode: "paper"
risk:
  max_drawdown_pct: 0.18
riskless:
  note: "not actually under /risk"
"#;

    let loaded = load_layered_yaml_from_strings(&[yaml]).expect("config load must succeed");

    let report = report_unused_keys(ConfigMode::Paper, &loaded.config_json, UnusedKeyPolicy::Warn)
        .expect("warn mode must not error");

    assert!(
        report.unused_leaf_pointers.contains(&"/riskless/note".to_string()),
        "sibling key must remain unused"
    );
}

#[test]
fn deterministic_unused_pointer_ordering() {
    let yaml = r#"
runtime:
  mode: "paper"
unused:
  b: 2
  a: 1
"#;

    let loaded = load_layered_yaml_from_strings(&[yaml]).expect("config load must succeed");

    let report = report_unused_keys(ConfigMode::Paper, &loaded.config_json, UnusedKeyPolicy::Warn)
        .expect("warn mode must not error");

    assert_eq!(
        report.unused_leaf_pointers,
        vec!["/unused/a".to_string(), "/unused/b".to_string()],
        "unused pointers must be sorted deterministically"
    );
}
