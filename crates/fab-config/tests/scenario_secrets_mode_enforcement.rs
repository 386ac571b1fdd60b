//! Mode-aware fail-closed enforcement of `resolve_secrets_for_mode`.
//!
//! All failure tests use globally-unique sentinel env var names that are
//! never set in any CI or dev environment, so assertions don't race other
//! tests mutating the process environment.

use fab_config::secrets::resolve_secrets_for_mode;
use fab_config::{load_layered_yaml_from_strings, ConfigMode};

fn load(yaml: &str) -> serde_json::Value {
    load_layered_yaml_from_strings(&[yaml]).expect("test yaml must parse cleanly").config_json
}

#[test]
fn live_mode_fails_when_venue_a_signing_key_missing() {
    let yaml = r#"
venues:
  venue_a:
    signing_key_env: "FAB_SENTINEL_LIVE_VA_MISSING_A1"
  venue_b:
    api_key_env: "FAB_SENTINEL_LIVE_VB_KEY_MISSING_A1"
    api_secret_env: "FAB_SENTINEL_LIVE_VB_SEC_MISSING_A1"
"#;
    let cfg = load(yaml);
    let result = resolve_secrets_for_mode(&cfg, ConfigMode::Live);

    assert!(result.is_err(), "LIVE must fail when venue-a signing key env var is not set");
    let msg = result.unwrap_err().to_string();
    assert!(msg.contains("SECRETS_MISSING"), "got: {msg}");
    assert!(msg.contains("mode=LIVE"), "got: {msg}");
    assert!(msg.contains("FAB_SENTINEL_LIVE_VA_MISSING_A1"), "error must name the missing env var, got: {msg}");
}

#[test]
fn live_mode_fails_when_any_required_key_missing() {
    let yaml = r#"
venues:
  venue_a:
    signing_key_env: "FAB_SENTINEL_LIVE_VA_MISSING_B2"
  venue_b:
    api_key_env: "FAB_SENTINEL_LIVE_VB_KEY_MISSING_B2"
    api_secret_env: "FAB_SENTINEL_LIVE_VB_SEC_MISSING_B2"
"#;
    let cfg = load(yaml);
    let result = resolve_secrets_for_mode(&cfg, ConfigMode::Live);
    assert!(result.is_err(), "LIVE must fail when required keys are absent");
    assert!(result.unwrap_err().to_string().contains("SECRETS_MISSING"));
}

#[test]
fn live_mode_error_references_var_name_not_secret_value() {
    let yaml = r#"
venues:
  venue_a:
    signing_key_env: "FAB_SENTINEL_VARNAME_CHECK_C3"
  venue_b:
    api_key_env: "FAB_SENTINEL_VARKEY_CHECK_C3"
    api_secret_env: "FAB_SENTINEL_VARSEC_CHECK_C3"
"#;
    let cfg = load(yaml);
    let err_msg = resolve_secrets_for_mode(&cfg, ConfigMode::Live).expect_err("must fail").to_string();

    assert!(err_msg.contains("FAB_SENTINEL_VARNAME_CHECK_C3"), "error must contain the env var NAME, got: {err_msg}");
    assert!(!err_msg.contains("sk-"), "error must not contain secret-like value, got: {err_msg}");
}

#[test]
fn paper_mode_fails_when_venue_b_api_key_missing() {
    let yaml = r#"
venues:
  venue_b:
    api_key_env: "FAB_SENTINEL_PAPER_VB_KEY_MISSING_D4"
    api_secret_env: "FAB_SENTINEL_PAPER_VB_SEC_MISSING_D4"
"#;
    let cfg = load(yaml);
    let result = resolve_secrets_for_mode(&cfg, ConfigMode::Paper);
    assert!(result.is_err(), "PAPER must fail when venue-b api key env var is not set");
    let msg = result.unwrap_err().to_string();
    assert!(msg.contains("SECRETS_MISSING"), "{msg}");
    assert!(msg.contains("mode=PAPER"), "got: {msg}");
    assert!(msg.contains("FAB_SENTINEL_PAPER_VB_KEY_MISSING_D4"), "got: {msg}");
}

#[test]
fn paper_mode_fails_when_both_venue_b_keys_missing() {
    let yaml = r#"
venues:
  venue_b:
    api_key_env: "FAB_SENTINEL_PAPER_BOTH_KEY_E5"
    api_secret_env: "FAB_SENTINEL_PAPER_BOTH_SEC_E5"
"#;
    let cfg = load(yaml);
    let result = resolve_secrets_for_mode(&cfg, ConfigMode::Paper);
    assert!(result.is_err(), "PAPER must fail when venue-b keys are absent");
    assert!(result.unwrap_err().to_string().contains("SECRETS_MISSING"));
}

#[test]
fn backtest_mode_succeeds_with_no_keys_set() {
    let yaml = r#"
venues:
  venue_a:
    signing_key_env: "FAB_SENTINEL_BT_VA_ABSENT_F6"
  venue_b:
    api_key_env: "FAB_SENTINEL_BT_VB_KEY_ABSENT_F6"
    api_secret_env: "FAB_SENTINEL_BT_VB_SEC_ABSENT_F6"
"#;
    let cfg = load(yaml);
    let result = resolve_secrets_for_mode(&cfg, ConfigMode::Backtest);

    assert!(result.is_ok(), "BACKTEST must succeed when no required keys exist: {:?}", result.err());

    let secrets = result.unwrap();
    assert!(secrets.venue_a_signing_key.is_none());
    assert!(secrets.venue_b_api_key.is_none());
    assert!(secrets.venue_b_api_secret.is_none());
}

#[test]
fn config_json_stores_var_names_not_resolved_values() {
    let yaml = r#"
venues:
  venue_a:
    signing_key_env: "VENUE_A_SIGNING_KEY_LIVE"
  venue_b:
    api_key_env: "VENUE_B_API_KEY_LIVE"
    api_secret_env: "VENUE_B_API_SECRET_LIVE"
"#;
    let loaded = load_layered_yaml_from_strings(&[yaml]).expect("must parse");
    let cfg = &loaded.config_json;

    assert_eq!(
        cfg.pointer("/venues/venue_a/signing_key_env").and_then(|v| v.as_str()),
        Some("VENUE_A_SIGNING_KEY_LIVE"),
        "config must store var NAME, not value"
    );
    assert_eq!(
        cfg.pointer("/venues/venue_b/api_key_env").and_then(|v| v.as_str()),
        Some("VENUE_B_API_KEY_LIVE"),
    );

    assert!(!loaded.config_hash.is_empty());
    assert!(!loaded.canonical_json.contains("sk-"), "canonical JSON must not contain secret-like values");
}

#[test]
fn resolved_secrets_debug_output_is_redacted() {
    let yaml = r#"
venues:
  venue_a:
    signing_key_env: "FAB_SENTINEL_DBG_KEY_H10"
"#;
    let cfg = load(yaml);
    let secrets = resolve_secrets_for_mode(&cfg, ConfigMode::Backtest).expect("BACKTEST must not fail");

    let debug_str = format!("{:?}", secrets);
    assert!(debug_str.contains("None") || debug_str.contains("REDACTED"), "got: {debug_str}");
    assert!(!debug_str.contains("sk-"));
}
