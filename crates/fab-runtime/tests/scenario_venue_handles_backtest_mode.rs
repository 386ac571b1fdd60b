//! Invariant: BACKTEST mode constructs both venue adapters without any
//! credentials present, matching `resolve_secrets_for_mode`'s BACKTEST
//! branch (no required env vars) — and a malformed venue-A signing key
//! is rejected with a clear error rather than panicking.

use fab_config::bot_config::BotConfig;
use fab_config::secrets::ResolvedSecrets;
use fab_runtime::wiring::build_venue_handles;

fn load(yaml: &str) -> BotConfig {
    let loaded = fab_config::load_layered_yaml_from_strings(&[yaml]).unwrap();
    serde_json::from_value(loaded.config_json).unwrap()
}

#[test]
fn backtest_mode_builds_venue_handles_with_no_credentials() {
    let config = load("runtime:\n  mode: backtest\n");
    let secrets = ResolvedSecrets { venue_a_signing_key: None, venue_b_api_key: None, venue_b_api_secret: None };

    let handles = build_venue_handles(&config, &secrets).expect("backtest mode needs no credentials");
    let _ = handles.venue_a;
    let _ = handles.venue_b;
}

#[test]
fn malformed_venue_a_signing_key_is_rejected() {
    let config = load("runtime:\n  mode: backtest\n");
    let secrets = ResolvedSecrets {
        venue_a_signing_key: Some("not-hex".to_string()),
        venue_b_api_key: None,
        venue_b_api_secret: None,
    };

    let result = build_venue_handles(&config, &secrets);
    assert!(result.is_err());
}

#[test]
fn wrong_length_venue_a_signing_key_is_rejected() {
    let config = load("runtime:\n  mode: backtest\n");
    let secrets = ResolvedSecrets {
        venue_a_signing_key: Some("aabb".to_string()),
        venue_b_api_key: None,
        venue_b_api_secret: None,
    };

    let result = build_venue_handles(&config, &secrets);
    assert!(result.is_err());
}
