//! Runtime secret resolution.
//!
//! Config YAML stores only env var **names** (e.g. `"VENUE_B_API_KEY_LIVE"`).
//! At startup, callers invoke [`resolve_secrets_for_mode`] once; the
//! returned [`ResolvedSecrets`] is passed into venue adapter constructors.
//! Do not scatter `std::env::var` calls elsewhere — this is the one place
//! that reads credential values out of the environment.
//!
//! `Debug` on every secret-bearing struct here redacts its fields. Error
//! messages reference the env var name, never the value.
//!
//! Mode-aware enforcement:
//! - `LIVE`: Venue-A signing key and Venue-B api key + secret are required.
//! - `PAPER`: Venue-B api key + secret are required (Venue-A is simulated).
//! - `BACKTEST`: nothing is required.

use crate::consumption::ConfigMode;
use anyhow::{bail, Result};
use serde_json::Value;

/// All runtime-resolved venue credentials for one bot instantiation.
#[derive(Clone)]
pub struct ResolvedSecrets {
    /// Venue-A order-signing key (EdDSA). `None` if unset or empty.
    pub venue_a_signing_key: Option<String>,
    /// Venue-B REST api key, used to build HMAC request signatures.
    pub venue_b_api_key: Option<String>,
    /// Venue-B REST api secret, the HMAC signing key.
    pub venue_b_api_secret: Option<String>,
}

impl std::fmt::Debug for ResolvedSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedSecrets")
            .field("venue_a_signing_key", &self.venue_a_signing_key.as_ref().map(|_| "<REDACTED>"))
            .field("venue_b_api_key", &self.venue_b_api_key.as_ref().map(|_| "<REDACTED>"))
            .field("venue_b_api_secret", &self.venue_b_api_secret.as_ref().map(|_| "<REDACTED>"))
            .finish()
    }
}

struct SecretEnvNames {
    venue_a_signing_key_var: String,
    venue_b_api_key_var: String,
    venue_b_api_secret_var: String,
}

fn read_str_at(config: &Value, pointer: &str) -> Option<String> {
    let s = config.pointer(pointer)?.as_str()?;
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Resolve a named environment variable. Never returns the value in an
/// error path — callers report the NAME only.
fn resolve_env(var_name: &str) -> Option<String> {
    match std::env::var(var_name) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}

fn parse_env_names(config_json: &Value) -> SecretEnvNames {
    SecretEnvNames {
        venue_a_signing_key_var: read_str_at(config_json, "/venues/venue_a/signing_key_env")
            .unwrap_or_else(|| "VENUE_A_SIGNING_KEY".to_string()),
        venue_b_api_key_var: read_str_at(config_json, "/venues/venue_b/api_key_env")
            .unwrap_or_else(|| "VENUE_B_API_KEY".to_string()),
        venue_b_api_secret_var: read_str_at(config_json, "/venues/venue_b/api_secret_env")
            .unwrap_or_else(|| "VENUE_B_API_SECRET".to_string()),
    }
}

/// Resolve all venue credentials from the environment for `mode`.
///
/// Returns `Err` naming the first missing required env var. The value is
/// never mentioned.
pub fn resolve_secrets_for_mode(config_json: &Value, mode: ConfigMode) -> Result<ResolvedSecrets> {
    let names = parse_env_names(config_json);

    let venue_a_signing_key = resolve_env(&names.venue_a_signing_key_var);
    let venue_b_api_key = resolve_env(&names.venue_b_api_key_var);
    let venue_b_api_secret = resolve_env(&names.venue_b_api_secret_var);

    match mode {
        ConfigMode::Live => {
            if venue_a_signing_key.is_none() {
                bail!(
                    "SECRETS_MISSING mode=LIVE: required env var '{}' (venue-a signing key) is not set or empty",
                    names.venue_a_signing_key_var,
                );
            }
            if venue_b_api_key.is_none() {
                bail!(
                    "SECRETS_MISSING mode=LIVE: required env var '{}' (venue-b api key) is not set or empty",
                    names.venue_b_api_key_var,
                );
            }
            if venue_b_api_secret.is_none() {
                bail!(
                    "SECRETS_MISSING mode=LIVE: required env var '{}' (venue-b api secret) is not set or empty",
                    names.venue_b_api_secret_var,
                );
            }
        }
        ConfigMode::Paper => {
            if venue_b_api_key.is_none() {
                bail!(
                    "SECRETS_MISSING mode=PAPER: required env var '{}' (venue-b api key) is not set or empty",
                    names.venue_b_api_key_var,
                );
            }
            if venue_b_api_secret.is_none() {
                bail!(
                    "SECRETS_MISSING mode=PAPER: required env var '{}' (venue-b api secret) is not set or empty",
                    names.venue_b_api_secret_var,
                );
            }
        }
        ConfigMode::Backtest => {}
    }

    Ok(ResolvedSecrets { venue_a_signing_key, venue_b_api_key, venue_b_api_secret })
}
