//! Which config subtrees each run mode actually reads, for
//! [`crate::unused_keys::report_unused_keys`].

use serde::Deserialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigMode {
    Backtest,
    Paper,
    Live,
}

pub fn consumed_pointers(mode: ConfigMode) -> &'static [&'static str] {
    match mode {
        ConfigMode::Backtest => BACKTEST,
        ConfigMode::Paper => PAPER,
        ConfigMode::Live => LIVE,
    }
}

static BACKTEST: &[&str] = &["/runtime/mode", "/trading", "/risk"];

static PAPER: &[&str] = &["/runtime/mode", "/trading", "/execution", "/risk", "/websocket", "/shutdown", "/venues"];

static LIVE: &[&str] = &[
    "/runtime/mode",
    "/trading",
    "/execution",
    "/risk",
    "/websocket",
    "/shutdown",
    "/venues",
    "/reconcile",
];
