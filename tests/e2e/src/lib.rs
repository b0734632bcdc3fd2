#[cfg(test)]
mod tests;

use std::path::PathBuf;

/// Node the tests run against; tests are skipped when unset.
pub fn get_rpc_endpoint() -> (String, bool) {
    match std::env::var("MEDIALANE_RPC_ENDPOINT") {
        Ok(s) if !s.trim().is_empty() => (s, true),
        _ => (String::new(), false),
    }
}

/// Optional config naming the collections and marketplace to follow.
pub fn get_config_path() -> Option<PathBuf> {
    std::env::var("MEDIALANE_E2E_CONFIG").ok().map(PathBuf::from)
}

/// Optional wallet for the per-wallet feed test.
pub fn get_wallet() -> Option<String> {
    std::env::var("MEDIALANE_E2E_WALLET").ok()
}
