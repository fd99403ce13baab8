//! Tracing/logging bootstrap for the smoke driver.

use std::env;

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info,logic_smoke=debug,logic_paging=debug,logic_core=info";

/// Initialize global tracing subscriber with severity gating from environment.
///
/// Precedence:
/// 1) `RUST_LOG`
/// 2) `LOGIC_SMOKE_LOG`
/// 3) `LOGIC_LOG`
/// 4) internal default filter
pub fn init() {
    let env_filter = filter_from_env(|key| env::var(key).ok());
    let _ = tracing_subscriber::fmt()
        .with_target(true)
        .with_thread_names(true)
        .with_env_filter(env_filter)
        .try_init();
}

fn filter_from_env<F>(lookup: F) -> EnvFilter
where
    F: Fn(&str) -> Option<String>,
{
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }

    for key in ["LOGIC_SMOKE_LOG", "LOGIC_LOG"] {
        if let Some(value) = lookup(key).filter(|v| !v.trim().is_empty())
            && let Ok(filter) = EnvFilter::try_new(value)
        {
            return filter;
        }
    }

    EnvFilter::new(DEFAULT_FILTER)
}
