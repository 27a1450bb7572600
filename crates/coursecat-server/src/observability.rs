//! Log output for the catalog server.
//!
//! The subscriber goes in before configuration is read, so startup errors are
//! still logged. Its filter sits behind a reload layer and
//! [`apply_logging_level`] swaps in `logging.level` once the config is known.
//! `RUST_LOG` overrides both.

use std::sync::OnceLock;
use tracing_subscriber::{EnvFilter, Registry, fmt, prelude::*, reload};

static FILTER_HANDLE: OnceLock<reload::Handle<EnvFilter, Registry>> = OnceLock::new();

/// Chatty dependencies held at `warn` whatever the service level is. Pool and
/// connection churn from these would otherwise drown request logs at `debug`.
const QUIET_DEPENDENCIES: &[&str] = &["sqlx=warn", "hyper=warn", "h2=warn", "reqwest=warn"];

/// Filter for the service at `level`, with the noisy dependencies capped.
fn service_filter(level: &str) -> EnvFilter {
    let mut filter = EnvFilter::new(level);
    for directive in QUIET_DEPENDENCIES {
        if let Ok(directive) = directive.parse() {
            filter = filter.add_directive(directive);
        }
    }
    filter
}

fn rust_log_filter() -> Option<EnvFilter> {
    std::env::var_os("RUST_LOG")?;
    EnvFilter::try_from_default_env().ok()
}

/// Installs the global subscriber at `info`. Later calls are no-ops.
pub fn init_tracing() {
    let filter = rust_log_filter().unwrap_or_else(|| service_filter("info"));
    let (filter_layer, handle) = reload::Layer::new(filter);
    let _ = FILTER_HANDLE.set(handle);

    let _ = tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt::layer().with_target(true))
        .try_init();
}

pub fn apply_logging_level(level: &str) {
    if std::env::var_os("RUST_LOG").is_some() {
        return;
    }
    if let Some(handle) = FILTER_HANDLE.get() {
        if let Err(e) = handle.modify(|f| *f = service_filter(level)) {
            tracing::warn!(level = %level, error = %e, "failed to apply logging level");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_level_keeps_dependencies_quiet() {
        let rendered = service_filter("debug").to_string();
        assert!(rendered.contains("debug"));
        for directive in QUIET_DEPENDENCIES {
            assert!(rendered.contains(directive), "{rendered} lacks {directive}");
        }
    }

    #[test]
    fn every_quiet_directive_parses() {
        for directive in QUIET_DEPENDENCIES {
            assert!(directive.parse::<tracing_subscriber::filter::Directive>().is_ok());
        }
    }
}
