//! Logging and tracing setup.
//!
//! The engine itself only emits `tracing` events; embedding applications
//! decide whether to install a subscriber. These helpers install the usual
//! one (env-filtered, text or JSON).

use std::sync::Once;

use tracing::info;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

static INIT: Once = Once::new();

/// `RUST_LOG` if set, otherwise `info`
fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

fn install<L>(layer: L, mode: &'static str)
where
    L: Layer<Registry> + Send + Sync + 'static,
{
    INIT.call_once(|| {
        // Someone else may already own the global dispatcher.
        if tracing_subscriber::registry()
            .with(layer)
            .with(env_filter())
            .try_init()
            .is_ok()
        {
            info!(mode, "crashsym tracing initialized");
        }
    });
}

/// Initialize the global tracing subscriber.
///
/// Subsequent calls are ignored, as is a subscriber installed elsewhere.
pub fn init_tracing() {
    let layer = fmt::layer()
        .with_span_events(FmtSpan::CLOSE)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);
    install(layer, "text");
}

/// Initialize tracing with JSON output for structured logging.
pub fn init_tracing_json() {
    let layer = fmt::layer()
        .json()
        .with_span_events(FmtSpan::CLOSE)
        .with_target(true)
        .with_thread_ids(true)
        .with_current_span(true);
    install(layer, "json");
}

/// Log a recovered failure and hand it back.
#[macro_export]
macro_rules! log_recovered {
    ($source:expr, $err:expr) => {{
        let e = $err;
        tracing::debug!(source = $source, error = %e, "symbol source failed, falling back");
        e
    }};
}
