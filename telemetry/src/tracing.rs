//! Tracing subscriber setup for binaries and tests.

use std::sync::Once;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

static INIT_TEST_TRACING: Once = Once::new();

/// Installs a global subscriber printing formatted events.
///
/// The filter is read from `RUST_LOG` and falls back to `default_filter`. Fails if a global
/// subscriber is already installed.
pub fn init_tracing(
    default_filter: &str,
) -> Result<(), tracing_subscriber::util::TryInitError> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init()
}

/// Installs a subscriber for tests, once per process.
///
/// Output goes through the test writer so it is captured per test. Set `RUST_LOG` to see more
/// than warnings.
pub fn init_test_tracing() {
    INIT_TEST_TRACING.call_once(|| {
        let _ = tracing_subscriber::registry()
            .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
            .with(tracing_subscriber::fmt::layer().with_test_writer())
            .try_init();
    });
}
