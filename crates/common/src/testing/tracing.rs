//! Tracing subscriber setup for tests

use std::sync::Once;

use tracing_subscriber::fmt;
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Install a test-friendly subscriber once per process
///
/// Output goes through the test harness writer, so it is only shown for
/// failing tests. The filter comes from `RUST_LOG`, defaulting to
/// debug for both decorum crates.
pub fn init_test_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("decorum_common=debug,decorum_core=debug"));

        // Another harness may already own the global subscriber
        let _ = fmt().with_env_filter(filter).with_test_writer().try_init();
    });
}
