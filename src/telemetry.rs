//! Tracing subscriber bootstrap for binaries and tests embedding the engine.

use tracing_subscriber::EnvFilter;

/// Install a global `fmt` subscriber filtered by `LANEGRAPH_LOG` (falling back
/// to `warn`). Safe to call more than once; later calls are no-ops.
pub fn init() {
    let filter = EnvFilter::try_from_env("LANEGRAPH_LOG")
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
