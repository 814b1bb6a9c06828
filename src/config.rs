//! Engine configuration sourced from the environment.
//!
//! Loaded once per [`EngineContext`](crate::context::EngineContext); a `.env`
//! file is honored when present.
//!
//! Recognized variables:
//! - `LANEGRAPH_MAX_QUEUES` — hard cap on an executable graph's queue pool.
//!   Instantiation of a plan that needs more concurrent queues than the cap
//!   fails instead of silently serializing.
//! - `LANEGRAPH_LOG` — tracing filter consumed by [`crate::telemetry::init`].

/// Tunables for graph instantiation and replay.
#[derive(Clone, Debug, Default)]
pub struct EngineConfig {
    /// Upper bound on the queue pool created by instantiation, if any.
    pub queue_pool_limit: Option<usize>,
}

impl EngineConfig {
    /// Read configuration from the process environment (and `.env`, if one
    /// exists).
    #[must_use]
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let queue_pool_limit = std::env::var("LANEGRAPH_MAX_QUEUES")
            .ok()
            .and_then(|raw| match raw.trim().parse::<usize>() {
                Ok(n) if n > 0 => Some(n),
                _ => {
                    tracing::warn!(value = %raw, "ignoring unparsable LANEGRAPH_MAX_QUEUES");
                    None
                }
            });
        Self { queue_pool_limit }
    }
}
