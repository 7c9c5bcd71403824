//! Test helper functions for integration tests
//!
//! Shared across the test binaries using the tests/common/ pattern.

#![allow(dead_code)]

use breadcrumbs_core::{Crumb, Field, Fields, TrailCapable};
use std::sync::Once;

/// Initialize logging for tests (only once per test run)
static INIT: Once = Once::new();

pub fn init_test_logging() {
    INIT.call_once(|| {
        // The library logs through tracing; RUST_LOG=breadcrumbs_core=trace shows context moves
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        let _ = tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_test_writer()
                    .with_target(true)
                    .with_level(true)
                    .with_thread_ids(false)
                    .with_thread_names(false),
            )
            .with(tracing_subscriber::filter::EnvFilter::from_default_env())
            .try_init();
    });
}

/// Build a field map from JSON literals
pub fn fields(pairs: &[(&str, serde_json::Value)]) -> Fields {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), Field::from(v.clone())))
        .collect()
}

/// Titles of a trail, in attachment order
pub fn titles(owner: &dyn TrailCapable) -> Vec<String> {
    owner
        .trail()
        .iter()
        .map(|c: &Crumb| c.title().to_string())
        .collect()
}
