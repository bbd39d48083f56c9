//! Process-wide tracing setup shared by the binaries.

/// Install the JSON subscriber. Later calls are no-ops.
pub fn init() {
    tracing::init();
}

pub mod tracing;
