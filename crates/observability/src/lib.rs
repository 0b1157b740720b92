//! Process-wide tracing setup shared by the binaries.

/// Initialize structured logging with the default filter.
///
/// Safe to call more than once; only the first call installs a subscriber.
pub fn init() {
    tracing::init(tracing::DEFAULT_FILTER);
}

/// Subscriber construction (filter, JSON formatting).
pub mod tracing;
