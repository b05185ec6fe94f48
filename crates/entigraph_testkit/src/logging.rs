//! Test logging setup.

use tracing_subscriber::EnvFilter;

/// Installs a `tracing` subscriber writing to the test output.
///
/// The filter is read from `RUST_LOG` and defaults to `entigraph_core=debug`.
/// Calling it more than once is harmless; only the first call installs
/// the subscriber.
pub fn init_test_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("entigraph_core=debug"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        init_test_tracing();
        init_test_tracing();
        tracing::debug!("test logging installed");
    }
}
