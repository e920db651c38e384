//! Tracing subscriber setup for the binary

use tracing_subscriber::EnvFilter;

/// AWS SDK internals are only interesting when something goes wrong
const QUIET_TARGETS: &str = "aws_config=warn,aws_sdk=warn,aws_smithy=warn,hyper=warn";

fn default_directives(verbose: bool) -> String {
    let level = if verbose { "debug" } else { "info" };
    format!("{level},{QUIET_TARGETS}")
}

/// Install the global fmt subscriber.
///
/// `RUST_LOG` wins unless `verbose` is set.
pub fn init(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new(default_directives(true))
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_directives(false)))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
