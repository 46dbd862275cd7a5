use tracing_subscriber::EnvFilter;

/// Install the global fmt subscriber.
///
/// Level defaults to `info` and follows `RUST_LOG` when set. Logs go to
/// stderr so they never interleave with child output on stdout.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();
}
