//! Log setup shared by the binaries

use tracing_subscriber::EnvFilter;

/// Filter from a `RUST_LOG`-style directive string, or `default_level`
/// when it is missing or malformed
pub fn filter_from(directives: Option<&str>, default_level: &str) -> EnvFilter {
    directives
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(default_level))
}

/// Installs a stderr fmt subscriber honouring `RUST_LOG`
pub fn init(default_level: &str) {
    let directives = std::env::var("RUST_LOG").ok();
    tracing_subscriber::fmt()
        .with_env_filter(filter_from(directives.as_deref(), default_level))
        .with_writer(std::io::stderr)
        .init();
}
