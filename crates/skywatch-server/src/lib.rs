pub mod config;
pub mod server;

use tracing_subscriber::EnvFilter;

/// Initialize structured logging for a pipeline binary.
pub fn init_tracing() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("skywatch=info".parse()?))
        .init();
    Ok(())
}
