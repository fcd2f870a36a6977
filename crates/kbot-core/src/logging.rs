use tracing_subscriber::{fmt, EnvFilter};

use crate::Result;

/// Initialize tracing for a bot binary.
///
/// Default: info for our crates and everything else. Override with `RUST_LOG`.
pub fn init(service_name: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "info,kbot_core=info,kbot_telegram=info,kbot_anthropic=info,{}=info",
            service_name.replace('-', "_")
        ))
    });

    // A second init (tests, embedding) keeps the first subscriber.
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(true)
        .try_init();

    Ok(())
}
