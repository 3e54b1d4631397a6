use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize logging.
/// - JSON logs on stdout
/// - RUST_LOG respected; defaults to "info,coredata=debug"
pub fn init(service_name: &str) {
    let default_filter = "info,coredata=debug";
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.to_string());

    if let Err(e) = tracing_subscriber::registry()
        .with(EnvFilter::new(env_filter))
        .with(tracing_subscriber::fmt::layer().json())
        .try_init()
    {
        tracing::debug!("Subscriber already installed: {}", e);
        return;
    }

    tracing::info!(service = %service_name, "Logging initialized");
}
