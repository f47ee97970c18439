use tracing_subscriber::EnvFilter;

/// Install the stderr subscriber.
///
/// `log_level` takes any `EnvFilter` directive; without it `RUST_LOG` is
/// used, and without that only warnings are shown. stdout is reserved for
/// the JSON document.
pub fn init_logger(log_level: Option<&str>, no_color: bool) {
    let filter = match log_level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };

    let result = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(!no_color)
        .with_env_filter(filter)
        .try_init();

    if let Err(e) = result {
        eprintln!("Failed to install logger: {}", e);
    }
}
