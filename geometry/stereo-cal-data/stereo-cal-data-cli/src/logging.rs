use std::path::Path;

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt};

/// Log to the console and optionally to a file.
///
/// The filter is taken from `RUST_LOG`, defaulting to `info`.
pub(crate) fn init(log_file: Option<&Path>) -> eyre::Result<()> {
    let file_layer = if let Some(path) = log_file {
        let file = std::fs::File::create(path)?;
        Some(
            fmt::layer()
                .with_writer(std::sync::Mutex::new(file))
                .with_ansi(false)
                .with_file(true)
                .with_line_number(true),
        )
    } else {
        None
    };

    let console_layer = fmt::layer()
        .with_ansi(!cfg!(windows))
        .with_file(true)
        .with_line_number(true);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let collector = tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .with(filter);
    tracing::subscriber::set_global_default(collector)?;

    if let Some(path) = log_file {
        tracing::debug!("Logging initiated to file \"{}\".", path.display());
    }
    Ok(())
}
