use eyre::{
    Context as _,
    Result,
};
use std::{
    fs::OpenOptions,
    path::Path,
    sync::Arc,
};
use tracing_subscriber::{
    fmt,
    prelude::*,
    EnvFilter,
};

/// Default filter: our own crates at `info` (or `debug`), everything else at `warn`.
/// `RUST_LOG` takes over when set.
pub fn env_filter(debug: bool) -> EnvFilter {
    let level = if debug { "debug" } else { "info" };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "warn,speedtest_to_gsheet={level},speedtest_gsheet_config={level},gsheets_client={level}"
        ))
    })
}

/// Log to stdout and, when `log_file` is set, append the same lines without colors to that file.
pub fn init_logging(debug: bool, log_file: Option<&Path>) -> Result<()> {
    let file_layer = match log_file {
        Some(path) => {
            if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
                std::fs::create_dir_all(dir).context("Failed to create log directory")?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .wrap_err_with(|| format!("Failed to open log file {}", path.display()))?;
            Some(fmt::layer().with_ansi(false).with_writer(Arc::new(file)))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter(debug))
        .with(fmt::layer())
        .with(file_layer)
        .with(tracing_error::ErrorLayer::default())
        .try_init()
        .context("Failed to initialize tracing subscriber")
}
