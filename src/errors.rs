use speedtest_gsheet_config::ConfigError;
use std::time::Duration;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failures of a single job cycle. None of them are retried; the scheduler logs them and waits
/// for the next trigger.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("failed to run `{command}`: {reason}")]
    Invocation { command: String, reason: String },

    #[error("`{command}` did not finish within {}s", .after.as_secs())]
    Timeout { command: String, after: Duration },

    #[error("failed to parse speedtest output: {0}")]
    Parse(#[source] serde_json::Error),

    #[error("failed to map measurement to a row: {0}")]
    Mapping(String),

    #[error("failed to append row to the sheet: {0}")]
    Append(#[from] gsheets_client::Error),
}

/// Install the error report and panic hooks. Panics get a full backtrace in debug builds and a
/// crash report file in release builds.
pub fn init_errors() -> color_eyre::Result<()> {
    color_eyre::install()?;

    #[cfg(debug_assertions)]
    better_panic::Settings::auto()
        .most_recent_first(false)
        .lineno_suffix(true)
        .install();

    #[cfg(not(debug_assertions))]
    human_panic::setup_panic!();

    Ok(())
}
