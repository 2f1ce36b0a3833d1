use clap::{
    builder::BoolishValueParser,
    Parser,
};
use std::path::PathBuf;

/// Periodically run the Ookla speedtest CLI and append each result to a Google Sheet.
///
/// Every option can also be given through the environment variable named next to it. Values in
/// the config file take precedence over both.
#[derive(Parser, Debug, Clone, Default)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// YAML config file. Defaults to `config.yaml` in the working directory when present.
    #[arg(long, env = "CONFIG_FILE", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Speedtest server to measure against.
    #[arg(long, env = "SERVER_ID", value_name = "ID")]
    pub server_id: Option<String>,

    /// Key of the spreadsheet document (the id in its URL).
    #[arg(long, env = "GSHEET_DOC_KEY", value_name = "KEY")]
    pub gsheet_doc_key: Option<String>,

    /// Name of the worksheet tab rows are appended to.
    #[arg(long, env = "GSHEET_SHEET_NAME", value_name = "NAME")]
    pub gsheet_sheet_name: Option<String>,

    /// Service account key file used to authenticate against Google Sheets.
    #[arg(long, env = "GSHEETS_SERVICE_KEY_FILENAME", value_name = "FILE")]
    pub gsheets_service_key_filename: Option<String>,

    /// Run every N minutes. Mutually exclusive with `--cron-expression`.
    #[arg(long, env = "SCHEDULE_INTERVAL", value_name = "MINUTES")]
    pub schedule_interval: Option<u64>,

    /// Run on a cron schedule (5 or 6 fields, local time). Mutually exclusive with
    /// `--schedule-interval`.
    #[arg(long, env = "CRON_EXPRESSION", value_name = "EXPR")]
    pub cron_expression: Option<String>,

    /// Enables debug logging.
    #[arg(long, env = "DEBUG", value_name = "BOOL", value_parser = BoolishValueParser::new())]
    pub debug: Option<bool>,

    /// Speedtest CLI executable.
    #[arg(long, env = "SPEEDTEST_BINARY", value_name = "PATH")]
    pub speedtest_binary: Option<String>,

    /// File whose presence means the speedtest license was already accepted.
    #[arg(long, env = "SPEEDTEST_LICENSE_MARKER", value_name = "FILE")]
    pub speedtest_license_marker: Option<String>,

    /// Upper bound for a single speedtest run.
    #[arg(long, env = "SPEEDTEST_TIMEOUT_SECS", value_name = "SECONDS")]
    pub speedtest_timeout_secs: Option<u64>,

    /// Timeout of each Google Sheets request.
    #[arg(long, env = "GSHEETS_TIMEOUT_SECS", value_name = "SECONDS")]
    pub gsheets_timeout_secs: Option<u64>,

    /// Log file, in addition to stdout. An empty value disables it.
    #[arg(long, env = "LOG_FILE", value_name = "FILE")]
    pub log_file: Option<String>,
}

mod config_ext {
    use super::*;
    use config::{
        Map,
        Source,
        Value,
    };

    impl Source for Args {
        fn clone_into_box(&self) -> Box<dyn Source + Send + Sync> {
            Box::new((*self).clone())
        }

        fn collect(&self) -> Result<Map<String, Value>, config::ConfigError> {
            let mut cache = Map::<String, Value>::new();
            let strings = [
                ("server_id", &self.server_id),
                ("gsheet_doc_key", &self.gsheet_doc_key),
                ("gsheet_sheet_name", &self.gsheet_sheet_name),
                ("gsheets_service_key_filename", &self.gsheets_service_key_filename),
                ("cron_expression", &self.cron_expression),
                ("speedtest_binary", &self.speedtest_binary),
                ("speedtest_license_marker", &self.speedtest_license_marker),
                ("log_file", &self.log_file),
            ];
            for (key, value) in strings {
                if let Some(value) = value {
                    cache.insert(key.to_string(), value.clone().into());
                }
            }
            let numbers = [
                ("schedule_interval", self.schedule_interval),
                ("speedtest_timeout_secs", self.speedtest_timeout_secs),
                ("gsheets_timeout_secs", self.gsheets_timeout_secs),
            ];
            for (key, value) in numbers {
                if let Some(value) = value {
                    cache.insert(key.to_string(), value.into());
                }
            }
            if let Some(debug) = self.debug {
                cache.insert("debug".to_string(), debug.into());
            }
            Ok(cache)
        }
    }
}
