#[macro_use]
extern crate tracing;

mod args;
mod schedule;

pub use args::Args;
use directories::BaseDirs;
pub use schedule::Schedule;
use serde::Deserialize;
use std::{
    path::{
        Path,
        PathBuf,
    },
    time::Duration,
};

/// Looked up in the working directory when no `--config` is given.
pub const CONFIG_FILE: &str = "config.yaml";

const DEFAULT_CONFIG: &str = include_str!("default-config.yaml");

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("the `{0}` setting is not set")]
    Missing(&'static str),

    #[error("set either `CRON_EXPRESSION` or `SCHEDULE_INTERVAL`, but not both")]
    ConflictingSchedule,

    #[error("no schedule information set, set either `CRON_EXPRESSION` or `SCHEDULE_INTERVAL`")]
    MissingSchedule,

    #[error("invalid cron expression `{expression}`: {reason}")]
    InvalidCron { expression: String, reason: String },
}

/// Settings as merged from defaults, arguments/environment and the config file, before
/// validation.
#[derive(Debug, Clone, Deserialize)]
struct RawConfig {
    #[serde(default)]
    server_id: String,
    #[serde(default)]
    gsheet_doc_key: String,
    #[serde(default)]
    gsheet_sheet_name: String,
    #[serde(default)]
    gsheets_service_key_filename: String,
    #[serde(default)]
    debug: bool,
    #[serde(default)]
    schedule_interval: Option<u64>,
    #[serde(default)]
    cron_expression: Option<String>,
    speedtest_binary: String,
    speedtest_license_marker: String,
    speedtest_timeout_secs: u64,
    gsheets_timeout_secs: u64,
    #[serde(default)]
    log_file: String,
}

#[derive(Debug, Clone)]
pub struct SpeedtestConfig {
    pub binary: PathBuf,
    /// Present once the CLI license has been accepted on this machine.
    pub license_marker: PathBuf,
    pub timeout: Duration,
}

/// Immutable configuration of the measurement job, built once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub server_id: String,
    pub gsheet_doc_key: String,
    pub gsheet_sheet_name: String,
    pub gsheets_service_key_filename: PathBuf,
    pub gsheets_timeout: Duration,
    pub debug: bool,
    pub schedule: Schedule,
    pub speedtest: SpeedtestConfig,
    pub log_file: Option<PathBuf>,
}

/// Lower-cases the top-level keys of the wrapped source so that `SERVER_ID` in the config file
/// and `server_id` from the arguments address the same setting.
#[derive(Debug, Clone)]
struct CaseFolded<S>(S);

impl<S> config::Source for CaseFolded<S>
where
    S: config::Source + Clone + Send + Sync + 'static,
{
    fn clone_into_box(&self) -> Box<dyn config::Source + Send + Sync> {
        Box::new(self.clone())
    }

    fn collect(&self) -> Result<config::Map<String, config::Value>, config::ConfigError> {
        Ok(self
            .0
            .collect()?
            .into_iter()
            .map(|(key, value)| (key.to_lowercase(), value))
            .collect())
    }
}

impl Config {
    /// Merge defaults, arguments (which carry the environment) and the config file, the file
    /// taking precedence, then validate.
    pub fn new(args: Args) -> Result<Self, ConfigError> {
        let config_file = args.config.clone();

        let mut builder = config::Config::builder()
            .add_source(config::File::from_str(DEFAULT_CONFIG, config::FileFormat::Yaml))
            .add_source(args);

        builder = match config_file {
            Some(path) => {
                debug!(path = %path.display(), "loading config file");
                builder.add_source(CaseFolded(
                    config::File::from(path).format(config::FileFormat::Yaml).required(true),
                ))
            }
            None => builder.add_source(CaseFolded(
                config::File::from(Path::new(CONFIG_FILE))
                    .format(config::FileFormat::Yaml)
                    .required(false),
            )),
        };

        let raw: RawConfig = builder.build()?.try_deserialize()?;
        raw.validate()
    }

    /// Settings worth echoing at startup, in a stable order.
    pub fn display_settings(&self) -> Vec<(&'static str, String)> {
        vec![
            ("SERVER_ID", self.server_id.clone()),
            ("GSHEET_DOC_KEY", self.gsheet_doc_key.clone()),
            ("GSHEET_SHEET_NAME", self.gsheet_sheet_name.clone()),
            (
                "GSHEETS_SERVICE_KEY_FILENAME",
                self.gsheets_service_key_filename.display().to_string(),
            ),
            ("SCHEDULE", self.schedule.to_string()),
            ("DEBUG", self.debug.to_string()),
        ]
    }
}

impl RawConfig {
    fn validate(self) -> Result<Config, ConfigError> {
        let required = [
            ("SERVER_ID", &self.server_id),
            ("GSHEET_DOC_KEY", &self.gsheet_doc_key),
            ("GSHEET_SHEET_NAME", &self.gsheet_sheet_name),
            ("GSHEETS_SERVICE_KEY_FILENAME", &self.gsheets_service_key_filename),
        ];
        if let Some((name, _)) = required.iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(ConfigError::Missing(*name));
        }

        let schedule = Schedule::from_settings(self.schedule_interval, self.cron_expression.as_deref())?;

        let log_file = Some(self.log_file.trim())
            .filter(|path| !path.is_empty())
            .map(PathBuf::from);

        Ok(Config {
            server_id: self.server_id.trim().to_string(),
            gsheet_doc_key: self.gsheet_doc_key.trim().to_string(),
            gsheet_sheet_name: self.gsheet_sheet_name,
            gsheets_service_key_filename: expand_home(&self.gsheets_service_key_filename),
            gsheets_timeout: Duration::from_secs(self.gsheets_timeout_secs),
            debug: self.debug,
            schedule,
            speedtest: SpeedtestConfig {
                binary: expand_home(&self.speedtest_binary),
                license_marker: expand_home(&self.speedtest_license_marker),
                timeout: Duration::from_secs(self.speedtest_timeout_secs),
            },
            log_file,
        })
    }
}

/// Expand a leading `~/` to the user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    let path = path.trim();
    match path.strip_prefix("~/") {
        Some(rest) => match BaseDirs::new() {
            Some(dirs) => dirs.home_dir().join(rest),
            None => PathBuf::from(path),
        },
        None => PathBuf::from(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    fn complete_args() -> Args {
        Args {
            server_id: Some("1234".to_string()),
            gsheet_doc_key: Some("doc-key".to_string()),
            gsheet_sheet_name: Some("Speedtest".to_string()),
            gsheets_service_key_filename: Some("/etc/speedtest/service-account.json".to_string()),
            schedule_interval: Some(60),
            ..Default::default()
        }
    }

    fn config_file(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn defaults() {
        let config = Config::new(complete_args()).unwrap();
        assert_eq!(config.server_id, "1234");
        assert!(!config.debug);
        assert_eq!(config.speedtest.binary, PathBuf::from("speedtest"));
        assert_eq!(config.speedtest.timeout, Duration::from_secs(300));
        assert_eq!(config.gsheets_timeout, Duration::from_secs(60));
        assert_eq!(config.log_file, Some(PathBuf::from("speedtest_to_gsheet.log")));
        assert!(config.speedtest.license_marker.ends_with(".config/ookla/speedtest-cli.json"));
        assert!(matches!(config.schedule, Schedule::Interval { minutes: 60 }));
    }

    #[test]
    fn missing_required_setting() {
        for (name, args) in [
            (
                "SERVER_ID",
                Args {
                    server_id: None,
                    ..complete_args()
                },
            ),
            (
                "GSHEET_DOC_KEY",
                Args {
                    gsheet_doc_key: Some("  ".to_string()),
                    ..complete_args()
                },
            ),
            (
                "GSHEET_SHEET_NAME",
                Args {
                    gsheet_sheet_name: None,
                    ..complete_args()
                },
            ),
            (
                "GSHEETS_SERVICE_KEY_FILENAME",
                Args {
                    gsheets_service_key_filename: None,
                    ..complete_args()
                },
            ),
        ] {
            match Config::new(args) {
                Err(ConfigError::Missing(missing)) => assert_eq!(missing, name),
                other => panic!("expected {name} to be reported missing, got {other:?}"),
            }
        }
    }

    #[test]
    fn both_schedules_rejected() {
        let args = Args {
            cron_expression: Some("0 * * * *".to_string()),
            ..complete_args()
        };
        assert!(matches!(Config::new(args), Err(ConfigError::ConflictingSchedule)));
    }

    #[test]
    fn no_schedule_rejected() {
        let args = Args {
            schedule_interval: None,
            ..complete_args()
        };
        assert!(matches!(Config::new(args), Err(ConfigError::MissingSchedule)));
    }

    #[test]
    fn config_file_takes_precedence() {
        let file = config_file(
            "SERVER_ID: 9999\nCRON_EXPRESSION: \"*/30 * * * *\"\nSCHEDULE_INTERVAL: 0\nDEBUG: \"True\"\nLOG_FILE: \"\"\n",
        );
        let args = Args {
            config: Some(file.path().to_path_buf()),
            ..complete_args()
        };
        let config = Config::new(args).unwrap();
        assert_eq!(config.server_id, "9999");
        assert_eq!(config.gsheet_doc_key, "doc-key");
        assert!(config.debug);
        assert_eq!(config.log_file, None);
        match config.schedule {
            Schedule::Cron { expression, .. } => assert_eq!(expression, "*/30 * * * *"),
            other => panic!("expected cron schedule, got {other:?}"),
        }
    }

    #[test]
    fn explicit_config_file_must_exist() {
        let args = Args {
            config: Some(PathBuf::from("/nonexistent/speedtest/config.yaml")),
            ..complete_args()
        };
        assert!(matches!(Config::new(args), Err(ConfigError::Load(_))));
    }

    #[test]
    fn home_expansion() {
        assert_eq!(expand_home("/abs/path"), PathBuf::from("/abs/path"));
        assert_eq!(expand_home("relative"), PathBuf::from("relative"));
        if let Some(dirs) = BaseDirs::new() {
            assert_eq!(expand_home("~/.config/x"), dirs.home_dir().join(".config/x"));
        }
    }
}
