use crate::ConfigError;
use croner::Cron;
use std::{
    fmt,
    time::Duration,
};

/// When the measurement job is triggered. Exactly one policy is configured per process.
#[derive(Clone)]
pub enum Schedule {
    /// Cron expression evaluated in local time.
    Cron { expression: String, cron: Cron },
    /// Fixed period; the first run happens right after start.
    Interval { minutes: u64 },
}

impl Schedule {
    pub fn cron(expression: &str) -> Result<Self, ConfigError> {
        let expression = expression.trim();
        let cron = Cron::new(expression)
            .with_seconds_optional()
            .parse()
            .map_err(|err| ConfigError::InvalidCron {
                expression: expression.to_string(),
                reason: err.to_string(),
            })?;
        Ok(Schedule::Cron {
            expression: expression.to_string(),
            cron,
        })
    }

    pub fn interval(minutes: u64) -> Result<Self, ConfigError> {
        if minutes == 0 {
            return Err(ConfigError::MissingSchedule);
        }
        Ok(Schedule::Interval { minutes })
    }

    /// Resolve the `SCHEDULE_INTERVAL` / `CRON_EXPRESSION` pair. A zero interval and a blank
    /// expression both count as unset.
    pub fn from_settings(interval: Option<u64>, cron_expression: Option<&str>) -> Result<Self, ConfigError> {
        let interval = interval.filter(|minutes| *minutes > 0);
        let cron_expression = cron_expression.map(str::trim).filter(|expr| !expr.is_empty());
        match (interval, cron_expression) {
            (Some(_), Some(_)) => Err(ConfigError::ConflictingSchedule),
            (None, None) => Err(ConfigError::MissingSchedule),
            (Some(minutes), None) => Self::interval(minutes),
            (None, Some(expression)) => Self::cron(expression),
        }
    }

    pub fn period(&self) -> Option<Duration> {
        match self {
            Schedule::Interval { minutes } => Some(Duration::from_secs(minutes * 60)),
            Schedule::Cron { .. } => None,
        }
    }
}

impl fmt::Debug for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Schedule::Cron { expression, .. } => f.debug_tuple("Cron").field(expression).finish(),
            Schedule::Interval { minutes } => f.debug_tuple("Interval").field(minutes).finish(),
        }
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Schedule::Cron { expression, .. } => write!(f, "cron `{expression}`"),
            Schedule::Interval { minutes } => write!(f, "every {minutes} minutes"),
        }
    }
}
