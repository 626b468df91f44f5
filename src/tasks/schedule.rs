//! Periodic pattern validation
//!
//! A pattern is either a cron expression ("MIN HOUR DOM MON DOW", optionally
//! prefixed with a seconds field) or a human interval ("5 minutes").

use croner::Cron;
use croner::parser::{CronParser, Seconds};

use crate::humanize::HumanInterval;
use crate::models::PeriodicData;

use super::error::TaskError;

#[derive(Debug, Clone)]
pub enum Pattern {
    Cron(Cron),
    Interval(HumanInterval),
}

fn parse_cron(pattern: &str) -> Result<Cron, String> {
    CronParser::builder()
        .seconds(Seconds::Optional)
        .build()
        .parse(pattern)
        .map_err(|err| err.to_string())
}

impl Pattern {
    pub fn parse(pattern: &str) -> Result<Self, String> {
        let pattern = pattern.trim();
        if pattern.is_empty() {
            return Err("pattern must not be empty".to_string());
        }

        let cron_error = match parse_cron(pattern) {
            Ok(cron) => return Ok(Pattern::Cron(cron)),
            Err(err) => err,
        };

        match pattern.parse::<HumanInterval>() {
            Ok(interval) if interval.as_secs() > 0 => Ok(Pattern::Interval(interval)),
            Ok(_) => Err("interval must be longer than zero".to_string()),
            Err(interval_error) => Err(format!(
                "'{pattern}' is neither a cron expression ({cron_error}) nor an interval ({interval_error})"
            )),
        }
    }
}

pub fn validate_periodic_data(periodic: &PeriodicData) -> Result<Pattern, TaskError> {
    if periodic.window_duration_seconds == Some(0) {
        return Err(TaskError::InvalidSchedule(
            "windowDurationSeconds must be greater than zero".to_string(),
        ));
    }
    Pattern::parse(&periodic.pattern).map_err(TaskError::InvalidSchedule)
}
