//! Five-field cron expressions and the preset schedule table
//!
//! Configurations store classic five-field expressions (minute, hour, day of
//! month, month, day of week). The parser underneath expects a leading
//! seconds field, so a `0` seconds field is prepended before parsing; a
//! stored expression therefore always fires at second zero.

use chrono::{DateTime, Utc};
use cron::Schedule;
use gridsync_types::{Error, Result};
use std::str::FromStr;

/// A labelled schedule offered by the front-end dropdown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CronPreset {
    /// Human-readable label
    pub label: &'static str,
    /// Five-field cron expression
    pub expression: &'static str,
}

/// Preset schedules, lookup works by label and by expression
pub const CRON_PRESETS: &[CronPreset] = &[
    CronPreset {
        label: "Every 5 minutes",
        expression: "*/5 * * * *",
    },
    CronPreset {
        label: "Every 15 minutes",
        expression: "*/15 * * * *",
    },
    CronPreset {
        label: "Every hour",
        expression: "0 * * * *",
    },
    CronPreset {
        label: "Every day at midnight",
        expression: "0 0 * * *",
    },
    CronPreset {
        label: "Every day at noon",
        expression: "0 12 * * *",
    },
    CronPreset {
        label: "Every Sunday at midnight",
        expression: "0 0 * * SUN",
    },
];

impl CronPreset {
    /// Find a preset by its display label
    pub fn by_label(label: &str) -> Option<&'static CronPreset> {
        CRON_PRESETS.iter().find(|p| p.label == label)
    }

    /// Find a preset matching a stored expression
    pub fn by_expression(expression: &str) -> Option<&'static CronPreset> {
        CRON_PRESETS.iter().find(|p| p.expression == expression)
    }
}

/// A validated five-field cron expression
#[derive(Debug, Clone)]
pub struct CronTrigger {
    expression: String,
    schedule: Schedule,
}

impl CronTrigger {
    /// Parse and validate a five-field expression
    pub fn parse(expression: &str) -> Result<Self> {
        let fields = expression.split_whitespace().count();
        if fields != 5 {
            return Err(Error::InvalidCron {
                expression: expression.to_string(),
                message: format!("expected 5 fields, found {fields}"),
            });
        }
        let schedule =
            Schedule::from_str(&format!("0 {expression}")).map_err(|e| Error::InvalidCron {
                expression: expression.to_string(),
                message: e.to_string(),
            })?;
        Ok(Self {
            expression: expression.to_string(),
            schedule,
        })
    }

    /// Whether `expression` is a valid five-field cron expression
    pub fn is_valid(expression: &str) -> bool {
        Self::parse(expression).is_ok()
    }

    /// The expression as stored
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Earliest occurrence strictly after `from`
    pub fn next_occurrence(&self, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.after(&from).next()
    }

    /// Seconds from `now` until the next occurrence, clamped to zero
    ///
    /// An occurrence computed as "now" or in the past, e.g. from clock drift
    /// during a scheduler rebuild, yields 0 so the timer fires immediately.
    pub fn seconds_until_next(&self, now: DateTime<Utc>) -> Option<u64> {
        let next = self.next_occurrence(now)?;
        let delta = next.timestamp() - now.timestamp();
        Some(u64::try_from(delta).unwrap_or(0))
    }
}

impl std::fmt::Display for CronTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.expression)
    }
}
