use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::ConfigError;

pub const INSPECTION_DURATIONS: [u32; 4] = [10, 15, 20, 30];
pub const WARNING_THRESHOLDS: [u32; 3] = [2, 3, 5];

/// Competition-style inspection settings handed to the solve timer
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct InspectionConfig {
    pub enabled: bool,
    pub duration_seconds: u32,
    pub show_warnings: bool,
    pub warning_threshold_seconds: u32,
}

impl Default for InspectionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            duration_seconds: 15,
            show_warnings: true,
            warning_threshold_seconds: 3,
        }
    }
}

impl InspectionConfig {
    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_seconds as u64)
    }

    pub fn warning_threshold(&self) -> Duration {
        Duration::from_secs(self.warning_threshold_seconds as u64)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !INSPECTION_DURATIONS.contains(&self.duration_seconds) {
            return Err(ConfigError::UnsupportedDuration(self.duration_seconds));
        }
        if !WARNING_THRESHOLDS.contains(&self.warning_threshold_seconds) {
            return Err(ConfigError::UnsupportedWarningThreshold(
                self.warning_threshold_seconds,
            ));
        }
        Ok(())
    }

    /// Apply a partial update. On error the config is left untouched.
    pub fn apply(&mut self, patch: InspectionConfigPatch) -> Result<(), ConfigError> {
        let mut next = *self;
        if let Some(enabled) = patch.enabled {
            next.enabled = enabled;
        }
        if let Some(secs) = patch.duration_seconds {
            next.duration_seconds = secs;
        }
        if let Some(show) = patch.show_warnings {
            next.show_warnings = show;
        }
        if let Some(secs) = patch.warning_threshold_seconds {
            next.warning_threshold_seconds = secs;
        }
        next.validate()?;
        *self = next;
        Ok(())
    }

    /// Next recognized duration, wrapping around
    pub fn next_duration(&self) -> u32 {
        cycle(&INSPECTION_DURATIONS, self.duration_seconds, 1)
    }

    pub fn previous_duration(&self) -> u32 {
        cycle(&INSPECTION_DURATIONS, self.duration_seconds, -1)
    }

    pub fn next_warning_threshold(&self) -> u32 {
        cycle(&WARNING_THRESHOLDS, self.warning_threshold_seconds, 1)
    }
}

fn cycle(values: &[u32], current: u32, step: isize) -> u32 {
    let len = values.len() as isize;
    let idx = values.iter().position(|v| *v == current).unwrap_or(0) as isize;
    values[(idx + step).rem_euclid(len) as usize]
}

/// Partial inspection update; `None` fields keep their current value
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InspectionConfigPatch {
    pub enabled: Option<bool>,
    pub duration_seconds: Option<u32>,
    pub show_warnings: Option<bool>,
    pub warning_threshold_seconds: Option<u32>,
}

impl InspectionConfigPatch {
    pub fn enabled(enabled: bool) -> Self {
        Self {
            enabled: Some(enabled),
            ..Self::default()
        }
    }

    pub fn duration_seconds(secs: u32) -> Self {
        Self {
            duration_seconds: Some(secs),
            ..Self::default()
        }
    }

    pub fn show_warnings(show: bool) -> Self {
        Self {
            show_warnings: Some(show),
            ..Self::default()
        }
    }

    pub fn warning_threshold_seconds(secs: u32) -> Self {
        Self {
            warning_threshold_seconds: Some(secs),
            ..Self::default()
        }
    }
}
