use std::collections::HashSet;
use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;

use crate::aggregate::OutputKey;
use crate::dates::{SessionWindow, parse_time_of_day};
use crate::sweep::ParamGrid;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file path is not valid UTF-8")]
    FilePathIntoString,
    #[error("failed to read settings: {0}")]
    SettingsInit(String),
    #[error("failed to deserialize settings: {0}")]
    Deserialize(String),
    #[error("invalid settings: {0}")]
    Invalid(String),
}

/// Half-open value range `[start, stop)` walked in `step` increments.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ParamRange {
    pub name: String,
    pub start: f64,
    pub stop: f64,
    pub step: f64,
}

impl ParamRange {
    pub fn values(&self) -> Vec<f64> {
        let mut values = Vec::new();
        let mut i = 0u32;
        loop {
            let value = self.start + f64::from(i) * self.step;
            if value >= self.stop {
                break;
            }
            values.push(value);
            i += 1;
        }
        values
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SweepConfig {
    /// Directory flushed batches are written to
    pub file_output: PathBuf,

    /// Directory holding the simulator's per-combination working tables
    pub input_dir: PathBuf,

    /// Instrument symbol (e.g. NQ)
    pub security: String,

    /// Bar size label (e.g. 15min)
    pub timeframe: String,

    pub algo_name: String,

    /// First combination to run, 1-based
    #[serde(default = "default_combo_start")]
    pub combo_start: u64,

    /// Flush once more than this many combinations are buffered
    pub flush_threshold: usize,

    /// Session start (HH:MM); no time filtering when absent
    #[serde(default)]
    pub start_time: Option<String>,

    /// Session end (HH:MM)
    #[serde(default)]
    pub eod_time: Option<String>,

    /// Hours of lead-in before `start_time`
    #[serde(default)]
    pub subtract_hours: i64,

    pub params: Vec<ParamRange>,
}

fn default_combo_start() -> u64 {
    1
}

impl SweepConfig {
    pub fn load(path: PathBuf) -> Result<Self, ConfigError> {
        let filename = path
            .into_os_string()
            .into_string()
            .map_err(|_| ConfigError::FilePathIntoString)?;
        let config: Self = config::Config::builder()
            .add_source(config::File::with_name(&filename))
            .build()
            .map_err(|err| ConfigError::SettingsInit(err.to_string()))?
            .try_deserialize()
            .map_err(|err| ConfigError::Deserialize(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.params.is_empty() {
            return Err(ConfigError::Invalid("no parameters to sweep".into()));
        }
        if self.combo_start == 0 {
            return Err(ConfigError::Invalid("combo_start is 1-based".into()));
        }
        let mut seen = HashSet::new();
        for p in &self.params {
            if !seen.insert(p.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "parameter {} declared twice",
                    p.name
                )));
            }
            if ![p.start, p.stop, p.step].iter().all(|v| v.is_finite()) {
                return Err(ConfigError::Invalid(format!(
                    "parameter {} needs finite start, stop and step",
                    p.name
                )));
            }
            if !(p.step > 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "parameter {} needs a positive step",
                    p.name
                )));
            }
            if !(p.start < p.stop) {
                return Err(ConfigError::Invalid(format!(
                    "parameter {} has an empty range",
                    p.name
                )));
            }
        }
        if !(0..24).contains(&self.subtract_hours) {
            return Err(ConfigError::Invalid(format!(
                "subtract_hours must be within 0..24, got {}",
                self.subtract_hours
            )));
        }
        if self.start_time.is_some() != self.eod_time.is_some() {
            return Err(ConfigError::Invalid(
                "start_time and eod_time must be given together".into(),
            ));
        }
        self.session()?;
        Ok(())
    }

    pub fn grid(&self) -> ParamGrid {
        ParamGrid::new(
            self.params
                .iter()
                .map(|p| (p.name.clone(), p.values()))
                .collect(),
        )
    }

    pub fn output_key(&self) -> OutputKey {
        OutputKey {
            security: self.security.clone(),
            timeframe: self.timeframe.clone(),
            algo_name: self.algo_name.clone(),
        }
    }

    pub fn session(&self) -> Result<Option<SessionWindow>, ConfigError> {
        let (Some(start), Some(eod)) = (&self.start_time, &self.eod_time) else {
            return Ok(None);
        };
        let parse = |raw: &str| {
            parse_time_of_day(raw).map_err(|err| ConfigError::Invalid(err.to_string()))
        };
        Ok(Some(SessionWindow {
            start_time: parse(start)?,
            eod_time: parse(eod)?,
            subtract_hours: self.subtract_hours,
        }))
    }
}
