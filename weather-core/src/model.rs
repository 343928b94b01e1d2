use chrono::{DateTime, NaiveDateTime};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::FetchError;

/// Textual form used both in storage and on the wire: `YYYY-MM-DDTHH:MM:SS`.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Geographic position of the tracked city, in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// The "current conditions" subset of an upstream response.
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentConditions {
    /// Unix epoch seconds reported by the upstream as "now".
    pub observed_at: i64,
    pub temperature: f64,
    pub condition_code: String,
    pub condition_description: String,
}

/// One stored weather data point.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherObservation {
    pub city: String,
    /// Local wall-clock time in the service timezone, second precision.
    pub timestamp: NaiveDateTime,
    pub temperature: f64,
    pub condition_code: String,
    pub condition_description: String,
}

impl WeatherObservation {
    /// Build an observation from upstream conditions, converting the epoch
    /// timestamp into local time of `tz`.
    pub fn from_conditions(
        city: &str,
        conditions: CurrentConditions,
        tz: Tz,
    ) -> Result<Self, FetchError> {
        let timestamp = epoch_to_local(conditions.observed_at, tz)
            .ok_or(FetchError::InvalidTimestamp(conditions.observed_at))?;

        Ok(Self {
            city: city.to_string(),
            timestamp,
            temperature: conditions.temperature,
            condition_code: conditions.condition_code,
            condition_description: conditions.condition_description,
        })
    }
}

/// A single entry of the `/history` payload. The description is not exposed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub timestamp: String,
    pub temp: f64,
    pub weather: String,
}

impl From<&WeatherObservation> for HistoryEntry {
    fn from(obs: &WeatherObservation) -> Self {
        Self {
            timestamp: format_timestamp(&obs.timestamp),
            temp: obs.temperature,
            weather: obs.condition_code.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub city: String,
    pub day: String,
    pub data: Vec<HistoryEntry>,
}

pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT).ok()
}

fn epoch_to_local(ts: i64, tz: Tz) -> Option<NaiveDateTime> {
    DateTime::from_timestamp(ts, 0).map(|utc| utc.with_timezone(&tz).naive_local())
}
