use crate::error::CheckError;
use chrono::{DateTime, Timelike, Utc};
use reqwest::Client;
use shared::ObserverLocation;
use shared::api::sunrise_sunset::{STATUS_OK, SunriseSunsetQuery, SunriseSunsetRoot};
use tracing::{debug, instrument};

/// Sunrise and sunset for the observer, truncated to whole UTC hours.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DaylightWindow {
    pub sunrise_hour: u32,
    pub sunset_hour: u32,
}

impl DaylightWindow {
    /// Night is at or after the sunset hour, or at or before the sunrise hour.
    ///
    /// Minutes are dropped on both sides, so up to 59 minutes around each
    /// boundary can be classified as night while the sun is still up.
    pub const fn is_night_at(&self, hour: u32) -> bool {
        hour >= self.sunset_hour || hour <= self.sunrise_hour
    }
}

pub struct NightChecker {
    client: Client,
    url: String,
    observer: ObserverLocation,
    clock: fn() -> DateTime<Utc>,
}

impl NightChecker {
    pub fn new(client: Client, url: impl Into<String>, observer: ObserverLocation) -> Self {
        Self {
            client,
            url: url.into(),
            observer,
            clock: Utc::now,
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    pub async fn fetch(&self) -> Result<DaylightWindow, CheckError> {
        let resp = self
            .client
            .get(&self.url)
            .query(&SunriseSunsetQuery::iso8601(
                self.observer.latitude,
                self.observer.longitude,
            ))
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let root: SunriseSunsetRoot = serde_json::from_str(&resp)?;
        if let Some(status) = root.status
            && status != STATUS_OK
        {
            return Err(CheckError::UpstreamStatus(status));
        }

        Ok(DaylightWindow {
            sunrise_hour: root.results.sunrise.with_timezone(&Utc).hour(),
            sunset_hour: root.results.sunset.with_timezone(&Utc).hour(),
        })
    }

    /// Whether it is currently night at the observer's location.
    #[instrument(skip(self), fields(url = %self.url))]
    pub async fn check(&self) -> Result<bool, CheckError> {
        let hour = (self.clock)().hour();
        let window = self.fetch().await?;
        let night = window.is_night_at(hour);
        debug!(
            sunrise_hour = window.sunrise_hour,
            sunset_hour = window.sunset_hour,
            hour,
            night,
            "fetched daylight window"
        );
        Ok(night)
    }
}
