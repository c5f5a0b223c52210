use crate::error::CheckError;
use reqwest::Client;
use shared::ObserverLocation;
use shared::api::open_notify::IssNowRoot;
use tracing::{debug, instrument};

/// A single decoded ISS position, in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IssPosition {
    pub latitude: f64,
    pub longitude: f64,
}

/// Inclusive on every edge.
pub fn within_box(observer: ObserverLocation, position: IssPosition, tolerance: f64) -> bool {
    (observer.latitude - tolerance..=observer.latitude + tolerance).contains(&position.latitude)
        && (observer.longitude - tolerance..=observer.longitude + tolerance)
            .contains(&position.longitude)
}

pub struct PositionChecker {
    client: Client,
    url: String,
    observer: ObserverLocation,
    tolerance_degrees: f64,
}

impl PositionChecker {
    pub fn new(
        client: Client,
        url: impl Into<String>,
        observer: ObserverLocation,
        tolerance_degrees: f64,
    ) -> Self {
        Self {
            client,
            url: url.into(),
            observer,
            tolerance_degrees,
        }
    }

    pub async fn fetch(&self) -> Result<IssPosition, CheckError> {
        let resp = self
            .client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let root: IssNowRoot = serde_json::from_str(&resp)?;
        Ok(IssPosition {
            latitude: parse_coordinate(&root.iss_position.latitude)?,
            longitude: parse_coordinate(&root.iss_position.longitude)?,
        })
    }

    /// Whether the ISS is currently inside the box around the observer.
    #[instrument(skip(self), fields(url = %self.url))]
    pub async fn check(&self) -> Result<bool, CheckError> {
        let position = self.fetch().await?;
        let overhead = within_box(self.observer, position, self.tolerance_degrees);
        debug!(
            latitude = position.latitude,
            longitude = position.longitude,
            overhead,
            "fetched ISS position"
        );
        Ok(overhead)
    }
}

fn parse_coordinate(value: &str) -> Result<f64, CheckError> {
    value
        .trim()
        .parse::<f64>()
        .map_err(|source| CheckError::Coordinate {
            value: value.to_string(),
            source,
        })
}
