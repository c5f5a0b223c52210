use serde::{Deserialize, Serialize};

pub const ISS_NOW_ENDPOINT: &str = "http://api.open-notify.org/iss-now.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssNowRoot {
    pub iss_position: IssPosition,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub timestamp: Option<i64>,
}

/// Coordinates as the API sends them: decimal degrees encoded as strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssPosition {
    pub latitude: String,
    pub longitude: String,
}
