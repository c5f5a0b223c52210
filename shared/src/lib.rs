pub mod api;

use crate::error::{ConfigError, InitializationError};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Formatter};
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

pub const ENV_VAR_PREFIX: &str = "ISS_TRACKER__";
pub const SETTINGS_FILE: &str = "Settings.toml";

/// Env vars read without the prefix, mapped onto the `email` section.
const LEGACY_EMAIL_VARS: [&str; 3] = ["EMAIL_SENDER", "EMAIL_PASSWORD", "EMAIL_RECEIVERS"];

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub observer: ObserverLocation,
    #[serde(default)]
    pub endpoints: EndpointsConfig,
    #[serde(default)]
    pub tracker: TrackerConfig,
    /// Loaded separately so a broken email section only disables alerts.
    #[serde(skip)]
    pub email: Option<EmailConfig>,
}

/// Fixed point on the ground the tracker watches, in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct ObserverLocation {
    pub latitude: f64,
    pub longitude: f64,
}

impl Default for ObserverLocation {
    fn default() -> Self {
        Self {
            latitude: 6.628_260,
            longitude: 3.375_070,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EndpointsConfig {
    pub iss_position_url: String,
    pub sunrise_sunset_url: String,
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            iss_position_url: api::open_notify::ISS_NOW_ENDPOINT.to_string(),
            sunrise_sunset_url: api::sunrise_sunset::SUNRISE_SUNSET_ENDPOINT.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TrackerConfig {
    pub interval_seconds: u64,
    pub tolerance_degrees: f64,
}

impl TrackerConfig {
    pub const fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            interval_seconds: 60,
            tolerance_degrees: 5.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    pub sender: String,
    pub password: Secret,
    #[serde(default = "default_smtp_host")]
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    #[serde(default)]
    pub recipients: Vec<Recipient>,
}

fn default_smtp_host() -> String {
    "smtp.gmail.com".to_string()
}

const fn default_smtp_port() -> u16 {
    465
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Recipient {
    pub name: String,
    pub email: String,
}

/// A credential that never shows up in `Debug` output.
#[derive(Clone, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl Debug for Secret {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("Secret([redacted])")
    }
}

/// Layered configuration sources, lowest priority first.
pub fn figment() -> Figment {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(SETTINGS_FILE))
        .merge(
            Env::raw()
                .only(&LEGACY_EMAIL_VARS)
                .map(|key| match key.as_str().to_ascii_uppercase().as_str() {
                    "EMAIL_SENDER" => "email.sender".into(),
                    "EMAIL_PASSWORD" => "email.password".into(),
                    _ => "email.recipients".into(),
                }),
        );
    let figment = merge_raw_password(figment, "EMAIL_PASSWORD");
    let figment = figment.merge(Env::prefixed(ENV_VAR_PREFIX).split("__"));
    merge_raw_password(figment, &format!("{ENV_VAR_PREFIX}EMAIL__PASSWORD"))
}

/// Env values are parsed as TOML-like literals, so `123456` or `[abc]` would
/// stop being strings. Passwords are re-merged verbatim over the parsed value.
fn merge_raw_password(figment: Figment, var: &str) -> Figment {
    match dotenvy::var(var) {
        Ok(password) => figment.merge(Serialized::default("email.password", password)),
        Err(_) => figment,
    }
}

pub fn load_config() -> Result<Config, ConfigError> {
    // A missing .env file is not an error
    if let Err(e) = dotenvy::dotenv()
        && !e.not_found()
    {
        return Err(ConfigError::DotEnv(e));
    }

    Ok(extract_config(&figment())?)
}

pub fn extract_config(figment: &Figment) -> Result<Config, figment::Error> {
    let mut config: Config = figment.extract()?;
    if figment.find_value("email").is_ok() {
        config.email = match figment.extract_inner::<EmailConfig>("email") {
            Ok(email) => Some(email),
            Err(e) => {
                // Values are left out of the log, they may hold the password
                let detail = match &e.kind {
                    figment::error::Kind::MissingField(field) => {
                        format!("missing field `{field}`")
                    }
                    _ => format!("invalid value at `{}`", e.path.join(".")),
                };
                warn!(detail = %detail, "ignoring malformed email configuration");
                None
            }
        };
    }
    Ok(config)
}

pub mod error {
    use thiserror::Error;
    use tracing::dispatcher::SetGlobalDefaultError;

    #[derive(Debug, Error)]
    pub enum ConfigError {
        #[error("failed to load configuration: {0}")]
        Figment(#[from] figment::Error),
        #[error("failed to read .env file: {0}")]
        DotEnv(dotenvy::Error),
    }

    #[derive(Debug, Error)]
    pub enum InitializationError {
        #[error(transparent)]
        Tracing(#[from] SetGlobalDefaultError),
        #[error(transparent)]
        Config(#[from] ConfigError),
    }
}

pub fn init_tracing() -> Result<(), InitializationError> {
    let subscriber = tracing_subscriber::fmt()
        .compact()
        .with_file(true)
        .with_line_number(true)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

pub async fn shutdown_listener(token: Option<CancellationToken>) {
    let ctrl_c = signal::ctrl_c();
    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = ?e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!(name: "signal.ctrlc.received", "received Ctrl+C signal, shutting down"),
        _ = terminate => info!(name: "signal.sigterm.received", "received SIGTERM signal, shutting down"),
    }

    if let Some(token) = token {
        token.cancel();
    }
}
