#![warn(clippy::pedantic)]
mod error;
mod night;
mod notifier;
mod position;
#[cfg(test)]
mod test_support;
mod tracker;

use crate::error::MainError;
use crate::night::NightChecker;
use crate::notifier::{Notifier, SmtpMailer};
use crate::position::PositionChecker;
use crate::tracker::Tracker;
use shared::error::InitializationError;
use shared::{Config, init_tracing, load_config, shutdown_listener};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), MainError> {
    init_tracing()?;

    let config = load_config().map_err(|e| {
        error!(error = ?e, "configuration could not be initialized");
        InitializationError::Config(e)
    })?;

    info!(
        latitude = config.observer.latitude,
        longitude = config.observer.longitude,
        "watching for the ISS"
    );

    let tracker = build_tracker(&config)?;

    // Cancelled on SIGINT/SIGTERM; the tracker exits at its next await point.
    let shutdown_token = CancellationToken::new();
    let signal_handle = tokio::spawn(shutdown_listener(Some(shutdown_token.clone())));

    let cycles = tracker.run(shutdown_token.clone()).await;
    info!(cycles, "ISS tracker stopped");

    signal_handle.await?;
    Ok(())
}

fn build_tracker(config: &Config) -> Result<Tracker<SmtpMailer>, MainError> {
    // Default reqwest client
    let http_client = reqwest::Client::builder()
        .build()
        .map_err(MainError::HttpClient)?;

    let position = PositionChecker::new(
        http_client.clone(),
        &config.endpoints.iss_position_url,
        config.observer,
        config.tracker.tolerance_degrees,
    );
    let night = NightChecker::new(
        http_client,
        &config.endpoints.sunrise_sunset_url,
        config.observer,
    );

    Ok(Tracker::new(
        position,
        night,
        build_notifier(config),
        config.tracker.interval(),
    ))
}

fn build_notifier(config: &Config) -> Option<Notifier<SmtpMailer>> {
    let Some(email) = &config.email else {
        warn!("email is not configured, alerts will only be logged");
        return None;
    };

    if email.recipients.is_empty() {
        warn!("no email recipients configured");
    }

    match SmtpMailer::new(email) {
        Ok(mailer) => {
            info!(
                smtp_host = %email.smtp_host,
                smtp_port = email.smtp_port,
                recipients = email.recipients.len(),
                "configured email alerts"
            );
            Some(Notifier::new(
                mailer,
                email.sender.clone(),
                email.recipients.clone(),
                config.observer,
            ))
        }
        Err(e) => {
            warn!(error = ?e, "invalid email configuration, alerts will only be logged");
            None
        }
    }
}
