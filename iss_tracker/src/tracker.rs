use crate::night::NightChecker;
use crate::notifier::{Mailer, Notifier, NotifyReport};
use crate::position::PositionChecker;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    NotOverhead,
    NotNight,
    Notified(NotifyReport),
    NotificationFailed,
    NotificationDisabled,
}

pub struct Tracker<M> {
    position: PositionChecker,
    night: NightChecker,
    notifier: Option<Notifier<M>>,
    interval: Duration,
}

impl<M: Mailer> Tracker<M> {
    pub fn new(
        position: PositionChecker,
        night: NightChecker,
        notifier: Option<Notifier<M>>,
        interval: Duration,
    ) -> Self {
        Self {
            position,
            night,
            notifier,
            interval,
        }
    }

    /// One polling cycle. Check failures count as the condition not being met.
    pub async fn run_cycle(&self) -> CycleOutcome {
        match self.position.check().await {
            Ok(true) => {}
            Ok(false) => return CycleOutcome::NotOverhead,
            Err(e) => {
                warn!(error = ?e, "failed to fetch ISS position");
                return CycleOutcome::NotOverhead;
            }
        }

        match self.night.check().await {
            Ok(true) => {}
            Ok(false) => return CycleOutcome::NotNight,
            Err(e) => {
                warn!(error = ?e, "failed to fetch sunrise/sunset data");
                return CycleOutcome::NotNight;
            }
        }

        let Some(notifier) = &self.notifier else {
            warn!("ISS is overhead at night but email is not configured");
            return CycleOutcome::NotificationDisabled;
        };

        match notifier.notify().await {
            Ok(report) => {
                info!(
                    delivered = report.delivered.len(),
                    failed = report.failed.len(),
                    "ISS overhead at night, alerts sent"
                );
                CycleOutcome::Notified(report)
            }
            Err(e) => {
                warn!(error = ?e, "failed to send ISS alerts");
                CycleOutcome::NotificationFailed
            }
        }
    }

    /// Sleeps, then polls, until `shutdown` is cancelled. Returns the number of
    /// completed cycles; a cycle interrupted by shutdown is not counted.
    pub async fn run(&self, shutdown: CancellationToken) -> u64 {
        info!(interval = ?self.interval, "initialized ISS tracker");
        let mut cycles = 0;
        loop {
            tokio::select! {
                () = sleep(self.interval) => {},
                () = shutdown.cancelled() => {
                    info!("shutdown requested, exiting tracker loop");
                    break;
                }
            }

            // Requests have no timeout, so a stalled endpoint must not outlive shutdown
            tokio::select! {
                outcome = self.run_cycle() => {
                    cycles += 1;
                    debug!(cycle = cycles, ?outcome, "completed polling cycle");
                }
                () = shutdown.cancelled() => {
                    info!("shutdown requested, abandoning in-flight polling cycle");
                    break;
                }
            }
        }
        cycles
    }
}
