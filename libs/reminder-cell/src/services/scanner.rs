use std::sync::Arc;

use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, instrument, warn};

use notification_cell::ParticipantResolver;
use shared_database::AppointmentRepository;
use shared_models::appointment::{Appointment, AppointmentStatus};
use shared_models::notification::{deliver, NotificationKind, NotificationPort};
use shared_utils::clock::Clock;

use crate::models::{ReminderConfig, ReminderError, ReminderKind, ScanSummary};

/// Periodically reminds patients of confirmed appointments, once per reminder kind.
pub struct ReminderScanner {
    config: ReminderConfig,
    appointments: Arc<dyn AppointmentRepository>,
    resolver: Arc<ParticipantResolver>,
    port: Arc<dyn NotificationPort>,
    clock: Arc<dyn Clock>,
    tick_lock: Mutex<()>,
}

/// Running scanner task.
pub struct ReminderScannerHandle {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl ReminderScanner {
    pub fn new(
        config: ReminderConfig,
        appointments: Arc<dyn AppointmentRepository>,
        resolver: Arc<ParticipantResolver>,
        port: Arc<dyn NotificationPort>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            appointments,
            resolver,
            port,
            clock,
            tick_lock: Mutex::new(()),
        }
    }

    /// Runs a tick now and then every `config.interval` until shut down.
    /// Ticks that fall behind are skipped rather than bunched up.
    pub fn spawn(self: Arc<Self>) -> ReminderScannerHandle {
        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let scanner = self;

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(scanner.config.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            info!("Reminder scanner started, every {:?}", scanner.config.interval);

            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_rx.changed() => break,
                    _ = ticker.tick() => {}
                }
                scanner.tick().await;
            }

            info!("Reminder scanner stopped");
        });

        ReminderScannerHandle { shutdown, handle }
    }

    /// Scans every enabled reminder kind once. Returns nothing if another tick
    /// is still running.
    pub async fn tick(&self) -> Vec<ScanSummary> {
        let Ok(_running) = self.tick_lock.try_lock() else {
            debug!("Previous reminder tick still running, skipping");
            return Vec::new();
        };

        let mut summaries = Vec::with_capacity(ReminderKind::ALL.len());
        for kind in ReminderKind::ALL {
            if !self.config.enabled(kind) {
                continue;
            }
            match self.scan(kind).await {
                Ok(summary) => summaries.push(summary),
                Err(e) => error!("{} reminder scan failed: {}", kind, e),
            }
        }
        summaries
    }

    #[instrument(skip(self))]
    pub async fn scan(&self, kind: ReminderKind) -> Result<ScanSummary, ReminderError> {
        let target = self.clock.now() + kind.lead_time();
        let due: Vec<Appointment> = self
            .appointments
            .find_by_scheduled_at_range(
                target - self.config.window,
                target + self.config.window,
                AppointmentStatus::Confirmed,
            )
            .await?
            .into_iter()
            .filter(|a| !kind.already_sent(a))
            .collect();

        let mut summary = ScanSummary::empty(kind);
        summary.due = due.len();

        for appointment in &due {
            let participants = match self
                .resolver
                .resolve(appointment, Some(kind.label().to_string()))
                .await
            {
                Ok(participants) => participants,
                Err(e) => {
                    warn!("Skipping {} reminder for appointment {}: {}", kind, appointment.id, e);
                    summary.skipped += 1;
                    continue;
                }
            };

            if let Err(e) = deliver(
                self.port.as_ref(),
                NotificationKind::Reminder,
                &participants.patient,
                &participants.notice,
            )
            .await
            {
                warn!("Failed to send {} reminder for appointment {}: {}", kind, appointment.id, e);
                summary.failed += 1;
                continue;
            }
            summary.sent += 1;

            let marked = match kind {
                ReminderKind::DayBefore => self.appointments.mark_reminder_24h_sent(appointment.id).await,
                ReminderKind::HourBefore => self.appointments.mark_reminder_1h_sent(appointment.id).await,
            };
            if let Err(e) = marked {
                error!(
                    "Sent {} reminder for appointment {} but could not record it: {}",
                    kind, appointment.id, e
                );
                summary.unmarked += 1;
            }
        }

        if summary.due > 0 {
            info!(
                "{} reminders: {} due, {} sent, {} failed, {} skipped",
                kind, summary.due, summary.sent, summary.failed, summary.skipped
            );
        }
        Ok(summary)
    }
}

impl ReminderScannerHandle {
    /// Stops scheduling ticks; a tick already in progress finishes first.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.handle.await {
            error!("Reminder scanner ended abnormally: {}", e);
        }
    }
}
