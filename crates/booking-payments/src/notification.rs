//! Confirmation Notifications
//!
//! Payment confirmations are queued on a bounded channel and delivered by a
//! background worker, so the verifying request never waits on the mail
//! server. Delivery failures stay in the worker: they are retried, then
//! logged as errors, and never touch the payment record.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::NotificationError;
use crate::mailer::{Mailer, OutgoingMail};

pub const CONFIRMATION_SUBJECT: &str = "Booking Payment Confirmation";

/// A confirmation to deliver for a completed payment
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Confirmation {
    pub email: String,
    pub booking_reference: String,
}

impl Confirmation {
    pub fn new(email: impl Into<String>, booking_reference: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            booking_reference: booking_reference.into(),
        }
    }

    pub fn body(&self) -> String {
        format!(
            "Your payment for booking {} has been successfully completed.",
            self.booking_reference
        )
    }

    /// Render as a mail from `sender`
    pub fn to_mail(&self, sender: &str) -> OutgoingMail {
        OutgoingMail {
            from: sender.to_string(),
            to: self.email.clone(),
            subject: CONFIRMATION_SUBJECT.to_string(),
            body: self.body(),
        }
    }
}

/// Schedules confirmations without waiting for delivery
pub trait Notifier: Send + Sync {
    fn schedule(&self, confirmation: Confirmation) -> Result<(), NotificationError>;
}

/// Dispatcher settings
#[derive(Clone, Debug)]
pub struct DispatcherConfig {
    /// Sender address
    pub from_email: String,

    /// Bounded queue capacity
    pub queue_size: usize,

    /// Send attempts per confirmation (at least one)
    pub max_attempts: u32,

    /// Base delay between attempts; grows linearly
    pub retry_delay: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            from_email: "no-reply@localhost".into(),
            queue_size: 256,
            max_attempts: 3,
            retry_delay: Duration::from_secs(2),
        }
    }
}

/// Delivery counters reported when the worker stops
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub delivered: u64,
    pub failed: u64,
}

/// Queue-backed notifier
#[derive(Clone, Debug)]
pub struct NotificationDispatcher {
    tx: mpsc::Sender<Confirmation>,
}

impl NotificationDispatcher {
    /// Start the worker. Returns the dispatcher and a handle to the worker task.
    pub fn spawn(mailer: Arc<dyn Mailer>, config: DispatcherConfig) -> (Self, DispatcherHandle) {
        let (tx, rx) = mpsc::channel(config.queue_size.max(1));

        let handle = DispatcherHandle {
            task: tokio::spawn(Self::run(mailer, config, rx)),
        };

        (Self { tx }, handle)
    }

    async fn run(
        mailer: Arc<dyn Mailer>,
        config: DispatcherConfig,
        mut rx: mpsc::Receiver<Confirmation>,
    ) -> DispatchStats {
        let mut stats = DispatchStats::default();

        while let Some(confirmation) = rx.recv().await {
            match deliver(mailer.as_ref(), &config, &confirmation).await {
                Ok(attempts) => {
                    stats.delivered += 1;
                    tracing::info!(
                        booking_reference = %confirmation.booking_reference,
                        email = %confirmation.email,
                        attempts,
                        "Sent payment confirmation"
                    );
                }
                Err(e) => {
                    stats.failed += 1;
                    tracing::error!(
                        booking_reference = %confirmation.booking_reference,
                        email = %confirmation.email,
                        error = %e,
                        "Payment confirmation could not be delivered"
                    );
                }
            }
        }

        stats
    }
}

async fn deliver(
    mailer: &dyn Mailer,
    config: &DispatcherConfig,
    confirmation: &Confirmation,
) -> Result<u32, NotificationError> {
    let mail = confirmation.to_mail(&config.from_email);
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match mailer.send(&mail).await {
            Ok(()) => return Ok(attempt),
            // Bad addresses will not get better on retry
            Err(e @ NotificationError::InvalidAddress(_)) => return Err(e),
            Err(e) if attempt >= max_attempts => return Err(e),
            Err(e) => {
                tracing::warn!(
                    booking_reference = %confirmation.booking_reference,
                    attempt,
                    error = %e,
                    "Confirmation send failed, retrying"
                );
                tokio::time::sleep(backoff(config.retry_delay, attempt)).await;
                attempt += 1;
            }
        }
    }
}

/// Linear backoff, clamped at `Duration::MAX`
fn backoff(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(attempt)
}

impl Notifier for NotificationDispatcher {
    fn schedule(&self, confirmation: Confirmation) -> Result<(), NotificationError> {
        self.tx.try_send(confirmation).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => NotificationError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => NotificationError::QueueClosed,
        })
    }
}

/// Handle for the background notification worker
pub struct DispatcherHandle {
    task: JoinHandle<DispatchStats>,
}

impl DispatcherHandle {
    /// Wait for the worker to drain the queue. Every dispatcher clone must be
    /// dropped first, otherwise this waits forever.
    pub async fn shutdown(self) -> DispatchStats {
        match self.task.await {
            Ok(stats) => stats,
            Err(e) => {
                tracing::error!(error = %e, "Notification worker panicked");
                DispatchStats::default()
            }
        }
    }
}
