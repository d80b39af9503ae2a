//! Payment Lifecycle
//!
//! Drives a booking's payment through `Pending -> Completed | Failed`:
//!
//! ```text
//! initiate ──▶ Pending ──verify (gateway "success")──▶ Completed ──▶ confirmation queued
//!                  │
//!                  └────verify (any other status)────▶ Failed
//! ```
//!
//! Re-verifying a settled payment queries the gateway again and records
//! whatever it reports. Both operations hold a per-reference lock for their
//! whole read-modify-write, so concurrent calls for one booking run one at a
//! time.

use reqwest::Url;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::error::{PaymentError, Result};
use crate::gateway::{InitializeRequest, PaymentGateway};
use crate::notification::{Confirmation, Notifier};
use crate::payment::{Payment, PaymentStatus, PaymentStore};

/// Controller settings
#[derive(Clone, Debug)]
pub struct LifecycleConfig {
    /// Currency sent on every initialize
    pub currency: String,

    /// Public base URL the gateway calls back into
    pub callback_base_url: String,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            currency: "ETB".into(),
            callback_base_url: "http://localhost:8000".into(),
        }
    }
}

impl LifecycleConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let config = Self {
            currency: std::env::var("CHAPA_CURRENCY").unwrap_or(defaults.currency),
            callback_base_url: std::env::var("CALLBACK_BASE_URL").unwrap_or(defaults.callback_base_url),
        };

        // Fail at start-up rather than on the first payment
        config.callback_url("BR0")?;
        Ok(config)
    }

    /// Verification URL for a booking, with the reference path-encoded
    pub fn callback_url(&self, booking_reference: &str) -> Result<String> {
        let mut url = Url::parse(&self.callback_base_url)
            .map_err(|e| PaymentError::Config(format!("CALLBACK_BASE_URL: {e}")))?;

        url.path_segments_mut()
            .map_err(|()| PaymentError::Config("CALLBACK_BASE_URL cannot be a base".into()))?
            .pop_if_empty()
            .extend(["payments", "verify", booking_reference]);

        Ok(url.into())
    }
}

/// Initiation input; every field is required
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct InitiatePayment {
    #[serde(default)]
    pub booking_reference: Option<String>,
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub email: Option<String>,
}

impl InitiatePayment {
    pub fn new(booking_reference: impl Into<String>, amount: Decimal, email: impl Into<String>) -> Self {
        Self {
            booking_reference: Some(booking_reference.into()),
            amount: Some(amount),
            email: Some(email.into()),
        }
    }

    fn validate(self) -> Result<(String, Decimal, String)> {
        let present = |s: Option<String>| s.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());

        let booking_reference = present(self.booking_reference);
        let email = present(self.email);

        let mut missing = Vec::new();
        if booking_reference.is_none() {
            missing.push("booking_reference");
        }
        if self.amount.is_none() {
            missing.push("amount");
        }
        if email.is_none() {
            missing.push("email");
        }

        match (booking_reference, self.amount, email) {
            (Some(reference), Some(amount), Some(email)) => {
                if amount <= Decimal::ZERO {
                    return Err(PaymentError::Validation("amount must be positive".into()));
                }
                Ok((reference, amount, email))
            }
            _ => Err(PaymentError::Validation(format!(
                "Missing required fields: {}",
                missing.join(", ")
            ))),
        }
    }
}

/// Successful initiation
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Initiated {
    pub booking_reference: String,
    pub transaction_id: String,
    pub payment_url: String,
}

/// Result of a verification
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Verification {
    /// Status recorded after the gateway check
    pub status: PaymentStatus,

    /// Whether a confirmation was queued
    pub notified: bool,
}

impl Verification {
    pub const fn message(&self) -> &'static str {
        match self.status {
            PaymentStatus::Completed => "Payment completed successfully",
            _ => "Payment failed",
        }
    }
}

/// Per-booking-reference async locks
#[derive(Default)]
struct ReferenceLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl ReferenceLocks {
    /// Register interest in a reference. The table entry lives until the last
    /// handle for it is dropped, including handles of cancelled calls.
    fn entry(&self, reference: &str) -> Result<LockEntry<'_>> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|_| PaymentError::Storage("reference lock table poisoned".into()))?;
        let mutex = locks.entry(reference.to_string()).or_default().clone();

        Ok(LockEntry {
            table: self,
            reference: reference.to_string(),
            mutex,
        })
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.lock().map_or(0, |l| l.len())
    }
}

/// Handle on one reference's lock
struct LockEntry<'a> {
    table: &'a ReferenceLocks,
    reference: String,
    mutex: Arc<tokio::sync::Mutex<()>>,
}

impl LockEntry<'_> {
    async fn lock(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.mutex.lock().await
    }
}

impl Drop for LockEntry<'_> {
    fn drop(&mut self) {
        if let Ok(mut locks) = self.table.locks.lock() {
            // One count for the table, one for this handle
            if Arc::strong_count(&self.mutex) <= 2 {
                locks.remove(&self.reference);
            }
        }
    }
}

/// Payment lifecycle controller
pub struct PaymentService {
    store: Arc<dyn PaymentStore>,
    gateway: Arc<dyn PaymentGateway>,
    notifier: Arc<dyn Notifier>,
    config: LifecycleConfig,
    locks: ReferenceLocks,
}

impl PaymentService {
    pub fn new(
        store: Arc<dyn PaymentStore>,
        gateway: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn Notifier>,
        config: LifecycleConfig,
    ) -> Self {
        Self {
            store,
            gateway,
            notifier,
            config,
            locks: ReferenceLocks::default(),
        }
    }

    pub fn gateway_name(&self) -> &str {
        self.gateway.name()
    }

    /// Create a pending payment and open a checkout with the gateway.
    ///
    /// The pending record is kept even if the gateway call fails.
    pub async fn initiate(&self, request: InitiatePayment) -> Result<Initiated> {
        let (booking_reference, amount, email) = request.validate()?;
        let callback_url = self.config.callback_url(&booking_reference)?;

        let entry = self.locks.entry(&booking_reference)?;
        let _guard = entry.lock().await;
        self.initiate_locked(booking_reference, amount, email, callback_url)
            .await
    }

    async fn initiate_locked(
        &self,
        booking_reference: String,
        amount: Decimal,
        email: String,
        callback_url: String,
    ) -> Result<Initiated> {
        let mut payment = Payment::pending(booking_reference, amount, email);
        self.store.create(&payment)?;

        tracing::info!(
            booking_reference = %payment.booking_reference,
            amount = %payment.amount,
            "Created pending payment"
        );

        let request = InitializeRequest {
            amount: payment.amount,
            currency: self.config.currency.clone(),
            email: payment.email.clone(),
            tx_ref: payment.booking_reference.clone(),
            callback_url,
        };

        let checkout = match self.gateway.initialize(&request).await {
            Ok(checkout) => checkout,
            Err(e) => {
                tracing::warn!(
                    booking_reference = %payment.booking_reference,
                    gateway = self.gateway.name(),
                    error = %e,
                    "Payment initiation failed; payment left pending"
                );
                return Err(e);
            }
        };

        payment.attach_transaction(checkout.id.clone())?;
        self.store.update(&payment)?;

        tracing::info!(
            booking_reference = %payment.booking_reference,
            transaction_id = %checkout.id,
            "Payment initiated"
        );

        Ok(Initiated {
            booking_reference: payment.booking_reference,
            transaction_id: checkout.id,
            payment_url: checkout.checkout_url,
        })
    }

    /// Ask the gateway for the transaction's status and record the outcome.
    ///
    /// A confirmation is queued on every success answer, including repeat
    /// verifies of a payment that is already `Completed`. Failure to queue it
    /// is logged and does not affect the recorded status.
    pub async fn verify(&self, booking_reference: &str) -> Result<Verification> {
        let entry = self.locks.entry(booking_reference)?;
        let _guard = entry.lock().await;
        self.verify_locked(booking_reference).await
    }

    async fn verify_locked(&self, booking_reference: &str) -> Result<Verification> {
        let mut payment = self
            .store
            .get(booking_reference)?
            .ok_or_else(|| PaymentError::NotFound(booking_reference.to_string()))?;

        let transaction_id = payment
            .transaction_id
            .clone()
            .ok_or_else(|| PaymentError::NotInitiated(booking_reference.to_string()))?;

        let verified = match self.gateway.verify(&transaction_id).await {
            Ok(verified) => verified,
            Err(e) => {
                tracing::warn!(
                    %booking_reference,
                    %transaction_id,
                    error = %e,
                    "Payment verification failed; status unchanged"
                );
                return Err(e);
            }
        };

        let previous = payment.status;
        let changed = if verified.is_success() {
            payment.mark_completed()
        } else {
            payment.mark_failed()
        };

        if changed {
            self.store.update(&payment)?;
        }

        tracing::info!(
            %booking_reference,
            %transaction_id,
            gateway_status = %verified.status,
            from = %previous,
            to = %payment.status,
            "Payment verified"
        );

        let mut notified = false;
        if verified.is_success() {
            let confirmation = Confirmation::new(payment.email.clone(), payment.booking_reference.clone());
            match self.notifier.schedule(confirmation) {
                Ok(()) => notified = true,
                Err(e) => tracing::error!(
                    %booking_reference,
                    error = %e,
                    "Could not queue payment confirmation"
                ),
            }
        }

        Ok(Verification {
            status: payment.status,
            notified,
        })
    }
}
