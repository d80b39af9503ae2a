//! Payment Records
//!
//! The payment entity, its status lifecycle, and the record store keyed by
//! booking reference.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

use crate::error::{PaymentError, Result};

/// Payment status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
}

impl PaymentStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Completed => "Completed",
            Self::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A payment for one booking
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Payment {
    /// Record id
    pub id: Uuid,

    /// Caller-supplied booking reference, unique per payment
    pub booking_reference: String,

    /// Amount charged
    pub amount: Decimal,

    /// Recipient for the confirmation email
    pub email: String,

    /// Lifecycle status
    pub status: PaymentStatus,

    /// Gateway-assigned transaction id (None until initiation succeeds)
    pub transaction_id: Option<String>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last mutation timestamp
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    /// Create a new payment. Payments always start out `Pending`.
    pub fn pending(booking_reference: impl Into<String>, amount: Decimal, email: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            booking_reference: booking_reference.into(),
            amount,
            email: email.into(),
            status: PaymentStatus::Pending,
            transaction_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Attach the gateway transaction id. It can only be assigned once.
    pub fn attach_transaction(&mut self, transaction_id: impl Into<String>) -> Result<()> {
        if self.transaction_id.is_some() {
            return Err(PaymentError::Validation(format!(
                "transaction id already assigned for {}",
                self.booking_reference
            )));
        }
        self.transaction_id = Some(transaction_id.into());
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Mark the payment completed. Returns whether the status changed.
    pub fn mark_completed(&mut self) -> bool {
        self.set_status(PaymentStatus::Completed)
    }

    /// Mark the payment failed. Returns whether the status changed.
    pub fn mark_failed(&mut self) -> bool {
        self.set_status(PaymentStatus::Failed)
    }

    fn set_status(&mut self, status: PaymentStatus) -> bool {
        if self.status == status {
            return false;
        }
        self.status = status;
        self.updated_at = Utc::now();
        true
    }
}

/// Payment storage trait
pub trait PaymentStore: Send + Sync {
    /// Insert a new payment; fails if the booking reference is taken
    fn create(&self, payment: &Payment) -> Result<()>;

    /// Get payment by booking reference
    fn get(&self, booking_reference: &str) -> Result<Option<Payment>>;

    /// Overwrite an existing payment, matched by booking reference
    fn update(&self, payment: &Payment) -> Result<()>;
}

/// In-memory payment store (for development and tests)
pub struct MemoryPaymentStore {
    payments: RwLock<HashMap<String, Payment>>,
}

impl Default for MemoryPaymentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryPaymentStore {
    pub fn new() -> Self {
        Self {
            payments: RwLock::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.payments.read().map_or(0, |p| p.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned<T>(_: T) -> PaymentError {
    PaymentError::Storage("payment store lock poisoned".into())
}

impl PaymentStore for MemoryPaymentStore {
    fn create(&self, payment: &Payment) -> Result<()> {
        let mut payments = self.payments.write().map_err(poisoned)?;

        if payments.contains_key(&payment.booking_reference) {
            return Err(PaymentError::DuplicateReference(payment.booking_reference.clone()));
        }

        payments.insert(payment.booking_reference.clone(), payment.clone());
        Ok(())
    }

    fn get(&self, booking_reference: &str) -> Result<Option<Payment>> {
        let payments = self.payments.read().map_err(poisoned)?;
        Ok(payments.get(booking_reference).cloned())
    }

    fn update(&self, payment: &Payment) -> Result<()> {
        let mut payments = self.payments.write().map_err(poisoned)?;

        match payments.get_mut(&payment.booking_reference) {
            Some(existing) => {
                *existing = payment.clone();
                Ok(())
            }
            None => Err(PaymentError::NotFound(payment.booking_reference.clone())),
        }
    }
}
