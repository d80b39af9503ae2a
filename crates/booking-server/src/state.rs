//! Application State

use std::sync::Arc;

use booking_payments::PaymentService;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Payment lifecycle controller
    pub payments: Arc<PaymentService>,
}

impl AppState {
    pub fn new(payments: PaymentService) -> Self {
        Self {
            payments: Arc::new(payments),
        }
    }
}
