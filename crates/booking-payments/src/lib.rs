//! # booking-payments
//!
//! Payment initiation and verification for bookings through the Chapa
//! gateway, with confirmation emails sent in the background.
//!
//! ## Flow
//!
//! ```text
//! ┌──────────┐ initiate ┌────────────────┐ initialize ┌─────────┐
//! │  Client  │─────────▶│ PaymentService │───────────▶│  Chapa  │
//! └──────────┘          │  (Pending)     │◀───────────│ checkout│
//!      │                └────────────────┘  id + url  └─────────┘
//!      │ pays on checkout page   │
//!      ▼                         │ verify
//! ┌──────────┐  verify  ┌────────────────┐            ┌─────────┐
//! │ Callback │─────────▶│ PaymentService │───────────▶│  Chapa  │
//! └──────────┘          │Completed/Failed│            └─────────┘
//!                       └────────────────┘
//!                                │ on Completed
//!                                ▼
//!                     ┌──────────────────────┐   ┌────────┐
//!                     │NotificationDispatcher│──▶│ Mailer │
//!                     │  (background queue)  │   └────────┘
//!                     └──────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use booking_payments::*;
//!
//! let gateway = Arc::new(ChapaClient::new(ChapaConfig::new("CHASECK_xxx"))?);
//! let (dispatcher, worker) = NotificationDispatcher::spawn(Arc::new(LogMailer), DispatcherConfig::default());
//! let service = PaymentService::new(
//!     Arc::new(MemoryPaymentStore::new()),
//!     gateway,
//!     Arc::new(dispatcher),
//!     LifecycleConfig::default(),
//! );
//!
//! let initiated = service.initiate(InitiatePayment::new("BR100", dec!(250), "a@x.com")).await?;
//! // Redirect payer to: initiated.payment_url
//!
//! let verification = service.verify("BR100").await?;
//! ```

mod error;
mod gateway;
mod lifecycle;
mod mailer;
mod notification;
mod payment;

pub use error::{NotificationError, PaymentError, Result};
pub use gateway::{ChapaClient, ChapaConfig, Checkout, InitializeRequest, PaymentGateway, VerifiedTransaction};
pub use lifecycle::{InitiatePayment, Initiated, LifecycleConfig, PaymentService, Verification};
pub use mailer::{LogMailer, Mailer, OutgoingMail, SmtpConfig, SmtpMailer};
pub use notification::{
    CONFIRMATION_SUBJECT, Confirmation, DispatchStats, DispatcherConfig, DispatcherHandle,
    NotificationDispatcher, Notifier,
};
pub use payment::{MemoryPaymentStore, Payment, PaymentStatus, PaymentStore};
