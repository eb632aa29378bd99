//! Booking subsystem: construction, persistence, payment reconciliation,
//! the status/availability state machine and the read-side views.

pub mod builder;
pub mod gateway;
pub mod lifecycle;
pub mod payment;
pub mod views;

pub use builder::{build_booking, BookingRequest};
pub use gateway::{BookingGateway, PaymentReceipt};
pub use lifecycle::Lifecycle;
pub use payment::{CheckoutRequest, PaymentConfirmation, PaymentHandler, PaymentOutcome};
pub use views::{BookingBuckets, BookingViews, StatusFilter};
