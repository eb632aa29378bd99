use serde::Serialize;
use tracing::{info, warn};

use super::gateway::{BookingGateway, PaymentReceipt};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::{Amount, Booking};

/// Parameters for opening the hosted checkout. Serialises to the options
/// object the checkout widget expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutRequest {
    pub key: String,
    pub name: String,
    pub description: String,
    /// Minor currency units.
    pub amount: Amount,
    pub currency: String,
    pub prefill: Prefill,
    pub notes: CheckoutNotes,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Prefill {
    pub email: String,
    pub contact: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutNotes {
    pub booking_id: String,
    pub property_id: String,
}

impl CheckoutRequest {
    /// Charge the advance for `booking`.
    pub fn for_booking(booking: &Booking, config: &Config) -> Self {
        Self {
            key: config.payment_key_id.clone(),
            name: config.merchant_name.clone(),
            description: format!("Advance for {}", booking.property_title),
            amount: booking.advance_amount(),
            currency: config.currency.clone(),
            prefill: Prefill {
                email: booking.tenant_email.clone(),
                contact: booking.tenant_phone.clone(),
            },
            notes: CheckoutNotes {
                booking_id: booking.id.clone(),
                property_id: booking.property_id.clone(),
            },
        }
    }
}

/// Callback from the payment gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentOutcome {
    Success {
        payment_id: Option<String>,
        signature: Option<String>,
        order_id: Option<String>,
    },
    Failure {
        code: i32,
        message: String,
    },
}

impl PaymentOutcome {
    pub fn success(payment_id: &str) -> Self {
        PaymentOutcome::Success {
            payment_id: Some(payment_id.to_string()),
            signature: None,
            order_id: None,
        }
    }
}

/// Tells the caller to move on to the confirmed booking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentConfirmation {
    pub payment_id: String,
    pub booking: Booking,
}

pub struct PaymentHandler {
    gateway: BookingGateway,
}

impl PaymentHandler {
    pub fn new(gateway: BookingGateway) -> Self {
        Self { gateway }
    }

    /// Reconcile a gateway callback with `booking`. Failures leave the
    /// booking as it was; the tenant starts a new checkout to retry.
    pub async fn handle(&self, booking: &Booking, outcome: PaymentOutcome) -> Result<PaymentConfirmation> {
        let (payment_id, signature, order_id) = match outcome {
            PaymentOutcome::Success {
                payment_id: Some(id),
                signature,
                order_id,
            } if !id.is_empty() => (id, signature, order_id),
            PaymentOutcome::Success { .. } => {
                metrics::counter!(crate::observability::PAYMENTS_TOTAL, "outcome" => "missing_id")
                    .increment(1);
                warn!("payment for booking {} succeeded without an id", booking.id);
                return Err(Error::PaymentIdMissing);
            }
            PaymentOutcome::Failure { code, message } => {
                metrics::counter!(crate::observability::PAYMENTS_TOTAL, "outcome" => "failed")
                    .increment(1);
                warn!("payment for booking {} failed ({code}): {message}", booking.id);
                return Err(Error::PaymentFailed { code, message });
            }
        };

        let receipt = PaymentReceipt {
            payment_id: payment_id.clone(),
            signature: signature.unwrap_or_default(),
            order_id: order_id.unwrap_or_default(),
            amount_paid: booking.advance_amount(),
        };
        let confirmed = self.gateway.update_payment(&booking.id, &receipt).await?;

        metrics::counter!(crate::observability::PAYMENTS_TOTAL, "outcome" => "confirmed").increment(1);
        info!("payment {payment_id} applied to booking {}", booking.id);
        Ok(PaymentConfirmation {
            payment_id,
            booking: confirmed,
        })
    }
}
