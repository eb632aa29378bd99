use std::sync::Arc;

use tracing::info;

use crate::error::{Error, Result};
use crate::model::{
    now_ms, Amount, Booking, BookingStatus, OwnerBookingIndex, TenantBookingIndex,
};
use crate::store::{paths, Store, Transaction};

/// What the payment gateway handed back for a successful checkout.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaymentReceipt {
    pub payment_id: String,
    pub signature: String,
    pub order_id: String,
    pub amount_paid: Amount,
}

/// Writes bookings together with their tenant-side and owner-side index
/// records.
#[derive(Clone)]
pub struct BookingGateway {
    store: Arc<Store>,
}

fn require_complete(booking: &Booking) -> Result<()> {
    if booking.id.trim().is_empty() {
        return Err(Error::IncompleteBooking("booking id"));
    }
    if booking.tenant_email.trim().is_empty() {
        return Err(Error::IncompleteBooking("tenant e-mail"));
    }
    if booking.owner_email.trim().is_empty() {
        return Err(Error::IncompleteBooking("owner e-mail"));
    }
    if booking.property_id.trim().is_empty() {
        return Err(Error::IncompleteBooking("property id"));
    }
    Ok(())
}

/// Stage the canonical booking and both index records.
pub(crate) fn stage(txn: &mut Transaction<'_>, booking: &Booking) -> Result<()> {
    txn.set_record(&paths::booking(&booking.id)?, booking)?;
    txn.set_record(
        &paths::tenant_booking(&booking.tenant_email, &booking.id)?,
        &TenantBookingIndex::from(booking),
    )?;
    txn.set_record(
        &paths::owner_booking(&booking.owner_email, &booking.property_id, &booking.id)?,
        &OwnerBookingIndex::from(booking),
    )?;
    Ok(())
}

/// Read a booking inside a transaction.
pub(crate) fn load(txn: &mut Transaction<'_>, booking_id: &str) -> Result<Booking> {
    let path = paths::booking(booking_id)?;
    match txn.get(&path) {
        Some(doc) => Ok(doc.decode()?),
        None => Err(Error::BookingNotFound(booking_id.to_string())),
    }
}

impl BookingGateway {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    /// Persist `booking` and its two index records in one commit.
    pub async fn save(&self, booking: &Booking) -> Result<()> {
        require_complete(booking)?;
        let mut txn = self.store.begin();
        stage(&mut txn, booking)?;
        txn.commit().await?;

        metrics::counter!(crate::observability::BOOKINGS_SAVED_TOTAL).increment(1);
        info!(
            "saved booking {} for {} on property {}",
            booking.id, booking.tenant_email, booking.property_id
        );
        Ok(())
    }

    pub async fn get(&self, booking_id: &str) -> Result<Booking> {
        self.store
            .get_as(&paths::booking(booking_id)?)?
            .ok_or_else(|| Error::BookingNotFound(booking_id.to_string()))
    }

    /// Record a successful payment: `pending → confirmed`, stamped with the
    /// gateway's identifiers. Index records follow in the same commit.
    pub async fn update_payment(&self, booking_id: &str, receipt: &PaymentReceipt) -> Result<Booking> {
        let booking = self
            .store
            .run_transaction(|txn| {
                let mut booking = load(txn, booking_id)?;
                if booking.booking_status != BookingStatus::Pending {
                    return Err(Error::PreconditionFailed(format!(
                        "booking {booking_id} is {}, expected pending",
                        booking.booking_status
                    )));
                }
                let now = now_ms();
                booking.booking_status = BookingStatus::Confirmed;
                booking.payment_id = receipt.payment_id.clone();
                booking.payment_signature = receipt.signature.clone();
                booking.gateway_order_id = receipt.order_id.clone();
                booking.amount_paid = receipt.amount_paid;
                booking.payment_date = Some(now);
                booking.updated_at = now;
                stage(txn, &booking)?;
                Ok(booking)
            })
            .await?;
        info!("booking {booking_id} confirmed by payment {}", receipt.payment_id);
        Ok(booking)
    }
}
