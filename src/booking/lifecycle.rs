use std::sync::Arc;

use serde_json::json;
use tracing::{info, warn};

use super::gateway::{load, stage};
use crate::error::{Error, Result};
use crate::limits::MAX_REASON_LEN;
use crate::model::{now_ms, Booking, BookingStatus, Partition, Property};
use crate::session::Session;
use crate::store::{paths, Store, Transaction};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Actor {
    Owner,
    OwnerOrTenant,
}

fn authorize(booking: &Booking, email: &str, actor: Actor) -> Result<()> {
    let allowed = match actor {
        Actor::Owner => booking.owner_email == email,
        Actor::OwnerOrTenant => booking.owner_email == email || booking.tenant_email == email,
    };
    if allowed {
        Ok(())
    } else {
        Err(Error::PreconditionFailed(format!(
            "{email} may not change booking {}",
            booking.id
        )))
    }
}

/// Move a property document out of `from` into the opposite partition:
/// read, copy with `isAvailable` flipped, write, delete the source.
pub(crate) fn move_property(
    txn: &mut Transaction<'_>,
    owner_id: &str,
    property_id: &str,
    from: Partition,
) -> Result<Property> {
    let to = from.flipped();
    let source = paths::property(owner_id, from, property_id)?;
    let doc = txn.get(&source).ok_or_else(|| {
        Error::PreconditionFailed(format!("property {property_id} is not {}", from.as_str()))
    })?;
    let mut property: Property = doc.decode()?;
    let now = now_ms();

    let mut fields = doc.fields;
    fields.insert("isAvailable".into(), json!(to.is_available()));
    fields.insert("updatedAt".into(), json!(now));
    txn.set(&paths::property(owner_id, to, property_id)?, fields);
    txn.delete(&source);

    property.is_available = to.is_available();
    property.updated_at = now;
    Ok(property)
}

/// Drives bookings along the status lattice and keeps the property's
/// availability partition in step with it.
#[derive(Clone)]
pub struct Lifecycle {
    store: Arc<Store>,
}

impl Lifecycle {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Owner accepts a paid booking. The booking becomes `approved` and the
    /// property leaves the Available partition in the same commit; if the
    /// property is not Available, neither happens.
    pub async fn approve(&self, session: &Session, booking_id: &str) -> Result<Booking> {
        self.transition(session, booking_id, BookingStatus::Approved, Actor::Owner, "")
            .await
    }

    pub async fn reject(&self, session: &Session, booking_id: &str, reason: &str) -> Result<Booking> {
        self.transition(session, booking_id, BookingStatus::Rejected, Actor::Owner, reason)
            .await
    }

    /// Either party withdraws. A property held by the booking goes back to
    /// Available.
    pub async fn cancel(&self, session: &Session, booking_id: &str, reason: &str) -> Result<Booking> {
        self.transition(
            session,
            booking_id,
            BookingStatus::Cancelled,
            Actor::OwnerOrTenant,
            reason,
        )
        .await
    }

    /// The stay has started.
    pub async fn activate(&self, session: &Session, booking_id: &str) -> Result<Booking> {
        self.transition(session, booking_id, BookingStatus::Active, Actor::Owner, "")
            .await
    }

    /// The stay is over; the property is listed again.
    pub async fn complete(&self, session: &Session, booking_id: &str) -> Result<Booking> {
        self.transition(session, booking_id, BookingStatus::Completed, Actor::Owner, "")
            .await
    }

    /// Owner moves their own listing between partitions by hand.
    pub async fn toggle_availability(
        &self,
        session: &Session,
        property_id: &str,
        currently_available: bool,
    ) -> Result<Property> {
        let owner = session.email()?;
        let from = Partition::for_flag(currently_available);
        let result = self
            .store
            .run_transaction(|txn| move_property(txn, owner, property_id, from))
            .await;

        metrics::counter!(
            crate::observability::TRANSITIONS_TOTAL,
            "transition" => "toggle_availability",
            "status" => crate::observability::status_label(&result)
        )
        .increment(1);
        match &result {
            Ok(p) => info!("property {property_id} moved to {}", p.partition().as_str()),
            Err(e) => warn!("toggle availability of {property_id} failed: {e}"),
        }
        result
    }

    async fn transition(
        &self,
        session: &Session,
        booking_id: &str,
        next: BookingStatus,
        actor: Actor,
        reason: &str,
    ) -> Result<Booking> {
        let email = session.email()?;
        let reason = reason.trim();
        if reason.len() > MAX_REASON_LEN {
            return Err(Error::InvalidRequest("reason too long".into()));
        }

        let result = self
            .store
            .run_transaction(|txn| {
                let mut booking = load(txn, booking_id)?;
                authorize(&booking, email, actor)?;

                let prev = booking.booking_status;
                if !prev.can_become(next) {
                    return Err(Error::PreconditionFailed(format!(
                        "booking {booking_id} is {prev}, cannot become {next}"
                    )));
                }

                let (owner, property_id) = (&booking.owner_email, &booking.property_id);
                match (prev.holds_property(), next.holds_property()) {
                    (false, true) => {
                        move_property(txn, owner, property_id, Partition::Available)?;
                    }
                    (true, false) => {
                        // Already back in Available (or delisted): leave it.
                        let held = paths::property(owner, Partition::Unavailable, property_id)?;
                        if txn.get(&held).is_some() {
                            move_property(txn, owner, property_id, Partition::Unavailable)?;
                        }
                    }
                    _ => {}
                }

                let now = now_ms();
                match next {
                    BookingStatus::Approved => booking.approved_at = Some(now),
                    BookingStatus::Rejected => {
                        booking.rejected_at = Some(now);
                        booking.rejection_reason = reason.to_string();
                        booking.refund_amount = booking.amount_paid;
                    }
                    BookingStatus::Cancelled => {
                        booking.cancellation_reason = reason.to_string();
                        if !prev.holds_property() {
                            booking.refund_amount = booking.amount_paid;
                        }
                    }
                    _ => {}
                }
                booking.booking_status = next;
                booking.updated_at = now;
                stage(txn, &booking)?;
                Ok(booking)
            })
            .await;

        metrics::counter!(
            crate::observability::TRANSITIONS_TOTAL,
            "transition" => next.as_str(),
            "status" => crate::observability::status_label(&result)
        )
        .increment(1);
        match &result {
            Ok(_) => info!("booking {booking_id} is now {next}"),
            Err(e) => warn!("booking {booking_id} could not become {next}: {e}"),
        }
        result
    }
}
