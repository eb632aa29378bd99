use chrono::NaiveDate;
use ulid::Ulid;

use crate::error::{Error, Result};
use crate::limits::{MAX_NOTES_LEN, MAX_OCCUPANTS};
use crate::model::{add_months, now_ms, Booking, BookingStatus, Property, StayDuration};
use crate::session::Session;

/// What the tenant entered on the booking form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingRequest {
    pub start_date: NaiveDate,
    pub duration: StayDuration,
    pub occupants: u32,
    pub notes: String,
}

impl BookingRequest {
    /// Parse a raw month count; only 1, 6 and 12 month stays are offered.
    pub fn new(start_date: NaiveDate, months: u32, occupants: u32, notes: &str) -> Result<Self> {
        let duration = StayDuration::try_from(months).map_err(|m| {
            Error::InvalidRequest(format!("unsupported stay of {m} months"))
        })?;
        Ok(Self {
            start_date,
            duration,
            occupants,
            notes: notes.to_string(),
        })
    }
}

/// Assemble a `pending` booking for the signed-in tenant from a property
/// snapshot. Pure: nothing is written.
pub fn build_booking(
    session: &Session,
    property: &Property,
    request: BookingRequest,
    today: NaiveDate,
) -> Result<Booking> {
    let tenant = session.identity()?;

    if property.id.trim().is_empty() {
        return Err(Error::MissingPropertySnapshot("id"));
    }
    if property.owner_id.trim().is_empty() {
        return Err(Error::MissingPropertySnapshot("owner"));
    }
    if property.price <= 0 {
        return Err(Error::MissingPropertySnapshot("price"));
    }

    if request.start_date < today {
        return Err(Error::InvalidRequest(format!(
            "start date {} is in the past",
            request.start_date
        )));
    }
    if request.occupants == 0 || request.occupants > MAX_OCCUPANTS {
        return Err(Error::InvalidRequest(format!(
            "occupants must be between 1 and {MAX_OCCUPANTS}"
        )));
    }
    if request.notes.len() > MAX_NOTES_LEN {
        return Err(Error::InvalidRequest("notes too long".into()));
    }

    let months = request.duration.months();
    let end_date = add_months(request.start_date, months)
        .ok_or_else(|| Error::InvalidRequest("end date out of range".into()))?;

    let now = now_ms();
    let mut booking = Booking {
        id: Ulid::new().to_string(),
        tenant_email: tenant.email.clone(),
        tenant_name: tenant.name.clone(),
        tenant_phone: tenant.phone.clone(),
        owner_email: property.owner_id.clone(),
        owner_name: property.owner_name.clone(),
        owner_phone: property.owner_phone.clone(),
        property_id: property.id.clone(),
        property_title: property.title.clone(),
        property_location: property.display_location().to_string(),
        property_price: property.price,
        booking_status: BookingStatus::Pending,
        start_date: Some(request.start_date),
        end_date: Some(end_date),
        duration_months: months,
        number_of_occupants: request.occupants,
        special_notes: request.notes.trim().to_string(),
        created_at: now,
        updated_at: now,
        ..Default::default()
    };
    booking.total_amount = booking.calculate_total_amount();
    booking.security_deposit = booking.calculate_security_deposit();
    Ok(booking)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::booking::fixtures::{date, property, tenant};

    fn request(start: NaiveDate, months: u32) -> BookingRequest {
        BookingRequest::new(start, months, 2, " quiet tenant ").unwrap()
    }

    #[test]
    fn six_month_stay_from_june() {
        let today = date(2025, 5, 20);
        let b = build_booking(&tenant(), &property("P1"), request(date(2025, 6, 1), 6), today).unwrap();

        assert_eq!(b.end_date, Some(date(2025, 12, 1)));
        assert_eq!(b.total_amount, 60_000);
        assert_eq!(b.security_deposit, 10_000);
        assert_eq!(b.advance_amount(), 2_000);
        assert_eq!(b.booking_status, BookingStatus::Pending);
        assert_eq!(b.tenant_email, "tenant@example.com");
        assert_eq!(b.owner_email, "owner@example.com");
        assert_eq!(b.property_location, "Indiranagar");
        assert_eq!(b.special_notes, "quiet tenant");
        assert!(Ulid::from_string(&b.id).is_ok());
    }

    #[test]
    fn end_date_tracks_duration() {
        let today = date(2025, 1, 1);
        for months in [1, 6, 12] {
            let start = date(2025, 1, 31);
            let b = build_booking(&tenant(), &property("P1"), request(start, months), today).unwrap();
            assert_eq!(b.end_date, add_months(start, months));
            assert_eq!(b.total_amount, b.property_price * months as i64);
        }
    }

    #[test]
    fn start_today_is_allowed_but_yesterday_is_not() {
        let today = date(2025, 6, 1);
        assert!(build_booking(&tenant(), &property("P1"), request(today, 1), today).is_ok());
        let err = build_booking(&tenant(), &property("P1"), request(date(2025, 5, 31), 1), today)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
    }

    #[test]
    fn unsupported_duration() {
        let err = BookingRequest::new(date(2025, 6, 1), 3, 1, "").unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
    }

    #[test]
    fn anonymous_tenant() {
        let err = build_booking(
            &Session::anonymous(),
            &property("P1"),
            request(date(2025, 6, 1), 1),
            date(2025, 6, 1),
        )
        .unwrap_err();
        assert!(matches!(err, Error::NotAuthenticated));
    }

    #[test]
    fn incomplete_property_snapshot() {
        let today = date(2025, 6, 1);
        let mut p = property("P1");
        p.price = 0;
        assert!(matches!(
            build_booking(&tenant(), &p, request(today, 1), today),
            Err(Error::MissingPropertySnapshot("price"))
        ));

        let mut p = property("");
        p.price = 5;
        assert!(matches!(
            build_booking(&tenant(), &p, request(today, 1), today),
            Err(Error::MissingPropertySnapshot("id"))
        ));

        let mut p = property("P1");
        p.owner_id.clear();
        assert!(matches!(
            build_booking(&tenant(), &p, request(today, 1), today),
            Err(Error::MissingPropertySnapshot("owner"))
        ));
    }

    #[test]
    fn occupant_bounds() {
        let today = date(2025, 6, 1);
        let zero = BookingRequest::new(today, 1, 0, "").unwrap();
        assert!(matches!(
            build_booking(&tenant(), &property("P1"), zero, today),
            Err(Error::InvalidRequest(_))
        ));
    }
}
