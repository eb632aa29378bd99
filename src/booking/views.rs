use std::sync::Arc;

use crate::error::Result;
use crate::model::{Booking, BookingStatus};
use crate::session::Session;
use crate::store::{paths, Document, Filter, Store, Subscription};

/// The status tabs of the booking lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StatusFilter {
    #[default]
    All,
    /// Paid and waiting for the owner (`confirmed`).
    Pending,
    Approved,
    Rejected,
}

impl StatusFilter {
    pub const TABS: [StatusFilter; 4] = [
        StatusFilter::All,
        StatusFilter::Pending,
        StatusFilter::Approved,
        StatusFilter::Rejected,
    ];

    pub fn matches(self, status: BookingStatus) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Pending => status == BookingStatus::Confirmed,
            StatusFilter::Approved => status == BookingStatus::Approved,
            StatusFilter::Rejected => status == BookingStatus::Rejected,
        }
    }

    pub fn apply<'a>(self, bookings: &'a [Booking]) -> impl Iterator<Item = &'a Booking> + 'a {
        bookings.iter().filter(move |b| self.matches(b.booking_status))
    }
}

/// One list split into every tab at once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookingBuckets {
    pub all: Vec<Booking>,
    pub pending: Vec<Booking>,
    pub approved: Vec<Booking>,
    pub rejected: Vec<Booking>,
}

impl BookingBuckets {
    pub fn new(mut bookings: Vec<Booking>) -> Self {
        sort_newest_first(&mut bookings);
        let mut buckets = BookingBuckets::default();
        for b in &bookings {
            match b.booking_status {
                BookingStatus::Confirmed => buckets.pending.push(b.clone()),
                BookingStatus::Approved => buckets.approved.push(b.clone()),
                BookingStatus::Rejected => buckets.rejected.push(b.clone()),
                _ => {}
            }
        }
        buckets.all = bookings;
        buckets
    }

    pub fn get(&self, filter: StatusFilter) -> &[Booking] {
        match filter {
            StatusFilter::All => &self.all,
            StatusFilter::Pending => &self.pending,
            StatusFilter::Approved => &self.approved,
            StatusFilter::Rejected => &self.rejected,
        }
    }

    pub fn counts(&self) -> [(StatusFilter, usize); 4] {
        StatusFilter::TABS.map(|f| (f, self.get(f).len()))
    }
}

/// Newest first, ties broken by id so the order is stable.
pub fn sort_newest_first(bookings: &mut [Booking]) {
    bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
}

fn decode_all(docs: Vec<Document>) -> Result<Vec<Booking>> {
    Ok(docs
        .iter()
        .map(Document::decode)
        .collect::<Result<Vec<Booking>, _>>()?)
}

/// Read side of the booking collections.
#[derive(Clone)]
pub struct BookingViews {
    store: Arc<Store>,
}

impl BookingViews {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    fn query(&self, filter: Filter) -> Result<Vec<Booking>> {
        let mut bookings = decode_all(self.store.query(&paths::bookings(), &filter))?;
        sort_newest_first(&mut bookings);
        Ok(bookings)
    }

    /// Every booking the signed-in tenant made.
    pub fn list_for_tenant(&self, session: &Session) -> Result<Vec<Booking>> {
        self.query(Filter::all().eq("tenantEmail", session.email()?))
    }

    /// Every booking on the signed-in owner's properties.
    pub fn list_for_owner(&self, session: &Session) -> Result<Vec<Booking>> {
        self.query(Filter::all().eq("ownerEmail", session.email()?))
    }

    /// Paid bookings waiting for the owner's decision.
    pub fn pending_for_owner(&self, session: &Session) -> Result<Vec<Booking>> {
        self.query(
            Filter::all()
                .eq("ownerEmail", session.email()?)
                .eq("bookingStatus", BookingStatus::Confirmed.as_str()),
        )
    }

    /// Live tenant list. Snapshots arrive in id order; pass them through
    /// [`BookingBuckets::new`] or [`sort_newest_first`] for display.
    pub fn watch_for_tenant(&self, session: &Session) -> Result<Subscription<Booking>> {
        let filter = Filter::all().eq("tenantEmail", session.email()?);
        Ok(self.store.subscribe(paths::bookings(), filter))
    }

    pub fn watch_for_owner(&self, session: &Session) -> Result<Subscription<Booking>> {
        let filter = Filter::all().eq("ownerEmail", session.email()?);
        Ok(self.store.subscribe(paths::bookings(), filter))
    }
}
