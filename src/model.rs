use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unix milliseconds, the timestamp type for every stored record.
pub type Ms = i64;

/// Money in minor currency units (paise for INR).
pub type Amount = i64;

/// Up-front advance charged at checkout, as a percentage of the monthly price.
pub const ADVANCE_PERCENT: Amount = 20;

/// Security deposit, in months of rent.
pub const SECURITY_DEPOSIT_MONTHS: Amount = 1;

pub fn now_ms() -> Ms {
    chrono::Utc::now().timestamp_millis()
}

// ── Properties ───────────────────────────────────────────────────

/// Which availability partition a property document lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Partition {
    Available,
    Unavailable,
}

impl Partition {
    pub fn for_flag(is_available: bool) -> Self {
        if is_available {
            Partition::Available
        } else {
            Partition::Unavailable
        }
    }

    /// Collection segment name under `Properties/{ownerId}`.
    pub fn as_str(self) -> &'static str {
        match self {
            Partition::Available => "Available",
            Partition::Unavailable => "Unavailable",
        }
    }

    pub fn flipped(self) -> Self {
        match self {
            Partition::Available => Partition::Unavailable,
            Partition::Unavailable => Partition::Available,
        }
    }

    pub fn is_available(self) -> bool {
        self == Partition::Available
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Property {
    pub id: String,
    /// Owner e-mail; also the `Properties/{ownerId}` key.
    pub owner_id: String,
    pub owner_name: String,
    pub owner_phone: String,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub price: Amount,
    pub address: String,
    pub location: String,
    pub description: String,
    pub bedrooms: u32,
    pub bathrooms: u32,
    pub latitude: f64,
    pub longitude: f64,
    pub images: Vec<String>,
    pub videos: Vec<String>,
    pub is_available: bool,
    pub is_bookmarked: bool,
    pub created_at: Ms,
    pub updated_at: Ms,
}

impl Property {
    /// Location shown on cards: the locality if set, else the street address.
    pub fn display_location(&self) -> &str {
        if self.location.is_empty() {
            &self.address
        } else {
            &self.location
        }
    }

    pub fn partition(&self) -> Partition {
        Partition::for_flag(self.is_available)
    }
}

// ── Bookings ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    /// Created, advance not yet paid.
    #[default]
    Pending,
    /// Advance paid, waiting for the owner.
    Confirmed,
    Approved,
    Rejected,
    Cancelled,
    Active,
    Completed,
}

impl BookingStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Approved => "approved",
            BookingStatus::Rejected => "rejected",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Active => "active",
            BookingStatus::Completed => "completed",
        }
    }

    /// Edges of the status lattice. Statuses only move forward.
    pub fn can_become(self, next: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed)
                | (Confirmed, Approved)
                | (Confirmed, Rejected)
                | (Approved, Active)
                | (Active, Completed)
                | (Pending | Confirmed | Approved | Active, Cancelled)
        )
    }

    /// The property sits in the Unavailable partition while the booking is in this status.
    pub fn holds_property(self) -> bool {
        matches!(self, BookingStatus::Approved | BookingStatus::Active)
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            BookingStatus::Rejected | BookingStatus::Cancelled | BookingStatus::Completed
        )
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stay lengths offered by the booking form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StayDuration {
    OneMonth,
    SixMonths,
    TwelveMonths,
}

impl StayDuration {
    pub fn months(self) -> u32 {
        match self {
            StayDuration::OneMonth => 1,
            StayDuration::SixMonths => 6,
            StayDuration::TwelveMonths => 12,
        }
    }
}

impl TryFrom<u32> for StayDuration {
    type Error = u32;

    fn try_from(months: u32) -> Result<Self, u32> {
        match months {
            1 => Ok(StayDuration::OneMonth),
            6 => Ok(StayDuration::SixMonths),
            12 => Ok(StayDuration::TwelveMonths),
            other => Err(other),
        }
    }
}

/// `start + months`, clamped to the last day of the target month.
pub fn add_months(start: NaiveDate, months: u32) -> Option<NaiveDate> {
    start.checked_add_months(Months::new(months))
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Booking {
    pub id: String,
    pub tenant_email: String,
    pub tenant_name: String,
    pub tenant_phone: String,
    pub owner_email: String,
    pub owner_name: String,
    pub owner_phone: String,
    pub property_id: String,
    pub property_title: String,
    pub property_location: String,
    pub property_price: Amount,
    pub booking_status: BookingStatus,
    pub payment_id: String,
    pub payment_signature: String,
    pub gateway_order_id: String,
    pub amount_paid: Amount,
    pub total_amount: Amount,
    pub security_deposit: Amount,
    pub refund_amount: Amount,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub duration_months: u32,
    pub number_of_occupants: u32,
    pub special_notes: String,
    pub cancellation_reason: String,
    pub rejection_reason: String,
    pub created_at: Ms,
    pub updated_at: Ms,
    pub payment_date: Option<Ms>,
    pub approved_at: Option<Ms>,
    pub rejected_at: Option<Ms>,
}

impl Booking {
    pub fn calculate_total_amount(&self) -> Amount {
        self.property_price * Amount::from(self.duration_months)
    }

    pub fn advance_amount(&self) -> Amount {
        self.property_price * ADVANCE_PERCENT / 100
    }

    pub fn calculate_security_deposit(&self) -> Amount {
        self.property_price * SECURITY_DEPOSIT_MONTHS
    }

    /// What the tenant still owes after the advance.
    pub fn balance_due(&self) -> Amount {
        (self.total_amount - self.amount_paid).max(0)
    }

    pub fn status(&self) -> BookingStatus {
        self.booking_status
    }
}

/// Copy of a booking kept under `tenants/{email}/bookings`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TenantBookingIndex {
    pub booking_id: String,
    pub property_title: String,
    pub property_location: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub status: BookingStatus,
    pub amount_paid: Amount,
    pub created_at: Ms,
}

impl From<&Booking> for TenantBookingIndex {
    fn from(b: &Booking) -> Self {
        Self {
            booking_id: b.id.clone(),
            property_title: b.property_title.clone(),
            property_location: b.property_location.clone(),
            start_date: b.start_date,
            end_date: b.end_date,
            status: b.booking_status,
            amount_paid: b.amount_paid,
            created_at: b.created_at,
        }
    }
}

/// Copy of a booking kept under `owner_properties/{owner}/properties/{pid}/bookings`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OwnerBookingIndex {
    pub booking_id: String,
    pub tenant_name: String,
    pub tenant_email: String,
    pub tenant_phone: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub status: BookingStatus,
    pub amount_paid: Amount,
    pub number_of_occupants: u32,
    pub created_at: Ms,
}

impl From<&Booking> for OwnerBookingIndex {
    fn from(b: &Booking) -> Self {
        Self {
            booking_id: b.id.clone(),
            tenant_name: b.tenant_name.clone(),
            tenant_email: b.tenant_email.clone(),
            tenant_phone: b.tenant_phone.clone(),
            start_date: b.start_date,
            end_date: b.end_date,
            status: b.booking_status,
            amount_paid: b.amount_paid,
            number_of_occupants: b.number_of_occupants,
            created_at: b.created_at,
        }
    }
}

// ── Chat ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SenderRole {
    #[default]
    Tenant,
    Owner,
    System,
}

impl SenderRole {
    /// The participant whose unread counter a message from `self` bumps.
    pub fn counterpart(self) -> Option<SenderRole> {
        match self {
            SenderRole::Tenant => Some(SenderRole::Owner),
            SenderRole::Owner => Some(SenderRole::Tenant),
            SenderRole::System => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    #[default]
    Text,
    PropertyLink,
    System,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Chat {
    pub id: String,
    pub tenant_email: String,
    pub tenant_name: String,
    pub owner_email: String,
    pub owner_name: String,
    pub property_id: String,
    pub property_title: String,
    pub property_location: String,
    pub last_message: String,
    pub last_message_timestamp: Ms,
    pub last_message_sender: SenderRole,
    pub unread_count_tenant: u32,
    pub unread_count_owner: u32,
    pub created_at: Ms,
    pub updated_at: Ms,
    pub is_active: bool,
}

impl Chat {
    /// `{tenant}_{owner}_{property}` with dots replaced, so e-mails make valid ids.
    pub fn chat_id(tenant_email: &str, owner_email: &str, property_id: &str) -> String {
        format!("{tenant_email}_{owner_email}_{property_id}").replace('.', "_")
    }

    pub fn unread_for(&self, role: SenderRole) -> u32 {
        match role {
            SenderRole::Tenant => self.unread_count_tenant,
            SenderRole::Owner => self.unread_count_owner,
            SenderRole::System => 0,
        }
    }
}

/// Property card attached to `property_link` messages.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PropertyCard {
    pub property_id: String,
    pub property_title: String,
    pub property_location: String,
    pub property_price: Amount,
    pub property_image_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Message {
    pub id: String,
    pub chat_id: String,
    pub sender_email: String,
    pub sender_name: String,
    pub sender_type: SenderRole,
    pub message_text: String,
    pub message_type: MessageKind,
    pub timestamp: Ms,
    pub is_read: bool,
    pub property_data: Option<PropertyCard>,
}

// ── WAL records ──────────────────────────────────────────────────

/// One document write inside a commit. Fields travel as JSON text so the
/// bincode frame stays schema-free.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WriteOp {
    Put { path: String, fields: String },
    Delete { path: String },
}

impl WriteOp {
    pub fn path(&self) -> &str {
        match self {
            WriteOp::Put { path, .. } | WriteOp::Delete { path } => path,
        }
    }
}

/// The WAL record format: one atomic commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    Committed {
        txn_id: Ulid,
        at: Ms,
        writes: Vec<WriteOp>,
    },
}
