//! Locations of every record the marketplace keeps.
//!
//! ```text
//! Properties/{ownerId}/Available|Unavailable/{propertyId}
//! bookings/{bookingId}
//! tenants/{email}/bookings/{bookingId}
//! owner_properties/{ownerEmail}/properties/{propertyId}/bookings/{bookingId}
//! chats/{chatId}
//! chats/{chatId}/messages/{messageId}
//! bookmarked/{tenantEmail}/properties/{propertyId}
//! ```

use crate::model::Partition;

use super::{CollectionPath, DocPath, StoreError};

fn root(id: &'static str) -> CollectionPath {
    CollectionPath::top_level(id)
}

pub fn partition(owner_id: &str, partition: Partition) -> Result<CollectionPath, StoreError> {
    root("Properties").doc(owner_id)?.collection(partition.as_str())
}

pub fn property(owner_id: &str, part: Partition, property_id: &str) -> Result<DocPath, StoreError> {
    partition(owner_id, part)?.doc(property_id)
}

pub fn bookings() -> CollectionPath {
    root("bookings")
}

pub fn booking(booking_id: &str) -> Result<DocPath, StoreError> {
    bookings().doc(booking_id)
}

pub fn tenant_bookings(tenant_email: &str) -> Result<CollectionPath, StoreError> {
    root("tenants").doc(tenant_email)?.collection("bookings")
}

pub fn tenant_booking(tenant_email: &str, booking_id: &str) -> Result<DocPath, StoreError> {
    tenant_bookings(tenant_email)?.doc(booking_id)
}

pub fn owner_property_bookings(
    owner_email: &str,
    property_id: &str,
) -> Result<CollectionPath, StoreError> {
    root("owner_properties")
        .doc(owner_email)?
        .collection("properties")?
        .doc(property_id)?
        .collection("bookings")
}

pub fn owner_booking(
    owner_email: &str,
    property_id: &str,
    booking_id: &str,
) -> Result<DocPath, StoreError> {
    owner_property_bookings(owner_email, property_id)?.doc(booking_id)
}

pub fn chats() -> CollectionPath {
    root("chats")
}

pub fn chat(chat_id: &str) -> Result<DocPath, StoreError> {
    chats().doc(chat_id)
}

pub fn messages(chat_id: &str) -> Result<CollectionPath, StoreError> {
    chat(chat_id)?.collection("messages")
}

pub fn message(chat_id: &str, message_id: &str) -> Result<DocPath, StoreError> {
    messages(chat_id)?.doc(message_id)
}

pub fn bookmarks(tenant_email: &str) -> Result<CollectionPath, StoreError> {
    root("bookmarked").doc(tenant_email)?.collection("properties")
}

pub fn bookmark(tenant_email: &str, property_id: &str) -> Result<DocPath, StoreError> {
    bookmarks(tenant_email)?.doc(property_id)
}
