//! Property catalog: owners list and delist properties, tenants browse what
//! is currently Available.

use std::sync::Arc;

use serde::Deserialize;
use tracing::info;
use ulid::Ulid;

use crate::error::{Error, Result};
use crate::limits::{MAX_MEDIA_ASSETS, MAX_TITLE_LEN};
use crate::model::{now_ms, Amount, Partition, Property};
use crate::session::{Session, UserRole};
use crate::store::{paths, Document, Filter, Store};

/// Owner input for a new listing.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewListing {
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
}

impl NewListing {
    fn validate(&self) -> Result<()> {
        let title = self.title.trim();
        if title.is_empty() || title.len() > MAX_TITLE_LEN {
            return Err(Error::InvalidRequest("title must be 1..=200 bytes".into()));
        }
        if self.price <= 0 {
            return Err(Error::InvalidRequest("price must be positive".into()));
        }
        if self.images.len() + self.videos.len() > MAX_MEDIA_ASSETS {
            return Err(Error::InvalidRequest("too many media assets".into()));
        }
        Ok(())
    }
}

/// Optional narrowing for [`PropertyCatalog::browse_available`].
///
/// Text matching is a case-insensitive substring match. `kind` is the type
/// chip ("All" means no chip); `query` is the search box and matches title,
/// type, location, address or description.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BrowseFilter {
    pub kind: Option<String>,
    pub query: Option<String>,
    pub max_price: Option<Amount>,
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

impl BrowseFilter {
    pub fn matches(&self, p: &Property) -> bool {
        if let Some(kind) = active(&self.kind) {
            if !kind.eq_ignore_ascii_case("all") && !contains_ci(&p.kind, &kind.to_lowercase()) {
                return false;
            }
        }
        if let Some(query) = active(&self.query) {
            let q = query.to_lowercase();
            let hit = [&p.title, &p.kind, &p.location, &p.address, &p.description]
                .iter()
                .any(|field| contains_ci(field, &q));
            if !hit {
                return false;
            }
        }
        self.max_price.is_none_or(|max| p.price <= max)
    }
}

/// A trimmed, non-empty text criterion.
fn active(text: &Option<String>) -> Option<&str> {
    text.as_deref().map(str::trim).filter(|t| !t.is_empty())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AvailabilityStats {
    pub total: usize,
    pub available: usize,
    pub unavailable: usize,
}

/// Decode a partition's documents, pinning `isAvailable` to the partition
/// they were found in.
fn decode_partition(docs: Vec<Document>, part: Partition) -> Result<Vec<Property>> {
    docs.iter()
        .map(|doc| {
            let mut p: Property = doc.decode()?;
            p.is_available = part.is_available();
            Ok::<_, Error>(p)
        })
        .collect()
}

fn newest_first(properties: &mut [Property]) {
    properties.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
}

#[derive(Clone)]
pub struct PropertyCatalog {
    store: Arc<Store>,
}

impl PropertyCatalog {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Publish a listing for the signed-in owner. New listings always start
    /// out Available.
    pub async fn create_listing(&self, session: &Session, listing: NewListing) -> Result<Property> {
        let owner = session.identity()?;
        if owner.role != UserRole::Owner {
            return Err(Error::PreconditionFailed("only owners can list properties".into()));
        }
        listing.validate()?;

        let now = now_ms();
        let property = Property {
            id: Ulid::new().to_string(),
            owner_id: owner.email.clone(),
            owner_name: owner.name.clone(),
            owner_phone: owner.phone.clone(),
            title: listing.title.trim().to_string(),
            kind: listing.kind,
            price: listing.price,
            address: listing.address,
            location: listing.location,
            description: listing.description,
            bedrooms: listing.bedrooms,
            bathrooms: listing.bathrooms,
            latitude: listing.latitude,
            longitude: listing.longitude,
            images: listing.images,
            videos: listing.videos,
            is_available: true,
            is_bookmarked: false,
            created_at: now,
            updated_at: now,
        };
        let path = paths::property(&property.owner_id, Partition::Available, &property.id)?;
        let mut txn = self.store.begin();
        txn.create(&path, crate::store::encode(&property)?)?;
        txn.commit().await?;

        info!("owner {} listed property {}", property.owner_id, property.id);
        Ok(property)
    }

    /// Look a property up in whichever partition holds it.
    pub fn get(&self, owner_id: &str, property_id: &str) -> Result<Property> {
        for part in [Partition::Available, Partition::Unavailable] {
            if let Some(doc) = self.store.get(&paths::property(owner_id, part, property_id)?) {
                let mut p: Property = doc.decode()?;
                p.is_available = part.is_available();
                return Ok(p);
            }
        }
        Err(Error::PropertyNotFound(property_id.to_string()))
    }

    /// Both partitions of the signed-in owner, newest first.
    pub fn list_for_owner(&self, session: &Session) -> Result<Vec<Property>> {
        let owner = session.email()?;
        let mut all = Vec::new();
        for part in [Partition::Available, Partition::Unavailable] {
            let docs = self.store.list(&paths::partition(owner, part)?);
            all.extend(decode_partition(docs, part)?);
        }
        newest_first(&mut all);
        Ok(all)
    }

    /// Every owner's Available listings, newest first.
    pub fn browse_available(&self, filter: &BrowseFilter) -> Result<Vec<Property>> {
        let docs = self
            .store
            .collection_group(Partition::Available.as_str(), &Filter::all());
        let mut found = decode_partition(docs, Partition::Available)?;
        found.retain(|p| filter.matches(p));
        newest_first(&mut found);
        Ok(found)
    }

    /// Remove a listing from whichever partition holds it.
    pub async fn delete_listing(&self, session: &Session, property_id: &str) -> Result<()> {
        let owner = session.email()?;
        self.store
            .run_transaction(|txn| {
                let mut found = false;
                for part in [Partition::Available, Partition::Unavailable] {
                    let path = paths::property(owner, part, property_id)?;
                    if txn.get(&path).is_some() {
                        txn.delete(&path);
                        found = true;
                    }
                }
                if found {
                    Ok(())
                } else {
                    Err(Error::PropertyNotFound(property_id.to_string()))
                }
            })
            .await?;
        info!("owner {owner} removed property {property_id}");
        Ok(())
    }

    pub fn availability_stats(&self, session: &Session) -> Result<AvailabilityStats> {
        let owner = session.email()?;
        let available = self.store.list(&paths::partition(owner, Partition::Available)?).len();
        let unavailable = self
            .store
            .list(&paths::partition(owner, Partition::Unavailable)?)
            .len();
        Ok(AvailabilityStats {
            total: available + unavailable,
            available,
            unavailable,
        })
    }
}
