use std::collections::HashSet;
use std::sync::Arc;

use serde_json::json;
use tracing::debug;

use crate::error::{Error, Result};
use crate::model::{now_ms, Property};
use crate::session::Session;
use crate::store::{encode, paths, Store};

/// Tenant bookmarks, one property snapshot per bookmarked listing.
#[derive(Clone)]
pub struct Bookmarks {
    store: Arc<Store>,
}

impl Bookmarks {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    pub async fn add(&self, session: &Session, property: &Property) -> Result<()> {
        let email = session.email()?;
        if property.id.is_empty() {
            return Err(Error::MissingPropertySnapshot("id"));
        }
        let mut snapshot = property.clone();
        snapshot.is_bookmarked = true;
        let mut fields = encode(&snapshot)?;
        fields.insert("bookmarkedAt".into(), json!(now_ms()));

        self.store.set(&paths::bookmark(email, &property.id)?, fields).await?;
        debug!("{email} bookmarked {}", property.id);
        Ok(())
    }

    pub async fn remove(&self, session: &Session, property_id: &str) -> Result<()> {
        let email = session.email()?;
        self.store.delete(&paths::bookmark(email, property_id)?).await?;
        debug!("{email} removed bookmark {property_id}");
        Ok(())
    }

    pub fn is_bookmarked(&self, session: &Session, property_id: &str) -> Result<bool> {
        Ok(self.store.exists(&paths::bookmark(session.email()?, property_id)?))
    }

    /// Bookmarked snapshots, most recently bookmarked first.
    pub fn list(&self, session: &Session) -> Result<Vec<Property>> {
        let mut docs = self.store.list(&paths::bookmarks(session.email()?)?);
        let at = |d: &crate::store::Document| d.get("bookmarkedAt").and_then(|v| v.as_i64()).unwrap_or(0);
        docs.sort_by(|a, b| at(b).cmp(&at(a)).then_with(|| a.path.cmp(&b.path)));
        docs.iter()
            .map(|d| d.decode::<Property>().map_err(Error::from))
            .collect()
    }

    /// Flip the stored bookmark state. Returns whether the property is now
    /// bookmarked. The store decides, not the caller's possibly stale flag.
    pub async fn toggle(&self, session: &Session, property: &Property) -> Result<bool> {
        if self.is_bookmarked(session, &property.id)? {
            self.remove(session, &property.id).await?;
            Ok(false)
        } else {
            self.add(session, property).await?;
            Ok(true)
        }
    }

    /// Set `is_bookmarked` on each property from one read of the tenant's
    /// bookmarks.
    pub fn mark_states(&self, session: &Session, properties: &mut [Property]) -> Result<()> {
        let docs = self.store.list(&paths::bookmarks(session.email()?)?);
        let saved: HashSet<&str> = docs.iter().map(|d| d.id()).collect();
        for p in properties {
            p.is_bookmarked = saved.contains(p.id.as_str());
        }
        Ok(())
    }
}
