use std::fmt;

use crate::limits::{MAX_PATH_DEPTH, MAX_SEGMENT_LEN};

use super::StoreError;

fn validate(path: &str) -> Result<usize, StoreError> {
    let mut depth = 0usize;
    for segment in path.split('/') {
        if segment.is_empty() {
            return Err(StoreError::InvalidPath(format!("empty segment in {path:?}")));
        }
        if segment.len() > MAX_SEGMENT_LEN {
            return Err(StoreError::InvalidPath(format!("segment too long in {path:?}")));
        }
        depth += 1;
    }
    if depth > MAX_PATH_DEPTH {
        return Err(StoreError::LimitExceeded("path too deep"));
    }
    Ok(depth)
}

fn validate_segment(segment: &str) -> Result<(), StoreError> {
    if segment.is_empty() || segment.contains('/') {
        return Err(StoreError::InvalidPath(format!("bad segment {segment:?}")));
    }
    Ok(())
}

/// A collection: an odd number of segments (`chats`, `chats/C1/messages`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CollectionPath(String);

/// A document: an even number of segments (`chats/C1`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocPath(String);

impl CollectionPath {
    /// Top-level collection with a compile-time id.
    pub(super) fn top_level(id: &'static str) -> Self {
        debug_assert!(!id.is_empty() && !id.contains('/'));
        Self(id.to_string())
    }

    pub fn parse(path: &str) -> Result<Self, StoreError> {
        if validate(path)? % 2 == 0 {
            return Err(StoreError::InvalidPath(format!("{path:?} names a document")));
        }
        Ok(Self(path.to_string()))
    }

    pub fn doc(&self, id: &str) -> Result<DocPath, StoreError> {
        validate_segment(id)?;
        DocPath::parse(&format!("{}/{id}", self.0))
    }

    /// Last segment, the collection id used by group queries.
    pub fn id(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl DocPath {
    pub fn parse(path: &str) -> Result<Self, StoreError> {
        if validate(path)? % 2 != 0 {
            return Err(StoreError::InvalidPath(format!("{path:?} names a collection")));
        }
        Ok(Self(path.to_string()))
    }

    pub fn collection(&self, id: &str) -> Result<CollectionPath, StoreError> {
        validate_segment(id)?;
        CollectionPath::parse(&format!("{}/{id}", self.0))
    }

    pub fn parent(&self) -> CollectionPath {
        let (parent, _) = self.0.rsplit_once('/').unwrap_or(("", &self.0));
        CollectionPath(parent.to_string())
    }

    /// Last segment.
    pub fn id(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for DocPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parity_decides_kind() {
        assert!(CollectionPath::parse("chats").is_ok());
        assert!(CollectionPath::parse("chats/C1").is_err());
        assert!(DocPath::parse("chats/C1").is_ok());
        assert!(DocPath::parse("chats/C1/messages").is_err());
    }

    #[test]
    fn empty_segments_rejected() {
        assert!(DocPath::parse("chats//C1").is_err());
        assert!(CollectionPath::parse("").is_err());
        assert!(CollectionPath::parse("chats").unwrap().doc("").is_err());
        assert!(CollectionPath::parse("chats").unwrap().doc("a/b").is_err());
    }

    #[test]
    fn navigation() {
        let chat = CollectionPath::parse("chats").unwrap().doc("C1").unwrap();
        let messages = chat.collection("messages").unwrap();
        let msg = messages.doc("M1").unwrap();
        assert_eq!(msg.as_str(), "chats/C1/messages/M1");
        assert_eq!(msg.parent(), messages);
        assert_eq!(msg.id(), "M1");
        assert_eq!(messages.id(), "messages");
        assert_eq!(chat.parent().as_str(), "chats");
    }

    #[test]
    fn depth_limit() {
        let deep = vec!["a"; MAX_PATH_DEPTH + 2].join("/");
        assert!(matches!(
            DocPath::parse(&deep),
            Err(StoreError::LimitExceeded(_))
        ));
    }
}
