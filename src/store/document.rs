use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use super::{DocPath, StoreError};

pub type Fields = Map<String, Value>;

/// A stored document as of the commit that last wrote it.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub path: DocPath,
    /// Sequence number of the commit that wrote this version.
    pub version: u64,
    pub fields: Fields,
}

impl Document {
    pub fn id(&self) -> &str {
        self.path.id()
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, StoreError> {
        serde_json::from_value(Value::Object(self.fields.clone()))
            .map_err(|e| StoreError::Decode(format!("{}: {e}", self.path)))
    }
}

/// Encode a record as document fields. Only structs/maps make documents.
pub fn encode<T: Serialize>(value: &T) -> Result<Fields, StoreError> {
    match serde_json::to_value(value)? {
        Value::Object(fields) => Ok(fields),
        other => Err(StoreError::Decode(format!(
            "document must be an object, got {other}"
        ))),
    }
}

/// Build a field map from `(name, value)` pairs.
pub fn fields<I, K>(pairs: I) -> Fields
where
    I: IntoIterator<Item = (K, Value)>,
    K: Into<String>,
{
    pairs.into_iter().map(|(k, v)| (k.into(), v)).collect()
}

/// Conjunction of field-equality clauses. The empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    clauses: Vec<(String, Value)>,
}

impl Filter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.clauses.push((field.to_string(), value.into()));
        self
    }

    pub fn matches(&self, fields: &Fields) -> bool {
        self.clauses
            .iter()
            .all(|(field, want)| fields.get(field) == Some(want))
    }
}
