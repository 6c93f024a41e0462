use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt::Debug;
use uuid::Uuid;

/// Prefix of client-generated identifiers given to records before the backend assigns the real ones.
pub const TEMPORARY_ID_PREFIX: &str = "temp-";

/// A row-like record the cache can hold.
///
/// The core only ever reads fields to match records against each other and merges two records on optimistic
/// updates. Everything else about the record is opaque to it.
pub trait Record: Debug + Clone + PartialEq + Send + Sync + 'static {
    /// Value of the named field. `None` means the field is absent; absent fields never match anything.
    fn field(&self, name: &str) -> Option<Value>;

    /// Shallow merge: fields of `patch` override fields of `self`, fields missing in `patch` survive.
    fn merged_with(&self, patch: &Self) -> Self;
}

/// Open, attribute-bearing record backed by a JSON object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Entity(Map<String, Value>);

impl Entity {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accepts JSON objects only; any other value is handed back as the error.
    pub fn from_value(value: Value) -> Result<Self, Value> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(other),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name).filter(|v| !v.is_null())
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(name.into(), value.into())
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    /// Stamp the record with a fresh temporary `id`.
    pub fn with_temporary_id(self) -> Self {
        self.with("id", temporary_id())
    }

    pub fn id(&self) -> Option<&Value> {
        self.get("id")
    }

    pub fn has_temporary_id(&self) -> bool {
        self.id().and_then(Value::as_str).is_some_and(is_temporary_id)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl Record for Entity {
    fn field(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }

    fn merged_with(&self, patch: &Self) -> Self {
        let mut merged = self.0.clone();
        merged.extend(patch.0.iter().map(|(k, v)| (k.clone(), v.clone())));
        Self(merged)
    }
}

impl From<Map<String, Value>> for Entity {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl TryFrom<Value> for Entity {
    type Error = Value;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_value(value)
    }
}

pub fn temporary_id() -> String {
    format!("{TEMPORARY_ID_PREFIX}{}", Uuid::now_v7())
}

pub fn is_temporary_id(id: &str) -> bool {
    id.starts_with(TEMPORARY_ID_PREFIX)
}
