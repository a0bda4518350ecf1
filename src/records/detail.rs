//! Detail record validation and decoration

use crate::config::FilterConfig;
use serde_json::Value;
use std::fmt;

/// Quality criteria a detail record must satisfy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailFilter {
    /// Required value of the `type` field
    pub kind: String,

    /// Category id that disqualifies an item
    pub excluded_category: u64,
}

impl From<&FilterConfig> for DetailFilter {
    fn from(config: &FilterConfig) -> Self {
        Self {
            kind: config.kind.clone(),
            excluded_category: config.excluded_category,
        }
    }
}

impl Default for DetailFilter {
    fn default() -> Self {
        Self::from(&FilterConfig::default())
    }
}

/// Why a detail record was not accepted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    NotAnObject,
    WrongKind(Option<String>),
    MissingName,
    ExcludedCategory(u64),
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAnObject => f.write_str("payload is not an object"),
            Self::WrongKind(Some(kind)) => write!(f, "kind '{}' is not the target kind", kind),
            Self::WrongKind(None) => f.write_str("kind is missing"),
            Self::MissingName => f.write_str("name is missing or empty"),
            Self::ExcludedCategory(id) => write!(f, "declares excluded category {}", id),
        }
    }
}

impl DetailFilter {
    /// Checks a detail payload against the filter
    ///
    /// An item is accepted when its `type` equals the target kind, its
    /// `name` is non-empty, and none of its `categories` carries the
    /// excluded id. Category entries that are not objects are ignored.
    pub fn validate(&self, detail: &Value) -> Result<(), Rejection> {
        let object = detail.as_object().ok_or(Rejection::NotAnObject)?;

        match object.get("type").and_then(Value::as_str) {
            Some(kind) if kind == self.kind => {}
            other => return Err(Rejection::WrongKind(other.map(str::to_string))),
        }

        if display_name(detail).is_none() {
            return Err(Rejection::MissingName);
        }

        let excluded = object
            .get("categories")
            .and_then(Value::as_array)
            .map(|categories| {
                categories
                    .iter()
                    .filter_map(|category| category.get("id").and_then(Value::as_u64))
                    .any(|id| id == self.excluded_category)
            })
            .unwrap_or(false);
        if excluded {
            return Err(Rejection::ExcludedCategory(self.excluded_category));
        }

        Ok(())
    }
}

/// Returns the non-empty display name of a detail payload
pub fn display_name(detail: &Value) -> Option<&str> {
    detail
        .get("name")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|name| !name.is_empty())
}

/// Injects the owning id into a record
///
/// Non-object payloads are wrapped so the output line is still an object.
pub fn decorate_with_id(record: Value, id_field: &str, id: u64) -> Value {
    match record {
        Value::Object(mut map) => {
            map.insert(id_field.to_string(), Value::from(id));
            Value::Object(map)
        }
        other => {
            let mut map = serde_json::Map::new();
            map.insert(id_field.to_string(), Value::from(id));
            map.insert("data".to_string(), other);
            Value::Object(map)
        }
    }
}
