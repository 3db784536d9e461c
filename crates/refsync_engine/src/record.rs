//! Catalog records and pages.

use serde_json::Value;

/// One opaque item from the remote catalog.
///
/// Only `id` is interpreted; `payload` is the full remote object and is
/// handed to the sink unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Stable identifier.
    pub id: String,
    /// Full remote object, including the `id` field.
    pub payload: Value,
}

impl Record {
    /// Creates a record from an id and payload.
    pub fn new(id: impl Into<String>, payload: Value) -> Self {
        Self {
            id: id.into(),
            payload,
        }
    }

    /// Builds a record from a remote JSON object.
    ///
    /// Numeric ids are rendered as decimal strings. Returns `None` when the
    /// object carries no usable `id`.
    pub fn from_value(payload: Value) -> Option<Self> {
        let id = match payload.get("id")? {
            Value::String(s) if !s.trim().is_empty() => s.clone(),
            Value::Number(n) => n.to_string(),
            _ => return None,
        };
        Some(Self { id, payload })
    }
}

/// The records returned by one remote fetch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    /// 1-based page index.
    pub index: u32,
    /// Records in remote order.
    pub records: Vec<Record>,
    /// Remote items dropped because they had no usable id.
    pub dropped: usize,
}

impl Page {
    /// Creates a page from records.
    pub fn new(index: u32, records: Vec<Record>) -> Self {
        Self {
            index,
            records,
            dropped: 0,
        }
    }

    /// Creates an empty page.
    pub fn empty(index: u32) -> Self {
        Self::new(index, Vec::new())
    }

    /// Builds a page from raw remote objects, dropping items without an id.
    pub fn from_values(index: u32, values: Vec<Value>) -> Self {
        let total = values.len();
        let records: Vec<Record> = values.into_iter().filter_map(Record::from_value).collect();
        let dropped = total - records.len();
        Self {
            index,
            records,
            dropped,
        }
    }

    /// Returns true if the page holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of records on the page.
    pub fn len(&self) -> usize {
        self.records.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn string_and_numeric_ids() {
        let r = Record::from_value(json!({"id": "abc", "name": "x"})).unwrap();
        assert_eq!(r.id, "abc");
        assert_eq!(r.payload["name"], "x");

        let r = Record::from_value(json!({"id": 42})).unwrap();
        assert_eq!(r.id, "42");
    }

    #[test]
    fn missing_or_unusable_id() {
        assert!(Record::from_value(json!({"name": "no id"})).is_none());
        assert!(Record::from_value(json!({"id": null})).is_none());
        assert!(Record::from_value(json!({"id": ""})).is_none());
        assert!(Record::from_value(json!({"id": [1]})).is_none());
        assert!(Record::from_value(json!("bare string")).is_none());
    }

    #[test]
    fn page_drops_items_without_id() {
        let page = Page::from_values(3, vec![json!({"id": 1}), json!({}), json!({"id": "2"})]);
        assert_eq!(page.index, 3);
        assert_eq!(page.len(), 2);
        assert_eq!(page.dropped, 1);
    }
}
