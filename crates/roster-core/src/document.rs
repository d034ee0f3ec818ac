//! # Profile Documents
//!
//! A profile is stored as an open-ended JSON object. Field order is part of
//! the contract: a profile read back from the store lists its fields in the
//! order they were first written, so [`Document`] is a `serde_json::Map`
//! built with the `preserve_order` feature.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::identity::ProfileId;

/// Name of the identifier field in the wire representation of a profile.
pub const ID_FIELD: &str = "_id";

/// Name of the field whose value must be unique across all profiles.
pub const NAME_FIELD: &str = "name";

/// An insertion-ordered JSON object.
pub type Document = serde_json::Map<String, Value>;

/// Remove the identifier field from a client-supplied document.
///
/// Returns the removed value, if any, so callers can log it. Order of the
/// remaining fields is preserved.
pub fn strip_id(doc: &mut Document) -> Option<Value> {
    doc.shift_remove(ID_FIELD)
}

/// Merge `patch` into `target` with `$set` semantics.
///
/// Fields present in `patch` overwrite the same field in `target` in place;
/// new fields are appended; fields absent from `patch` are left untouched.
/// The identifier field is never merged.
pub fn merge_fields(target: &mut Document, patch: Document) {
    for (key, value) in patch {
        if key == ID_FIELD {
            continue;
        }
        target.insert(key, value);
    }
}

/// A stored profile: the store-assigned identifier plus the profile fields.
///
/// Serializes as a single flat object with `_id` first:
///
/// ```text
/// {"_id": "5b2c...", "name": "Asha", "age": 21}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(rename = "_id")]
    pub id: ProfileId,
    #[serde(flatten)]
    pub fields: Document,
}

impl Profile {
    /// Build a profile from its identifier and fields.
    ///
    /// Any identifier field inside `fields` is discarded; `id` is authoritative.
    pub fn new(id: ProfileId, mut fields: Document) -> Self {
        strip_id(&mut fields);
        Self { id, fields }
    }

    /// The profile's `name`, when present and a string.
    pub fn name(&self) -> Option<&str> {
        self.fields.get(NAME_FIELD).and_then(Value::as_str)
    }

    /// Look up a single field.
    pub fn get(&self, field: &str) -> Option<&Value> {
        if field == ID_FIELD {
            return None;
        }
        self.fields.get(field)
    }

    /// Flatten into a single document with `_id` first.
    pub fn into_document(self) -> Document {
        let mut doc = Document::with_capacity(self.fields.len() + 1);
        doc.insert(ID_FIELD.to_string(), Value::String(self.id.to_string()));
        for (key, value) in self.fields {
            doc.insert(key, value);
        }
        doc
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn strip_id_removes_identifier_and_keeps_order() {
        let mut d = doc(json!({"name": "Asha", "_id": "x", "age": 20, "city": "Pune"}));
        let removed = strip_id(&mut d);
        assert_eq!(removed, Some(json!("x")));
        let keys: Vec<&str> = d.keys().map(String::as_str).collect();
        assert_eq!(keys, ["name", "age", "city"]);
    }

    #[test]
    fn strip_id_on_document_without_identifier_is_noop() {
        let mut d = doc(json!({"name": "Asha"}));
        assert_eq!(strip_id(&mut d), None);
        assert_eq!(d.len(), 1);
    }

    #[test]
    fn merge_overwrites_in_place_and_appends_new_fields() {
        let mut target = doc(json!({"name": "Asha", "age": 20, "city": "Pune"}));
        merge_fields(&mut target, doc(json!({"age": 21, "email": "a@x.io"})));
        assert_eq!(
            Value::Object(target.clone()),
            json!({"name": "Asha", "age": 21, "city": "Pune", "email": "a@x.io"})
        );
        let keys: Vec<&str> = target.keys().map(String::as_str).collect();
        assert_eq!(keys, ["name", "age", "city", "email"]);
    }

    #[test]
    fn merge_ignores_identifier_field() {
        let mut target = doc(json!({"name": "Asha"}));
        merge_fields(&mut target, doc(json!({"_id": "evil"})));
        assert!(!target.contains_key(ID_FIELD));
    }

    #[test]
    fn profile_serializes_with_id_first() {
        let id = ProfileId::new();
        let profile = Profile::new(id, doc(json!({"name": "Asha", "age": 20})));
        let text = serde_json::to_string(&profile).unwrap();
        assert!(text.starts_with(&format!("{{\"_id\":\"{id}\"")), "got {text}");
        assert_eq!(
            serde_json::to_value(&profile).unwrap(),
            json!({"_id": id.to_string(), "name": "Asha", "age": 20})
        );
    }

    #[test]
    fn profile_deserializes_from_flat_object() {
        let id = ProfileId::new();
        let profile: Profile =
            serde_json::from_value(json!({"_id": id.to_string(), "name": "Asha"})).unwrap();
        assert_eq!(profile.id, id);
        assert_eq!(profile.name(), Some("Asha"));
        assert!(!profile.fields.contains_key(ID_FIELD));
    }

    #[test]
    fn profile_new_discards_embedded_identifier() {
        let profile = Profile::new(ProfileId::new(), doc(json!({"_id": "x", "name": "A"})));
        assert!(profile.get(ID_FIELD).is_none());
        assert_eq!(profile.fields.len(), 1);
    }

    #[test]
    fn into_document_puts_id_first() {
        let id = ProfileId::new();
        let d = Profile::new(id, doc(json!({"name": "A", "age": 3}))).into_document();
        let keys: Vec<&str> = d.keys().map(String::as_str).collect();
        assert_eq!(keys, ["_id", "name", "age"]);
        assert_eq!(d[ID_FIELD], json!(id.to_string()));
    }
}
