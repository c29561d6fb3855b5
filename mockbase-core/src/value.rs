//! Tagged value kinds of the emulated object API.
//!
//! Ordinary field values are plain BSON scalars, arrays and sub-documents. A handful of
//! sub-document shapes carry a `__type` tag and get special treatment from the update,
//! query and include engines:
//!
//! - [`Pointer`] - a weak reference to a document in some collection
//! - [`Relation`] - an owned, sorted, de-duplicated many-to-many edge set
//! - Date - `{ "__type": "Date", "iso": "..." }`, interchangeable with a native `DateTime`
//!
//! Update operations are marked by an `__op` tag instead; see [`crate::operation`].

use std::{borrow::Cow, collections::BTreeSet};

use bson::{Bson, DateTime, Document, doc};
use chrono::{SecondsFormat, Utc};

/// Key holding the kind tag of a typed value.
pub const TYPE_KEY: &str = "__type";
/// Key marking an update operation payload.
pub const OP_KEY: &str = "__op";
/// Key holding the collection name of a pointer, relation or hydrated object.
pub const CLASS_NAME_KEY: &str = "className";
/// Reserved document identifier field.
pub const OBJECT_ID_KEY: &str = "objectId";
/// Reserved creation timestamp field.
pub const CREATED_AT_KEY: &str = "createdAt";
/// Reserved modification timestamp field.
pub const UPDATED_AT_KEY: &str = "updatedAt";

const POINTER_TYPE: &str = "Pointer";
const RELATION_TYPE: &str = "Relation";
const DATE_TYPE: &str = "Date";
const OBJECT_TYPE: &str = "Object";

fn type_tag(value: &Bson) -> Option<&str> {
    value
        .as_document()?
        .get(TYPE_KEY)?
        .as_str()
}

/// Returns `true` if the value is an update operation payload (`{ "__op": ... }`).
pub fn is_op(value: &Bson) -> bool {
    value
        .as_document()
        .is_some_and(|doc| doc.contains_key(OP_KEY))
}

/// Returns `true` if the value is tagged as a pointer.
pub fn is_pointer(value: &Bson) -> bool {
    type_tag(value) == Some(POINTER_TYPE)
}

/// Returns `true` if the value is tagged as a relation.
pub fn is_relation(value: &Bson) -> bool {
    type_tag(value) == Some(RELATION_TYPE)
}

/// Returns `true` if the value is a tagged date. Native `DateTime` values are not tagged.
pub fn is_date(value: &Bson) -> bool {
    type_tag(value) == Some(DATE_TYPE)
}

/// Returns `true` for anything that denotes an instant: a native `DateTime` or a tagged date.
pub fn is_date_like(value: &Bson) -> bool {
    matches!(value, Bson::DateTime(_)) || is_date(value)
}

/// Builds a tagged date value from a native timestamp.
pub fn date(instant: DateTime) -> Bson {
    Bson::Document(doc! {
        TYPE_KEY: DATE_TYPE,
        "iso": instant.to_chrono().to_rfc3339_opts(SecondsFormat::Millis, true),
    })
}

/// Resolves a native `DateTime` or a tagged date to an instant.
///
/// Returns `None` for any other value, including tagged dates whose `iso` does not parse.
pub fn resolve_date(value: &Bson) -> Option<DateTime> {
    match value {
        Bson::DateTime(instant) => Some(*instant),
        _ if is_date(value) => {
            let iso = value.as_document()?.get("iso")?.as_str()?;
            chrono::DateTime::parse_from_rfc3339(iso)
                .ok()
                .map(|parsed| DateTime::from_chrono(parsed.with_timezone(&Utc)))
        }
        _ => None,
    }
}

/// Replaces a tagged date with its native instant; leaves everything else untouched.
pub fn deserialize_query_param(value: &Bson) -> Cow<'_, Bson> {
    if is_date(value) {
        if let Some(instant) = resolve_date(value) {
            return Cow::Owned(Bson::DateTime(instant));
        }
    }

    Cow::Borrowed(value)
}

/// A weak reference to a document: resolved by lookup, never owned.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Pointer {
    pub class_name: String,
    pub object_id: String,
}

impl Pointer {
    pub fn new(class_name: impl Into<String>, object_id: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            object_id: object_id.into(),
        }
    }

    /// Reads a pointer out of any value that names a collection and an object id.
    ///
    /// Accepts tagged pointers as well as hydrated objects, which both carry
    /// `className` and `objectId`.
    pub fn from_bson(value: &Bson) -> Option<Self> {
        let doc = value.as_document()?;

        Some(Self::new(
            doc.get(CLASS_NAME_KEY)?.as_str()?,
            doc.get(OBJECT_ID_KEY)?.as_str()?,
        ))
    }

    pub fn to_bson(&self) -> Bson {
        Bson::Document(doc! {
            TYPE_KEY: POINTER_TYPE,
            CLASS_NAME_KEY: self.class_name.clone(),
            OBJECT_ID_KEY: self.object_id.clone(),
        })
    }
}

impl From<Pointer> for Bson {
    fn from(pointer: Pointer) -> Self {
        pointer.to_bson()
    }
}

/// A many-to-many edge set owned by the document that holds it.
///
/// Member identifiers are kept in a sorted set, so the stored `ids` array is always
/// ascending and free of duplicates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    pub class_name: String,
    pub ids: BTreeSet<String>,
}

impl Relation {
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            ids: BTreeSet::new(),
        }
    }

    pub fn from_bson(value: &Bson) -> Option<Self> {
        if !is_relation(value) {
            return None;
        }

        let doc = value.as_document()?;
        let class_name = doc
            .get(CLASS_NAME_KEY)
            .and_then(Bson::as_str)
            .unwrap_or_default();
        let ids = doc
            .get("ids")
            .and_then(Bson::as_array)
            .map(|ids| {
                ids.iter()
                    .filter_map(Bson::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Some(Self { class_name: class_name.to_string(), ids })
    }

    pub fn contains(&self, object_id: &str) -> bool {
        self.ids.contains(object_id)
    }

    pub fn to_bson(&self) -> Bson {
        Bson::Document(doc! {
            TYPE_KEY: RELATION_TYPE,
            CLASS_NAME_KEY: self.class_name.clone(),
            "ids": self.ids.iter().cloned().map(Bson::String).collect::<Vec<_>>(),
        })
    }
}

impl From<Relation> for Bson {
    fn from(relation: Relation) -> Self {
        relation.to_bson()
    }
}

/// Returns the identifier a value stands for: its `objectId` or `id` field.
pub fn identifier(value: &Bson) -> Option<&str> {
    let doc = value.as_document()?;

    doc.get(OBJECT_ID_KEY)
        .or_else(|| doc.get("id"))
        .and_then(Bson::as_str)
}

/// Wraps a stored document as a hydrated object of the given collection.
pub fn hydrated_object(class_name: &str, stored: Document) -> Document {
    let mut object = doc! {
        TYPE_KEY: OBJECT_TYPE,
        CLASS_NAME_KEY: class_name,
    };

    for (key, value) in stored {
        object.insert(key, value);
    }

    object
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_tagged_values() {
        let pointer = Pointer::new("Brand", "b1").to_bson();
        let relation = Relation::new("Brand").to_bson();
        let op = Bson::Document(doc! { OP_KEY: "Increment", "amount": 1 });

        assert!(is_pointer(&pointer));
        assert!(!is_pointer(&relation));
        assert!(is_relation(&relation));
        assert!(is_op(&op));
        assert!(!is_op(&pointer));
    }

    #[test]
    fn tagged_date_resolves_to_the_same_instant() {
        let now = DateTime::from_millis(1_700_000_000_123);
        let tagged = date(now);

        assert!(is_date(&tagged));
        assert_eq!(resolve_date(&tagged), Some(now));
        assert_eq!(deserialize_query_param(&tagged).into_owned(), Bson::DateTime(now));
    }

    #[test]
    fn relation_ids_are_sorted_and_unique() {
        let raw = Bson::Document(doc! {
            TYPE_KEY: "Relation",
            CLASS_NAME_KEY: "Item",
            "ids": ["c", "a", "b", "a"],
        });

        let relation = Relation::from_bson(&raw).unwrap();
        let ids: Vec<_> = relation.ids.iter().map(String::as_str).collect();

        assert_eq!(ids, vec!["a", "b", "c"]);
        assert!(relation.contains("b"));
    }

    #[test]
    fn hydrated_object_keeps_stored_fields() {
        let object = hydrated_object("Brand", doc! { OBJECT_ID_KEY: "b1", "name": "Acme" });

        assert_eq!(object.get_str(TYPE_KEY).unwrap(), "Object");
        assert_eq!(Pointer::from_bson(&Bson::Document(object)), Some(Pointer::new("Brand", "b1")));
    }
}
