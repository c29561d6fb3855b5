//! Typed records and format conversion.
//!
//! Stored documents are schema-less [`bson::Document`]s. A [`Record`] is a serde type bound
//! to one collection, so callers can read and write a collection through their own structs.
//! [`DocumentExt`] converts documents to and from JSON.

use bson::{Bson, Document, de::deserialize_from_document, ser::serialize_to_document};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Value, from_value, to_value};

use crate::{
    error::{DocumentStoreError, DocumentStoreResult},
    value::OBJECT_ID_KEY,
};

pub trait Record: Serialize + DeserializeOwned + Send + Sync + 'static {
    fn class_name() -> &'static str;
}

pub trait RecordExt: Record {
    fn to_document(&self) -> DocumentStoreResult<Document>;

    fn from_document(document: Document) -> DocumentStoreResult<Self>;
}

impl<R: Record> RecordExt for R {
    fn to_document(&self) -> DocumentStoreResult<Document> {
        Ok(serialize_to_document(self)?)
    }

    fn from_document(document: Document) -> DocumentStoreResult<Self> {
        Ok(deserialize_from_document(document)?)
    }
}

pub trait DocumentExt {
    /// The document's `objectId`, if it has one.
    fn object_id(&self) -> Option<&str>;

    fn to_json(&self) -> DocumentStoreResult<Value>;

    fn from_json(value: Value) -> DocumentStoreResult<Document>;
}

impl DocumentExt for Document {
    fn object_id(&self) -> Option<&str> {
        self.get(OBJECT_ID_KEY).and_then(Bson::as_str)
    }

    fn to_json(&self) -> DocumentStoreResult<Value> {
        Ok(to_value(self)?)
    }

    fn from_json(value: Value) -> DocumentStoreResult<Document> {
        match value {
            Value::Object(_) => Ok(from_value(value)?),
            other => Err(DocumentStoreError::Serialization(format!(
                "expected a JSON object, got {other}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use bson::doc;
    use serde::Deserialize;
    use serde_json::json;

    use super::*;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Item {
        name: String,
        price: i32,
    }

    impl Record for Item {
        fn class_name() -> &'static str {
            "Item"
        }
    }

    #[test]
    fn records_round_trip_through_documents() {
        let item = Item { name: "Box".to_string(), price: 30 };
        let document = item.to_document().unwrap();

        assert_eq!(document, doc! { "name": "Box", "price": 30 });
        assert_eq!(Item::from_document(document).unwrap(), item);
    }

    #[test]
    fn json_objects_convert_to_documents() {
        let document = Document::from_json(json!({ "objectId": "a1", "tags": ["x"] })).unwrap();

        assert_eq!(document.object_id(), Some("a1"));
        assert!(Document::from_json(json!([1, 2])).is_err());
        assert_eq!(document.to_json().unwrap()["tags"], json!(["x"]));
    }
}
