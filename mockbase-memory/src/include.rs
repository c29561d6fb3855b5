//! Pointer hydration along include paths.

use bson::{Bson, Document};
use tracing::trace;

use mockbase_core::value::{Pointer, hydrated_object};

use crate::store::StoreMap;

fn fetch(store: &StoreMap, pointer: &Pointer) -> Option<Document> {
    store
        .get(&pointer.class_name)?
        .get(&pointer.object_id)
        .map(|stored| hydrated_object(&pointer.class_name, stored.clone()))
}

/// Replaces the pointer (or each pointer of the array) at `value` with a hydrated copy,
/// then continues down `rest` inside every hydrated object.
///
/// Non-pointer values and pointers to missing documents are left as they are.
fn hydrate(store: &StoreMap, value: &mut Bson, rest: &[String]) {
    match value {
        Bson::Array(elements) => {
            for element in elements {
                hydrate_one(store, element, rest);
            }
        }
        other => hydrate_one(store, other, rest),
    }
}

fn hydrate_one(store: &StoreMap, value: &mut Bson, rest: &[String]) {
    let Some(pointer) = Pointer::from_bson(value) else {
        return;
    };

    let Some(mut fetched) = fetch(store, &pointer) else {
        trace!(class_name = %pointer.class_name, object_id = %pointer.object_id, "include target missing");
        return;
    };

    include_path(store, &mut fetched, rest);
    *value = Bson::Document(fetched);
}

/// Hydrates the pointers found along one dotted path of `object`.
///
/// An absent or null field at any segment ends the walk without error.
pub(crate) fn include_path(store: &StoreMap, object: &mut Document, path: &[String]) {
    let Some((head, rest)) = path.split_first() else {
        return;
    };

    match object.get_mut(head) {
        None | Some(Bson::Null) => {}
        Some(target) => hydrate(store, target, rest),
    }
}

#[cfg(test)]
mod tests {
    use bson::doc;
    use indexmap::IndexMap;

    use super::*;
    use mockbase_core::include::IncludePath;

    fn store() -> StoreMap {
        let mut store = StoreMap::new();

        store.insert(
            "User".to_string(),
            IndexMap::from([("u1".to_string(), doc! { "objectId": "u1", "name": "Ann" })]),
        );
        store.insert(
            "Brand".to_string(),
            IndexMap::from([
                (
                    "b1".to_string(),
                    doc! {
                        "objectId": "b1",
                        "owner": { "__type": "Pointer", "className": "User", "objectId": "u1" },
                    },
                ),
                ("b2".to_string(), doc! { "objectId": "b2" }),
            ]),
        );

        store
    }

    fn include(object: &mut Document, path: &str) {
        include_path(&store(), object, IncludePath::from(path).segments());
    }

    #[test]
    fn hydrates_nested_pointer_chain() {
        let mut item = doc! {
            "objectId": "i1",
            "brand": { "__type": "Pointer", "className": "Brand", "objectId": "b1" },
        };

        include(&mut item, "brand.owner");

        let brand = item.get_document("brand").unwrap();
        assert_eq!(brand.get_str("__type").unwrap(), "Object");
        assert_eq!(brand.get_document("owner").unwrap().get_str("name").unwrap(), "Ann");
    }

    #[test]
    fn hydrates_each_pointer_of_an_array() {
        let mut item = doc! {
            "brands": [
                { "__type": "Pointer", "className": "Brand", "objectId": "b1" },
                { "__type": "Pointer", "className": "Brand", "objectId": "b2" },
            ],
        };

        include(&mut item, "brands");

        let brands = item.get_array("brands").unwrap();
        assert!(brands.iter().all(|brand| brand.as_document().unwrap().get_str("__type").unwrap() == "Object"));
    }

    #[test]
    fn missing_paths_are_left_untouched() {
        let mut item = doc! { "objectId": "i1" };
        include(&mut item, "brand.owner");
        assert_eq!(item, doc! { "objectId": "i1" });

        let dangling = doc! { "brand": { "__type": "Pointer", "className": "Brand", "objectId": "zz" } };
        let mut copy = dangling.clone();
        include(&mut copy, "brand");
        assert_eq!(copy, dangling);
    }
}
