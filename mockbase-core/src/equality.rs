//! Representation-independent value equality.
//!
//! Pointers, raw ids and fully hydrated objects must compare equal when they stand for the
//! same document. [`equals`] runs an ordered cascade of checks; the order matters and the
//! relation check is deliberately one-sided (`a` must be the relation).

use bson::Bson;

use crate::value::{self, OBJECT_ID_KEY};

/// Numeric view of a BSON value: every integer and float normalized to `f64`.
pub fn as_number(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(n) => Some(*n as f64),
        Bson::Int64(n) => Some(*n as f64),
        Bson::Double(n) => Some(*n),
        _ => None,
    }
}

/// Loose scalar comparison: numbers across integer/float widths, numeric strings
/// against numbers, and same-kind scalars.
fn scalars_equal(a: &Bson, b: &Bson) -> bool {
    match (a, b) {
        (Bson::Null, Bson::Null) => true,
        (Bson::Boolean(a), Bson::Boolean(b)) => a == b,
        (Bson::String(a), Bson::String(b)) => a == b,
        (Bson::String(s), other) | (other, Bson::String(s)) => match as_number(other) {
            Some(n) => s.trim().parse::<f64>().is_ok_and(|parsed| parsed == n),
            None => false,
        },
        _ => match (as_number(a), as_number(b)) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        },
    }
}

fn field<'a>(value: &'a Bson, key: &str) -> Option<&'a Bson> {
    value.as_document()?.get(key)
}

fn same_field(a: &Bson, a_key: &str, b: &Bson, b_key: &str) -> bool {
    match (field(a, a_key), field(b, b_key)) {
        (Some(left), Some(right)) => scalars_equal(left, right),
        _ => false,
    }
}

/// Structural equality with numeric normalization at every level.
pub fn deep_equals(a: &Bson, b: &Bson) -> bool {
    match (a, b) {
        (Bson::Array(a), Bson::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(a, b)| deep_equals(a, b))
        }
        (Bson::Document(a), Bson::Document(b)) => {
            a.len() == b.len()
                && a.iter().all(|(key, value)| {
                    b.get(key).is_some_and(|other| deep_equals(value, other))
                })
        }
        (Bson::DateTime(a), Bson::DateTime(b)) => a == b,
        _ if as_number(a).is_some() && as_number(b).is_some() => as_number(a) == as_number(b),
        _ => a == b,
    }
}

/// Compares two values independent of their representation.
///
/// `None` stands for an absent field and never equals anything, not even another `None`.
/// In order, the cascade accepts:
///
/// 1. equal scalars
/// 2. two objects with equal `id` fields
/// 3. `a` a relation whose `ids` contains `b`'s `id` or `objectId`
/// 4. structurally equal values
/// 5. two objects with equal `objectId` fields
/// 6. two dates (native or tagged) denoting the same instant
/// 7. one object's `id` matching the other's `objectId`
pub fn equals(a: Option<&Bson>, b: Option<&Bson>) -> bool {
    let (Some(a), Some(b)) = (a, b) else {
        return false;
    };

    if scalars_equal(a, b) {
        return true;
    }

    if same_field(a, "id", b, "id") {
        return true;
    }

    if let Some(relation) = value::Relation::from_bson(a) {
        if value::identifier(b).is_some_and(|id| relation.contains(id)) {
            return true;
        }
    }

    if deep_equals(a, b) {
        return true;
    }

    if same_field(a, OBJECT_ID_KEY, b, OBJECT_ID_KEY) {
        return true;
    }

    if value::is_date_like(a) && value::is_date_like(b) {
        if let (Some(left), Some(right)) = (value::resolve_date(a), value::resolve_date(b)) {
            return left == right;
        }
    }

    same_field(a, "id", b, OBJECT_ID_KEY) || same_field(b, "id", a, OBJECT_ID_KEY)
}

#[cfg(test)]
mod tests {
    use bson::{DateTime, doc};

    use super::*;
    use crate::value::{Pointer, Relation, date};

    fn eq(a: impl Into<Bson>, b: impl Into<Bson>) -> bool {
        equals(Some(&a.into()), Some(&b.into()))
    }

    #[test]
    fn absent_never_equals() {
        assert!(!equals(None, None));
        assert!(!equals(Some(&Bson::Null), None));
    }

    #[test]
    fn numbers_compare_across_widths() {
        assert!(eq(30_i32, 30.0_f64));
        assert!(eq(30_i64, 30_i32));
        assert!(eq("30", 30_i32));
        assert!(!eq(30_i32, 31_i32));
    }

    #[test]
    fn pointer_equals_hydrated_object() {
        let pointer = Pointer::new("Brand", "b1").to_bson();
        let object = Bson::Document(doc! {
            "__type": "Object",
            "className": "Brand",
            "objectId": "b1",
            "name": "Acme",
        });

        assert!(equals(Some(&pointer), Some(&object)));
        assert!(equals(Some(&object), Some(&pointer)));
    }

    #[test]
    fn relation_contains_pointer_but_not_the_reverse() {
        let mut relation = Relation::new("Brand");
        relation.ids.insert("b1".to_string());
        let relation = relation.to_bson();
        let pointer = Pointer::new("Brand", "b1").to_bson();

        assert!(equals(Some(&relation), Some(&pointer)));
        assert!(!equals(Some(&pointer), Some(&relation)));
    }

    #[test]
    fn id_matches_object_id() {
        assert!(eq(doc! { "id": "x" }, doc! { "objectId": "x" }));
        assert!(eq(doc! { "objectId": "x" }, doc! { "id": "x" }));
        assert!(!eq(doc! { "id": "x" }, doc! { "objectId": "y" }));
    }

    #[test]
    fn dates_compare_by_instant() {
        let instant = DateTime::from_millis(1_600_000_000_000);

        assert!(equals(Some(&date(instant)), Some(&Bson::DateTime(instant))));
        assert!(!equals(
            Some(&date(instant)),
            Some(&date(DateTime::from_millis(1_600_000_000_001)))
        ));
    }

    #[test]
    fn nested_structures_compare_deeply() {
        assert!(eq(doc! { "a": [1, 2, { "b": 3 }] }, doc! { "a": [1.0, 2, { "b": 3_i64 }] }));
        assert!(!eq(doc! { "a": [1, 2] }, doc! { "a": [2, 1] }));
    }
}
