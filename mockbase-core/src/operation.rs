//! Atomic update operators.
//!
//! A write payload may carry, in place of an ordinary field value, an operation such as
//! `{ "__op": "Increment", "amount": 1 }`. Such fields are pulled out of the payload with
//! [`extract_ops`] and applied to the result document with [`apply_ops`], against the value
//! the field held before the write.
//!
//! Operators are parsed into the closed [`Operation`] enum up front, so an unknown tag is
//! rejected before any field of the write is touched.

use bson::{Bson, Document, doc};
use tracing::trace;

use crate::{
    equality::{as_number, equals},
    error::{DocumentStoreError, DocumentStoreResult},
    value::{self, CLASS_NAME_KEY, OP_KEY, Relation},
};

/// A single atomic field transform.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    /// Adds `amount` to the numeric prior value (absent counts as zero).
    Increment(Bson),
    /// Appends every object, duplicates included.
    Add(Vec<Bson>),
    /// Appends each object not already present by value-equality.
    AddUnique(Vec<Bson>),
    /// Removes every element value-equal to any of the objects.
    Remove(Vec<Bson>),
    /// Removes the field.
    Delete,
    /// Adds the given objects' identifiers to a relation.
    AddRelation(Vec<Bson>),
    /// Removes the given objects' identifiers from a relation.
    RemoveRelation(Vec<Bson>),
    /// A relation add and/or remove issued together; the add is applied first.
    Batch {
        add: Option<Vec<Bson>>,
        remove: Option<Vec<Bson>>,
    },
}

fn objects(field: &str, payload: &Document) -> DocumentStoreResult<Vec<Bson>> {
    match payload.get("objects") {
        Some(Bson::Array(objects)) => Ok(objects.clone()),
        None => Ok(Vec::new()),
        Some(other) => Err(DocumentStoreError::TypeMismatch(format!(
            "objects for field {field} must be an array, got {other}"
        ))),
    }
}

impl Operation {
    /// Parses an `__op` payload for the given field.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::UnknownOperator`] for an unrecognized tag and
    /// [`DocumentStoreError::TypeMismatch`] for malformed arguments.
    pub fn parse(field: &str, payload: &Bson) -> DocumentStoreResult<Self> {
        let unknown = |tag: &str| DocumentStoreError::UnknownOperator(field.to_string(), tag.to_string());

        let doc = payload
            .as_document()
            .ok_or_else(|| unknown(&payload.to_string()))?;
        let tag = doc
            .get(OP_KEY)
            .and_then(Bson::as_str)
            .ok_or_else(|| unknown("<missing>"))?;

        match tag {
            "Increment" => Ok(Operation::Increment(
                doc.get("amount").cloned().unwrap_or(Bson::Int32(1)),
            )),
            "Add" => Ok(Operation::Add(objects(field, doc)?)),
            "AddUnique" => Ok(Operation::AddUnique(objects(field, doc)?)),
            "Remove" => Ok(Operation::Remove(objects(field, doc)?)),
            "Delete" => Ok(Operation::Delete),
            "AddRelation" => Ok(Operation::AddRelation(objects(field, doc)?)),
            "RemoveRelation" => Ok(Operation::RemoveRelation(objects(field, doc)?)),
            "Batch" => {
                let ops = doc
                    .get("ops")
                    .and_then(Bson::as_array)
                    .ok_or_else(|| {
                        DocumentStoreError::TypeMismatch(format!("Batch on field {field} requires an ops array"))
                    })?;

                let mut add = None;
                let mut remove = None;

                for op in ops {
                    match Operation::parse(field, op)? {
                        Operation::AddRelation(objects) if add.is_none() => add = Some(objects),
                        Operation::RemoveRelation(objects) if remove.is_none() => remove = Some(objects),
                        _ => {}
                    }
                }

                Ok(Operation::Batch { add, remove })
            }
            other => Err(unknown(other)),
        }
    }

    /// Applies this operation to `field` of `result`.
    ///
    /// `prior` is the field's value before the write (`None` on create or when unset).
    /// The outcome is written into `result`, or the field is removed for [`Operation::Delete`].
    pub fn apply(&self, field: &str, prior: Option<&Bson>, result: &mut Document) -> DocumentStoreResult<()> {
        match self {
            Operation::Increment(amount) => {
                let sum = increment(field, prior, amount)?;
                result.insert(field, sum);
            }
            Operation::Add(objects) => {
                let mut array = ensure_array(field, prior)?;
                array.extend(objects.iter().cloned());
                result.insert(field, array);
            }
            Operation::AddUnique(objects) => {
                let mut array = ensure_array(field, prior)?;
                for object in objects {
                    if !array.iter().any(|item| equals(Some(item), Some(object))) {
                        array.push(object.clone());
                    }
                }
                result.insert(field, array);
            }
            Operation::Remove(objects) => {
                let mut array = ensure_array(field, prior)?;
                array.retain(|item| !objects.iter().any(|object| equals(Some(item), Some(object))));
                result.insert(field, array);
            }
            Operation::Delete => {
                result.remove(field);
            }
            Operation::AddRelation(objects) => {
                let mut relation = ensure_relation(field, prior, objects)?;
                relation.ids.extend(member_ids(objects));
                result.insert(field, relation);
            }
            Operation::RemoveRelation(objects) => {
                let mut relation = ensure_relation(field, prior, objects)?;
                for id in member_ids(objects) {
                    relation.ids.remove(&id);
                }
                result.insert(field, relation);
            }
            Operation::Batch { add, remove } => {
                if let Some(objects) = add {
                    Operation::AddRelation(objects.clone()).apply(field, prior, result)?;
                }
                if let Some(objects) = remove {
                    let current = result.get(field).cloned();
                    Operation::RemoveRelation(objects.clone()).apply(field, current.as_ref().or(prior), result)?;
                }
            }
        }

        Ok(())
    }
}

fn as_integer(value: &Bson) -> Option<i64> {
    match value {
        Bson::Int32(n) => Some(i64::from(*n)),
        Bson::Int64(n) => Some(*n),
        _ => None,
    }
}

fn increment(field: &str, prior: Option<&Bson>, amount: &Bson) -> DocumentStoreResult<Bson> {
    let mismatch = |what: &Bson| {
        DocumentStoreError::TypeMismatch(format!("cannot increment field {field} holding {what} by {amount}"))
    };

    let zero = Bson::Int32(0);
    let prior = prior.unwrap_or(&zero);

    if let (Bson::Int32(a), Bson::Int32(b)) = (prior, amount) {
        if let Some(sum) = a.checked_add(*b) {
            return Ok(Bson::Int32(sum));
        }
    }

    if let (Some(a), Some(b)) = (as_integer(prior), as_integer(amount)) {
        return a
            .checked_add(b)
            .map(Bson::Int64)
            .ok_or_else(|| DocumentStoreError::TypeMismatch(format!("increment of field {field} overflows")));
    }

    match (as_number(prior), as_number(amount)) {
        (Some(a), Some(b)) => Ok(Bson::Double(a + b)),
        (None, _) => Err(mismatch(prior)),
        (_, None) => Err(mismatch(amount)),
    }
}

fn ensure_array(field: &str, prior: Option<&Bson>) -> DocumentStoreResult<Vec<Bson>> {
    match prior {
        None | Some(Bson::Null) => Ok(Vec::new()),
        Some(Bson::Array(array)) => Ok(array.clone()),
        Some(_) => Err(DocumentStoreError::NotAnArray(field.to_string())),
    }
}

fn ensure_relation(field: &str, prior: Option<&Bson>, objects: &[Bson]) -> DocumentStoreResult<Relation> {
    match prior {
        None | Some(Bson::Null) => {
            let class_name = objects
                .first()
                .and_then(Bson::as_document)
                .and_then(|doc| doc.get(CLASS_NAME_KEY))
                .and_then(Bson::as_str)
                .unwrap_or_default();

            Ok(Relation::new(class_name))
        }
        Some(value) => Relation::from_bson(value).ok_or_else(|| {
            DocumentStoreError::TypeMismatch(format!("field {field} holding {value} is not a relation"))
        }),
    }
}

fn member_ids(objects: &[Bson]) -> Vec<String> {
    objects
        .iter()
        .filter_map(|object| match object {
            Bson::String(id) => Some(id.as_str()),
            other => value::identifier(other),
        })
        .map(str::to_string)
        .collect()
}

/// Pulls every operation payload out of a write.
///
/// Afterwards `data` holds only plain assignments, and the returned list holds the
/// `(field, payload)` pairs in their original order.
pub fn extract_ops(data: &mut Document) -> Vec<(String, Bson)> {
    let keys = data
        .iter()
        .filter(|(_, value)| value::is_op(value))
        .map(|(key, _)| key.clone())
        .collect::<Vec<_>>();

    keys.into_iter()
        .filter_map(|key| data.remove(&key).map(|op| (key, op)))
        .collect()
}

/// Applies extracted operations to `result`.
///
/// Every payload is parsed before anything is applied, and `result` is only replaced once
/// every operation succeeded, so a failing operation leaves it untouched.
pub fn apply_ops(result: &mut Document, ops: &[(String, Bson)], prior: &Document) -> DocumentStoreResult<()> {
    let parsed = ops
        .iter()
        .map(|(field, payload)| Operation::parse(field, payload).map(|op| (field.as_str(), op)))
        .collect::<DocumentStoreResult<Vec<_>>>()?;

    let mut staged = result.clone();

    for (field, op) in &parsed {
        trace!(field, ?op, "applying update operator");
        op.apply(field, prior.get(*field), &mut staged)?;
    }

    *result = staged;

    Ok(())
}

impl Operation {
    /// Encodes the operation as an `__op` payload, the form a write request carries.
    pub fn to_bson(&self) -> Bson {
        let tagged = |tag: &str, objects: &[Bson]| {
            Bson::Document(doc! { OP_KEY: tag, "objects": objects.to_vec() })
        };

        match self {
            Operation::Increment(amount) => Bson::Document(doc! { OP_KEY: "Increment", "amount": amount.clone() }),
            Operation::Add(objects) => tagged("Add", objects),
            Operation::AddUnique(objects) => tagged("AddUnique", objects),
            Operation::Remove(objects) => tagged("Remove", objects),
            Operation::Delete => Bson::Document(doc! { OP_KEY: "Delete" }),
            Operation::AddRelation(objects) => tagged("AddRelation", objects),
            Operation::RemoveRelation(objects) => tagged("RemoveRelation", objects),
            Operation::Batch { add, remove } => {
                let ops = add
                    .iter()
                    .map(|objects| tagged("AddRelation", objects))
                    .chain(remove.iter().map(|objects| tagged("RemoveRelation", objects)))
                    .collect::<Vec<_>>();

                Bson::Document(doc! { OP_KEY: "Batch", "ops": ops })
            }
        }
    }
}

impl From<Operation> for Bson {
    fn from(operation: Operation) -> Self {
        operation.to_bson()
    }
}

#[cfg(test)]
mod tests {
    use bson::doc;

    use super::*;
    use crate::value::Pointer;

    fn op(payload: Document) -> Bson {
        Bson::Document(payload)
    }

    fn run(prior: Document, ops: Vec<(&str, Document)>) -> DocumentStoreResult<Document> {
        let ops = ops
            .into_iter()
            .map(|(field, payload)| (field.to_string(), op(payload)))
            .collect::<Vec<_>>();
        let mut result = prior.clone();
        apply_ops(&mut result, &ops, &prior)?;
        Ok(result)
    }

    #[test]
    fn extract_ops_separates_plain_assignments() {
        let mut data = doc! {
            "name": "Box",
            "count": { "__op": "Increment", "amount": 2 },
            "tags": { "__op": "Add", "objects": ["a"] },
        };

        let ops = extract_ops(&mut data);

        assert_eq!(data, doc! { "name": "Box" });
        assert_eq!(ops.iter().map(|(k, _)| k.as_str()).collect::<Vec<_>>(), vec!["count", "tags"]);
    }

    #[test]
    fn increments_compose() {
        let once = run(doc! { "n": 5 }, vec![("n", doc! { "__op": "Increment", "amount": 2 })]).unwrap();
        let twice = run(once, vec![("n", doc! { "__op": "Increment", "amount": -4 })]).unwrap();

        assert_eq!(twice.get("n"), Some(&Bson::Int32(3)));
    }

    #[test]
    fn increment_of_unset_field_starts_at_zero() {
        let result = run(doc! {}, vec![("n", doc! { "__op": "Increment", "amount": 1.5 })]).unwrap();

        assert_eq!(result.get("n"), Some(&Bson::Double(1.5)));
    }

    #[test]
    fn increment_of_string_is_a_type_mismatch() {
        let err = run(doc! { "n": "five" }, vec![("n", doc! { "__op": "Increment", "amount": 1 })]).unwrap_err();

        assert!(matches!(err, DocumentStoreError::TypeMismatch(_)));
    }

    #[test]
    fn add_keeps_duplicates_and_add_unique_does_not() {
        let added = run(doc! { "t": ["a"] }, vec![("t", doc! { "__op": "Add", "objects": ["a", "b"] })]).unwrap();
        assert_eq!(added.get_array("t").unwrap(), &vec![Bson::from("a"), Bson::from("a"), Bson::from("b")]);

        let unique = run(doc! { "t": ["a"] }, vec![("t", doc! { "__op": "AddUnique", "objects": ["a", "b", "b"] })]).unwrap();
        assert_eq!(unique.get_array("t").unwrap(), &vec![Bson::from("a"), Bson::from("b")]);

        let again = run(unique.clone(), vec![("t", doc! { "__op": "AddUnique", "objects": ["b"] })]).unwrap();
        assert_eq!(again, unique);
    }

    #[test]
    fn remove_drops_every_equal_element() {
        let result = run(
            doc! { "t": ["a", "b", "a", 1] },
            vec![("t", doc! { "__op": "Remove", "objects": ["a", 1.0] })],
        )
        .unwrap();

        assert_eq!(result.get_array("t").unwrap(), &vec![Bson::from("b")]);
    }

    #[test]
    fn array_operator_on_scalar_is_rejected_and_leaves_result_untouched() {
        let prior = doc! { "t": "scalar", "name": "x" };
        let mut result = prior.clone();
        let ops = vec![
            ("name".to_string(), op(doc! { "__op": "Delete" })),
            ("t".to_string(), op(doc! { "__op": "Add", "objects": ["a"] })),
        ];

        let err = apply_ops(&mut result, &ops, &prior).unwrap_err();

        assert_eq!(err, DocumentStoreError::NotAnArray("t".to_string()));
        assert_eq!(result, prior);
    }

    #[test]
    fn delete_removes_the_field() {
        let result = run(doc! { "a": 1, "b": 2 }, vec![("a", doc! { "__op": "Delete" })]).unwrap();

        assert_eq!(result, doc! { "b": 2 });
    }

    #[test]
    fn unknown_operator_is_rejected() {
        let err = run(doc! {}, vec![("score", doc! { "__op": "Multiply", "amount": 2 })]).unwrap_err();

        assert_eq!(err, DocumentStoreError::UnknownOperator("score".to_string(), "Multiply".to_string()));
    }

    #[test]
    fn relation_ids_stay_sorted_and_unique() {
        let b2 = Pointer::new("Brand", "b2").to_bson();
        let b1 = Pointer::new("Brand", "b1").to_bson();

        let result = run(
            doc! {},
            vec![("brands", doc! { "__op": "AddRelation", "objects": [b2.clone(), b1.clone(), b2.clone()] })],
        )
        .unwrap();
        let relation = Relation::from_bson(result.get("brands").unwrap()).unwrap();

        assert_eq!(relation.class_name, "Brand");
        assert_eq!(relation.ids.iter().cloned().collect::<Vec<_>>(), vec!["b1", "b2"]);
        assert_eq!(
            result.get_document("brands").unwrap().get_array("ids").unwrap(),
            &vec![Bson::from("b1"), Bson::from("b2")]
        );
    }

    #[test]
    fn batch_adds_before_removing() {
        let b1 = Pointer::new("Brand", "b1").to_bson();
        let b2 = Pointer::new("Brand", "b2").to_bson();

        let result = run(
            doc! {},
            vec![(
                "brands",
                doc! {
                    "__op": "Batch",
                    "ops": [
                        { "__op": "RemoveRelation", "objects": [b1.clone()] },
                        { "__op": "AddRelation", "objects": [b1.clone(), b2.clone()] },
                    ],
                },
            )],
        )
        .unwrap();
        let relation = Relation::from_bson(result.get("brands").unwrap()).unwrap();

        assert_eq!(relation.ids.iter().cloned().collect::<Vec<_>>(), vec!["b2"]);
    }

    #[test]
    fn relation_operator_on_plain_array_is_a_type_mismatch() {
        let b1 = Pointer::new("Brand", "b1").to_bson();
        let prior = doc! { "brands": ["keep", "me"] };
        let mut result = prior.clone();
        let ops = vec![("brands".to_string(), op(doc! { "__op": "AddRelation", "objects": [b1] }))];

        let err = apply_ops(&mut result, &ops, &prior).unwrap_err();

        assert!(matches!(err, DocumentStoreError::TypeMismatch(ref message) if message.contains("brands")));
        assert_eq!(result, prior);
    }

    #[test]
    fn relation_operator_on_null_starts_a_fresh_relation() {
        let b1 = Pointer::new("Brand", "b1").to_bson();

        let result = run(
            doc! { "brands": Bson::Null },
            vec![("brands", doc! { "__op": "RemoveRelation", "objects": [b1] })],
        )
        .unwrap();
        let relation = Relation::from_bson(result.get("brands").unwrap()).unwrap();

        assert_eq!(relation.class_name, "Brand");
        assert!(relation.ids.is_empty());
    }
}
