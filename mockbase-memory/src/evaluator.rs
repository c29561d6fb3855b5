//! Query expression evaluation for in-memory document filtering.
//!
//! [`DocumentEvaluator`] walks a compiled [`Expr`] against one document. Sub-queries
//! (`$inQuery`, `$select`) and relation lookups (`$relatedTo`) read other collections, so
//! the evaluator borrows the whole store map rather than a single collection.

use std::cmp::Ordering;

use bson::{Bson, Document};
use tracing::trace;

use mockbase_core::{
    equality::{as_number, equals},
    error::{DocumentStoreError, DocumentStoreResult},
    query::{Expr, FieldOp, QueryVisitor, RelatedTo, SubQuery},
    value::{self, OBJECT_ID_KEY, Relation, identifier},
};

use crate::store::StoreMap;

/// Native ordering of two values: numbers across widths, strings, booleans and instants.
///
/// Values of different kinds are unordered.
pub(crate) fn compare(left: &Bson, right: &Bson) -> Option<Ordering> {
    if let (Some(left), Some(right)) = (as_number(left), as_number(right)) {
        return left.partial_cmp(&right);
    }

    match (left, right) {
        (Bson::String(left), Bson::String(right)) => Some(left.cmp(right)),
        (Bson::Boolean(left), Bson::Boolean(right)) => Some(left.cmp(right)),
        _ => match (value::resolve_date(left), value::resolve_date(right)) {
            (Some(left), Some(right)) => Some(left.cmp(&right)),
            _ => None,
        },
    }
}

/// The id a field value refers to: the string itself, or a pointer's/object's identifier.
fn referenced_id(value: &Bson) -> Option<&str> {
    match value {
        Bson::String(id) => Some(id),
        other => identifier(other),
    }
}

pub(crate) struct DocumentEvaluator<'a> {
    store: &'a StoreMap,
    document: &'a Document,
}

impl<'a> DocumentEvaluator<'a> {
    pub fn new(store: &'a StoreMap, document: &'a Document) -> Self {
        Self { store, document }
    }

    pub fn evaluate(&mut self, expr: &Expr) -> DocumentStoreResult<bool> {
        self.visit_expr(expr)
    }

    /// Returns the documents of `collection` matching `expr`, in insertion order.
    pub fn filter_documents(
        store: &'a StoreMap,
        collection: &str,
        expr: &Expr,
    ) -> DocumentStoreResult<Vec<&'a Document>> {
        let Some(documents) = store.get(collection) else {
            return Ok(Vec::new());
        };

        let mut matches = Vec::new();

        for document in documents.values() {
            if DocumentEvaluator::new(store, document).evaluate(expr)? {
                matches.push(document);
            }
        }

        trace!(collection, matches = matches.len(), "filtered documents");

        Ok(matches)
    }

    fn sub_query(&self, query: &SubQuery) -> DocumentStoreResult<Vec<&'a Document>> {
        Self::filter_documents(self.store, &query.class_name, &query.filter)
    }

    /// Whether `object_id` is a member of the relation named by `related_to`.
    fn is_related(&self, object_id: Option<&str>, related_to: &RelatedTo) -> bool {
        let Some(object_id) = object_id else {
            return false;
        };

        self.store
            .get(&related_to.object.class_name)
            .and_then(|documents| documents.get(&related_to.object.object_id))
            .and_then(|owner| owner.get(&related_to.key))
            .and_then(Relation::from_bson)
            .is_some_and(|relation| relation.contains(object_id))
    }

    fn own_id(&self) -> Option<&str> {
        self.document
            .get(OBJECT_ID_KEY)
            .and_then(Bson::as_str)
    }
}

impl<'a> QueryVisitor for DocumentEvaluator<'a> {
    type Output = bool;
    type Error = DocumentStoreError;

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if self.visit_expr(expr)? {
                return Ok(true);
            }
        }

        Ok(false)
    }

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if !self.visit_expr(expr)? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn visit_object_id(
        &mut self,
        object_id: &str,
        related_to: Option<&RelatedTo>,
    ) -> Result<Self::Output, Self::Error> {
        if self.own_id() != Some(object_id) {
            return Ok(false);
        }

        Ok(match related_to {
            Some(related_to) => self.is_related(Some(object_id), related_to),
            None => true,
        })
    }

    fn visit_equals(&mut self, field: &str, value: &Bson) -> Result<Self::Output, Self::Error> {
        Ok(equals(self.document.get(field), Some(value)))
    }

    fn visit_related_to(&mut self, related_to: &RelatedTo) -> Result<Self::Output, Self::Error> {
        Ok(self.is_related(self.own_id(), related_to))
    }

    fn visit_field(&mut self, field: &str, op: &FieldOp) -> Result<Self::Output, Self::Error> {
        let resolved = self
            .document
            .get(field)
            .map(value::deserialize_query_param);
        let current = resolved.as_deref();

        let ordered = |operand: &Bson, accept: fn(Ordering) -> bool| {
            current
                .and_then(|current| compare(current, operand))
                .is_some_and(accept)
        };

        let matched = match op {
            FieldOp::Exists(should_exist) => {
                current.is_some_and(|current| *current != Bson::Null) == *should_exist
            }
            FieldOp::In(values) => values
                .iter()
                .any(|value| equals(current, Some(value))),
            FieldOp::Nin(values) => values
                .iter()
                .all(|value| !equals(current, Some(value))),
            FieldOp::Eq(value) => equals(current, Some(value)),
            FieldOp::Ne(value) => !equals(current, Some(value)),
            FieldOp::Lt(value) => ordered(value, Ordering::is_lt),
            FieldOp::Lte(value) => ordered(value, Ordering::is_le),
            FieldOp::Gt(value) => ordered(value, Ordering::is_gt),
            FieldOp::Gte(value) => ordered(value, Ordering::is_ge),
            FieldOp::Regex(regex) => current
                .and_then(Bson::as_str)
                .is_some_and(|text| regex.is_match(text)),
            FieldOp::Select { key, query } => self
                .sub_query(query)?
                .iter()
                .any(|document| equals(document.get(key), current)),
            FieldOp::InQuery(query) => {
                let Some(current) = current else {
                    return Ok(false);
                };
                let matches = self.sub_query(query)?;
                let ids = matches
                    .iter()
                    .filter_map(|document| document.get(OBJECT_ID_KEY).and_then(Bson::as_str));

                match Relation::from_bson(current) {
                    Some(relation) => ids.into_iter().any(|id| relation.contains(id)),
                    None => {
                        let target = identifier(current);
                        target.is_some() && ids.into_iter().any(|id| Some(id) == target)
                    }
                }
            }
            FieldOp::All(values) => {
                let elements = match current {
                    Some(Bson::Array(elements)) => elements.as_slice(),
                    _ => &[],
                };

                values.iter().all(|value| {
                    elements
                        .iter()
                        .any(|element| equals(Some(value), Some(element)))
                })
            }
            FieldOp::RelatedTo(related_to) => {
                self.is_related(current.and_then(referenced_id), related_to)
            }
            FieldOp::Property { name, value } => {
                let property = current
                    .and_then(Bson::as_document)
                    .and_then(|current| current.get(name));

                equals(property, Some(value))
            }
        };

        Ok(matched)
    }
}
