//! Query construction and where-clause compilation.
//!
//! A where-clause is a document in the wire form of the emulated API:
//!
//! ```ignore
//! doc! {
//!     "price": { "$gt": 20, "$lt": 40 },
//!     "brand": { "$inQuery": { "className": "Brand", "where": { "name": "Acme" } } },
//! }
//! ```
//!
//! [`Expr::compile`] turns it into a closed [`Expr`] tree, rejecting malformed shapes with
//! [`DocumentStoreError::InvalidQuery`]. Backends evaluate the tree through the
//! [`QueryVisitor`] trait; sub-queries and relation lookups need the backend's data, so
//! the tree itself carries no evaluation logic.
//!
//! # Filter Fragment API
//!
//! [`Filter`] builds where-clause fragments, merged with [`Filter::and`]:
//!
//! ```ignore
//! use mockbase::query::{Filter, Query};
//!
//! let query = Query::builder()
//!     .filter(Filter::and([
//!         Filter::greater_than("price", 20),
//!         Filter::less_than("price", 40),
//!     ]))
//!     .include("brand.owner")
//!     .limit(10)
//!     .build();
//! ```

use bson::{Bson, Document, doc};
use regex::Regex;

use crate::{
    error::{DocumentStoreError, DocumentStoreResult},
    include::IncludePath,
    value::{self, CLASS_NAME_KEY, OBJECT_ID_KEY, Pointer},
};

/// Page size used when a query names no limit.
pub const DEFAULT_LIMIT: usize = 100;
/// Largest page a single query may return.
pub const HARD_LIMIT: usize = 1000;
/// Deepest nesting of `$or`, `$inQuery` and `$select` the compiler accepts.
pub const DEFAULT_MAX_DEPTH: usize = 32;

const QUOTE_MARKERS: [&str; 2] = ["\\Q", "\\E"];

/// A read request against one collection.
#[derive(Debug, Clone, Default)]
pub struct Query {
    /// Where-clause document; empty matches everything.
    pub filter: Document,
    /// Maximum number of documents to return.
    pub limit: Option<usize>,
    /// Number of documents to skip.
    pub skip: Option<usize>,
    /// Return only the number of matches.
    pub count: bool,
    /// Pointer paths to hydrate in the results.
    pub include: Vec<IncludePath>,
}

impl Query {
    /// Creates a query matching every document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new query builder for fluent construction.
    pub fn builder() -> QueryBuilder {
        QueryBuilder::new()
    }

    /// Reads a query from a request body of the form
    /// `{ where, limit, skip, count, include }`.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidQuery`] when a part has the wrong type.
    pub fn from_request(body: &Document) -> DocumentStoreResult<Self> {
        let filter = match body.get("where") {
            None | Some(Bson::Null) => Document::new(),
            Some(Bson::Document(filter)) => filter.clone(),
            Some(other) => return Err(DocumentStoreError::invalid_query(format!("where must be a document, got {other}"))),
        };

        let size = |key: &str| -> DocumentStoreResult<Option<usize>> {
            let invalid = |value: &Bson| {
                DocumentStoreError::invalid_query(format!("{key} must be a non-negative integer, got {value}"))
            };

            match body.get(key) {
                None | Some(Bson::Null) => Ok(None),
                Some(value @ Bson::Int32(n)) => usize::try_from(*n).map(Some).map_err(|_| invalid(value)),
                Some(value @ Bson::Int64(n)) => usize::try_from(*n).map(Some).map_err(|_| invalid(value)),
                Some(other) => Err(invalid(other)),
            }
        };

        let count = match body.get("count") {
            None | Some(Bson::Null) => false,
            Some(Bson::Boolean(count)) => *count,
            Some(Bson::Int32(n)) => *n != 0,
            Some(Bson::Int64(n)) => *n != 0,
            Some(other) => return Err(DocumentStoreError::invalid_query(format!("count must be a boolean, got {other}"))),
        };

        let include = match body.get("include") {
            None | Some(Bson::Null) => Vec::new(),
            Some(Bson::String(include)) => IncludePath::parse_list(include),
            Some(other) => return Err(DocumentStoreError::invalid_query(format!("include must be a string, got {other}"))),
        };

        Ok(Self {
            filter,
            limit: size("limit")?,
            skip: size("skip")?,
            count,
            include,
        })
    }

    /// Effective page size: the requested limit (or `default`) clamped to `max`.
    pub fn page_size(&self, default: usize, max: usize) -> usize {
        self.limit.unwrap_or(default).min(max)
    }
}

#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    query: Query,
}

impl QueryBuilder {
    /// Creates a new query builder.
    pub fn new() -> Self {
        QueryBuilder { query: Query::default() }
    }

    /// Sets the where-clause.
    pub fn filter(mut self, filter: Document) -> Self {
        self.query.filter = filter;
        self
    }

    /// Sets the maximum number of documents to return.
    pub fn limit(mut self, limit: usize) -> Self {
        self.query.limit = Some(limit);
        self
    }

    /// Sets the number of documents to skip.
    pub fn skip(mut self, skip: usize) -> Self {
        self.query.skip = Some(skip);
        self
    }

    /// Asks for the number of matches instead of the documents.
    pub fn count(mut self) -> Self {
        self.query.count = true;
        self
    }

    /// Adds comma-separated dotted include paths, e.g. `"brand.owner,tags"`.
    pub fn include(mut self, paths: &str) -> Self {
        self.query.include.extend(IncludePath::parse_list(paths));
        self
    }

    /// Builds and returns the final query.
    pub fn build(self) -> Query {
        self.query
    }
}

/// Builders for where-clause fragments.
///
/// Every method returns a single-key document; combine fragments with [`Filter::and`]
/// or [`Filter::or`].
pub struct Filter;

impl Filter {
    fn op(key: impl Into<String>, op: &str, value: impl Into<Bson>) -> Document {
        let mut constraint = Document::new();
        constraint.insert(op, value.into());

        let mut fragment = Document::new();
        fragment.insert(key, constraint);
        fragment
    }

    fn array<V: Into<Bson>>(values: impl IntoIterator<Item = V>) -> Bson {
        Bson::Array(values.into_iter().map(Into::into).collect())
    }

    /// Matches documents whose field equals the value.
    pub fn equal_to(key: impl Into<String>, value: impl Into<Bson>) -> Document {
        let mut fragment = Document::new();
        fragment.insert(key, value.into());
        fragment
    }

    pub fn not_equal_to(key: impl Into<String>, value: impl Into<Bson>) -> Document {
        Self::op(key, "$ne", value)
    }

    pub fn less_than(key: impl Into<String>, value: impl Into<Bson>) -> Document {
        Self::op(key, "$lt", value)
    }

    pub fn less_than_or_equal_to(key: impl Into<String>, value: impl Into<Bson>) -> Document {
        Self::op(key, "$lte", value)
    }

    pub fn greater_than(key: impl Into<String>, value: impl Into<Bson>) -> Document {
        Self::op(key, "$gt", value)
    }

    pub fn greater_than_or_equal_to(key: impl Into<String>, value: impl Into<Bson>) -> Document {
        Self::op(key, "$gte", value)
    }

    /// Matches documents whose field equals any of the values.
    pub fn contained_in<V: Into<Bson>>(key: impl Into<String>, values: impl IntoIterator<Item = V>) -> Document {
        Self::op(key, "$in", Self::array(values))
    }

    /// Matches documents whose field equals none of the values.
    pub fn not_contained_in<V: Into<Bson>>(key: impl Into<String>, values: impl IntoIterator<Item = V>) -> Document {
        Self::op(key, "$nin", Self::array(values))
    }

    /// Matches documents whose array field contains every one of the values.
    pub fn contains_all<V: Into<Bson>>(key: impl Into<String>, values: impl IntoIterator<Item = V>) -> Document {
        Self::op(key, "$all", Self::array(values))
    }

    pub fn exists(key: impl Into<String>) -> Document {
        Self::op(key, "$exists", true)
    }

    pub fn does_not_exist(key: impl Into<String>) -> Document {
        Self::op(key, "$exists", false)
    }

    /// Matches string fields against a regular expression; `options` takes `i`, `m`, `s`, `x`.
    pub fn matches(key: impl Into<String>, pattern: &str, options: Option<&str>) -> Document {
        let mut constraint = doc! { "$regex": pattern };
        if let Some(options) = options {
            constraint.insert("$options", options);
        }

        let mut fragment = Document::new();
        fragment.insert(key, constraint);
        fragment
    }

    /// Matches documents whose pointer field refers to a result of the sub-query.
    pub fn matches_query(key: impl Into<String>, class_name: &str, filter: Document) -> Document {
        Self::op(key, "$inQuery", doc! { CLASS_NAME_KEY: class_name, "where": filter })
    }

    /// Matches documents whose field equals `foreign_key` of some result of the sub-query.
    pub fn matches_key_in_query(
        key: impl Into<String>,
        foreign_key: &str,
        class_name: &str,
        filter: Document,
    ) -> Document {
        Self::op(
            key,
            "$select",
            doc! {
                "query": { CLASS_NAME_KEY: class_name, "where": filter },
                "key": foreign_key,
            },
        )
    }

    /// Matches the members of the relation `key` held by `object`.
    pub fn related_to(object: &Pointer, key: &str) -> Document {
        doc! { "$relatedTo": { "object": object.to_bson(), "key": key } }
    }

    /// Matches the document with the given identifier.
    pub fn object_id(object_id: &str) -> Document {
        doc! { OBJECT_ID_KEY: object_id }
    }

    /// Matches documents satisfying any of the clauses.
    pub fn or(clauses: impl IntoIterator<Item = Document>) -> Document {
        doc! { "$or": clauses.into_iter().map(Bson::Document).collect::<Vec<_>>() }
    }

    /// Merges fragments into one clause; operator constraints on the same key are combined.
    pub fn and(fragments: impl IntoIterator<Item = Document>) -> Document {
        let mut clause = Document::new();

        for fragment in fragments {
            for (key, constraint) in fragment {
                let merged = match (clause.get_mut(&key), &constraint) {
                    (Some(Bson::Document(existing)), Bson::Document(incoming))
                        if is_operator_map(existing) && is_operator_map(incoming) =>
                    {
                        for (op, operand) in incoming {
                            existing.insert(op.clone(), operand.clone());
                        }
                        true
                    }
                    _ => false,
                };

                if !merged {
                    clause.insert(key, constraint);
                }
            }
        }

        clause
    }
}

fn is_operator_map(constraint: &Document) -> bool {
    constraint.keys().all(|key| key.starts_with('$'))
}

/// A `$relatedTo` constraint: membership in relation `key` of the document at `object`.
#[derive(Debug, Clone, PartialEq)]
pub struct RelatedTo {
    pub object: Pointer,
    pub key: String,
}

/// A nested query against another collection.
#[derive(Debug, Clone)]
pub struct SubQuery {
    pub class_name: String,
    pub filter: Box<Expr>,
}

/// Comparison operators applied to a single field.
///
/// Operands that were tagged dates in the where-clause are already resolved to native
/// `DateTime` values.
#[derive(Debug, Clone)]
pub enum FieldOp {
    /// Field presence test.
    Exists(bool),
    /// Field equals any operand.
    In(Vec<Bson>),
    /// Field equals no operand.
    Nin(Vec<Bson>),
    Eq(Bson),
    Ne(Bson),
    Lt(Bson),
    Lte(Bson),
    Gt(Bson),
    Gte(Bson),
    /// Pattern match on string fields; quoting markers already stripped.
    Regex(Regex),
    /// Some result of `query` has `key` equal to the field.
    Select { key: String, query: SubQuery },
    /// The field refers to a result of the sub-query.
    InQuery(SubQuery),
    /// Every operand equals some element of the array field.
    All(Vec<Bson>),
    /// The field's identifier is a member of the named relation.
    RelatedTo(RelatedTo),
    /// Shorthand equality on a property of the field: `field[name] == value`.
    Property { name: String, value: Bson },
}

/// A compiled where-clause.
#[derive(Debug, Clone)]
pub enum Expr {
    /// Any clause matches.
    Or(Vec<Expr>),
    /// Every clause matches; empty matches everything.
    And(Vec<Expr>),
    /// Identity lookup; with `related_to`, the object must also be a member of that relation.
    ObjectId {
        object_id: String,
        related_to: Option<RelatedTo>,
    },
    /// Field value-equals a literal, pointer or date.
    Equals { field: String, value: Bson },
    /// The document itself is a member of the relation.
    RelatedTo(RelatedTo),
    /// An operator applied to a field.
    Field { field: String, op: FieldOp },
}

impl Expr {
    /// Compiles a where-clause with the default nesting limit.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidQuery`] for malformed clauses.
    pub fn compile(where_clause: &Document) -> DocumentStoreResult<Expr> {
        Self::compile_with_depth(where_clause, DEFAULT_MAX_DEPTH)
    }

    /// Compiles a where-clause, allowing at most `max_depth` levels of `$or`/sub-query nesting.
    pub fn compile_with_depth(where_clause: &Document, max_depth: usize) -> DocumentStoreResult<Expr> {
        Compiler { max_depth }.clause(where_clause, 0)
    }

    /// An expression matching every document.
    pub fn any() -> Expr {
        Expr::And(Vec::new())
    }
}

struct Compiler {
    max_depth: usize,
}

impl Compiler {
    fn descend(&self, depth: usize) -> DocumentStoreResult<usize> {
        if depth >= self.max_depth {
            return Err(DocumentStoreError::invalid_query(format!(
                "query nesting exceeds the maximum depth of {}",
                self.max_depth
            )));
        }

        Ok(depth + 1)
    }

    fn clause(&self, where_clause: &Document, depth: usize) -> DocumentStoreResult<Expr> {
        if let Some(or) = where_clause.get("$or") {
            let depth = self.descend(depth)?;
            let clauses = or
                .as_array()
                .ok_or_else(|| DocumentStoreError::invalid_query("$or must be an array of clauses"))?;

            return clauses
                .iter()
                .map(|clause| match clause {
                    Bson::Document(clause) => self.clause(clause, depth),
                    other => Err(DocumentStoreError::invalid_query(format!("$or clause must be a document, got {other}"))),
                })
                .collect::<DocumentStoreResult<Vec<_>>>()
                .map(Expr::Or);
        }

        if let Some(Bson::String(object_id)) = where_clause.get(OBJECT_ID_KEY) {
            if !object_id.is_empty() {
                let related_to = where_clause
                    .get("$relatedTo")
                    .map(related_to)
                    .transpose()?;

                return Ok(Expr::ObjectId { object_id: object_id.clone(), related_to });
            }
        }

        where_clause
            .iter()
            .map(|(key, constraint)| self.constraint(key, constraint, depth))
            .collect::<DocumentStoreResult<Vec<_>>>()
            .map(Expr::And)
    }

    fn constraint(&self, key: &str, constraint: &Bson, depth: usize) -> DocumentStoreResult<Expr> {
        let Bson::Document(operators) = constraint else {
            return Ok(Expr::Equals { field: key.to_string(), value: constraint.clone() });
        };

        if value::is_pointer(constraint) || value::is_date(constraint) {
            return Ok(Expr::Equals { field: key.to_string(), value: constraint.clone() });
        }

        if key == "$relatedTo" {
            return related_to(constraint).map(Expr::RelatedTo);
        }

        let mut exprs = Vec::with_capacity(operators.len());

        for (name, operand) in operators {
            if let Some(op) = self.field_op(name, operand, operators, depth)? {
                exprs.push(Expr::Field { field: key.to_string(), op });
            }
        }

        Ok(match exprs.len() {
            1 => exprs.remove(0),
            _ => Expr::And(exprs),
        })
    }

    fn field_op(&self, name: &str, operand: &Bson, siblings: &Document, depth: usize) -> DocumentStoreResult<Option<FieldOp>> {
        let operand = value::deserialize_query_param(operand).into_owned();

        let op = match name {
            "$exists" => FieldOp::Exists(
                operand
                    .as_bool()
                    .ok_or_else(|| DocumentStoreError::invalid_query("$exists takes a boolean"))?,
            ),
            "$in" => FieldOp::In(array_operand(name, operand)?),
            "$nin" => FieldOp::Nin(array_operand(name, operand)?),
            "$all" => FieldOp::All(array_operand(name, operand)?),
            "$eq" => FieldOp::Eq(operand),
            "$ne" => FieldOp::Ne(operand),
            "$lt" => FieldOp::Lt(operand),
            "$lte" => FieldOp::Lte(operand),
            "$gt" => FieldOp::Gt(operand),
            "$gte" => FieldOp::Gte(operand),
            "$regex" => {
                let pattern = operand
                    .as_str()
                    .ok_or_else(|| DocumentStoreError::invalid_query("$regex takes a string pattern"))?;
                let options = siblings
                    .get("$options")
                    .and_then(Bson::as_str)
                    .unwrap_or_default();

                FieldOp::Regex(compile_regex(pattern, options)?)
            }
            "$options" => return Ok(None),
            "$select" => {
                let select = operand
                    .as_document()
                    .ok_or_else(|| DocumentStoreError::invalid_query("$select takes { query, key }"))?;
                let key = select
                    .get("key")
                    .and_then(Bson::as_str)
                    .ok_or_else(|| DocumentStoreError::invalid_query("$select requires a key"))?;
                let query = select
                    .get("query")
                    .ok_or_else(|| DocumentStoreError::invalid_query("$select requires a query"))?;

                FieldOp::Select { key: key.to_string(), query: self.sub_query(query, depth)? }
            }
            "$inQuery" => FieldOp::InQuery(self.sub_query(&operand, depth)?),
            "$relatedTo" => FieldOp::RelatedTo(related_to(&operand)?),
            _ => FieldOp::Property { name: name.to_string(), value: operand },
        };

        Ok(Some(op))
    }

    fn sub_query(&self, query: &Bson, depth: usize) -> DocumentStoreResult<SubQuery> {
        let depth = self.descend(depth)?;
        let query = query
            .as_document()
            .ok_or_else(|| DocumentStoreError::invalid_query("sub-query must be a document"))?;
        let class_name = query
            .get(CLASS_NAME_KEY)
            .and_then(Bson::as_str)
            .ok_or_else(|| DocumentStoreError::invalid_query("sub-query requires a className"))?;
        let filter = match query.get("where") {
            None | Some(Bson::Null) => Expr::any(),
            Some(Bson::Document(filter)) => self.clause(filter, depth)?,
            Some(other) => return Err(DocumentStoreError::invalid_query(format!("sub-query where must be a document, got {other}"))),
        };

        Ok(SubQuery { class_name: class_name.to_string(), filter: Box::new(filter) })
    }
}

fn array_operand(name: &str, operand: Bson) -> DocumentStoreResult<Vec<Bson>> {
    match operand {
        Bson::Array(values) => Ok(values),
        other => Err(DocumentStoreError::invalid_query(format!("{name} takes an array, got {other}"))),
    }
}

fn related_to(operand: &Bson) -> DocumentStoreResult<RelatedTo> {
    let malformed = || DocumentStoreError::invalid_query("$relatedTo takes { object: <pointer>, key }");
    let operand = operand.as_document().ok_or_else(malformed)?;
    let object = operand
        .get("object")
        .filter(|object| value::is_pointer(object))
        .and_then(Pointer::from_bson)
        .ok_or_else(malformed)?;
    let key = operand
        .get("key")
        .and_then(Bson::as_str)
        .ok_or_else(malformed)?;

    Ok(RelatedTo { object, key: key.to_string() })
}

/// Strips `\Q`/`\E` quoting markers and applies `i`, `m`, `s`, `x` options as inline flags.
fn compile_regex(pattern: &str, options: &str) -> DocumentStoreResult<Regex> {
    let pattern = QUOTE_MARKERS
        .iter()
        .fold(pattern.to_string(), |pattern, marker| pattern.replace(*marker, ""));
    let flags = options
        .chars()
        .filter(|c| matches!(c, 'i' | 'm' | 's' | 'x'))
        .collect::<String>();

    let source = match flags.is_empty() {
        true => pattern,
        false => format!("(?{flags}){pattern}"),
    };

    Regex::new(&source)
        .map_err(|err| DocumentStoreError::invalid_query(format!("invalid $regex pattern: {err}")))
}

pub trait QueryVisitor {
    type Output;
    type Error: Into<DocumentStoreError>;

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_object_id(
        &mut self,
        object_id: &str,
        related_to: Option<&RelatedTo>,
    ) -> Result<Self::Output, Self::Error>;
    fn visit_equals(&mut self, field: &str, value: &Bson) -> Result<Self::Output, Self::Error>;
    fn visit_related_to(&mut self, related_to: &RelatedTo) -> Result<Self::Output, Self::Error>;
    fn visit_field(&mut self, field: &str, op: &FieldOp) -> Result<Self::Output, Self::Error>;

    fn visit_expr(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        match expr {
            Expr::Or(exprs) => self.visit_or(exprs),
            Expr::And(exprs) => self.visit_and(exprs),
            Expr::ObjectId { object_id, related_to } => self.visit_object_id(object_id, related_to.as_ref()),
            Expr::Equals { field, value } => self.visit_equals(field, value),
            Expr::RelatedTo(related_to) => self.visit_related_to(related_to),
            Expr::Field { field, op } => self.visit_field(field, op),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn compile(where_clause: Document) -> DocumentStoreResult<Expr> {
        Expr::compile(&where_clause)
    }

    #[test]
    fn literal_constraints_compile_to_equality() {
        let expr = compile(doc! { "price": 30, "name": "Box" }).unwrap();

        let Expr::And(exprs) = expr else { panic!("expected And") };
        assert_eq!(exprs.len(), 2);
        assert!(matches!(&exprs[0], Expr::Equals { field, .. } if field == "price"));
    }

    #[test]
    fn pointer_constraint_is_equality_not_an_operator_map() {
        let expr = compile(doc! { "brand": Pointer::new("Brand", "b1").to_bson() }).unwrap();

        let Expr::And(exprs) = expr else { panic!("expected And") };
        assert!(matches!(&exprs[0], Expr::Equals { .. }));
    }

    #[test]
    fn literal_object_id_short_circuits_other_keys() {
        let expr = compile(doc! { "objectId": "abc", "price": 10 }).unwrap();

        assert!(matches!(expr, Expr::ObjectId { ref object_id, related_to: None } if object_id == "abc"));
    }

    #[test]
    fn object_id_operator_map_is_not_an_identity_lookup() {
        let expr = compile(doc! { "objectId": { "$nin": ["a"] } }).unwrap();

        assert!(matches!(expr, Expr::And(_)));
    }

    #[test]
    fn unknown_operator_name_becomes_property_equality() {
        let expr = compile(doc! { "size": { "width": 3 } }).unwrap();

        let Expr::And(exprs) = expr else { panic!("expected And") };
        assert!(matches!(
            &exprs[0],
            Expr::Field { op: FieldOp::Property { name, .. }, .. } if name == "width"
        ));
    }

    #[test]
    fn tagged_date_operands_are_resolved() {
        let expr = compile(doc! {
            "when": { "$lt": { "__type": "Date", "iso": "2020-01-01T00:00:00.000Z" } }
        })
        .unwrap();

        let Expr::And(exprs) = expr else { panic!("expected And") };
        assert!(matches!(&exprs[0], Expr::Field { op: FieldOp::Lt(Bson::DateTime(_)), .. }));
    }

    #[test]
    fn malformed_clauses_are_rejected() {
        let cases = vec![
            doc! { "$or": { "a": 1 } },
            doc! { "tags": { "$in": "a" } },
            doc! { "tags": { "$exists": 1 } },
            doc! { "name": { "$regex": "(" } },
            doc! { "brand": { "$inQuery": { "where": {} } } },
            doc! { "brand": { "$select": { "query": { "className": "Brand" } } } },
            doc! { "$relatedTo": { "object": "b1", "key": "items" } },
        ];

        for case in cases {
            let err = compile(case.clone()).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidQuery, "{case}");
        }
    }

    #[test]
    fn regex_honours_quoting_and_options() {
        let expr = compile(doc! { "name": { "$regex": "\\Qbox\\E", "$options": "i" } }).unwrap();

        let Expr::And(exprs) = expr else { panic!("expected And") };
        let Expr::Field { op: FieldOp::Regex(regex), .. } = &exprs[0] else { panic!("expected regex") };
        assert!(regex.is_match("Big BOX"));
    }

    #[test]
    fn nesting_beyond_the_limit_is_rejected() {
        let mut clause = doc! { "name": "leaf" };
        for _ in 0..4 {
            clause = doc! { "ref": { "$inQuery": { "className": "Node", "where": clause } } };
        }

        assert!(Expr::compile_with_depth(&clause, 4).is_ok());
        assert_eq!(
            Expr::compile_with_depth(&clause, 3).unwrap_err().kind(),
            ErrorKind::InvalidQuery
        );
    }

    #[test]
    fn filter_and_merges_operators_on_one_key() {
        let clause = Filter::and([
            Filter::greater_than("price", 20),
            Filter::less_than("price", 40),
            Filter::equal_to("name", "Box"),
        ]);

        assert_eq!(clause, doc! { "price": { "$gt": 20, "$lt": 40 }, "name": "Box" });
    }

    #[test]
    fn request_body_is_parsed() {
        let query = Query::from_request(&doc! {
            "where": { "price": 30 },
            "limit": 5,
            "skip": 2,
            "include": "brand.owner,tags",
        })
        .unwrap();

        assert_eq!(query.filter, doc! { "price": 30 });
        assert_eq!(query.limit, Some(5));
        assert_eq!(query.skip, Some(2));
        assert_eq!(query.include.len(), 2);
        assert_eq!(query.page_size(DEFAULT_LIMIT, HARD_LIMIT), 5);
        assert_eq!(Query::new().page_size(DEFAULT_LIMIT, HARD_LIMIT), DEFAULT_LIMIT);
    }

    #[test]
    fn request_sizes_must_be_non_negative_integers() {
        let wide = Query::from_request(&doc! { "limit": 7_i64, "skip": 0_i64 }).unwrap();
        assert_eq!(wide.limit, Some(7));
        assert_eq!(wide.skip, Some(0));

        for body in [doc! { "limit": -1 }, doc! { "skip": -3_i64 }, doc! { "limit": "5" }] {
            let err = Query::from_request(&body).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidQuery);
        }
    }
}
