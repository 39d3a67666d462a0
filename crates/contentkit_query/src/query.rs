//! Fluent query builder over one content type.

use crate::error::{QueryError, QueryResult};
use crate::predicate::{Condition, Operator, Predicate};
use crate::projection::Projection;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Sort direction for [`Query::ascending`] and [`Query::descending`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    /// Smallest first (`asc`).
    Ascending,
    /// Largest first (`desc`).
    Descending,
}

/// Immutable snapshot of a [`Query`], consumed by one execution.
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySpec {
    /// Target content type uid.
    pub content_type: String,
    /// Filter tree.
    pub predicate: Predicate,
    /// Raw URL parameters (paging, sort, flags, custom additions).
    pub params: Map<String, Value>,
    /// Field projections and reference inclusion.
    pub projection: Projection,
    /// Call-level headers, merged over stack headers by the client.
    pub headers: BTreeMap<String, String>,
    /// Whether the caller asked for a single entry.
    pub single: bool,
}

impl QuerySpec {
    /// Builds the outgoing parameter document.
    pub fn to_params(&self) -> Map<String, Value> {
        let mut params = self.params.clone();
        if !self.predicate.is_empty() {
            params.insert("query".into(), self.predicate.to_value());
        }
        self.projection.apply(&mut params);
        params
    }
}

/// A fluent builder for a query against one content type.
///
/// Every method takes and returns the builder so calls chain. Methods
/// never fail: a bad argument marks the builder invalid and the error is
/// returned by [`Query::snapshot`], which the client calls at execution
/// time. The first recorded error wins.
///
/// ```rust
/// use contentkit_query::Query;
///
/// let spec = Query::new("product")
///     .where_eq("title", "Women")
///     .limit(8)
///     .remove_query("limit")
///     .snapshot()
///     .unwrap();
///
/// assert!(!spec.to_params().contains_key("limit"));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    content_type: String,
    predicate: Predicate,
    params: Map<String, Value>,
    projection: Projection,
    headers: BTreeMap<String, String>,
    single: bool,
    invalid: Option<QueryError>,
}

impl Query {
    /// Creates a query against `content_type`.
    pub fn new(content_type: impl Into<String>) -> Self {
        Self {
            content_type: content_type.into(),
            predicate: Predicate::new(),
            params: Map::new(),
            projection: Projection::new(),
            headers: BTreeMap::new(),
            single: false,
            invalid: None,
        }
    }

    /// Returns the target content type uid.
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Returns the current filter tree.
    pub fn predicate(&self) -> &Predicate {
        &self.predicate
    }

    /// Returns true if [`Query::find_one`] was called.
    pub fn is_single(&self) -> bool {
        self.single
    }

    /// Returns the error that invalidated this builder, if any.
    pub fn error(&self) -> Option<&QueryError> {
        self.invalid.as_ref()
    }

    /// Returns true if no invalid argument has been recorded.
    pub fn is_valid(&self) -> bool {
        self.invalid.is_none()
    }

    fn invalidate(&mut self, error: QueryError) {
        if self.invalid.is_none() {
            self.invalid = Some(error);
        }
    }

    fn check_key(&mut self, operation: &'static str, key: &str) -> bool {
        if key.is_empty() {
            self.invalidate(QueryError::InvalidArgument {
                operation,
                reason: "key is empty".into(),
            });
            return false;
        }
        true
    }

    fn check_value(&mut self, operation: &'static str, value: &Value) -> bool {
        if value.is_null() {
            self.invalidate(QueryError::InvalidArgument {
                operation,
                reason: "value is null".into(),
            });
            return false;
        }
        true
    }

    fn compare(mut self, operation: &'static str, key: &str, op: Operator, value: Value) -> Self {
        if self.check_key(operation, key) && self.check_value(operation, &value) {
            self.predicate.set(key, Condition::Compare(op, value));
        }
        self
    }

    fn set_flag(mut self, name: &str) -> Self {
        self.params.insert(name.into(), Value::Bool(true));
        self
    }

    // --- comparisons -----------------------------------------------------

    /// Matches entries where `key` equals `value`.
    pub fn where_eq(mut self, key: &str, value: impl Into<Value>) -> Self {
        let value = value.into();
        if self.check_key("where_eq", key) && self.check_value("where_eq", &value) {
            self.predicate.set(key, Condition::Equals(value));
        }
        self
    }

    /// Matches entries where `key < value`.
    pub fn less_than(self, key: &str, value: impl Into<Value>) -> Self {
        self.compare("less_than", key, Operator::LessThan, value.into())
    }

    /// Matches entries where `key <= value`.
    pub fn less_than_or_equal_to(self, key: &str, value: impl Into<Value>) -> Self {
        self.compare(
            "less_than_or_equal_to",
            key,
            Operator::LessThanOrEqual,
            value.into(),
        )
    }

    /// Matches entries where `key > value`.
    pub fn greater_than(self, key: &str, value: impl Into<Value>) -> Self {
        self.compare("greater_than", key, Operator::GreaterThan, value.into())
    }

    /// Matches entries where `key >= value`.
    pub fn greater_than_or_equal_to(self, key: &str, value: impl Into<Value>) -> Self {
        self.compare(
            "greater_than_or_equal_to",
            key,
            Operator::GreaterThanOrEqual,
            value.into(),
        )
    }

    /// Matches entries where `key != value`.
    pub fn not_equal_to(self, key: &str, value: impl Into<Value>) -> Self {
        self.compare("not_equal_to", key, Operator::NotEqual, value.into())
    }

    /// Matches entries whose `key` is one of `values`.
    pub fn contained_in<I, V>(self, key: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values = Value::Array(values.into_iter().map(Into::into).collect());
        self.compare("contained_in", key, Operator::In, values)
    }

    /// Matches entries whose `key` is none of `values`.
    pub fn not_contained_in<I, V>(self, key: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values = Value::Array(values.into_iter().map(Into::into).collect());
        self.compare("not_contained_in", key, Operator::NotIn, values)
    }

    /// Matches entries that have a value for `key`.
    pub fn exists(self, key: &str) -> Self {
        self.compare("exists", key, Operator::Exists, Value::Bool(true))
    }

    /// Matches entries that have no value for `key`.
    pub fn not_exists(self, key: &str) -> Self {
        self.compare("not_exists", key, Operator::Exists, Value::Bool(false))
    }

    /// Matches entries whose `key` matches `pattern`.
    ///
    /// `options` carries regex modifiers such as `"i"` for case-insensitive.
    pub fn regex(mut self, key: &str, pattern: &str, options: Option<&str>) -> Self {
        if !self.check_key("regex", key) {
            return self;
        }
        if pattern.is_empty() {
            self.invalidate(QueryError::InvalidArgument {
                operation: "regex",
                reason: "pattern is empty".into(),
            });
            return self;
        }
        self.predicate.set(
            key,
            Condition::Regex {
                pattern: pattern.to_string(),
                options: options.map(str::to_string),
            },
        );
        self
    }

    /// Matches entries whose reference field `key` points at an entry
    /// satisfying `query`.
    pub fn where_in(mut self, key: &str, query: Query) -> Self {
        if let Some(predicate) = self.nested("where_in", key, query) {
            self.predicate.set(key, Condition::InQuery(predicate));
        }
        self
    }

    /// Matches entries whose reference field `key` points at no entry
    /// satisfying `query`.
    pub fn where_not_in(mut self, key: &str, query: Query) -> Self {
        if let Some(predicate) = self.nested("where_not_in", key, query) {
            self.predicate.set(key, Condition::NotInQuery(predicate));
        }
        self
    }

    fn nested(&mut self, operation: &'static str, key: &str, query: Query) -> Option<Predicate> {
        if !self.check_key(operation, key) {
            return None;
        }
        if let Some(err) = query.invalid {
            self.invalidate(err);
            return None;
        }
        Some(query.predicate)
    }

    // --- combinators -----------------------------------------------------

    /// Matches entries satisfying every query in `queries`.
    pub fn and(mut self, queries: Vec<Query>) -> Self {
        if let Some(items) = self.combine("and", queries) {
            self.predicate.set("$and", Condition::And(items));
        }
        self
    }

    /// Matches entries satisfying at least one query in `queries`.
    pub fn or(mut self, queries: Vec<Query>) -> Self {
        if let Some(items) = self.combine("or", queries) {
            self.predicate.set("$or", Condition::Or(items));
        }
        self
    }

    fn combine(&mut self, operation: &'static str, queries: Vec<Query>) -> Option<Vec<Predicate>> {
        if queries.is_empty() {
            self.invalidate(QueryError::EmptyCombinator { operation });
            return None;
        }
        let mut items = Vec::with_capacity(queries.len());
        for query in queries {
            if let Some(err) = query.invalid {
                self.invalidate(err);
                return None;
            }
            items.push(query.predicate);
        }
        Some(items)
    }

    // --- raw parameters --------------------------------------------------

    /// Adds a raw URL parameter, replacing any previous value for `key`.
    pub fn add_query(mut self, key: &str, value: impl Into<Value>) -> Self {
        let value = value.into();
        if self.check_key("add_query", key) && self.check_value("add_query", &value) {
            self.params.insert(key.to_string(), value);
        }
        self
    }

    /// Adds a raw string URL parameter.
    pub fn add_param(self, key: &str, value: &str) -> Self {
        self.add_query(key, value)
    }

    /// Removes a raw URL parameter previously set by any method.
    pub fn remove_query(mut self, key: &str) -> Self {
        self.params.remove(key);
        self
    }

    /// Sets a call-level header.
    pub fn set_header(mut self, key: &str, value: &str) -> Self {
        if self.check_key("set_header", key) {
            self.headers.insert(key.to_string(), value.to_string());
        }
        self
    }

    /// Removes a call-level header.
    pub fn remove_header(mut self, key: &str) -> Self {
        self.headers.remove(key);
        self
    }

    // --- paging and sorting ----------------------------------------------

    /// Skips the first `count` matching entries.
    pub fn skip(mut self, count: u32) -> Self {
        self.params.insert("skip".into(), Value::from(count));
        self
    }

    /// Returns at most `count` entries.
    pub fn limit(mut self, count: u32) -> Self {
        self.params.insert("limit".into(), Value::from(count));
        self
    }

    /// Sorts by `key` in ascending order.
    pub fn ascending(self, key: &str) -> Self {
        self.sort(key, SortOrder::Ascending)
    }

    /// Sorts by `key` in descending order.
    pub fn descending(self, key: &str) -> Self {
        self.sort(key, SortOrder::Descending)
    }

    /// Sorts by `key` in the given direction.
    pub fn sort(mut self, key: &str, order: SortOrder) -> Self {
        if !self.check_key("sort", key) {
            return self;
        }
        let (set, clear) = match order {
            SortOrder::Ascending => ("asc", "desc"),
            SortOrder::Descending => ("desc", "asc"),
        };
        self.params.remove(clear);
        self.params.insert(set.into(), Value::String(key.to_string()));
        self
    }

    // --- scoping flags ---------------------------------------------------

    /// Restricts results to the given locale code.
    pub fn locale(self, code: &str) -> Self {
        self.add_query("locale", code)
    }

    /// Restricts results to entries carrying any of `tags`.
    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let joined = tags
            .into_iter()
            .map(|tag| tag.as_ref().to_string())
            .collect::<Vec<_>>()
            .join(",");
        if joined.is_empty() {
            self.invalidate(QueryError::InvalidArgument {
                operation: "tags",
                reason: "no tags given".into(),
            });
            return self;
        }
        self.params.insert("tags".into(), Value::String(joined));
        self
    }

    /// Full-text search across entry fields.
    pub fn search(self, term: &str) -> Self {
        self.add_query("typeahead", term)
    }

    /// Returns only the number of matching entries.
    pub fn count(self) -> Self {
        self.set_flag("count")
    }

    /// Adds the total match count alongside the entries.
    pub fn include_count(self) -> Self {
        self.set_flag("include_count")
    }

    /// Adds the content type schema to the response.
    pub fn include_schema(self) -> Self {
        self.set_flag("include_schema")
    }

    /// Adds the content type definition, including global field schemas.
    pub fn include_content_type(self) -> Self {
        self.set_flag("include_content_type")
            .set_flag("include_global_field_schema")
    }

    /// Falls back to the master locale for untranslated entries.
    pub fn include_fallback(self) -> Self {
        self.set_flag("include_fallback")
    }

    /// Adds owner details to each entry.
    pub fn include_owner(self) -> Self {
        self.set_flag("include_owner")
    }

    /// Expands items embedded in rich text fields.
    pub fn include_embedded_items(mut self) -> Self {
        self.params.insert(
            "include_embedded_items[]".into(),
            Value::String(crate::projection::BASE_FIELDS.into()),
        );
        self
    }

    /// Adds entry metadata.
    pub fn include_metadata(self) -> Self {
        self.set_flag("include_metadata")
    }

    // --- projections -----------------------------------------------------

    /// Returns only the given top-level fields.
    pub fn only<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.projection.only(fields);
        self
    }

    /// Returns all top-level fields except the given ones.
    pub fn except<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.projection.except(fields);
        self
    }

    /// Expands `reference` and returns only `fields` of it.
    pub fn only_with_reference<I, S>(mut self, fields: I, reference: &str) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if self.check_key("only_with_reference", reference) {
            self.projection.only_reference(reference, fields);
        }
        self
    }

    /// Expands `reference` and omits `fields` from it.
    pub fn except_with_reference<I, S>(mut self, fields: I, reference: &str) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if self.check_key("except_with_reference", reference) {
            self.projection.except_reference(reference, fields);
        }
        self
    }

    /// Expands a reference field into the referenced entries.
    pub fn include_reference(mut self, reference: &str) -> Self {
        if self.check_key("include_reference", reference) {
            self.projection.include_reference(reference);
        }
        self
    }

    /// Clears `only`, `except` and reference inclusion so the builder can
    /// be reused for a request with different projections.
    pub fn reset_projections(mut self) -> Self {
        self.projection.clear();
        self
    }

    // --- execution -------------------------------------------------------

    /// Marks the query as a single-entry lookup (`limit` 1).
    pub fn find_one(mut self) -> Self {
        self.single = true;
        self.limit(1)
    }

    /// Returns `{"query": <predicate>}`, the filter document alone.
    pub fn query_document(&self) -> Value {
        let mut map = Map::new();
        map.insert("query".into(), self.predicate.to_value());
        Value::Object(map)
    }

    /// Takes an immutable snapshot for one execution.
    ///
    /// # Errors
    ///
    /// Returns the first error recorded by a builder method.
    pub fn snapshot(&self) -> QueryResult<QuerySpec> {
        if let Some(err) = &self.invalid {
            return Err(err.clone());
        }
        Ok(QuerySpec {
            content_type: self.content_type.clone(),
            predicate: self.predicate.clone(),
            params: self.params.clone(),
            projection: self.projection.clone(),
            headers: self.headers.clone(),
            single: self.single,
        })
    }

    /// Builds the outgoing parameter document.
    ///
    /// # Errors
    ///
    /// Returns the first error recorded by a builder method.
    pub fn to_params(&self) -> QueryResult<Map<String, Value>> {
        self.snapshot().map(|spec| spec.to_params())
    }
}
