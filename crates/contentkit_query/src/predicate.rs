//! Filter tree sent as the `query` parameter.

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Comparison operators that take a single operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// `$lt`
    LessThan,
    /// `$lte`
    LessThanOrEqual,
    /// `$gt`
    GreaterThan,
    /// `$gte`
    GreaterThanOrEqual,
    /// `$ne`
    NotEqual,
    /// `$in`
    In,
    /// `$nin`
    NotIn,
    /// `$exists`
    Exists,
}

impl Operator {
    /// Returns the wire name of the operator.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::LessThan => "$lt",
            Operator::LessThanOrEqual => "$lte",
            Operator::GreaterThan => "$gt",
            Operator::GreaterThanOrEqual => "$gte",
            Operator::NotEqual => "$ne",
            Operator::In => "$in",
            Operator::NotIn => "$nin",
            Operator::Exists => "$exists",
        }
    }
}

/// The condition attached to one key of a [`Predicate`].
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// `key = value`
    Equals(Value),
    /// `key: {op: value}`
    Compare(Operator, Value),
    /// `key: {"$regex": pattern, "$options": options}`
    Regex {
        /// Regular expression source.
        pattern: String,
        /// Modifier flags such as `i`, `m`, `s`, `x`.
        options: Option<String>,
    },
    /// `key: {"$in_query": {...}}`, matching entries whose referenced
    /// entry satisfies the nested predicate.
    InQuery(Predicate),
    /// `key: {"$nin_query": {...}}`
    NotInQuery(Predicate),
    /// `"$and": [...]`
    And(Vec<Predicate>),
    /// `"$or": [...]`
    Or(Vec<Predicate>),
}

impl Condition {
    fn to_value(&self) -> Value {
        match self {
            Condition::Equals(value) => value.clone(),
            Condition::Compare(op, value) => single(op.as_str(), value.clone()),
            Condition::Regex { pattern, options } => {
                let mut map = Map::new();
                map.insert("$regex".into(), Value::String(pattern.clone()));
                if let Some(options) = options {
                    map.insert("$options".into(), Value::String(options.clone()));
                }
                Value::Object(map)
            }
            Condition::InQuery(inner) => single("$in_query", inner.to_value()),
            Condition::NotInQuery(inner) => single("$nin_query", inner.to_value()),
            Condition::And(items) | Condition::Or(items) => {
                Value::Array(items.iter().map(Predicate::to_value).collect())
            }
        }
    }
}

fn single(key: &str, value: Value) -> Value {
    let mut map = Map::new();
    map.insert(key.to_string(), value);
    Value::Object(map)
}

/// A filter tree over field keys.
///
/// # Invariants
///
/// - A key appears at most once per predicate scope.
/// - Setting a condition on a key that already has one replaces it
///   (last write wins). Two different operators on the same key are
///   therefore not merged into one operator object: `less_than("a", 1)`
///   followed by `greater_than("a", 0)` leaves only `{"a": {"$gt": 0}}`.
///   Existing callers depend on this, so it is kept as-is.
/// - `$and` and `$or` are ordinary keys of the scope; their sibling
///   predicates keep the order they were supplied in.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Predicate {
    clauses: BTreeMap<String, Condition>,
}

impl Predicate {
    /// Creates an empty predicate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the condition for `key`, replacing any previous one.
    pub fn set(&mut self, key: impl Into<String>, condition: Condition) {
        self.clauses.insert(key.into(), condition);
    }

    /// Returns the condition currently set for `key`.
    pub fn get(&self, key: &str) -> Option<&Condition> {
        self.clauses.get(key)
    }

    /// Removes the condition for `key`.
    pub fn remove(&mut self, key: &str) -> Option<Condition> {
        self.clauses.remove(key)
    }

    /// Returns true if no condition is set.
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Returns the number of keys in this scope.
    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    /// Iterates over the keys of this scope in serialization order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.clauses.keys().map(String::as_str)
    }

    /// Converts the tree to its JSON document form.
    pub fn to_value(&self) -> Value {
        let map = self
            .clauses
            .iter()
            .map(|(key, condition)| (key.clone(), condition.to_value()))
            .collect::<Map<String, Value>>();
        Value::Object(map)
    }
}

impl Serialize for Predicate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn equality_serializes_as_plain_value() {
        let mut predicate = Predicate::new();
        predicate.set("title", Condition::Equals(json!("Women")));
        assert_eq!(predicate.to_value(), json!({"title": "Women"}));
    }

    #[test]
    fn operator_serializes_as_object() {
        let mut predicate = Predicate::new();
        predicate.set("price", Condition::Compare(Operator::LessThanOrEqual, json!(90)));
        assert_eq!(predicate.to_value(), json!({"price": {"$lte": 90}}));
    }

    #[test]
    fn later_operator_replaces_earlier() {
        let mut predicate = Predicate::new();
        predicate.set("price", Condition::Compare(Operator::LessThan, json!(90)));
        predicate.set("price", Condition::Compare(Operator::GreaterThan, json!(10)));
        assert_eq!(predicate.len(), 1);
        assert_eq!(predicate.to_value(), json!({"price": {"$gt": 10}}));
    }

    #[test]
    fn regex_without_options() {
        let mut predicate = Predicate::new();
        predicate.set(
            "title",
            Condition::Regex {
                pattern: "^wom".into(),
                options: None,
            },
        );
        assert_eq!(predicate.to_value(), json!({"title": {"$regex": "^wom"}}));
    }

    #[test]
    fn nested_in_query() {
        let mut inner = Predicate::new();
        inner.set("name", Condition::Equals(json!("Acme")));
        let mut outer = Predicate::new();
        outer.set("brand", Condition::InQuery(inner));
        assert_eq!(
            outer.to_value(),
            json!({"brand": {"$in_query": {"name": "Acme"}}})
        );
    }

    #[test]
    fn serialize_matches_to_value() {
        let mut predicate = Predicate::new();
        predicate.set("a", Condition::Compare(Operator::Exists, json!(true)));
        let text = serde_json::to_string(&predicate).unwrap();
        assert_eq!(text, r#"{"a":{"$exists":true}}"#);
    }
}
