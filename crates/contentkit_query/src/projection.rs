//! Field projection and reference inclusion lists.

use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Key under which top-level `only` / `except` fields are sent.
pub const BASE_FIELDS: &str = "BASE";

/// Field projections and reference expansion for one request.
///
/// `only` and `except` are passed through as given: asking for both
/// `only(["a"])` and `except(["a"])` sends both clauses and leaves the
/// conflict to the server.
///
/// Reference inclusion is append-only. Including the same reference
/// twice sends it twice; servers tolerate the duplicate and removing it
/// would change the wire format existing callers observe.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Projection {
    only: Vec<String>,
    except: Vec<String>,
    only_references: BTreeMap<String, Vec<String>>,
    except_references: BTreeMap<String, Vec<String>>,
    include: Vec<String>,
}

impl Projection {
    /// Creates an empty projection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds top-level fields to the `only` list.
    pub fn only<I, S>(&mut self, fields: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.only.extend(fields.into_iter().map(Into::into));
    }

    /// Adds top-level fields to the `except` list.
    pub fn except<I, S>(&mut self, fields: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.except.extend(fields.into_iter().map(Into::into));
    }

    /// Restricts the fields returned for an expanded reference.
    ///
    /// Also registers `reference` for inclusion.
    pub fn only_reference<I, S>(&mut self, reference: &str, fields: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.only_references
            .entry(reference.to_string())
            .or_default()
            .extend(fields.into_iter().map(Into::into));
        self.include.push(reference.to_string());
    }

    /// Excludes fields from an expanded reference.
    ///
    /// Also registers `reference` for inclusion.
    pub fn except_reference<I, S>(&mut self, reference: &str, fields: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.except_references
            .entry(reference.to_string())
            .or_default()
            .extend(fields.into_iter().map(Into::into));
        self.include.push(reference.to_string());
    }

    /// Registers a reference field for expansion.
    pub fn include_reference(&mut self, reference: impl Into<String>) {
        self.include.push(reference.into());
    }

    /// Returns the reference fields registered for expansion, in call order.
    pub fn included(&self) -> &[String] {
        &self.include
    }

    /// Returns true if nothing has been projected or included.
    pub fn is_empty(&self) -> bool {
        self.only.is_empty()
            && self.except.is_empty()
            && self.only_references.is_empty()
            && self.except_references.is_empty()
            && self.include.is_empty()
    }

    /// Clears every list.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Writes `only`, `except` and `include[]` into outgoing parameters.
    pub fn apply(&self, params: &mut Map<String, Value>) {
        if let Some(only) = field_map(&self.only, &self.only_references) {
            params.insert("only".into(), only);
        }
        if let Some(except) = field_map(&self.except, &self.except_references) {
            params.insert("except".into(), except);
        }
        if !self.include.is_empty() {
            params.insert("include[]".into(), strings(&self.include));
        }
    }
}

fn field_map(base: &[String], references: &BTreeMap<String, Vec<String>>) -> Option<Value> {
    if base.is_empty() && references.is_empty() {
        return None;
    }
    let mut map = Map::new();
    if !base.is_empty() {
        map.insert(BASE_FIELDS.into(), strings(base));
    }
    for (reference, fields) in references {
        map.insert(reference.clone(), strings(fields));
    }
    Some(Value::Object(map))
}

fn strings(items: &[String]) -> Value {
    Value::Array(items.iter().cloned().map(Value::String).collect())
}
