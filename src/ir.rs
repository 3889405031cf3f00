// Strongly-typed schema tree. No serde_json::Value here.
//
// Every transformation in this crate takes `&Schema` and returns a new tree;
// the only in-place edits are on values the caller already owns.

use std::fmt;
use indexmap::{IndexMap, IndexSet};
use ordered_float::OrderedFloat;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Schema {
    Any,                     // `{}`: accepts everything
    Never,                   // `false`: accepts nothing; as a property, the field must be absent
    String(StringSchema),
    Number(NumberSchema),
    Boolean(BooleanSchema),
    Array(ArraySchema),
    Object(ObjectSchema),
    Ref(String),             // compared by name only, never expanded implicitly
    Combinator(Combinator),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StringSchema {
    pub format: Option<String>,
    pub length: Option<u64>,
    pub min_length: Option<u64>,
    pub max_length: Option<u64>,
    pub pattern: Option<String>,
    pub enum_: Option<IndexSet<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NumberSchema {
    pub integer: bool,       // `type: "integer"`
    pub format: Option<String>,
    pub minimum: Option<OrderedFloat<f64>>,
    pub maximum: Option<OrderedFloat<f64>>,
    pub enum_: Option<IndexSet<OrderedFloat<f64>>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BooleanSchema {
    pub enum_: Option<IndexSet<bool>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArraySchema {
    pub items: Box<Schema>,  // an `anyOf`/`oneOf` here is a union of item alternatives
    pub min_items: Option<u64>,
    pub max_items: Option<u64>,
}

/// Object schema. `required ⊆ keys(properties)` holds for every object built
/// through the methods below; emission omits empty containers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectSchema {
    pub properties: IndexMap<String, Schema>,
    pub required: IndexSet<String>,
    pub additional_properties: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Combinator {
    pub kind: CombinatorKind,
    pub branches: Vec<Schema>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CombinatorKind {
    OneOf,
    AnyOf,
    AllOf,
}

/// A literal a predicate can test a field against.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Literal {
    Bool(bool),
    Number(OrderedFloat<f64>),
    String(String),
}

// ------------------------------ Schema ----------------------------------- //

impl Schema {
    pub fn type_name(&self) -> &'static str {
        match self {
            Schema::Any => "any",
            Schema::Never => "never",
            Schema::String(_) => "string",
            Schema::Number(n) if n.integer => "integer",
            Schema::Number(_) => "number",
            Schema::Boolean(_) => "boolean",
            Schema::Array(_) => "array",
            Schema::Object(_) => "object",
            Schema::Ref(_) => "$ref",
            Schema::Combinator(c) => c.kind.keyword(),
        }
    }

    pub fn string() -> Self { Schema::String(StringSchema::default()) }
    pub fn number() -> Self { Schema::Number(NumberSchema::default()) }
    pub fn integer() -> Self { Schema::Number(NumberSchema { integer: true, ..NumberSchema::default() }) }
    pub fn boolean() -> Self { Schema::Boolean(BooleanSchema::default()) }

    pub fn one_of(branches: Vec<Schema>) -> Self {
        Schema::Combinator(Combinator { kind: CombinatorKind::OneOf, branches })
    }

    /// The branches of a `oneOf`; anything else is its own single branch.
    pub fn one_of_branches(&self) -> &[Schema] {
        match self {
            Schema::Combinator(c) if c.kind == CombinatorKind::OneOf => &c.branches,
            other => std::slice::from_ref(other),
        }
    }

    pub fn as_object(&self) -> Option<&ObjectSchema> {
        match self {
            Schema::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Leaf kinds whose values can be listed in an `enum`.
    pub fn is_enumerable_kind(&self) -> bool {
        matches!(self, Schema::String(_) | Schema::Number(_) | Schema::Boolean(_))
    }

    /// The literal set this schema is restricted to, if any.
    pub fn enum_literals(&self) -> Option<Vec<Literal>> {
        match self {
            Schema::String(s) => s.enum_.as_ref()
                .map(|e| e.iter().cloned().map(Literal::String).collect()),
            Schema::Number(n) => n.enum_.as_ref()
                .map(|e| e.iter().copied().map(Literal::Number).collect()),
            Schema::Boolean(b) => b.enum_.as_ref()
                .map(|e| e.iter().copied().map(Literal::Bool).collect()),
            _ => None,
        }
    }

    /// Restrict `self` to the given literals, or build a leaf schema for
    /// them when `self` is not a leaf of a matching kind.
    pub fn restricted_to(&self, literals: &[Literal]) -> Schema {
        match self {
            Schema::String(s) if literals.iter().all(|l| matches!(l, Literal::String(_))) => {
                Schema::String(StringSchema { enum_: Some(string_lits(literals)), ..s.clone() })
            }
            Schema::Number(n) if literals.iter().all(|l| matches!(l, Literal::Number(_))) => {
                Schema::Number(NumberSchema { enum_: Some(number_lits(literals)), ..n.clone() })
            }
            Schema::Boolean(_) if literals.iter().all(|l| matches!(l, Literal::Bool(_))) => {
                Schema::Boolean(BooleanSchema { enum_: Some(bool_lits(literals)) })
            }
            _ => Schema::from_literals(literals),
        }
    }

    /// Leaf schema(s) accepting exactly `literals`; mixed kinds become `anyOf`.
    pub fn from_literals(literals: &[Literal]) -> Schema {
        let strings = string_lits(literals);
        let numbers = number_lits(literals);
        let bools = bool_lits(literals);

        let mut arms = Vec::new();
        if !strings.is_empty() {
            arms.push(Schema::String(StringSchema { enum_: Some(strings), ..StringSchema::default() }));
        }
        if !numbers.is_empty() {
            arms.push(Schema::Number(NumberSchema { enum_: Some(numbers), ..NumberSchema::default() }));
        }
        if !bools.is_empty() {
            arms.push(Schema::Boolean(BooleanSchema { enum_: Some(bools) }));
        }
        match arms.len() {
            0 => Schema::Any,
            1 => arms.remove(0),
            _ => Schema::Combinator(Combinator { kind: CombinatorKind::AnyOf, branches: arms }),
        }
    }
}

fn string_lits(literals: &[Literal]) -> IndexSet<String> {
    literals.iter().filter_map(|l| match l {
        Literal::String(s) => Some(s.clone()),
        _ => None,
    }).collect()
}

fn number_lits(literals: &[Literal]) -> IndexSet<OrderedFloat<f64>> {
    literals.iter().filter_map(|l| match l {
        Literal::Number(n) => Some(*n),
        _ => None,
    }).collect()
}

fn bool_lits(literals: &[Literal]) -> IndexSet<bool> {
    literals.iter().filter_map(|l| match l {
        Literal::Bool(b) => Some(*b),
        _ => None,
    }).collect()
}

// ------------------------------ Leaves ----------------------------------- //

impl StringSchema {
    /// Effective minimum length (`length` pins both bounds).
    pub fn min_len(&self) -> Option<u64> {
        match (self.length, self.min_length) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        }
    }

    pub fn max_len(&self) -> Option<u64> {
        match (self.length, self.max_length) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }
}

impl BooleanSchema {
    /// Booleans are fully enumerable: no `enum` means both values.
    pub fn values(&self) -> IndexSet<bool> {
        self.enum_.clone().unwrap_or_else(|| [true, false].into_iter().collect())
    }
}

impl ArraySchema {
    pub fn of(items: Schema) -> Self {
        Self { items: Box::new(items), min_items: None, max_items: None }
    }

    pub fn item_alternatives(&self) -> &[Schema] {
        match self.items.as_ref() {
            Schema::Combinator(c) if c.kind != CombinatorKind::AllOf => &c.branches,
            other => std::slice::from_ref(other),
        }
    }
}

// ------------------------------ Objects ---------------------------------- //

impl ObjectSchema {
    pub fn new() -> Self { Self::default() }

    pub fn with_property(mut self, name: impl Into<String>, schema: Schema) -> Self {
        self.properties.insert(name.into(), schema);
        self
    }

    pub fn with_required(mut self, name: impl Into<String>) -> Self {
        self.mark_required(&name.into());
        self
    }

    pub fn is_required(&self, key: &str) -> bool {
        self.required.contains(key)
    }

    pub fn required_keys(&self) -> impl Iterator<Item = &str> {
        self.required.iter().map(String::as_str)
    }

    pub fn optional_keys(&self) -> impl Iterator<Item = &str> {
        self.properties.keys()
            .map(String::as_str)
            .filter(|k| !self.required.contains(*k))
    }

    /// Put `key` first in `required`. No-op for undeclared keys.
    pub fn mark_required(&mut self, key: &str) {
        if !self.properties.contains_key(key) {
            return;
        }
        let rest = std::mem::take(&mut self.required);
        self.required = std::iter::once(key.to_string())
            .chain(rest.into_iter().filter(|k| k != key))
            .collect();
    }

    pub fn unmark_required(&mut self, key: &str) {
        self.required.shift_remove(key);
    }

    /// Drop a property together with its requiredness.
    pub fn remove_property(&mut self, key: &str) -> Option<Schema> {
        self.required.shift_remove(key);
        self.properties.shift_remove(key)
    }

    /// Re-establish `required ⊆ keys(properties)`.
    pub fn prune_required(&mut self) {
        let properties = &self.properties;
        self.required.retain(|k| properties.contains_key(k));
    }
}

impl From<ObjectSchema> for Schema {
    fn from(o: ObjectSchema) -> Self { Schema::Object(o) }
}

// ----------------------------- Combinators ------------------------------- //

impl CombinatorKind {
    pub fn keyword(self) -> &'static str {
        match self {
            CombinatorKind::OneOf => "oneOf",
            CombinatorKind::AnyOf => "anyOf",
            CombinatorKind::AllOf => "allOf",
        }
    }
}

impl Combinator {
    /// Deduplicate identical branches; one survivor collapses to a bare schema.
    pub fn collapse(kind: CombinatorKind, branches: Vec<Schema>) -> Schema {
        let mut unique: Vec<Schema> = Vec::with_capacity(branches.len());
        for b in branches {
            if !unique.contains(&b) {
                unique.push(b);
            }
        }
        match unique.len() {
            0 => Schema::Any,
            1 => unique.remove(0),
            _ => Schema::Combinator(Combinator { kind, branches: unique }),
        }
    }
}

// ------------------------------ Literals --------------------------------- //

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Bool(b) => write!(f, "{b}"),
            Literal::Number(n) => write!(f, "{}", n.0),
            Literal::String(s) => write!(f, "{s}"),
        }
    }
}

impl From<&str> for Literal {
    fn from(s: &str) -> Self { Literal::String(s.to_string()) }
}

impl From<f64> for Literal {
    fn from(n: f64) -> Self { Literal::Number(OrderedFloat(n)) }
}

impl From<bool> for Literal {
    fn from(b: bool) -> Self { Literal::Bool(b) }
}
