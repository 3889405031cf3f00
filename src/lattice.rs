//! Schema algebra: subsumption (⊆), merge (right-biased overlay) and diff.
//!
//! - `is_subset_of(a, b)`: every value accepted by `a` is accepted by `b`.
//!   `Any` is the top and `Never` the bottom; references are opaque and
//!   compare by name.
//! - `merge(a, b)`: `b` wins on conflicting constraints; objects merge
//!   key-by-key, `required` is unioned, enums intersect. Not commutative.
//! - `diff(a, b)`: values accepted by `a` but not `b`, as far as the
//!   intensional representation can say it. `None` means nothing is left.
//!   Objects diff field-by-field and never vanish: a field whose value space
//!   is exhausted is removed from the object. Leaves without an `enum` cannot
//!   express "everything but X" and come back unchanged.
//!
//! Per-kind rules live in the submodules; this file dispatches.
pub mod string;
pub mod num;
pub mod arr;
pub mod obj;

use crate::ir::{Combinator, CombinatorKind, Schema};

// ------------------------------ Subset (⊆) -------------------------------- //

pub fn is_subset_of(a: &Schema, b: &Schema) -> bool {
    match (a, b) {
        (Schema::Never, _) | (_, Schema::Any) => true,
        (_, Schema::Never) => false,
        (Schema::Ref(x), Schema::Ref(y)) => x == y,

        (Schema::Combinator(c), _) => match c.kind {
            CombinatorKind::AllOf => a == b || c.branches.iter().any(|x| is_subset_of(x, b)),
            _ => c.branches.iter().all(|x| is_subset_of(x, b)),
        },
        (_, Schema::Combinator(c)) => match c.kind {
            CombinatorKind::AllOf => c.branches.iter().all(|y| is_subset_of(a, y)),
            _ => c.branches.iter().any(|y| is_subset_of(a, y)),
        },
        (Schema::Any, _) => false,

        (Schema::String(x), Schema::String(y)) => x.is_subset_of(y),
        (Schema::Number(x), Schema::Number(y)) => x.is_subset_of(y),
        (Schema::Boolean(x), Schema::Boolean(y)) => x.is_subset_of(y),
        (Schema::Array(x), Schema::Array(y)) => x.is_subset_of(y),
        (Schema::Object(x), Schema::Object(y)) => x.is_subset_of(y),

        // different kinds
        (Schema::String(_) | Schema::Number(_) | Schema::Boolean(_)
            | Schema::Array(_) | Schema::Object(_) | Schema::Ref(_), _) => false,
    }
}

// -------------------------------- Merge ----------------------------------- //

pub fn merge(a: &Schema, b: &Schema) -> Schema {
    match (a, b) {
        (_, Schema::Any) => a.clone(),
        (Schema::Any, _) => b.clone(),
        (Schema::Never, _) | (_, Schema::Never) => Schema::Never,

        // distribute over unions: (x | y) ⊓ b = (x ⊓ b) | (y ⊓ b)
        (Schema::Combinator(c), _) => Combinator::collapse(
            c.kind,
            c.branches.iter().map(|x| merge(x, b)).collect(),
        ),
        (_, Schema::Combinator(c)) => Combinator::collapse(
            c.kind,
            c.branches.iter().map(|y| merge(a, y)).collect(),
        ),

        (Schema::String(x), Schema::String(y)) => Schema::String(x.merge(y)),
        (Schema::Number(x), Schema::Number(y)) => Schema::Number(x.merge(y)),
        (Schema::Boolean(x), Schema::Boolean(y)) => Schema::Boolean(x.merge(y)),
        (Schema::Array(x), Schema::Array(y)) => Schema::Array(x.merge(y)),
        (Schema::Object(x), Schema::Object(y)) => Schema::Object(x.merge(y)),

        // kind conflict: b wins
        (Schema::String(_) | Schema::Number(_) | Schema::Boolean(_)
            | Schema::Array(_) | Schema::Object(_) | Schema::Ref(_), _) => b.clone(),
    }
}

// -------------------------------- Diff ------------------------------------ //

pub fn diff(a: &Schema, b: &Schema) -> Option<Schema> {
    match (a, b) {
        (Schema::Never, _) | (_, Schema::Any) => None,
        (_, Schema::Never) => Some(a.clone()),

        // (x ∧ y) ∖ b = (x ∖ b) ∧ (y ∖ b)
        (Schema::Combinator(c), _) if c.kind == CombinatorKind::AllOf => {
            let rest = c.branches.iter()
                .map(|x| diff(x, b))
                .collect::<Option<Vec<_>>>()?;
            Some(Combinator::collapse(c.kind, rest))
        }
        (Schema::Combinator(c), _) => {
            let rest: Vec<Schema> = c.branches.iter().filter_map(|x| diff(x, b)).collect();
            if rest.is_empty() { None } else { Some(Combinator::collapse(c.kind, rest)) }
        }
        // a ∖ (y | z) = (a ∖ y) ∖ z
        (_, Schema::Combinator(c)) if c.kind != CombinatorKind::AllOf => {
            c.branches.iter().try_fold(a.clone(), |acc, y| diff(&acc, y))
        }

        (Schema::String(x), Schema::String(y)) => x.diff(y).map(Schema::String),
        (Schema::Number(x), Schema::Number(y)) => x.diff(y).map(Schema::Number),
        (Schema::Boolean(x), Schema::Boolean(y)) => x.diff(y).map(Schema::Boolean),
        (Schema::Object(x), Schema::Object(y)) => Some(Schema::Object(x.diff(y))),

        _ => {
            if is_subset_of(a, b) { None } else { Some(a.clone()) }
        }
    }
}

// ------------------------------- Helpers ---------------------------------- //

/// `b`'s lower bound admits everything above `a`'s (absent = −∞).
pub(crate) fn lower_covers<T: PartialOrd>(b: Option<T>, a: Option<T>) -> bool {
    match (b, a) {
        (None, _) => true,
        (Some(_), None) => false,
        (Some(b), Some(a)) => b <= a,
    }
}

/// `b`'s upper bound admits everything below `a`'s (absent = +∞).
pub(crate) fn upper_covers<T: PartialOrd>(b: Option<T>, a: Option<T>) -> bool {
    match (b, a) {
        (None, _) => true,
        (Some(_), None) => false,
        (Some(b), Some(a)) => b >= a,
    }
}

/// Constraint overlay: `b` wins when it says something.
pub(crate) fn prefer<T: Clone>(a: &Option<T>, b: &Option<T>) -> Option<T> {
    b.clone().or_else(|| a.clone())
}

/// Enum overlay: intersect when both sides enumerate, else adopt whichever does.
pub(crate) fn merge_enum<T>(a: &Option<indexmap::IndexSet<T>>, b: &Option<indexmap::IndexSet<T>>) -> Option<indexmap::IndexSet<T>>
where
    T: Clone + Eq + std::hash::Hash,
{
    match (a, b) {
        (Some(x), Some(y)) => Some(x.iter().filter(|v| y.contains(*v)).cloned().collect()),
        (Some(x), None) => Some(x.clone()),
        (None, Some(y)) => Some(y.clone()),
        (None, None) => None,
    }
}

// ------------------------------- Tests ------------------------------------ //
