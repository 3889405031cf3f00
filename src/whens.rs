//! Conditional rules and their grouping by referenced field.
//!
//! A rule reads "when `reference_path` satisfies `predicate`, apply `then` to
//! `field`, otherwise apply `otherwise`". Rules testing the same reference
//! are folded into one [`GroupedCondition`]; rules testing the same literal
//! set share one alternative. A group then splits into [`Outcome`]s that
//! never accept the same value.

use std::fmt;
use indexmap::IndexMap;

use crate::context::Context;
use crate::ir::{Literal, Schema};
use crate::lattice::{diff, merge};
use crate::path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// The referenced field equals one of the literals.
    Enum(Vec<Literal>),
    /// The referenced field is present (`true`) or absent (`false`).
    Exists { required: bool },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Presence {
    Required,
    Optional,
    #[default]
    Inherit,
}

/// Partial patch for a single field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Delta {
    pub schema: Option<Schema>,
    pub presence: Presence,
}

impl Delta {
    pub fn required(schema: Schema) -> Self {
        Self { schema: Some(schema), presence: Presence::Required }
    }

    pub fn optional(schema: Schema) -> Self {
        Self { schema: Some(schema), presence: Presence::Optional }
    }

    pub fn is_empty(&self) -> bool {
        self.schema.is_none() && self.presence == Presence::Inherit
    }

    /// Fold a later delta for the same field onto this one.
    pub(crate) fn overlay(&mut self, later: Delta) {
        self.schema = match (self.schema.take(), later.schema) {
            (Some(a), Some(b)) => Some(merge(&a, &b)),
            (a, b) => b.or(a),
        };
        if later.presence != Presence::Inherit {
            self.presence = later.presence;
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConditionalRule {
    /// Field the deltas apply to.
    pub field: String,
    pub reference_path: String,
    pub predicate: Predicate,
    pub then: Delta,
    pub otherwise: Delta,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PredicateKey {
    Literals(Vec<Literal>),
    AllCases,
}

impl fmt::Display for PredicateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PredicateKey::AllCases => f.write_str("<exists>"),
            PredicateKey::Literals(ls) => {
                let parts: Vec<String> = ls.iter().map(ToString::to_string).collect();
                f.write_str(&parts.join("."))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupedAlternative {
    pub predicate: Predicate,
    pub then: IndexMap<String, Delta>,
    pub otherwise: IndexMap<String, Delta>,
}

impl GroupedAlternative {
    fn new(predicate: Predicate) -> Self {
        Self { predicate, then: IndexMap::new(), otherwise: IndexMap::new() }
    }

    fn join(&mut self, field: &str, then: Delta, otherwise: Delta) {
        overlay_into(&mut self.then, field, then);
        overlay_into(&mut self.otherwise, field, otherwise);
    }
}

pub(crate) fn overlay_into(deltas: &mut IndexMap<String, Delta>, field: &str, d: Delta) {
    if d.is_empty() {
        return;
    }
    match deltas.get_mut(field) {
        Some(existing) => existing.overlay(d),
        None => { deltas.insert(field.to_string(), d); }
    }
}

/// How the referenced field looks in one outcome of a condition.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldTest {
    /// Present and restricted to the schema.
    Present(Schema),
    Absent,
}

impl FieldTest {
    /// The field's schema in a peek; an absent field is `false`.
    pub fn leaf(&self) -> Schema {
        match self {
            FieldTest::Present(s) => s.clone(),
            FieldTest::Absent => Schema::Never,
        }
    }
}

/// One way a [`GroupedCondition`] can turn out, with the deltas of every
/// alternative folded in: `then` where it holds, `otherwise` where it fails.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub test: FieldTest,
    pub deltas: IndexMap<String, Delta>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupedCondition {
    pub reference_path: String,
    pub reference_schema: Schema,
    pub alternatives: IndexMap<PredicateKey, GroupedAlternative>,
}

impl GroupedCondition {
    /// Every outcome of the condition, pairwise disjoint:
    ///
    /// 1. one per set of alternatives that hold together, the field
    ///    restricted to the literals that make exactly those hold;
    /// 2. the field holding a value no alternative tests for, when the
    ///    reference's schema leaves any;
    /// 3. the field missing, when an alternative tests for presence.
    ///
    /// An unenumerated reference tested for presence alone has outcomes 1
    /// (any value) and 3.
    pub fn outcomes(&self) -> Vec<Outcome> {
        let literals = self.tested_literals();
        let mut out = Vec::new();

        if literals.is_empty() {
            if self.alternatives.contains_key(&PredicateKey::AllCases) {
                out.push(Outcome {
                    test: FieldTest::Present(self.reference_schema.clone()),
                    deltas: self.deltas_where(|_| true),
                });
            }
        } else {
            // literals keyed by the alternatives they satisfy
            let mut cells: IndexMap<Vec<usize>, Vec<Literal>> = IndexMap::new();
            for lit in &literals {
                let holding: Vec<usize> = self.alternatives
                    .keys()
                    .enumerate()
                    .filter(|(_, k)| matches!(k, PredicateKey::Literals(ls) if ls.contains(lit)))
                    .map(|(i, _)| i)
                    .collect();
                cells.entry(holding).or_default().push(lit.clone());
            }
            for (holding, lits) in cells {
                out.push(Outcome {
                    test: FieldTest::Present(self.reference_schema.restricted_to(&lits)),
                    deltas: self.deltas_where(|i| holding.contains(&i)),
                });
            }
            let tested = self.reference_schema.restricted_to(&literals);
            if let Some(rest) = diff(&self.reference_schema, &tested) {
                out.push(Outcome { test: FieldTest::Present(rest), deltas: self.deltas_where(|_| false) });
            }
        }

        if self.alternatives.values().any(|a| matches!(a.predicate, Predicate::Exists { .. })) {
            out.push(Outcome { test: FieldTest::Absent, deltas: self.deltas_where(|_| false) });
        }
        out
    }

    /// Union of the literal sets, in first appearance order, minus literals
    /// the reference itself never takes.
    fn tested_literals(&self) -> Vec<Literal> {
        let allowed = self.reference_schema.enum_literals();
        let mut out: Vec<Literal> = Vec::new();
        for key in self.alternatives.keys() {
            let PredicateKey::Literals(ls) = key else { continue };
            for l in ls {
                if !out.contains(l) && allowed.as_ref().is_none_or(|a| a.contains(l)) {
                    out.push(l.clone());
                }
            }
        }
        out
    }

    /// `then` deltas of the alternatives `holds` picks, `otherwise` deltas of
    /// the rest, folded in alternative order.
    fn deltas_where(&self, holds: impl Fn(usize) -> bool) -> IndexMap<String, Delta> {
        let mut out = IndexMap::new();
        for (i, alt) in self.alternatives.values().enumerate() {
            let picked = if holds(i) { &alt.then } else { &alt.otherwise };
            for (field, d) in picked {
                overlay_into(&mut out, field, d.clone());
            }
        }
        out
    }
}

/// Fold `rules` into one [`GroupedCondition`] per reference path, in first
/// appearance order. Rules whose reference does not resolve in `base` are
/// skipped.
pub fn group_by_reference(
    rules: &[ConditionalRule],
    base: &Schema,
    ctx: &Context,
) -> IndexMap<String, GroupedCondition> {
    let mut groups: IndexMap<String, GroupedCondition> = IndexMap::new();

    for rule in rules {
        let Some(reference) = path::lookup(&rule.reference_path, base, ctx) else {
            tracing::warn!(
                field = %rule.field,
                reference = %rule.reference_path,
                "reference does not resolve in the base schema; skipping rule"
            );
            continue;
        };
        let reference = ctx.resolve(reference).unwrap_or(reference);

        let (predicate, then, otherwise) = match &rule.predicate {
            Predicate::Exists { required: false } => (
                Predicate::Exists { required: true },
                rule.otherwise.clone(),
                rule.then.clone(),
            ),
            p => (p.clone(), rule.then.clone(), rule.otherwise.clone()),
        };

        let key = match &predicate {
            Predicate::Enum(values) => {
                let mut values = values.clone();
                values.sort();
                values.dedup();
                PredicateKey::Literals(values)
            }
            // on an enumerated reference, presence is "one of all literals"
            Predicate::Exists { .. } => match reference.enum_literals() {
                Some(mut values) if !values.is_empty() => {
                    values.sort();
                    PredicateKey::Literals(values)
                }
                _ => PredicateKey::AllCases,
            },
        };

        tracing::debug!(field = %rule.field, reference = %rule.reference_path, key = %key, "grouping rule");

        let group = groups
            .entry(rule.reference_path.clone())
            .or_insert_with(|| GroupedCondition {
                reference_path: rule.reference_path.clone(),
                reference_schema: reference.clone(),
                alternatives: IndexMap::new(),
            });
        let alt = group
            .alternatives
            .entry(key)
            .or_insert_with(|| GroupedAlternative::new(predicate.clone()));
        // a presence test sharing literals with an enum test keeps the group's absent outcome
        if matches!(predicate, Predicate::Exists { .. }) {
            alt.predicate = predicate;
        }
        alt.join(&rule.field, then, otherwise);
    }

    for group in groups.values_mut() {
        let has_literals = group.alternatives.keys().any(|k| matches!(k, PredicateKey::Literals(_)));
        if has_literals && group.alternatives.shift_remove(&PredicateKey::AllCases).is_some() {
            tracing::warn!(
                reference = %group.reference_path,
                "existence and enum predicates on the same reference; dropping the existence rule"
            );
        }
    }

    groups
}
