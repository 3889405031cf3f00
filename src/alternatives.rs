//! Turn grouped conditions into the branches of a `oneOf`.
//!
//! Field-level rules: every condition splits into disjoint outcomes (see
//! [`GroupedCondition::outcomes`]) and independent conditions multiply, so
//! each `AlternativeBranch` picks one outcome per reference path.
//!
//! `if`/`then`/`else`: `make_options` splits one `(peek, then, otherwise)`
//! triple into a positive branch and one negative branch per tested field.

use indexmap::IndexMap;

use crate::context::Context;
use crate::error::Result;
use crate::ir::Schema;
use crate::lattice::{diff, merge};
use crate::normalize::{finalize, remove_overlapping};
use crate::path::{
    expand_along, extract_peek_from_origin, get, mark_absent, mark_all_required, mark_present,
    mark_required, segments, single_field, single_field_objects, unmark_required,
};
use crate::whens::{
    group_by_reference, overlay_into, ConditionalRule, Delta, FieldTest, GroupedCondition, Outcome, Presence,
};

// ------------------------------ Collaborators ----------------------------- //

/// Front-end that turns one of its own nodes into a `Schema`.
pub trait Converter<N: ?Sized> {
    fn convert(&self, node: &N, ctx: &Context) -> Result<Schema>;
}

/// The `if` / `then` / `else` parts of a node, borrowed from it.
#[derive(Debug)]
pub struct WhenClause<'a, N: ?Sized> {
    pub is: &'a N,
    pub then: Option<&'a N>,
    pub otherwise: Option<&'a N>,
}

pub trait Conditional {
    fn when_clause(&self) -> Option<WhenClause<'_, Self>>;
}

// -------------------------------- Branches -------------------------------- //

/// One outcome per tested reference path, with their deltas folded together.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlternativeBranch {
    pub tests: Vec<(String, FieldTest)>,
    pub deltas: IndexMap<String, Delta>,
}

impl AlternativeBranch {
    fn with(&self, reference: &str, outcome: &Outcome) -> Self {
        let mut out = self.clone();
        out.tests.push((reference.to_string(), outcome.test.clone()));
        for (field, d) in &outcome.deltas {
            overlay_into(&mut out.deltas, field, d.clone());
        }
        out
    }

    /// The tested fields as nested single-field objects.
    pub fn peek(&self) -> Schema {
        self.tests.iter().fold(Schema::Any, |acc, (path, test)| {
            merge(&acc, &single_field(&segments(path), test.leaf()))
        })
    }

    /// `full` with the deltas applied and every tested field narrowed:
    /// present fields become required along their whole path, absent ones
    /// are forbidden.
    pub fn realize(&self, full: &Schema) -> Schema {
        let narrowed = merge(&apply_deltas(&self.deltas, full), &self.peek());
        self.tests.iter().fold(narrowed, |acc, (path, test)| match test {
            FieldTest::Present(_) => mark_present(path, &acc),
            FieldTest::Absent => mark_absent(path, &acc),
        })
    }
}

/// Every combination of outcomes across independent reference paths.
pub fn build_branches(groups: &IndexMap<String, GroupedCondition>) -> Vec<AlternativeBranch> {
    let mut acc = vec![AlternativeBranch::default()];
    for (reference, group) in groups {
        let outcomes = group.outcomes();
        acc = acc.iter()
            .flat_map(|b| outcomes.iter().map(move |o| b.with(reference, o)))
            .collect();
        tracing::debug!(reference = %reference, outcomes = outcomes.len(), branches = acc.len(), "multiplied condition");
    }
    acc
}

/// Fold field deltas onto `original`: each schema becomes a single-field
/// patch merged in order, then presences are applied.
pub fn apply_deltas(deltas: &IndexMap<String, Delta>, original: &Schema) -> Schema {
    let patched = deltas.iter().fold(original.clone(), |acc, (field, delta)| {
        match &delta.schema {
            Some(schema) => merge(&acc, &single_field(&segments(field), schema.clone())),
            None => acc,
        }
    });
    deltas.iter().fold(patched, |acc, (field, delta)| match delta.presence {
        Presence::Required => mark_required(field, &acc),
        Presence::Optional => unmark_required(field, &acc),
        Presence::Inherit => acc,
    })
}

// -------------------------------- Options --------------------------------- //

/// Split one `(peek, then, otherwise)` triple into a `oneOf`: the positive
/// branch first, then one negative branch per field the peek tests.
pub fn make_options(peek: &Schema, then: &Schema, otherwise: &Schema, ctx: &Context) -> Result<Schema> {
    Ok(Schema::one_of(option_branches(peek, then, otherwise, ctx)?))
}

fn option_branches(peek: &Schema, then: &Schema, otherwise: &Schema, ctx: &Context) -> Result<Vec<Schema>> {
    let (falsy, paths) = single_field_objects(peek);
    let positive = mark_all_required(&paths, &merge(then, peek));

    let negatives: Vec<Schema> = falsy.iter()
        .zip(&paths)
        .filter_map(|(excluded, p)| negative(otherwise, excluded, p))
        .collect();
    let negatives = remove_overlapping(negatives, &paths, ctx)?;

    Ok(std::iter::once(positive).chain(negatives).collect())
}

/// `otherwise` with the field at `path` failing `excluded`. A presence test
/// fails by the field being absent. A declared field with no values left
/// over cannot fail, so there is no branch.
fn negative(otherwise: &Schema, excluded: &Schema, path: &str) -> Option<Schema> {
    let rest = diff(otherwise, excluded)?;
    if get(path, excluded) == Some(&Schema::Any) {
        return Some(mark_absent(path, &rest));
    }
    match (get(path, otherwise), get(path, &rest)) {
        (Some(_), Some(_)) => Some(mark_required(path, &rest)),
        (Some(_), None) => None,
        // undeclared in the base: nothing to narrow
        (None, _) => Some(rest),
    }
}

/// Drop from `obj.required` every key that `patch` declares without
/// requiring it.
pub fn overwrite_required(obj: &Schema, patch: &Schema) -> Schema {
    let (Schema::Object(o), Schema::Object(p)) = (obj, patch) else { return obj.clone() };
    let mut out = o.clone();
    out.required.retain(|k| !p.properties.contains_key(k) || p.is_required(k));
    Schema::Object(out)
}

// ------------------------------ Entry points ------------------------------ //

/// Compile field-level conditional rules against `base` into a single
/// `oneOf`. Without applicable rules `base` comes back unchanged.
pub fn make_alternatives_from_options(
    rules: &[ConditionalRule],
    base: &Schema,
    ctx: &Context,
) -> Result<Schema> {
    let groups = group_by_reference(rules, base, ctx);
    if groups.is_empty() {
        return Ok(base.clone());
    }

    // references on the way to a tested field are inlined so branches can narrow it
    let full = groups.keys().try_fold(base.clone(), |acc, reference| expand_along(reference, &acc, ctx))?;
    let out: Vec<Schema> = build_branches(&groups).iter().map(|b| b.realize(&full)).collect();
    tracing::debug!(rules = rules.len(), branches = out.len(), "built alternatives");
    Ok(finalize(out, &ctx.config))
}

/// Compile the `when` clause of `node`, if it has one, against `base`. A
/// `oneOf` base is compiled branch by branch and the results flattened.
pub fn maybe_options_from_whens<N, C>(base: &Schema, node: &N, ctx: &Context, convert: &C) -> Result<Schema>
where
    N: Conditional + ?Sized,
    C: Converter<N>,
{
    let Some(when) = node.when_clause() else { return Ok(base.clone()) };

    let is = convert.convert(when.is, ctx)?;
    let then = match when.then {
        Some(n) => convert.convert(n, ctx)?,
        None => Schema::Any,
    };
    let otherwise = match when.otherwise {
        Some(n) => convert.convert(n, ctx)?,
        None => Schema::Any,
    };

    let mut out = Vec::new();
    for branch in base.one_of_branches() {
        let then = merge(&overwrite_required(branch, &then), &then);
        let otherwise = merge(&overwrite_required(branch, &otherwise), &otherwise);
        let peek = extract_peek_from_origin(branch, &is);
        out.extend(option_branches(&peek, &then, &otherwise, ctx)?);
    }
    tracing::debug!(branches = out.len(), "compiled when clause");
    Ok(finalize(out, &ctx.config))
}
