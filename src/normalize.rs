//! Post-processing of a branch list before it becomes a `oneOf`.
//!
//! Order matters throughout: the earlier branch wins ties.

use crate::context::{Config, Context};
use crate::emit::emit_schema;
use crate::error::Result;
use crate::ir::{Combinator, CombinatorKind, Schema};
use crate::lattice::{diff, is_subset_of, merge};
use crate::path::{get, mark_required, missing_keys, project, segments, single_field};

/// Keep the head; drop every later branch whose view on `paths` is fully
/// covered by the head's view, and narrow the survivors so they stay
/// distinguishable from it. Repeats on the remainder.
pub fn remove_overlapping(list: Vec<Schema>, paths: &[String], ctx: &Context) -> Result<Vec<Schema>> {
    let mut out = Vec::with_capacity(list.len());
    let mut rest = list.into_iter();

    while let Some(head) = rest.next() {
        let head_view = project(paths, &head, ctx)?;
        let mut survivors = Vec::new();
        for obj in rest {
            let view = project(paths, &obj, ctx)?;
            let remaining = diff(&view, &head_view).unwrap_or(Schema::Any);
            if missing_keys(paths, &remaining).len() == paths.len() {
                tracing::debug!("dropping branch covered by an earlier one");
                continue;
            }
            survivors.push(separate(obj, &view, &head_view, &remaining, paths));
        }
        out.push(head);
        rest = survivors.into_iter();
    }
    Ok(out)
}

/// Constrain `obj` on the first path that tells it apart from the head.
fn separate(obj: Schema, view: &Schema, head_view: &Schema, remaining: &Schema, paths: &[String]) -> Schema {
    for p in paths {
        let (Some(ours), Some(left)) = (get(p, view), get(p, remaining)) else { continue };
        match get(p, head_view) {
            // the head lacks or forbids the field: presence alone separates
            None | Some(Schema::Never) => return mark_required(p, &obj),
            Some(_) if left != ours => {
                let narrowed = merge(&obj, &single_field(&segments(p), left.clone()));
                return mark_required(p, &narrowed);
            }
            Some(_) => {}
        }
    }
    obj
}

/// Drop structurally identical branches, keeping first occurrences.
pub fn remove_duplicates(list: Vec<Schema>) -> Vec<Schema> {
    let mut out: Vec<Schema> = Vec::with_capacity(list.len());
    for s in list {
        if !out.contains(&s) {
            out.push(s);
        }
    }
    out
}

/// Drop branches subsumed by another branch.
pub fn remove_subsets(list: Vec<Schema>) -> Vec<Schema> {
    let mut out: Vec<Schema> = Vec::with_capacity(list.len());
    for s in list {
        if out.iter().any(|o| is_subset_of(&s, o)) {
            continue;
        }
        out.retain(|o| !is_subset_of(o, &s));
        out.push(s);
    }
    out
}

/// Stable sort by serialized JSON.
pub fn canonicalize(mut list: Vec<Schema>) -> Vec<Schema> {
    list.sort_by_cached_key(|s| emit_schema(s).to_string());
    list
}

/// Final pass over a branch list: deduplicate, optionally prune and sort,
/// and wrap in a `oneOf` (a single survivor stays bare).
pub fn finalize(list: Vec<Schema>, config: &Config) -> Schema {
    let mut list = remove_duplicates(list);
    if config.prune_subsumed {
        list = remove_subsets(list);
    }
    if config.canonical_order {
        list = canonicalize(list);
    }
    Combinator::collapse(CombinatorKind::OneOf, list)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lower::lower_to_ir;
    use serde_json::{json, Value};

    fn lower(v: Value) -> Schema {
        lower_to_ir(&v, &Context::default()).unwrap()
    }

    fn with_mode(lits: &[&str], required: &[&str]) -> Schema {
        lower(json!({
            "type": "object",
            "properties": { "mode": { "type": "string", "enum": lits }, "a": { "type": "string" } },
            "required": required
        }))
    }

    #[test]
    fn covered_branch_is_dropped() {
        let head = with_mode(&["x", "y"], &["mode"]);
        let covered = with_mode(&["y"], &["mode", "a"]);
        let out = remove_overlapping(vec![head.clone(), covered], &["mode".to_string()], &Context::default()).unwrap();
        assert_eq!(out, vec![head]);
    }

    #[test]
    fn partially_covered_branch_is_narrowed() {
        let head = with_mode(&["x"], &["mode"]);
        let tail = with_mode(&["x", "y"], &[]);
        let out = remove_overlapping(vec![head, tail], &["mode".to_string()], &Context::default()).unwrap();
        assert_eq!(out.len(), 2);
        let o = out[1].as_object().unwrap();
        assert_eq!(o.properties["mode"].enum_literals(), Some(vec!["y".into()]));
        assert!(o.is_required("mode"));
    }

    #[test]
    fn field_the_head_lacks_becomes_required() {
        let head = with_mode(&["x"], &["mode"]);
        let tail = lower(json!({
            "type": "object",
            "properties": {
                "mode": { "type": "string", "enum": ["x"] },
                "flag": { "type": "boolean" }
            },
            "required": ["mode"]
        }));
        let paths = vec!["mode".to_string(), "flag".to_string()];
        let out = remove_overlapping(vec![head, tail], &paths, &Context::default()).unwrap();
        assert_eq!(out.len(), 2);
        assert!(out[1].as_object().unwrap().is_required("flag"));
    }

    #[test]
    fn field_the_head_forbids_becomes_required() {
        let obj = lower(json!({
            "type": "object",
            "properties": { "pet": { "type": "string" }, "owner": { "type": "string" } }
        }));
        let head = crate::path::mark_absent("pet", &obj);
        let tail = crate::path::mark_absent("owner", &obj);
        let paths = vec!["pet".to_string(), "owner".to_string()];
        let out = remove_overlapping(vec![head, tail], &paths, &Context::default()).unwrap();
        assert_eq!(out.len(), 2);
        assert!(out[1].as_object().unwrap().is_required("pet"));
    }

    #[test]
    fn subsets_are_pruned_in_either_order() {
        let wide = with_mode(&["x", "y"], &[]);
        let narrow = with_mode(&["x"], &[]);
        assert_eq!(remove_subsets(vec![narrow.clone(), wide.clone()]), vec![wide.clone()]);
        assert_eq!(remove_subsets(vec![wide.clone(), narrow]), vec![wide]);
    }

    #[test]
    fn finalize_collapses_a_single_survivor() {
        let s = with_mode(&["x"], &[]);
        assert_eq!(finalize(vec![s.clone(), s.clone()], &Config::default()), s);
    }

    #[test]
    fn canonical_order_is_stable_across_permutations() {
        let a = with_mode(&["x"], &[]);
        let b = with_mode(&["y"], &[]);
        let config = Config { canonical_order: true, ..Config::default() };
        assert_eq!(
            finalize(vec![a.clone(), b.clone()], &config),
            finalize(vec![b, a], &config)
        );
    }
}
