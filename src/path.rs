//! Dotted field paths (`"a.b.c"`) into nested object schemas.
//!
//! Queries never expand references; the operations that take a `Context`
//! (lookup, removal, projection) resolve `$ref`s on the way down.

use crate::context::Context;
use crate::error::{Error, Result};
use crate::ir::{Combinator, ObjectSchema, Schema};
use crate::lattice::merge;

pub fn segments(path: &str) -> Vec<&str> {
    if path.is_empty() { Vec::new() } else { path.split('.').collect() }
}

// ------------------------------- Queries ---------------------------------- //

/// The schema of the field at `path`, expanding references.
pub fn lookup<'a>(path: &str, schema: &'a Schema, ctx: &'a Context) -> Option<&'a Schema> {
    segments(path).into_iter().try_fold(schema, |acc, seg| {
        let acc = ctx.resolve(acc).ok()?;
        acc.as_object()?.properties.get(seg)
    })
}

/// The schema of the field at `path`, without expanding references.
pub fn get<'a>(path: &str, schema: &'a Schema) -> Option<&'a Schema> {
    segments(path)
        .into_iter()
        .try_fold(schema, |acc, seg| acc.as_object()?.properties.get(seg))
}

/// Every segment resolves and every segment (terminal included) is required
/// in its parent. A field under an optional parent is not present.
pub fn is_field_present(path: &str, obj: &Schema) -> bool {
    fn walk(path: &[&str], schema: &Schema) -> Option<()> {
        let Some((key, rest)) = path.split_first() else { return Some(()) };
        let o = schema.as_object()?;
        if !o.is_required(key) {
            return None;
        }
        walk(rest, o.properties.get(*key)?)
    }
    !path.is_empty() && walk(&segments(path), obj).is_some()
}

/// The terminal segment resolves and is required in its parent; intermediate
/// segments only need to exist.
pub fn is_required_field(path: &str, obj: &Schema) -> bool {
    let segs = segments(path);
    let Some((last, parents)) = segs.split_last() else { return false };
    parents
        .iter()
        .try_fold(obj, |acc, seg| acc.as_object()?.properties.get(*seg))
        .and_then(Schema::as_object)
        .is_some_and(|o| o.properties.contains_key(*last) && o.is_required(last))
}

pub fn required_fields_from_list(paths: &[String], obj: &Schema) -> Vec<String> {
    paths.iter().filter(|p| is_required_field(p, obj)).cloned().collect()
}

/// Paths whose property chain does not fully resolve in `obj`. Inside a
/// union a path resolves when it does in some branch.
pub fn missing_keys(paths: &[String], obj: &Schema) -> Vec<String> {
    fn resolves(path: &[&str], schema: &Schema) -> bool {
        match (path.split_first(), schema) {
            (_, Schema::Combinator(c)) => c.branches.iter().any(|b| resolves(path, b)),
            (None, _) => true,
            (Some((key, rest)), Schema::Object(o)) => {
                o.properties.get(*key).is_some_and(|child| resolves(rest, child))
            }
            (Some(_), _) => false,
        }
    }
    paths.iter().filter(|p| !resolves(&segments(p), obj)).cloned().collect()
}

// ------------------------------ Required ---------------------------------- //

/// Copy of `obj` with the terminal field of `path` required in its parent.
/// Unresolvable paths leave the copy unchanged.
pub fn mark_required(path: &str, obj: &Schema) -> Schema {
    update_required(&segments(path), obj, true)
}

/// Copy of `obj` with the terminal field of `path` no longer required.
pub fn unmark_required(path: &str, obj: &Schema) -> Schema {
    update_required(&segments(path), obj, false)
}

pub fn mark_all_required(paths: &[String], obj: &Schema) -> Schema {
    paths.iter().fold(obj.clone(), |acc, p| mark_required(p, &acc))
}

/// Require every segment of `path`, parents first, so the field is present.
pub fn mark_present(path: &str, obj: &Schema) -> Schema {
    let segs = segments(path);
    (1..=segs.len()).fold(obj.clone(), |acc, n| update_required(&segs[..n], &acc, true))
}

/// Forbid the field at `path`: its schema becomes `false` and it stops
/// being required. Parents are left as they are.
pub fn mark_absent(path: &str, obj: &Schema) -> Schema {
    let forbidden = merge(obj, &single_field(&segments(path), Schema::Never));
    unmark_required(path, &forbidden)
}

fn update_required(path: &[&str], schema: &Schema, required: bool) -> Schema {
    match schema {
        Schema::Combinator(c) => Schema::Combinator(Combinator {
            kind: c.kind,
            branches: c.branches.iter().map(|b| update_required(path, b, required)).collect(),
        }),
        Schema::Object(o) => {
            let Some((key, rest)) = path.split_first() else { return schema.clone() };
            let Some(child) = o.properties.get(*key) else { return schema.clone() };
            let mut out = o.clone();
            if rest.is_empty() {
                if required { out.mark_required(key) } else { out.unmark_required(key) }
            } else {
                out.properties.insert(key.to_string(), update_required(rest, child, required));
            }
            Schema::Object(out)
        }
        _ => schema.clone(),
    }
}

// ------------------------------- Removal ---------------------------------- //

/// Remove the terminal field of `path`, cleaning up `required`.
///
/// Unions apply the removal to every branch and deduplicate the results.
/// Missing intermediate fields make this a no-op. Anything that is neither
/// an object nor a union is an `InvalidOperation`.
pub fn remove_field(path: &str, schema: &Schema, ctx: &Context) -> Result<Schema> {
    remove_at(&segments(path), schema, ctx)
}

fn remove_at(path: &[&str], schema: &Schema, ctx: &Context) -> Result<Schema> {
    match schema {
        Schema::Combinator(c) => {
            let branches = c.branches.iter()
                .map(|b| remove_at(path, b, ctx))
                .collect::<Result<Vec<_>>>()?;
            Ok(Combinator::collapse(c.kind, branches))
        }
        Schema::Ref(_) if path.is_empty() => Ok(schema.clone()),
        Schema::Ref(name) => match ctx.resolve(schema)? {
            Schema::Ref(_) => Err(Error::InvalidOperation {
                op: "remove a field through a cyclic reference",
                found: "$ref",
            }),
            target => {
                tracing::debug!(reference = %name, "expanding reference to remove a field");
                remove_at(path, target, ctx)
            }
        },
        Schema::Object(o) => {
            let Some((key, rest)) = path.split_first() else { return Ok(schema.clone()) };
            let Some(child) = o.properties.get(*key) else { return Ok(schema.clone()) };
            let mut out = o.clone();
            if rest.is_empty() {
                out.remove_property(key);
            } else {
                let nested = remove_at(rest, child, ctx)?;
                out.properties.insert(key.to_string(), nested);
            }
            Ok(Schema::Object(out))
        }
        other => Err(Error::InvalidOperation { op: "remove a field", found: other.type_name() }),
    }
}

/// Copy of `schema` with every reference on the way to `path` (terminal
/// included) replaced by its definition.
pub fn expand_along(path: &str, schema: &Schema, ctx: &Context) -> Result<Schema> {
    expand_at(&segments(path), schema, ctx)
}

fn expand_at(path: &[&str], schema: &Schema, ctx: &Context) -> Result<Schema> {
    let Some((key, rest)) = path.split_first() else { return Ok(ctx.resolve(schema)?.clone()) };
    let Schema::Object(o) = ctx.resolve(schema)? else { return Ok(schema.clone()) };
    let mut out = o.clone();
    if let Some(child) = o.properties.get(*key) {
        out.properties.insert(key.to_string(), expand_at(rest, child, ctx)?);
    }
    Ok(Schema::Object(out))
}

// ------------------------------ Projection -------------------------------- //

/// Chain of single-key object wrappers ending in `leaf`.
pub fn single_field(path: &[&str], leaf: Schema) -> Schema {
    path.iter().rev().fold(leaf, |acc, seg| {
        ObjectSchema::new().with_property(*seg, acc).into()
    })
}

/// `obj` restricted to `paths`, keeping `additionalProperties` of every
/// object passed through. Paths that do not resolve contribute nothing.
pub fn project(paths: &[String], obj: &Schema, ctx: &Context) -> Result<Schema> {
    paths.iter().try_fold(Schema::Any, |acc, p| {
        Ok(merge(&acc, &extract(&segments(p), obj, ctx)?))
    })
}

fn extract(path: &[&str], schema: &Schema, ctx: &Context) -> Result<Schema> {
    let Some((key, rest)) = path.split_first() else { return Ok(schema.clone()) };
    let o = match ctx.resolve(schema)? {
        Schema::Object(o) => o,
        Schema::Combinator(c) => {
            let views = c.branches.iter()
                .map(|b| extract(path, b, ctx))
                .collect::<Result<Vec<_>>>()?;
            return Ok(Combinator::collapse(c.kind, views));
        }
        _ => return Ok(Schema::Any),
    };
    let Some(child) = o.properties.get(*key) else { return Ok(Schema::Any) };
    let view = ObjectSchema {
        additional_properties: o.additional_properties,
        ..ObjectSchema::new()
    };
    Ok(view.with_property(*key, extract(rest, child, ctx)?).into())
}

/// Split a peek into one single-field object chain per leaf, together with
/// the dotted path of that leaf. An unconstrained field (`{}`) is a leaf.
pub fn single_field_objects(peek: &Schema) -> (Vec<Schema>, Vec<String>) {
    match peek {
        Schema::Any => (Vec::new(), Vec::new()),
        _ => leaves(peek),
    }
}

fn leaves(peek: &Schema) -> (Vec<Schema>, Vec<String>) {
    match peek {
        Schema::Object(o) if !o.properties.is_empty() => {
            let mut objs = Vec::new();
            let mut paths = Vec::new();
            for (k, v) in &o.properties {
                let (os, ps) = leaves(v);
                objs.extend(os.into_iter().map(|x| Schema::from(ObjectSchema::new().with_property(k.clone(), x))));
                paths.extend(ps.into_iter().map(|p| if p.is_empty() { k.clone() } else { format!("{k}.{p}") }));
            }
            (objs, paths)
        }
        leaf => (vec![leaf.clone()], vec![String::new()]),
    }
}

/// Copy `additionalProperties` from `origin` onto `peek` along the
/// properties they share.
pub fn extract_peek_from_origin(origin: &Schema, peek: &Schema) -> Schema {
    let (Schema::Object(o), Schema::Object(p)) = (origin, peek) else {
        return peek.clone();
    };
    let mut out = p.clone();
    if o.additional_properties.is_some() {
        out.additional_properties = o.additional_properties;
    }
    for (k, v) in out.properties.iter_mut() {
        if let Some(from) = o.properties.get(k) {
            *v = extract_peek_from_origin(from, v);
        }
    }
    Schema::Object(out)
}
