use serde_json::{json, Value};

use json_whens::alternatives::build_branches;
use json_whens::emit::emit_schema;
use json_whens::path::remove_field;
use json_whens::request::{compile, CompileRequest};
use json_whens::whens::group_by_reference;
use json_whens::{Context, Converter, Error, JsonConverter, Schema};

fn run(request: Value) -> Value {
    let request = CompileRequest::from_value(request).unwrap();
    emit_schema(&compile(&request).unwrap())
}

/// Enough JSON Schema to check compiled output against sample documents.
fn accepts(schema: &Value, v: &Value) -> bool {
    let Some(m) = schema.as_object() else { return schema.as_bool().unwrap_or(false) };
    if let Some(branches) = m.get("oneOf").and_then(Value::as_array) {
        return branches.iter().filter(|b| accepts(b, v)).count() == 1;
    }
    if let Some(lits) = m.get("enum").and_then(Value::as_array) {
        if !lits.contains(v) {
            return false;
        }
    }
    match m.get("type").and_then(Value::as_str) {
        None => true,
        Some("string") => v.is_string(),
        Some("number") => v.is_number(),
        Some("integer") => v.as_f64().is_some_and(|f| f.fract() == 0.0),
        Some("boolean") => v.is_boolean(),
        Some("object") => {
            let Some(obj) = v.as_object() else { return false };
            let required = m.get("required").and_then(Value::as_array).cloned().unwrap_or_default();
            let properties = m.get("properties").and_then(Value::as_object).cloned().unwrap_or_default();
            required.iter().filter_map(Value::as_str).all(|k| obj.contains_key(k))
                && obj.iter().all(|(k, x)| properties.get(k).is_none_or(|p| accepts(p, x)))
        }
        Some(other) => panic!("unsupported type {other}"),
    }
}

/// Each sample is accepted by exactly one branch when valid, by none otherwise.
fn assert_partition(out: &Value, samples: &[(Value, bool)]) {
    let branches = out["oneOf"].as_array().unwrap();
    for (sample, valid) in samples {
        let hits = branches.iter().filter(|b| accepts(b, sample)).count();
        assert_eq!(hits, usize::from(*valid), "{sample} matched {hits} branches of {out:#}");
    }
}

fn required_of(branch: &Value) -> Vec<&str> {
    let mut keys: Vec<&str> = branch["required"]
        .as_array()
        .map(|xs| xs.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();
    keys.sort();
    keys
}

fn two_conditions() -> Value {
    json!({
        "schema": {
            "type": "object",
            "properties": {
                "mode": { "type": "string", "enum": ["x", "y"] },
                "kind": { "type": "string", "enum": ["p", "q"] },
                "a": { "type": "string" },
                "b": { "type": "string" }
            }
        },
        "rules": [
            { "field": "a", "ref": "mode", "is": ["x"], "then": { "required": true } },
            { "field": "b", "ref": "kind", "is": ["p"], "then": { "required": true } }
        ]
    })
}

#[test]
fn single_literal_rule_yields_positive_and_negative_branch() {
    let out = run(json!({
        "schema": {
            "type": "object",
            "properties": {
                "mode": { "type": "string" },
                "a": { "type": "string" },
                "b": { "type": "number" }
            }
        },
        "rules": [
            { "field": "a", "ref": "mode", "is": ["x"], "then": { "required": true } },
            { "field": "b", "ref": "mode", "is": ["x"], "otherwise": { "required": true } }
        ]
    }));
    let branches = out["oneOf"].as_array().unwrap();
    assert_eq!(branches.len(), 2);
    assert_eq!(branches[0]["properties"]["mode"]["enum"], json!(["x"]));
    assert_eq!(branches[0]["required"], json!(["mode", "a"]));
    assert!(branches[1]["properties"]["mode"].get("enum").is_none());
    assert_eq!(branches[1]["required"], json!(["mode", "b"]));
}

#[test]
fn two_conditions_multiply_to_four_branches() {
    let request = CompileRequest::from_value(two_conditions()).unwrap();
    let ctx = request.context().unwrap();
    let base = JsonConverter.convert(&request.schema, &ctx).unwrap();
    let rules = request.conditional_rules(&ctx).unwrap();
    let groups = group_by_reference(&rules, &base, &ctx);
    assert_eq!(build_branches(&groups).len(), 4);

    let out = run(two_conditions());
    let branches = out["oneOf"].as_array().unwrap();
    assert!(branches.len() <= 4);

    let shape: Vec<(Value, Value, Vec<&str>)> = branches.iter()
        .map(|b| (b["properties"]["mode"]["enum"].clone(), b["properties"]["kind"]["enum"].clone(), required_of(b)))
        .collect();
    assert_eq!(shape, vec![
        (json!(["x"]), json!(["p"]), vec!["a", "b", "kind", "mode"]),
        (json!(["x"]), json!(["q"]), vec!["a", "kind", "mode"]),
        (json!(["y"]), json!(["p"]), vec!["b", "kind", "mode"]),
        (json!(["y"]), json!(["q"]), vec!["kind", "mode"]),
    ]);
}

#[test]
fn two_literal_alternatives_per_reference_give_four_branches() {
    let request = json!({
        "schema": {
            "type": "object",
            "properties": {
                "mode": { "type": "string", "enum": ["x", "y"] },
                "kind": { "type": "string", "enum": ["p", "q"] },
                "a": { "type": "string" },
                "b": { "type": "string" }
            }
        },
        "rules": [
            { "field": "a", "ref": "mode", "is": ["x"], "then": { "required": true } },
            { "field": "b", "ref": "mode", "is": ["y"], "then": { "required": true } },
            { "field": "a", "ref": "kind", "is": ["p"], "otherwise": { "required": false } },
            { "field": "b", "ref": "kind", "is": ["q"], "then": { "required": true } }
        ]
    });
    let parsed = CompileRequest::from_value(request.clone()).unwrap();
    let ctx = parsed.context().unwrap();
    let base = JsonConverter.convert(&parsed.schema, &ctx).unwrap();
    let groups = group_by_reference(&parsed.conditional_rules(&ctx).unwrap(), &base, &ctx);
    assert_eq!(build_branches(&groups).len(), 4);
    assert!(run(request)["oneOf"].as_array().unwrap().len() <= 4);
}

#[test]
fn branches_partition_the_valid_documents() {
    let out = run(two_conditions());
    assert_partition(&out, &[
        (json!({ "mode": "x", "kind": "p", "a": "", "b": "" }), true),
        (json!({ "mode": "x", "kind": "p", "a": "" }), false),
        (json!({ "mode": "x", "kind": "q", "a": "" }), true),
        (json!({ "mode": "x", "kind": "q" }), false),
        (json!({ "mode": "y", "kind": "p", "b": "" }), true),
        (json!({ "mode": "y", "kind": "p" }), false),
        (json!({ "mode": "y", "kind": "q" }), true),
    ]);
}

#[test]
fn sibling_literals_on_one_reference_do_not_overlap() {
    let out = run(json!({
        "schema": {
            "type": "object",
            "properties": {
                "mode": { "type": "string", "enum": ["x", "y"] },
                "a": { "type": "string" },
                "b": { "type": "string" }
            }
        },
        "rules": [
            { "field": "a", "ref": "mode", "is": ["x"], "then": { "required": true } },
            { "field": "b", "ref": "mode", "is": ["y"], "then": { "required": true } }
        ]
    }));
    assert_eq!(out["oneOf"].as_array().unwrap().len(), 2);
    assert_partition(&out, &[
        (json!({ "mode": "x", "a": "" }), true),
        (json!({ "mode": "x" }), false),
        (json!({ "mode": "y", "b": "" }), true),
        (json!({ "mode": "y" }), false),
        (json!({ "mode": "x", "a": "", "b": "" }), true),
    ]);
}

#[test]
fn existence_of_an_object_field_tests_the_field_itself() {
    let out = run(json!({
        "schema": {
            "type": "object",
            "properties": {
                "pet": {
                    "type": "object",
                    "properties": { "kind": { "type": "string" }, "age": { "type": "number" } }
                },
                "a": { "type": "string" }
            }
        },
        "rules": [{ "field": "a", "ref": "pet", "is": { "exists": true }, "then": { "required": true } }]
    }));
    assert_eq!(out["oneOf"].as_array().unwrap().len(), 2);
    assert_partition(&out, &[
        (json!({}), true),
        (json!({ "a": "" }), true),
        (json!({ "pet": {} }), false),
        (json!({ "pet": { "age": 3 } }), false),
        (json!({ "pet": { "kind": "cat" }, "a": "" }), true),
    ]);
}

#[test]
fn rules_and_if_then_else_compile_into_one_flat_one_of() {
    let out = run(json!({
        "schema": {
            "type": "object",
            "properties": {
                "mode": { "type": "string", "enum": ["x", "y"] },
                "kind": { "type": "string", "enum": ["p", "q"] },
                "flag": { "type": "boolean" },
                "b": { "type": "string" },
                "c": { "type": "string" }
            },
            "if": { "properties": { "mode": { "const": "x" }, "kind": { "const": "p" } } },
            "then": { "required": ["b"] }
        },
        "rules": [{ "field": "c", "ref": "flag", "is": [true], "then": { "required": true } }]
    }));
    let branches = out["oneOf"].as_array().unwrap();
    assert!(branches.iter().all(|b| b.get("oneOf").is_none()), "{out:#}");
    assert_partition(&out, &[
        (json!({ "mode": "x", "kind": "q", "flag": false }), true),
        (json!({ "mode": "x", "kind": "p", "flag": false }), false),
        (json!({ "mode": "x", "kind": "p", "flag": false, "b": "" }), true),
        (json!({ "mode": "y", "kind": "p", "flag": true, "c": "" }), true),
        (json!({ "mode": "y", "kind": "p", "flag": true }), false),
        (json!({ "mode": "x", "kind": "p", "flag": true, "b": "", "c": "" }), true),
    ]);
}

#[test]
fn recompiling_emitted_output_is_a_no_op() {
    for request in [two_conditions(), json!({
        "schema": {
            "type": "object",
            "properties": { "token": { "type": "string" }, "a": { "type": "string" } }
        },
        "rules": [{ "field": "a", "ref": "token", "is": { "exists": true }, "then": { "required": true } }]
    })] {
        let once = run(request);
        assert_eq!(run(json!({ "schema": once.clone() })), once);
    }
}

#[test]
fn compilation_is_deterministic() {
    assert_eq!(run(two_conditions()), run(two_conditions()));
}

#[test]
fn prune_subsumed_never_adds_branches() {
    let plain = run(two_conditions());
    let mut request = two_conditions();
    request["config"] = json!({ "prune_subsumed": true });
    let pruned = run(request);
    let count = |v: &Value| v["oneOf"].as_array().map_or(1, Vec::len);
    assert!(count(&pruned) <= count(&plain));
}

#[test]
fn schema_without_rules_is_returned_unchanged() {
    let schema = json!({
        "type": "object",
        "properties": { "a": { "type": "string" }, "n": { "type": "integer", "maximum": 3 } },
        "required": ["a"]
    });
    let once = run(json!({ "schema": schema.clone() }));
    assert_eq!(once, schema);
    assert_eq!(run(json!({ "schema": once })), schema);
}

#[test]
fn rule_on_missing_reference_is_skipped() {
    let schema = json!({ "type": "object", "properties": { "a": { "type": "string" } } });
    let out = run(json!({
        "schema": schema.clone(),
        "rules": [{ "field": "a", "ref": "ghost.field", "is": ["x"], "then": { "required": true } }]
    }));
    assert_eq!(out, schema);
}

#[test]
fn removing_under_a_missing_parent_is_a_no_op() {
    let ctx = Context::default();
    let schema = json_whens::lower::lower_to_ir(
        &json!({ "type": "object", "properties": { "a": { "type": "string" } } }),
        &ctx,
    )
    .unwrap();
    assert_eq!(remove_field("x.y", &schema, &ctx).unwrap(), schema);
}

#[test]
fn removing_from_a_leaf_is_an_invalid_operation() {
    let ctx = Context::default();
    let err = remove_field("a", &Schema::string(), &ctx).unwrap_err();
    assert!(matches!(err, Error::InvalidOperation { found: "string", .. }));
}

#[test]
fn unknown_component_surfaces_when_removal_needs_it() {
    let ctx = Context::default();
    let err = remove_field("a", &Schema::Ref("Missing".into()), &ctx).unwrap_err();
    assert!(matches!(err, Error::UnknownReference(name) if name == "Missing"));
}
