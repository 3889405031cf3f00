// Typed `Schema` → JSON Schema. Empty `properties`/`required` never appear.

use serde_json::{json, Map, Value};

use crate::ir::{NumberSchema, ObjectSchema, Schema, StringSchema};

pub const REF_PREFIX: &str = "#/components/schemas/";

pub fn emit_schema(s: &Schema) -> Value {
    match s {
        Schema::Any => json!({}),
        Schema::Never => Value::Bool(false),
        Schema::String(x) => emit_string(x),
        Schema::Number(x) => emit_number(x),
        Schema::Boolean(x) => {
            let mut o = json!({ "type": "boolean" });
            if let Some(e) = &x.enum_ {
                o["enum"] = Value::Array(e.iter().copied().map(Value::from).collect());
            }
            o
        }
        Schema::Array(x) => {
            let mut o = json!({ "type": "array" });
            if *x.items != Schema::Any {
                o["items"] = emit_schema(&x.items);
            }
            if let Some(n) = x.min_items { o["minItems"] = Value::from(n); }
            if let Some(n) = x.max_items { o["maxItems"] = Value::from(n); }
            o
        }
        Schema::Object(x) => emit_object(x),
        Schema::Ref(name) => json!({ "$ref": format!("{REF_PREFIX}{name}") }),
        Schema::Combinator(c) => {
            let mut o = Map::new();
            o.insert(
                c.kind.keyword().into(),
                Value::Array(c.branches.iter().map(emit_schema).collect()),
            );
            Value::Object(o)
        }
    }
}

fn emit_string(x: &StringSchema) -> Value {
    let mut o = json!({ "type": "string" });
    if let Some(f) = &x.format { o["format"] = Value::from(f.as_str()); }
    if let Some(n) = x.min_len() { o["minLength"] = Value::from(n); }
    if let Some(n) = x.max_len() { o["maxLength"] = Value::from(n); }
    if let Some(rx) = &x.pattern { o["pattern"] = Value::from(rx.as_str()); }
    if let Some(e) = &x.enum_ {
        o["enum"] = Value::Array(e.iter().map(|s| Value::from(s.as_str())).collect());
    }
    o
}

fn emit_number(x: &NumberSchema) -> Value {
    let ty = if x.integer { "integer" } else { "number" };
    let mut o = json!({ "type": ty });
    if let Some(f) = &x.format { o["format"] = Value::from(f.as_str()); }
    if let Some(m) = x.minimum { o["minimum"] = json_num_pref_i64(m.0); }
    if let Some(m) = x.maximum { o["maximum"] = json_num_pref_i64(m.0); }
    if let Some(e) = &x.enum_ {
        o["enum"] = Value::Array(e.iter().map(|n| json_num_pref_i64(n.0)).collect());
    }
    o
}

fn emit_object(x: &ObjectSchema) -> Value {
    let mut o = json!({ "type": "object" });
    if !x.properties.is_empty() {
        let props: Map<String, Value> = x.properties
            .iter()
            .map(|(k, v)| (k.clone(), emit_schema(v)))
            .collect();
        o["properties"] = Value::Object(props);
    }
    if !x.required.is_empty() {
        o["required"] = Value::Array(x.required.iter().map(|k| Value::from(k.as_str())).collect());
    }
    if let Some(b) = x.additional_properties {
        o["additionalProperties"] = Value::Bool(b);
    }
    o
}

/// Integral floats print as integers (`3`, not `3.0`).
fn json_num_pref_i64(x: f64) -> Value {
    if x.fract() == 0.0 && x >= i64::MIN as f64 && x <= i64::MAX as f64 {
        Value::from(x as i64)
    } else {
        serde_json::Number::from_f64(x).map(Value::Number).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::lower::lower_to_ir;

    fn roundtrip(v: Value) -> Value {
        emit_schema(&lower_to_ir(&v, &Context::default()).unwrap())
    }

    #[test]
    fn empty_containers_are_omitted() {
        assert_eq!(emit_schema(&ObjectSchema::new().into()), json!({ "type": "object" }));
    }

    #[test]
    fn references_get_the_components_prefix() {
        assert_eq!(
            emit_schema(&Schema::Ref("Pet".into())),
            json!({ "$ref": "#/components/schemas/Pet" })
        );
    }

    #[test]
    fn integral_bounds_print_as_integers() {
        let out = roundtrip(json!({ "type": "integer", "minimum": 1, "maximum": 2.5, "enum": [1, 2] }));
        assert_eq!(out, json!({ "type": "integer", "minimum": 1, "maximum": 2.5, "enum": [1, 2] }));
    }

    #[test]
    fn object_keeps_required_order() {
        let v = json!({
            "type": "object",
            "properties": { "a": { "type": "string" }, "b": { "type": "boolean", "enum": [true] } },
            "required": ["b", "a"],
            "additionalProperties": false
        });
        assert_eq!(roundtrip(v.clone()), v);
    }
}
