// JSON Schema (serde_json::Value) → typed `Schema`.
//
// Only the keywords the algebra understands are read; `if`/`then`/`else`
// are left for `request::JsonConverter`, everything else is ignored.

use indexmap::IndexSet;
use ordered_float::OrderedFloat;
use regex::Regex;
use serde_json::{Map, Value};

use crate::context::Context;
use crate::error::{Error, Result};
use crate::ir::{
    ArraySchema, BooleanSchema, Combinator, CombinatorKind, Literal, NumberSchema,
    ObjectSchema, Schema, StringSchema,
};

const REF_PREFIXES: [&str; 3] = ["#/components/schemas/", "#/definitions/", "#/$defs/"];

pub fn lower_to_ir(v: &Value, ctx: &Context) -> Result<Schema> {
    Lowering { limit: ctx.config.max_depth }.lower(v, "", 0)
}

/// Strip the usual JSON pointer prefixes from a `$ref` target.
pub fn reference_name(target: &str) -> &str {
    REF_PREFIXES
        .iter()
        .find_map(|p| target.strip_prefix(p))
        .unwrap_or(target)
}

/// JSON scalar → literal. `null` and containers are not literals.
pub fn literal_of(v: &Value) -> Option<Literal> {
    match v {
        Value::String(s) => Some(Literal::String(s.clone())),
        Value::Number(n) => n.as_f64().map(Literal::from),
        Value::Bool(b) => Some(Literal::Bool(*b)),
        _ => None,
    }
}

struct Lowering {
    limit: usize,
}

impl Lowering {
    fn lower(&self, v: &Value, at: &str, depth: usize) -> Result<Schema> {
        if depth > self.limit {
            return Err(Error::DepthExceeded { limit: self.limit });
        }
        let m = match v {
            Value::Object(m) => m,
            Value::Bool(true) => return Ok(Schema::Any),
            Value::Bool(false) => return Ok(Schema::Never),
            _ => return Err(Error::malformed(at, "a schema must be an object")),
        };

        if let Some(target) = m.get("$ref") {
            let target = target
                .as_str()
                .ok_or_else(|| Error::malformed(at, "`$ref` must be a string"))?;
            return Ok(Schema::Ref(reference_name(target).to_string()));
        }

        for kind in [CombinatorKind::OneOf, CombinatorKind::AnyOf, CombinatorKind::AllOf] {
            if let Some(xs) = m.get(kind.keyword()) {
                let here = format!("{at}/{}", kind.keyword());
                let branches = self.lower_list(xs, &here, depth)?;
                return Ok(Schema::Combinator(Combinator { kind, branches }));
            }
        }

        let literals = literals(m, at)?;
        let ty = match m.get("type") {
            None => None,
            Some(Value::String(t)) => Some(t.as_str()),
            Some(_) => return Err(Error::malformed(at, "`type` must be a single string")),
        };

        match ty {
            Some("string") => self.string(m, at, literals),
            Some("number") => self.number(m, at, literals, false),
            Some("integer") => self.number(m, at, literals, true),
            Some("boolean") => Ok(Schema::Boolean(BooleanSchema {
                enum_: literals.map(|ls| {
                    ls.into_iter().filter_map(|l| match l {
                        Literal::Bool(b) => Some(b),
                        _ => None,
                    }).collect()
                }),
            })),
            Some("array") => self.array(m, at, depth),
            Some("object") => self.object(m, at, depth),
            Some(other) => Err(Error::malformed(at, format!("unsupported type `{other}`"))),
            None => match literals {
                Some(ls) => Ok(Schema::from_literals(&ls)),
                None if m.contains_key("properties") || m.contains_key("required") => {
                    self.object(m, at, depth)
                }
                None => Ok(Schema::Any),
            },
        }
    }

    fn lower_list(&self, xs: &Value, at: &str, depth: usize) -> Result<Vec<Schema>> {
        let xs = xs
            .as_array()
            .ok_or_else(|| Error::malformed(at, "expected an array of schemas"))?;
        xs.iter()
            .enumerate()
            .map(|(i, x)| self.lower(x, &format!("{at}/{i}"), depth + 1))
            .collect()
    }

    fn string(&self, m: &Map<String, Value>, at: &str, literals: Option<Vec<Literal>>) -> Result<Schema> {
        let pattern = opt_str(m, "pattern", at)?;
        if let Some(rx) = &pattern {
            Regex::new(rx).map_err(|e| Error::malformed(at, format!("bad pattern: {e}")))?;
        }
        let enum_ = match literals {
            Some(ls) => Some(ls.into_iter().map(|l| match l {
                Literal::String(s) => Ok(s),
                other => Err(Error::malformed(at, format!("`{other}` in a string enum"))),
            }).collect::<Result<IndexSet<String>>>()?),
            None => None,
        };
        Ok(Schema::String(StringSchema {
            format: opt_str(m, "format", at)?,
            length: opt_u64(m, "length", at)?,
            min_length: opt_u64(m, "minLength", at)?,
            max_length: opt_u64(m, "maxLength", at)?,
            pattern,
            enum_,
        }))
    }

    fn number(&self, m: &Map<String, Value>, at: &str, literals: Option<Vec<Literal>>, integer: bool) -> Result<Schema> {
        let enum_ = match literals {
            Some(ls) => Some(ls.into_iter().map(|l| match l {
                Literal::Number(n) => Ok(n),
                other => Err(Error::malformed(at, format!("`{other}` in a numeric enum"))),
            }).collect::<Result<IndexSet<OrderedFloat<f64>>>>()?),
            None => None,
        };
        Ok(Schema::Number(NumberSchema {
            integer,
            format: opt_str(m, "format", at)?,
            minimum: opt_f64(m, "minimum", at)?.map(Into::into),
            maximum: opt_f64(m, "maximum", at)?.map(Into::into),
            enum_,
        }))
    }

    fn array(&self, m: &Map<String, Value>, at: &str, depth: usize) -> Result<Schema> {
        let here = format!("{at}/items");
        let items = match m.get("items") {
            None => Schema::Any,
            // positional items: any listed schema may appear
            Some(xs @ Value::Array(_)) => Combinator::collapse(
                CombinatorKind::AnyOf,
                self.lower_list(xs, &here, depth)?,
            ),
            Some(x) => self.lower(x, &here, depth + 1)?,
        };
        Ok(Schema::Array(ArraySchema {
            items: Box::new(items),
            min_items: opt_u64(m, "minItems", at)?,
            max_items: opt_u64(m, "maxItems", at)?,
        }))
    }

    fn object(&self, m: &Map<String, Value>, at: &str, depth: usize) -> Result<Schema> {
        let mut out = ObjectSchema::new();
        match m.get("properties") {
            None => {}
            Some(Value::Object(props)) => {
                for (k, v) in props {
                    let child = self.lower(v, &format!("{at}/properties/{k}"), depth + 1)?;
                    out.properties.insert(k.clone(), child);
                }
            }
            Some(_) => return Err(Error::malformed(at, "`properties` must be an object")),
        }
        match m.get("required") {
            None => {}
            Some(Value::Array(keys)) => {
                for k in keys {
                    let k = k
                        .as_str()
                        .ok_or_else(|| Error::malformed(at, "`required` must list strings"))?;
                    // a required key without a property schema may hold anything
                    out.properties.entry(k.to_string()).or_insert(Schema::Any);
                    out.required.insert(k.to_string());
                }
            }
            Some(_) => return Err(Error::malformed(at, "`required` must be an array")),
        }
        out.additional_properties = match m.get("additionalProperties") {
            Some(Value::Bool(b)) => Some(*b),
            // schema-valued additionalProperties are opaque to the algebra
            _ => None,
        };
        Ok(Schema::Object(out))
    }
}

fn literals(m: &Map<String, Value>, at: &str) -> Result<Option<Vec<Literal>>> {
    let raw: Vec<&Value> = match (m.get("const"), m.get("enum")) {
        (Some(c), _) => vec![c],
        (None, Some(Value::Array(xs))) => xs.iter().collect(),
        (None, Some(_)) => return Err(Error::malformed(at, "`enum` must be an array")),
        (None, None) => return Ok(None),
    };
    // `null` cannot be expressed by the leaf kinds
    Ok(Some(raw.into_iter().filter_map(literal_of).collect()))
}

fn opt_str(m: &Map<String, Value>, key: &str, at: &str) -> Result<Option<String>> {
    match m.get(key) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(Error::malformed(at, format!("`{key}` must be a string"))),
    }
}

fn opt_u64(m: &Map<String, Value>, key: &str, at: &str) -> Result<Option<u64>> {
    match m.get(key) {
        None => Ok(None),
        Some(v) => v
            .as_u64()
            .map(Some)
            .ok_or_else(|| Error::malformed(at, format!("`{key}` must be a non-negative integer"))),
    }
}

fn opt_f64(m: &Map<String, Value>, key: &str, at: &str) -> Result<Option<f64>> {
    match m.get(key) {
        None => Ok(None),
        Some(v) => v
            .as_f64()
            .map(Some)
            .ok_or_else(|| Error::malformed(at, format!("`{key}` must be a number"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Config;
    use serde_json::json;

    fn lower(v: Value) -> Result<Schema> {
        lower_to_ir(&v, &Context::default())
    }

    #[test]
    fn empty_object_is_any() {
        assert_eq!(lower(json!({})).unwrap(), Schema::Any);
        assert_eq!(lower(json!(true)).unwrap(), Schema::Any);
        assert_eq!(lower(json!(false)).unwrap(), Schema::Never);
    }

    #[test]
    fn references_lose_their_prefix() {
        assert_eq!(
            lower(json!({ "$ref": "#/components/schemas/Pet" })).unwrap(),
            Schema::Ref("Pet".into())
        );
        assert_eq!(lower(json!({ "$ref": "Pet" })).unwrap(), Schema::Ref("Pet".into()));
    }

    #[test]
    fn const_without_type_infers_the_kind() {
        let s = lower(json!({ "const": "x" })).unwrap();
        assert_eq!(s.enum_literals(), Some(vec![Literal::from("x")]));
        let mixed = lower(json!({ "enum": [1, "a"] })).unwrap();
        assert_eq!(mixed.type_name(), "anyOf");
    }

    #[test]
    fn object_keywords() {
        let s = lower(json!({
            "type": "object",
            "properties": {
                "a": { "type": "integer", "minimum": 1 },
                "b": { "type": "string", "enum": ["p", "q"] }
            },
            "required": ["b", "ghost"],
            "additionalProperties": false
        }))
        .unwrap();
        let o = s.as_object().unwrap();
        assert_eq!(o.properties["a"].type_name(), "integer");
        assert_eq!(o.required.iter().collect::<Vec<_>>(), ["b", "ghost"]);
        assert_eq!(o.properties["ghost"], Schema::Any);
        assert_eq!(o.additional_properties, Some(false));
    }

    #[test]
    fn positional_items_become_any_of() {
        let s = lower(json!({ "type": "array", "items": [{ "type": "string" }, { "type": "number" }] })).unwrap();
        let Schema::Array(a) = s else { panic!("expected array") };
        assert_eq!(a.item_alternatives().len(), 2);
    }

    #[test]
    fn bad_pattern_reports_its_path() {
        let err = lower(json!({
            "type": "object",
            "properties": { "a": { "type": "string", "pattern": "(" } }
        }))
        .unwrap_err();
        match err {
            Error::MalformedSchema { path, .. } => assert_eq!(path, "/properties/a"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn enum_of_the_wrong_kind_is_malformed() {
        assert!(matches!(
            lower(json!({ "type": "string", "enum": [1] })),
            Err(Error::MalformedSchema { .. })
        ));
    }

    #[test]
    fn nesting_is_bounded() {
        let ctx = Context { config: Config { max_depth: 2, ..Config::default() }, ..Context::default() };
        let deep = json!({ "properties": { "a": { "properties": { "b": { "properties": { "c": {} } } } } } });
        assert!(matches!(lower_to_ir(&deep, &ctx), Err(Error::DepthExceeded { limit: 2 })));
    }
}
