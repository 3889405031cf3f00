//! Compile requests: the JSON documents the CLI and the fixture runner read.
//!
//! ```json
//! {
//!   "schema": { "type": "object", "properties": { ... } },
//!   "rules": [
//!     { "field": "a", "ref": "mode", "is": ["x"],
//!       "then": { "required": true }, "otherwise": { "required": false } }
//!   ],
//!   "components": { "Pet": { ... } },
//!   "config": { "prune_subsumed": true }
//! }
//! ```

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use crate::alternatives::{make_alternatives_from_options, maybe_options_from_whens};
use crate::alternatives::{Conditional, Converter, WhenClause};
use crate::context::{Config, Context, Registry};
use crate::error::{Error, Result};
use crate::ir::Schema;
use crate::lower::{literal_of, lower_to_ir};
use crate::path_de;
use crate::whens::{ConditionalRule, Delta, Predicate, Presence};

static FIELD_PATH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^.\s]+(\.[^.\s]+)*$").expect("field path regex"));

// ---------------------------------- Wire ---------------------------------- //

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CompileRequest {
    pub schema: Value,
    #[serde(default)]
    pub rules: Vec<RuleDoc>,
    #[serde(default)]
    pub components: IndexMap<String, Value>,
    #[serde(default)]
    pub config: Config,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleDoc {
    pub field: String,
    #[serde(rename = "ref")]
    pub reference: String,
    pub is: PredicateDoc,
    #[serde(default)]
    pub then: Option<DeltaDoc>,
    #[serde(default)]
    pub otherwise: Option<DeltaDoc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PredicateDoc {
    OneOf(Vec<Value>),
    Exists(ExistsDoc),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExistsDoc {
    pub exists: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeltaDoc {
    #[serde(default)]
    pub schema: Option<Value>,
    #[serde(default)]
    pub required: Option<bool>,
}

// ------------------------------- Conversion ------------------------------- //

impl CompileRequest {
    pub fn from_value(v: Value) -> Result<Self> {
        path_de::from_value_with_path(v)
    }

    pub fn from_json(src: &str) -> Result<Self> {
        path_de::from_str_with_path(src)
    }

    /// Context with every component lowered into the registry.
    pub fn context(&self) -> Result<Context> {
        let ctx = Context::new(self.config.clone(), Registry::new());
        let mut registry = Registry::new();
        for (name, v) in &self.components {
            registry.insert(name.clone(), lower_to_ir(v, &ctx)?);
        }
        Ok(Context { registry, ..ctx })
    }

    pub fn conditional_rules(&self, ctx: &Context) -> Result<Vec<ConditionalRule>> {
        self.rules
            .iter()
            .enumerate()
            .map(|(i, r)| r.to_rule(&format!("/rules/{i}"), ctx))
            .collect()
    }
}

impl RuleDoc {
    fn to_rule(&self, at: &str, ctx: &Context) -> Result<ConditionalRule> {
        for (key, p) in [("field", &self.field), ("ref", &self.reference)] {
            if !FIELD_PATH.is_match(p) {
                return Err(Error::malformed(&format!("{at}/{key}"), format!("`{p}` is not a dotted field path")));
            }
        }
        let predicate = match &self.is {
            PredicateDoc::Exists(ExistsDoc { exists }) => Predicate::Exists { required: *exists },
            PredicateDoc::OneOf(values) => {
                let literals = values
                    .iter()
                    .map(|v| literal_of(v).ok_or_else(|| {
                        Error::malformed(&format!("{at}/is"), format!("`{v}` is not a literal"))
                    }))
                    .collect::<Result<Vec<_>>>()?;
                if literals.is_empty() {
                    return Err(Error::malformed(&format!("{at}/is"), "empty literal set"));
                }
                Predicate::Enum(literals)
            }
        };
        Ok(ConditionalRule {
            field: self.field.clone(),
            reference_path: self.reference.clone(),
            predicate,
            then: delta(self.then.as_ref(), &format!("{at}/then"), ctx)?,
            otherwise: delta(self.otherwise.as_ref(), &format!("{at}/otherwise"), ctx)?,
        })
    }
}

fn delta(doc: Option<&DeltaDoc>, at: &str, ctx: &Context) -> Result<Delta> {
    let Some(doc) = doc else { return Ok(Delta::default()) };
    let schema = match &doc.schema {
        Some(v) => Some(lower_to_ir(v, ctx).map_err(|e| rebase(e, at))?),
        None => None,
    };
    let presence = match doc.required {
        Some(true) => Presence::Required,
        Some(false) => Presence::Optional,
        None => Presence::Inherit,
    };
    Ok(Delta { schema, presence })
}

/// Prefix a lowering error path with the location of the embedded schema.
fn rebase(e: Error, at: &str) -> Error {
    match e {
        Error::MalformedSchema { path, reason } => {
            let path = if path == "/" { format!("{at}/schema") } else { format!("{at}/schema{path}") };
            Error::MalformedSchema { path, reason }
        }
        other => other,
    }
}

// ------------------------------- JSON front ------------------------------- //

/// `Converter` for plain JSON Schema documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonConverter;

impl Converter<Value> for JsonConverter {
    fn convert(&self, node: &Value, ctx: &Context) -> Result<Schema> {
        lower_to_ir(node, ctx)
    }
}

impl Conditional for Value {
    fn when_clause(&self) -> Option<WhenClause<'_, Self>> {
        Some(WhenClause {
            is: self.get("if")?,
            then: self.get("then"),
            otherwise: self.get("else"),
        })
    }
}

/// Lower the request's schema, apply its rules, then its `if`/`then`/`else`.
pub fn compile(req: &CompileRequest) -> Result<Schema> {
    let ctx = req.context()?;
    let base = JsonConverter.convert(&req.schema, &ctx)?;
    let rules = req.conditional_rules(&ctx)?;
    tracing::debug!(rules = rules.len(), components = ctx.registry.len(), "compiling request");

    let with_rules = make_alternatives_from_options(&rules, &base, &ctx)?;
    maybe_options_from_whens(&with_rules, &req.schema, &ctx, &JsonConverter)
}
