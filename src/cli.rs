//! CLI: compile requests → `oneOf` schemas, plus the algebra as subcommands.
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context as _, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use rayon::prelude::*;
use serde_json::Value;

use json_whens::context::{Config, Context, Registry};
use json_whens::emit::emit_schema;
use json_whens::ir::Schema;
use json_whens::lattice::{diff, is_subset_of, merge};
use json_whens::logging::LogFormat;
use json_whens::lower::lower_to_ir;
use json_whens::request::{compile, CompileRequest};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// compile conditional field rules into explicit `oneOf` JSON schemas
#[derive(Parser, Debug)]
pub struct CommandLineInterface {
    /// log output format (logs go to stderr)
    #[arg(long, value_enum, global = true, default_value_t = LogFormat::Human)]
    pub log_format: LogFormat,

    /// more logging (-v debug, -vv trace); RUST_LOG takes precedence
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// compile request documents (`{ schema, rules?, components?, config? }`)
    Compile(CompileOut),
    /// is every value accepted by LEFT also accepted by RIGHT?
    Subset(Pair),
    /// right-biased merge of two schemas
    Merge(Pair),
    /// what LEFT accepts that RIGHT does not (`null` when nothing is left)
    Diff(Pair),
}

#[derive(Args, Debug, Clone)]
struct InputSettings {
    /// JSON Pointer to select a subnode in each document (e.g. /requests/0)
    #[arg(long)]
    json_pointer: Option<String>,

    /// JQ pre-process filter for each document; every output is one request
    #[arg(long)]
    jq_expr: Option<String>,

    /// One or more inputs. May be literal paths or quoted glob patterns
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,
}

#[derive(Args, Debug, Clone, Default)]
struct ConfigOverrides {
    /// sort output branches by their serialized form
    #[arg(long)]
    canonical_order: bool,

    /// drop output branches subsumed by another branch
    #[arg(long)]
    prune_subsumed: bool,

    /// nesting / reference-chain limit
    #[arg(long)]
    max_depth: Option<usize>,
}

#[derive(clap::Parser, Debug)]
struct CompileOut {
    #[command(flatten)]
    input_settings: InputSettings,

    #[command(flatten)]
    overrides: ConfigOverrides,

    /// output .json file (stdout if omitted); several results are written as an array
    #[arg(short, long)]
    out: Option<PathBuf>,
}

#[derive(clap::Parser, Debug)]
struct Pair {
    /// left schema (JSON file)
    left: PathBuf,

    /// right schema (JSON file)
    right: PathBuf,

    /// JSON file mapping component names to schemas, for `$ref`s
    #[arg(long)]
    components: Option<PathBuf>,

    #[command(flatten)]
    overrides: ConfigOverrides,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl InputSettings {
    /// Every selected document, labelled with where it came from.
    fn load(&self) -> Result<Vec<(String, Value)>> {
        let source_paths = resolve_file_path_patterns(&self.input)
            .context("failed to resolve input file paths")?;
        let mut out = Vec::new();
        for source_path in source_paths {
            let label = source_path.to_string_lossy().to_string();
            let mut json_value = read_json(&source_path)?;
            if let Some(pointer) = self.json_pointer.as_deref() {
                json_value = json_value
                    .pointer(pointer)
                    .cloned()
                    .ok_or_else(|| anyhow!("JSON pointer {pointer} selects nothing in {label}"))?;
            }
            match self.jq_expr.as_deref() {
                None => out.push((label, json_value)),
                Some(jq_expr) => {
                    let results = json_whens::jq_exec::run_jaq(jq_expr, &json_value)
                        .with_context(|| format!("failed to apply jq expression to {label}"))?;
                    for (i, v) in results.into_iter().enumerate() {
                        out.push((format!("{label}#{i}"), v));
                    }
                }
            }
        }
        Ok(out)
    }
}

impl ConfigOverrides {
    fn apply(&self, config: &mut Config) {
        config.canonical_order |= self.canonical_order;
        config.prune_subsumed |= self.prune_subsumed;
        if let Some(d) = self.max_depth {
            config.max_depth = d;
        }
    }
}

impl Pair {
    fn load(&self) -> Result<(Context, Schema, Schema)> {
        let mut config = Config::default();
        self.overrides.apply(&mut config);
        let bare = Context::new(config.clone(), Registry::new());

        let mut registry = Registry::new();
        if let Some(path) = self.components.as_ref() {
            let Value::Object(components) = read_json(path)? else {
                bail!("{} must hold a JSON object of named schemas", path.display());
            };
            for (name, v) in &components {
                let s = lower_to_ir(v, &bare).with_context(|| format!("component {name}"))?;
                registry.insert(name.clone(), s);
            }
        }
        let ctx = Context::new(config, registry);
        let left = lower_to_ir(&read_json(&self.left)?, &ctx)
            .with_context(|| format!("in {}", self.left.display()))?;
        let right = lower_to_ir(&read_json(&self.right)?, &ctx)
            .with_context(|| format!("in {}", self.right.display()))?;
        Ok((ctx, left, right))
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    pub fn run(&self) -> Result<()> {
        match &self.cmd {
            Command::Compile(target) => {
                let documents = target.input_settings.load()?;
                tracing::info!(documents = documents.len(), "compiling");

                // one document per task; compilation itself is single-threaded
                let compiled = documents
                    .par_iter()
                    .map(|(label, doc)| {
                        let mut request = CompileRequest::from_value(doc.clone())
                            .with_context(|| format!("invalid request in {label}"))?;
                        target.overrides.apply(&mut request.config);
                        let schema = compile(&request)
                            .with_context(|| format!("failed to compile {label}"))?;
                        Ok(emit_schema(&schema))
                    })
                    .collect::<Result<Vec<Value>>>()?;

                let output = match <[Value; 1]>::try_from(compiled) {
                    Ok([single]) => single,
                    Err(many) => Value::Array(many),
                };
                write_output(target.out.as_deref(), &output)
            }
            Command::Subset(pair) => {
                let (_, left, right) = pair.load()?;
                if is_subset_of(&left, &right) {
                    println!("{} {} ⊆ {}", "yes".green().bold(), pair.left.display(), pair.right.display());
                } else {
                    println!("{} {} ⊄ {}", "no".red().bold(), pair.left.display(), pair.right.display());
                }
                Ok(())
            }
            Command::Merge(pair) => {
                let (_, left, right) = pair.load()?;
                write_output(None, &emit_schema(&merge(&left, &right)))
            }
            Command::Diff(pair) => {
                let (_, left, right) = pair.load()?;
                let rest = diff(&left, &right).map(|s| emit_schema(&s)).unwrap_or(Value::Null);
                write_output(None, &rest)
            }
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn read_json(path: &Path) -> Result<Value> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read source file {}", path.display()))?;
    serde_json::from_str(&source)
        .with_context(|| format!("failed to parse JSON source file {}", path.display()))
}

fn write_output(out: Option<&Path>, value: &Value) -> Result<()> {
    let src = serde_json::to_string_pretty(value)?;
    match out {
        Some(out) => {
            if let Some(parent) = out.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(out, &src).with_context(|| format!("failed to write {}", out.display()))
        }
        None => {
            println!("{src}");
            Ok(())
        }
    }
}

fn resolve_file_path_patterns<I>(patterns: I) -> Result<Vec<PathBuf>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        // Minimal glob detection for the `glob` crate syntax.
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'[' | b'{'))
    }

    let mut out = Vec::<PathBuf>::new();

    for raw in patterns {
        let pattern = raw.as_ref();

        if has_glob_chars(pattern) {
            let mut matched_any = false;
            for entry in glob::glob(pattern)? {
                out.push(entry?);
                matched_any = true;
            }
            if !matched_any {
                // Pattern was explicitly a glob but matched nothing -> surface as an error
                bail!("glob pattern matched no files: {pattern}");
            }
        } else {
            out.push(PathBuf::from(pattern));
        }
    }

    Ok(out)
}
