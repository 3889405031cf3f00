//! Runs every `fixtures/*.json` file: compile `request`, compare with `expected`.
//!
//! ```text
//! cargo run -p dev-test-runner -- [REGEX]
//! ```
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use colored::Colorize;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use json_whens::emit::emit_schema;
use json_whens::logging::{self, LogFormat};
use json_whens::path_de::from_str_with_path;
use json_whens::request::{compile, CompileRequest};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Fixture {
    #[serde(default)]
    description: Option<String>,
    request: Value,
    expected: Value,
}

enum Outcome {
    Pass,
    Fail { got: Value, expected: Value },
    Error(String),
}

fn run_fixture(path: &PathBuf) -> Result<(Option<String>, Outcome)> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let fixture: Fixture = from_str_with_path(&source)
        .with_context(|| format!("malformed fixture {}", path.display()))?;
    let outcome = match CompileRequest::from_value(fixture.request).and_then(|r| compile(&r)) {
        Err(error) => Outcome::Error(error.to_string()),
        Ok(schema) => {
            let got = emit_schema(&schema);
            if got == fixture.expected {
                Outcome::Pass
            } else {
                Outcome::Fail { got, expected: fixture.expected }
            }
        }
    };
    Ok((fixture.description, outcome))
}

fn main() -> Result<ExitCode> {
    logging::init(LogFormat::Human, 0);

    let filter = std::env::args()
        .nth(1)
        .map(|rx| Regex::new(&rx))
        .transpose()
        .context("invalid filter regex")?;

    let pattern = concat!(env!("CARGO_MANIFEST_DIR"), "/fixtures/*.json");
    let mut paths: Vec<PathBuf> = glob::glob(pattern)?.collect::<Result<_, _>>()?;
    paths.sort();

    let (mut passed, mut failed) = (0usize, 0usize);
    for path in paths {
        let name = path.file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_default();
        if filter.as_ref().is_some_and(|rx| !rx.is_match(&name)) {
            continue;
        }
        let (description, outcome) = run_fixture(&path)?;
        let label = match description {
            Some(d) => format!("{name} ({d})"),
            None => name,
        };
        match outcome {
            Outcome::Pass => {
                passed += 1;
                println!("{} {label}", "PASS".green().bold());
            }
            Outcome::Fail { got, expected } => {
                failed += 1;
                println!("{} {label}", "FAIL".red().bold());
                println!("  expected: {}", serde_json::to_string_pretty(&expected)?);
                println!("  got:      {}", serde_json::to_string_pretty(&got)?);
            }
            Outcome::Error(message) => {
                failed += 1;
                println!("{} {label}: {message}", "ERROR".red().bold());
            }
        }
    }

    println!("\n{passed} passed, {failed} failed");
    Ok(if failed == 0 { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}
