//! Compile field-level conditional rules (and JSON Schema `if`/`then`/`else`)
//! into an explicit `oneOf` of alternative object schemas.
//!
//! Pipeline: [`lower`] JSON into the typed [`ir`], group the rules
//! ([`whens`]), build and multiply branches ([`alternatives`]) with the
//! [`lattice`] algebra, clean them up ([`normalize`]) and [`emit`] JSON.

pub mod alternatives;
pub mod context;
pub mod emit;
pub mod error;
pub mod ir;
pub mod jq_exec;
pub mod lattice;
pub mod logging;
pub mod lower;
pub mod normalize;
pub mod path;
pub mod path_de;
pub mod request;
pub mod whens;

pub use alternatives::{make_alternatives_from_options, maybe_options_from_whens, Conditional, Converter};
pub use context::{Config, Context, Registry};
pub use error::{Error, Result};
pub use ir::Schema;
pub use request::{compile, CompileRequest, JsonConverter};
