//! Core logic of the `structdiff` command-line tool.
//!
//! - `structdiff diff`   : print the diff tree of two JSON documents
//! - `structdiff changes`: print the flattened change list with revert patches

use serde_json::Value;
use thiserror::Error;

use crate::change_list::build_change_list;
use crate::diff::{diff_document, DiffOptions};
use crate::error::SchemaError;
use crate::schema::Schema;

// ── Errors ────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum CliError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error("unknown schema type: {0}")]
    UnknownType(String),
}

/// Parsed inputs shared by the subcommands.
pub struct Inputs {
    pub from: Value,
    pub to: Value,
    pub schema: Schema,
    pub type_name: Option<String>,
}

impl Inputs {
    pub fn parse(from: &str, to: &str, schema: Option<&str>, type_name: Option<&str>) -> Result<Self, CliError> {
        let schema = match schema {
            Some(src) => Schema::from_json_str(src)?,
            None => Schema::new(),
        };
        if let Some(name) = type_name {
            if schema.get(name).is_none() {
                return Err(CliError::UnknownType(name.to_string()));
            }
        }
        Ok(Self {
            from: serde_json::from_str(from)?,
            to: serde_json::from_str(to)?,
            schema,
            type_name: type_name.map(str::to_string),
        })
    }

    fn options(&self) -> DiffOptions<'_> {
        DiffOptions::new().with_schema(&self.schema)
    }
}

// ── diff ──────────────────────────────────────────────────────────────────

pub fn diff(inputs: &Inputs) -> Result<Value, CliError> {
    let schema_type = inputs.type_name.as_deref().and_then(|n| inputs.schema.get(n));
    let diff = diff_document(Some(&inputs.from), Some(&inputs.to), schema_type, &inputs.options());
    Ok(serde_json::to_value(&diff)?)
}

// ── changes ───────────────────────────────────────────────────────────────

pub fn changes(inputs: &Inputs) -> Result<Value, CliError> {
    let schema_type = inputs
        .type_name
        .as_deref()
        .and_then(|n| inputs.schema.get(n))
        .or_else(|| inputs.schema.type_of(&inputs.to));
    let diff = crate::diff::diff(Some(&inputs.from), Some(&inputs.to), schema_type, &inputs.options());
    Ok(serde_json::to_value(build_change_list(&diff, schema_type))?)
}
