//! Template loading and management

use routedoc_common::{DocError, Result};
use std::collections::HashMap;
use tera::{Tera, Value};

/// Load all templates
pub fn load_templates() -> Result<Tera> {
    let mut tera = Tera::default();

    // Register custom filters
    tera.register_filter("md_cell", md_cell_filter);
    tera.register_filter("upper_method", upper_method_filter);

    tera.add_raw_template(
        "endpoints_summary.md",
        include_str!("../templates/endpoints_summary.md.tera"),
    )
    .map_err(|e| {
        DocError::Template(format!("Failed to load endpoints_summary.md template: {}", e))
    })?;

    tera.add_raw_template("basic_info.md", include_str!("../templates/basic_info.md.tera"))
        .map_err(|e| {
            DocError::Template(format!("Failed to load basic_info.md template: {}", e))
        })?;

    Ok(tera)
}

/// Make text safe for a single markdown table cell
fn md_cell_filter(value: &Value, _args: &HashMap<String, Value>) -> tera::Result<Value> {
    let s = match value {
        Value::Null => "",
        Value::String(s) => s.as_str(),
        _ => return Err(tera::Error::msg("md_cell filter expects a string")),
    };

    Ok(Value::String(escape_md_cell(s)))
}

/// Render a lowercase method name as `GET`, `POST`, ...
fn upper_method_filter(value: &Value, _args: &HashMap<String, Value>) -> tera::Result<Value> {
    let s = value
        .as_str()
        .ok_or_else(|| tera::Error::msg("upper_method filter expects a string"))?;

    Ok(Value::String(s.to_uppercase()))
}

pub(crate) fn escape_md_cell(s: &str) -> String {
    s.split(|c| c == '\r' || c == '\n')
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
        .replace('|', "\\|")
}
