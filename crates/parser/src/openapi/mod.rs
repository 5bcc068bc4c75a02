//! OpenAPI 3.x documents
//!
//! ## Usage
//! ```rust,ignore
//! use routedoc_parser::openapi::OpenApiParser;
//!
//! let raw = OpenApiParser::from_file("routing-openapi.json")?;
//! let resolved = routedoc_parser::resolve(&raw)?;
//! ```

mod parser;
mod types;

pub use parser::OpenApiParser;
pub use types::*;
