//! OpenAPI document handling for routedoc
//!
//! This crate turns a fetched OpenAPI document into provider-scoped,
//! self-contained documents:
//!
//! ```text
//! RawSpec --resolve--> ResolvedSpec --partition--> ProviderSpec (one per provider)
//! ```
//!
//! ## Resolution
//!
//! Every document-local `$ref` is replaced by a copy of its target. Cycles,
//! cross-document references and pointers to missing locations are errors.
//!
//! ## Partitioning
//!
//! Each path belongs to exactly one provider: the first one, in registry
//! order, whose path-prefix or tag predicate matches. Component entries
//! reachable from several providers are copied into each of them.

pub mod node;
pub mod openapi;
mod partitioner;
mod resolver;
mod spec;

pub use node::{Node, Primitive, Reference};
pub use partitioner::partition;
pub use resolver::{decode_pointer, resolve};
pub use spec::{ProviderSpec, RawSpec, ResolvedSpec};
