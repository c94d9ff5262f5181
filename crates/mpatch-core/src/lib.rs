//! # mpatch-core — Merge-Patch Validation Core
//!
//! A merge patch is an incomplete document by definition: it carries only
//! the fields being changed. Validating one against a resource's full
//! schema would reject it for every field it leaves out. This crate holds
//! the two transforms that make partial validation work:
//!
//! 1. **Relaxation** ([`relax`]) rewrites a structural schema so that it
//!    stops enforcing presence (`required`) and, optionally, closedness
//!    (`additionalProperties: false`) at every depth, while leaving type,
//!    format and nested structural rules intact.
//!
//! 2. **Collection** ([`collect`]) flattens the branch-nested error records
//!    a validator produces into a [`FieldErrorMap`]: one entry per document
//!    path, each a deduplicated set of error kind names.
//!
//! ## Schema Graph
//!
//! Schemas are held in a [`SchemaGraph`] arena. Shared definitions are
//! single nodes and recursive resource types are cycles, so every
//! whole-schema walk carries a visited set.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `mpatch-*` crates.
//! - No I/O. Relaxation and collection are pure and cannot fail.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod collect;
pub mod error;
pub mod graph;
pub mod relax;
pub mod report;

// Re-export primary types for ergonomic imports.
pub use collect::{collect, FieldErrorMap};
pub use error::PatchError;
pub use graph::{Definition, DefinitionsKeyword, ExtraProperties, Items, NodeId, SchemaGraph, SchemaNode};
pub use relax::{relax, relaxed, RelaxOptions};
pub use report::{ChildSchemaError, ErrorKind, JsonType, RawError, ValidationError};
