//! # mpatch-schema — Merge-Patch Validation
//!
//! Validates JSON merge patches against the schema of a target resource
//! type without rejecting them for the fields they leave out.
//!
//! ## Pipeline
//!
//! 1. [`SchemaProvider`] produces the full structural schema of the
//!    resource ([`TypeSchema`] derives it from a Rust type with `schemars`,
//!    [`StaticSchema`] serves an authored document).
//! 2. The schema is relaxed (`mpatch_core::relax`) and compiled once per
//!    (resource, policy) by the [`SchemaCache`].
//! 3. [`PatchValidator::validate`] runs the patch through the compiled
//!    schema ([`CompiledSchema`], backed by `jsonschema`), flattens the
//!    branch-nested errors and reports one [`FieldValidationResult`] per
//!    offending field.
//!
//! ## Example
//!
//! ```no_run
//! use mpatch_schema::{PatchValidator, ValidatorConfig};
//! use schemars::JsonSchema;
//! use serde::Deserialize;
//!
//! #[derive(Deserialize, JsonSchema)]
//! struct Person {
//!     name: String,
//!     age: u32,
//! }
//!
//! # async fn run() -> Result<(), mpatch_core::PatchError> {
//! let validator = PatchValidator::<mpatch_schema::TypeSchema<Person>>::for_type(ValidatorConfig::default());
//! let results = validator.validate(&serde_json::json!({ "age": "old" })).await?;
//! assert!(!results[0].is_success());
//! # Ok(())
//! # }
//! ```
//!
//! ## Crate Policy
//!
//! - Depends only on `mpatch-core` internally.
//! - Validation never raises for a bad document; only schema acquisition
//!   faults are errors.
//! - No network or file access during validation: external `$ref`s are
//!   refused at compile time.

pub mod cache;
pub mod config;
pub mod engine;
pub mod provider;
pub mod validate;

pub use cache::{CacheKey, PreparedSchema, SchemaCache};
pub use config::{ConfigError, Contract, ContractPolicy, SchemaDraft, ValidatorConfig};
pub use engine::CompiledSchema;
pub use provider::{ResourceKey, SchemaProvider, StaticSchema, TypeSchema};
pub use validate::{field_results, member_path, FieldFailure, FieldValidationResult, PatchValidator};
