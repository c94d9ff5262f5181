//! # Error Types
//!
//! Faults that cross the validation boundary. All errors use `thiserror`
//! for derive-based `Display` and `Error` implementations.
//!
//! ## Design
//!
//! - A structurally invalid patch document is never an error: it is data,
//!   reported through [`crate::FieldErrorMap`].
//! - Schema acquisition and compilation faults are configuration errors.
//!   They carry the resource name so the misconfigured type can be found.

use thiserror::Error;

/// Top-level error type for merge-patch validation.
#[derive(Error, Debug)]
pub enum PatchError {
    /// The schema provider could not produce a structural schema.
    #[error("schema generation failed for resource '{resource}': {reason}")]
    SchemaGeneration {
        /// Resource type the schema was requested for.
        resource: String,
        /// Reason the provider failed.
        reason: String,
    },

    /// The produced schema is not a usable JSON Schema document.
    #[error("invalid schema for resource '{resource}': {reason}")]
    InvalidSchema {
        /// Resource type the schema belongs to.
        resource: String,
        /// What is wrong with the schema.
        reason: String,
    },

    /// Validator configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(String),
}

impl PatchError {
    /// Shorthand for an [`PatchError::InvalidSchema`] fault.
    pub fn invalid_schema(resource: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidSchema {
            resource: resource.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for a [`PatchError::SchemaGeneration`] fault.
    pub fn generation(resource: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SchemaGeneration {
            resource: resource.into(),
            reason: reason.into(),
        }
    }
}
