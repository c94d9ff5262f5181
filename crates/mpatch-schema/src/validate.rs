//! # Patch Validation
//!
//! Entry point for a host's request-validation pipeline. A
//! [`PatchValidator`] is bound to one resource type: it acquires the
//! relaxed schema for that type (once, through the [`SchemaCache`]),
//! validates each incoming merge patch against it and turns the flattened
//! errors into one [`FieldValidationResult`] per offending field.
//!
//! ## Error Policy
//!
//! - A structurally invalid patch is `Ok` with failure results.
//! - An explicit `null` is a deletion marker and is never reported.
//! - Only schema acquisition faults (a type that cannot be described, a
//!   schema that does not compile, bad configuration) are `Err`.

use std::sync::Arc;

use mpatch_core::graph::unescape_pointer_token;
use mpatch_core::{collect, FieldErrorMap, PatchError};
use schemars::JsonSchema;
use serde::Serialize;
use serde_json::Value;

use crate::cache::{PreparedSchema, SchemaCache};
use crate::config::ValidatorConfig;
use crate::provider::{SchemaProvider, TypeSchema};

/// Why one field of a patch was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldFailure {
    /// Comma-joined, duplicate-free error kind names.
    pub message: String,
    /// Dotted member path of the field (`address.city`, `tags.1`); empty
    /// for the document itself. A segment containing `.`, `[` or `]` is
    /// written as a quoted index (`meta["a.b"]`).
    pub member_names: Vec<String>,
}

/// Outcome reported to the host pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FieldValidationResult {
    Success,
    Invalid(FieldFailure),
}

impl FieldValidationResult {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    pub fn failure(&self) -> Option<&FieldFailure> {
        match self {
            Self::Success => None,
            Self::Invalid(failure) => Some(failure),
        }
    }
}

/// Convert a flattened error map into host results.
///
/// An empty map is a single success.
pub fn field_results(errors: FieldErrorMap) -> Vec<FieldValidationResult> {
    if errors.is_empty() {
        return vec![FieldValidationResult::Success];
    }
    errors
        .into_iter()
        .map(|(path, kinds)| {
            FieldValidationResult::Invalid(FieldFailure {
                message: kinds.into_iter().collect::<Vec<_>>().join(","),
                member_names: vec![member_path(&path)],
            })
        })
        .collect()
}

/// `/address/city` → `address.city`; `/meta/a.b` → `meta["a.b"]`;
/// `""` → `""`.
pub fn member_path(pointer: &str) -> String {
    let mut out = String::new();
    for (index, token) in pointer.split('/').skip(1).map(unescape_pointer_token).enumerate() {
        if token.contains(['.', '[', ']']) {
            out.push('[');
            out.push_str(&Value::String(token).to_string());
            out.push(']');
        } else {
            if index > 0 {
                out.push('.');
            }
            out.push_str(&token);
        }
    }
    out
}

/// Validates merge patches for one resource type.
pub struct PatchValidator<P> {
    provider: P,
    config: ValidatorConfig,
    cache: Arc<SchemaCache>,
}

impl<P: std::fmt::Debug> std::fmt::Debug for PatchValidator<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PatchValidator")
            .field("provider", &self.provider)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<T: JsonSchema + 'static> PatchValidator<TypeSchema<T>> {
    /// Validator for the Rust type `T`, using the process-wide cache.
    pub fn for_type(config: ValidatorConfig) -> Self {
        Self::new(TypeSchema::new(), config)
    }
}

impl<P: SchemaProvider> PatchValidator<P> {
    /// Validator backed by the process-wide [`SchemaCache`].
    pub fn new(provider: P, config: ValidatorConfig) -> Self {
        Self::with_cache(provider, config, SchemaCache::shared())
    }

    pub fn with_cache(provider: P, config: ValidatorConfig, cache: Arc<SchemaCache>) -> Self {
        Self {
            provider,
            config,
            cache,
        }
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Acquire the relaxed schema, generating it on first use.
    ///
    /// Call at startup to move generation cost off the request path.
    pub async fn prepare(&self) -> Result<Arc<PreparedSchema>, PatchError> {
        self.cache
            .acquire(&self.provider, &self.config.policy, self.config.relax_options())
            .await
    }

    /// Flattened per-path errors for `document`.
    pub async fn field_errors(&self, document: &Value) -> Result<FieldErrorMap, PatchError> {
        let schema = self.prepare().await?;
        Ok(collect(&schema.validate(document)))
    }

    /// Validate a merge patch.
    ///
    /// Returns a single [`FieldValidationResult::Success`] when the patch is
    /// acceptable, otherwise one [`FieldValidationResult::Invalid`] per
    /// offending path.
    ///
    /// # Errors
    ///
    /// Only schema acquisition faults. Invalid documents are `Ok`.
    pub async fn validate(&self, document: &Value) -> Result<Vec<FieldValidationResult>, PatchError> {
        let schema = self.prepare().await?;
        let raw = schema.validate(document);
        if raw.is_empty() {
            return Ok(vec![FieldValidationResult::Success]);
        }
        let errors = collect(&raw);
        tracing::debug!(
            resource = schema.resource(),
            raw = raw.len(),
            paths = errors.len(),
            "merge patch validated with errors"
        );
        Ok(field_results(errors))
    }
}
