//! # Relaxed Schema Cache
//!
//! Generating a schema means introspecting a type, and compiling it means
//! building a validator; neither should happen per request. The cache holds
//! one [`PreparedSchema`] per (resource, policy, relaxation) key for the
//! life of the process. Schemas derive from static type definitions, so
//! entries never go stale.
//!
//! ## Single Flight
//!
//! Each key owns a `tokio::sync::OnceCell`. The first caller for a key runs
//! generation, relaxation and compilation; concurrent callers for the same
//! key wait on that computation instead of starting their own. A failed
//! initialization leaves the cell empty, so the next caller retries.

use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use mpatch_core::{collect, relax, FieldErrorMap, PatchError, RawError, RelaxOptions, SchemaGraph};
use serde_json::Value;
use tokio::sync::OnceCell;

use crate::config::ContractPolicy;
use crate::engine::CompiledSchema;
use crate::provider::{ResourceKey, SchemaProvider};

/// Identity of a prepared schema.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub resource: ResourceKey,
    pub policy: ContractPolicy,
    pub allow_additional_properties: bool,
}

/// A relaxed, compiled schema for one resource type. Immutable.
#[derive(Debug)]
pub struct PreparedSchema {
    resource: String,
    graph: SchemaGraph,
    compiled: CompiledSchema,
}

impl PreparedSchema {
    /// Relax and compile a full schema document.
    ///
    /// # Errors
    ///
    /// Returns [`PatchError::InvalidSchema`] if `document` is not a schema
    /// or the relaxed schema does not compile.
    pub fn prepare(
        resource: &str,
        document: &Value,
        policy: &ContractPolicy,
        options: RelaxOptions,
    ) -> Result<Self, PatchError> {
        let mut graph = SchemaGraph::from_value(document).map_err(|e| match e {
            PatchError::InvalidSchema { reason, .. } => PatchError::invalid_schema(resource, reason),
            other => other,
        })?;
        let visited = relax(&mut graph, options);
        let compiled = CompiledSchema::compile(resource, graph.to_value(), policy.draft)?;
        tracing::info!(
            resource,
            %policy,
            nodes = graph.len(),
            relaxed = visited,
            "compiled relaxed schema"
        );
        Ok(Self {
            resource: resource.to_string(),
            graph,
            compiled,
        })
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// The relaxed schema graph.
    pub fn graph(&self) -> &SchemaGraph {
        &self.graph
    }

    /// The relaxed schema as the JSON document the engine compiled.
    pub fn relaxed_schema(&self) -> &Value {
        self.compiled.document()
    }

    /// Raw structural errors for `document`.
    pub fn validate(&self, document: &Value) -> Vec<RawError> {
        self.compiled.validate(document)
    }

    /// Flattened per-path errors for `document`.
    pub fn field_errors(&self, document: &Value) -> FieldErrorMap {
        collect(&self.validate(document))
    }
}

/// Process-lifetime cache of prepared schemas.
#[derive(Debug, Default)]
pub struct SchemaCache {
    entries: DashMap<CacheKey, Arc<OnceCell<Arc<PreparedSchema>>>>,
}

static SHARED: OnceLock<Arc<SchemaCache>> = OnceLock::new();

impl SchemaCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide cache.
    pub fn shared() -> Arc<Self> {
        SHARED.get_or_init(|| Arc::new(Self::new())).clone()
    }

    /// Fetch the prepared schema for `provider`'s resource, generating,
    /// relaxing and compiling it on first use.
    ///
    /// # Errors
    ///
    /// Propagates provider and compilation faults. Nothing is cached for a
    /// failed attempt.
    #[tracing::instrument(skip_all, fields(resource = %provider.resource_name(), policy = %policy))]
    pub async fn acquire<P: SchemaProvider + ?Sized>(
        &self,
        provider: &P,
        policy: &ContractPolicy,
        options: RelaxOptions,
    ) -> Result<Arc<PreparedSchema>, PatchError> {
        let key = CacheKey {
            resource: provider.resource_key(),
            policy: *policy,
            allow_additional_properties: options.allow_additional_properties,
        };
        let resource = provider.resource_name();
        let cell = self.entries.entry(key).or_default().clone();

        if let Some(prepared) = cell.get() {
            tracing::debug!("schema cache hit");
            return Ok(prepared.clone());
        }

        let prepared = cell
            .get_or_try_init(|| async {
                tracing::debug!("schema cache miss; generating");
                let document = provider.generate(policy).await?;
                PreparedSchema::prepare(&resource, &document, policy, options).map(Arc::new)
            })
            .await?;
        Ok(prepared.clone())
    }

    /// Whether a prepared schema is present for `key`.
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries
            .get(key)
            .is_some_and(|cell| cell.initialized())
    }

    /// Number of prepared schemas held.
    pub fn len(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.value().initialized())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry. In-flight initializations complete into cells that
    /// are no longer reachable.
    pub fn clear(&self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::StaticSchema;
    use serde_json::json;

    fn note() -> StaticSchema {
        StaticSchema::new(
            "Note",
            json!({
                "type": "object",
                "properties": { "body": { "type": "string" } },
                "required": ["body"],
                "additionalProperties": false
            }),
        )
    }

    #[test]
    fn prepare_relaxes_before_compiling() {
        let prepared = PreparedSchema::prepare(
            "Note",
            note().document(),
            &ContractPolicy::default(),
            RelaxOptions::default(),
        )
        .unwrap();
        assert!(prepared.relaxed_schema().get("required").is_none());
        assert_eq!(prepared.relaxed_schema()["additionalProperties"], json!(true));
        assert!(prepared.validate(&json!({ "extra": 1 })).is_empty());
        assert!(prepared.field_errors(&json!({ "body": 1 })).contains("/body", "StringExpected"));
    }

    #[test]
    fn prepare_names_resource_on_bad_schema() {
        let err = PreparedSchema::prepare(
            "Broken",
            &json!("not a schema"),
            &ContractPolicy::default(),
            RelaxOptions::default(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("Broken"));
    }

    #[tokio::test]
    async fn second_acquire_hits_cache() {
        let cache = SchemaCache::new();
        let policy = ContractPolicy::default();
        let first = cache.acquire(&note(), &policy, RelaxOptions::default()).await.unwrap();
        let second = cache.acquire(&note(), &policy, RelaxOptions::default()).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn relaxation_options_are_part_of_the_key() {
        let cache = SchemaCache::new();
        let policy = ContractPolicy::default();
        let open = cache.acquire(&note(), &policy, RelaxOptions::default()).await.unwrap();
        let closed = cache
            .acquire(
                &note(),
                &policy,
                RelaxOptions {
                    allow_additional_properties: false,
                },
            )
            .await
            .unwrap();
        assert!(!Arc::ptr_eq(&open, &closed));
        assert_eq!(cache.len(), 2);
        assert!(!closed.validate(&json!({ "extra": 1 })).is_empty());

        cache.clear();
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn same_name_with_different_documents_is_not_shared() {
        let cache = SchemaCache::new();
        let policy = ContractPolicy::default();
        let loose = StaticSchema::new("Note", json!({ "properties": { "body": { "type": "string" } } }));
        let first = cache.acquire(&note(), &policy, RelaxOptions::default()).await.unwrap();
        let second = cache.acquire(&loose, &policy, RelaxOptions::default()).await.unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 2);
        assert!(cache.contains(&CacheKey {
            resource: loose.resource_key(),
            policy,
            allow_additional_properties: true,
        }));
    }

    #[test]
    fn shared_is_a_singleton() {
        assert!(Arc::ptr_eq(&SchemaCache::shared(), &SchemaCache::shared()));
    }
}
