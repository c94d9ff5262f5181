//! # Schema Providers
//!
//! A provider produces the full structural schema of one resource type
//! under a [`ContractPolicy`]. Generation may be expensive, so callers go
//! through [`crate::SchemaCache`], which invokes a provider at most once per
//! (resource, policy) pair.
//!
//! - [`TypeSchema`] derives the schema from a Rust type with `schemars`.
//!   Field naming follows the type's serde attributes (`rename_all`,
//!   `rename`, `flatten`, ...).
//! - [`StaticSchema`] serves an authored JSON Schema document.
//!
//! ## Identity
//!
//! The cache keys prepared schemas on [`ResourceKey`], not on the display
//! name. A type is identified by its `TypeId`; an authored document by the
//! SHA-256 digest of its JCS canonical form, so two documents registered
//! under one name never share an entry.

use std::any::TypeId;
use std::borrow::Cow;
use std::marker::PhantomData;

use async_trait::async_trait;
use mpatch_core::PatchError;
use schemars::generate::SchemaSettings;
use schemars::JsonSchema;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::config::{Contract, ContractPolicy, SchemaDraft};

/// Identity of the schema a provider serves.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResourceKey {
    /// A Rust type described by `schemars`.
    Type(TypeId),
    /// An authored document, by name and canonical digest.
    Document {
        name: Cow<'static, str>,
        digest: [u8; 32],
    },
    /// A provider-declared name. Providers sharing a name must serve the
    /// same schema.
    Named(Cow<'static, str>),
}

/// Source of structural schemas for a resource type.
#[async_trait]
pub trait SchemaProvider: Send + Sync {
    /// Human-readable name of the resource type, used in logs and errors.
    fn resource_name(&self) -> Cow<'static, str>;

    /// Cache identity of the schema this provider serves.
    fn resource_key(&self) -> ResourceKey {
        ResourceKey::Named(self.resource_name())
    }

    /// Produce the full (unrelaxed) JSON Schema document.
    ///
    /// # Errors
    ///
    /// Returns [`PatchError::SchemaGeneration`] if the resource type cannot
    /// be described under `policy`.
    async fn generate(&self, policy: &ContractPolicy) -> Result<Value, PatchError>;
}

/// Derives the schema of `T` with `schemars`.
pub struct TypeSchema<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T: JsonSchema + 'static> TypeSchema<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T: JsonSchema + 'static> Default for TypeSchema<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for TypeSchema<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("TypeSchema")
            .field(&std::any::type_name::<T>())
            .finish()
    }
}

#[async_trait]
impl<T: JsonSchema + 'static> SchemaProvider for TypeSchema<T> {
    fn resource_name(&self) -> Cow<'static, str> {
        Cow::Borrowed(std::any::type_name::<T>())
    }

    fn resource_key(&self) -> ResourceKey {
        ResourceKey::Type(TypeId::of::<T>())
    }

    async fn generate(&self, policy: &ContractPolicy) -> Result<Value, PatchError> {
        let settings = match policy.draft {
            SchemaDraft::Draft7 => SchemaSettings::draft07(),
            SchemaDraft::Draft202012 => SchemaSettings::draft2020_12(),
        };
        let settings = match policy.contract {
            Contract::Deserialize => settings.for_deserialize(),
            Contract::Serialize => settings.for_serialize(),
        };
        let schema = settings.into_generator().into_root_schema_for::<T>();
        serde_json::to_value(schema)
            .map_err(|e| PatchError::generation(std::any::type_name::<T>(), e.to_string()))
    }
}

/// Serves a fixed JSON Schema document, whatever the policy.
#[derive(Debug, Clone)]
pub struct StaticSchema {
    name: Cow<'static, str>,
    document: Value,
    digest: [u8; 32],
}

impl StaticSchema {
    pub fn new(name: impl Into<Cow<'static, str>>, document: Value) -> Self {
        let digest = document_digest(&document);
        Self {
            name: name.into(),
            document,
            digest,
        }
    }

    /// Load an authored schema written in YAML.
    ///
    /// # Errors
    ///
    /// Returns [`PatchError::SchemaGeneration`] if `source` is not valid YAML
    /// or uses constructs JSON cannot represent.
    pub fn from_yaml_str(name: impl Into<Cow<'static, str>>, source: &str) -> Result<Self, PatchError> {
        let name = name.into();
        let document: Value = serde_yaml::from_str(source)
            .map_err(|e| PatchError::generation(name.as_ref(), format!("invalid YAML: {e}")))?;
        Ok(Self::new(name, document))
    }

    pub fn document(&self) -> &Value {
        &self.document
    }
}

/// SHA-256 over the JCS canonical form of `document`.
fn document_digest(document: &Value) -> [u8; 32] {
    // JCS only rejects non-finite numbers, which a `Value` cannot hold.
    let canonical = serde_jcs::to_string(document).unwrap_or_else(|_| document.to_string());
    Sha256::digest(canonical.as_bytes()).into()
}

#[async_trait]
impl SchemaProvider for StaticSchema {
    fn resource_name(&self) -> Cow<'static, str> {
        self.name.clone()
    }

    fn resource_key(&self) -> ResourceKey {
        ResourceKey::Document {
            name: self.name.clone(),
            digest: self.digest,
        }
    }

    async fn generate(&self, _policy: &ContractPolicy) -> Result<Value, PatchError> {
        Ok(self.document.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[allow(dead_code)]
    #[derive(Deserialize, JsonSchema)]
    #[serde(rename_all = "camelCase")]
    struct Invoice {
        invoice_number: String,
        line_count: u32,
        #[serde(default)]
        memo: Option<String>,
    }

    #[tokio::test]
    async fn type_schema_follows_serde_naming() {
        let schema = TypeSchema::<Invoice>::new()
            .generate(&ContractPolicy::default())
            .await
            .unwrap();
        assert!(schema.pointer("/properties/invoiceNumber").is_some());
        assert!(schema.pointer("/properties/lineCount").is_some());
        let required = schema["required"].as_array().unwrap();
        assert!(required.contains(&Value::from("invoiceNumber")));
        assert!(!required.contains(&Value::from("memo")));
    }

    #[tokio::test]
    async fn draft7_uses_definitions_dialect() {
        let policy = ContractPolicy {
            draft: SchemaDraft::Draft7,
            ..ContractPolicy::default()
        };
        let schema = TypeSchema::<Invoice>::new().generate(&policy).await.unwrap();
        let dialect = schema["$schema"].as_str().unwrap();
        assert!(dialect.contains("draft-07"), "unexpected dialect {dialect}");
    }

    #[test]
    fn resource_name_is_type_path() {
        let name = TypeSchema::<Invoice>::new().resource_name();
        assert!(name.ends_with("Invoice"));
    }

    #[allow(dead_code)]
    #[derive(JsonSchema)]
    struct Receipt {
        invoice_number: String,
    }

    #[test]
    fn type_keys_are_distinct_per_type() {
        let invoice = TypeSchema::<Invoice>::new().resource_key();
        assert_eq!(invoice, TypeSchema::<Invoice>::new().resource_key());
        assert_ne!(invoice, TypeSchema::<Receipt>::new().resource_key());
        assert_eq!(invoice, ResourceKey::Type(TypeId::of::<Invoice>()));
    }

    #[test]
    fn document_key_ignores_member_order() {
        let a = StaticSchema::new("Sample", serde_json::json!({ "type": "object", "minProperties": 1 }));
        let b = StaticSchema::new("Sample", serde_json::json!({ "minProperties": 1, "type": "object" }));
        assert_eq!(a.resource_key(), b.resource_key());
    }

    #[test]
    fn same_name_different_document_has_distinct_key() {
        let a = StaticSchema::new("Sample", serde_json::json!({ "properties": { "n": { "type": "integer" } } }));
        let b = StaticSchema::new("Sample", serde_json::json!({ "properties": { "n": { "type": "string" } } }));
        assert_eq!(a.resource_name(), b.resource_name());
        assert_ne!(a.resource_key(), b.resource_key());
    }

    #[tokio::test]
    async fn static_schema_from_yaml() {
        let provider = StaticSchema::from_yaml_str(
            "Note",
            "type: object\nproperties:\n  body:\n    type: string\nrequired: [body]\n",
        )
        .unwrap();
        let schema = provider.generate(&ContractPolicy::default()).await.unwrap();
        assert_eq!(schema["properties"]["body"]["type"], "string");
        assert_eq!(provider.resource_name(), "Note");
    }

    #[test]
    fn static_schema_rejects_bad_yaml() {
        let err = StaticSchema::from_yaml_str("Broken", "type: [unclosed").unwrap_err();
        assert!(matches!(err, PatchError::SchemaGeneration { .. }));
    }
}
