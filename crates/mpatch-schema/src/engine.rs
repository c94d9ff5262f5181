//! # Structural Validation Engine
//!
//! Compiles relaxed schemas with the `jsonschema` crate and translates its
//! errors into [`RawError`] records.
//!
//! ## Error Translation
//!
//! `jsonschema` reports a failed `oneOf`/`anyOf` as a single error without
//! the reasons each branch rejected the value. Those reasons are what a
//! caller needs ("`id` must be an integer or a string"), so a composite
//! failure is expanded here: the branch array is found by walking the
//! error's schema location, each branch is compiled on its own (with the
//! root's definitions attached) and re-run against the failing sub-instance.
//! Branch error paths are re-based onto the composite's path.
//!
//! A `type` error is classified by reading the failing `type` keyword. A
//! null instance, or a value where only `null` was allowed, is
//! [`ErrorKind::NullExpected`]. A keyword listing several types
//! (`["string", "null"]` for an optional field) becomes a composite with one
//! branch per listed type, so collection keeps `StringExpected` and drops the
//! null branch.
//!
//! ## Schema Resolution
//!
//! Only local references are resolvable. Any `$ref` that would need a
//! network or file lookup makes compilation fail, which surfaces as a
//! configuration fault rather than a silently permissive schema.

use std::fmt;

use jsonschema::error::ValidationErrorKind;
use jsonschema::{Retrieve, Uri, ValidationOptions, Validator};
use mpatch_core::graph::{escape_pointer_token, unescape_pointer_token};
use mpatch_core::{ErrorKind, JsonType, PatchError, RawError};
use serde_json::{Map, Value};

use crate::config::SchemaDraft;

/// Definition slot that stands in for the document root when a branch is
/// compiled on its own.
const ROOT_ALIAS: &str = "__mpatch_root";

/// Retriever that refuses every external reference.
struct LocalOnlyRetriever;

impl Retrieve for LocalOnlyRetriever {
    fn retrieve(
        &self,
        uri: &Uri<&str>,
    ) -> Result<Value, Box<dyn std::error::Error + Send + Sync>> {
        Err(format!("external schema reference '{}' cannot be resolved", uri.as_str()).into())
    }
}

fn build_options(draft: SchemaDraft) -> ValidationOptions {
    let mut opts = jsonschema::options();
    opts.with_draft(draft.engine_draft());
    opts.should_validate_formats(true);
    opts.with_retriever(LocalOnlyRetriever);
    opts
}

fn build_validator(document: &Value, draft: SchemaDraft) -> Result<Validator, String> {
    build_options(draft).build(document).map_err(|e| e.to_string())
}

/// A relaxed schema compiled for repeated validation.
///
/// `Send + Sync`; one instance serves every validation of its resource type.
pub struct CompiledSchema {
    document: Value,
    draft: SchemaDraft,
    validator: Validator,
}

impl fmt::Debug for CompiledSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledSchema")
            .field("draft", &self.draft)
            .field("document", &self.document)
            .finish_non_exhaustive()
    }
}

impl CompiledSchema {
    /// Compile `document` for `resource`.
    ///
    /// # Errors
    ///
    /// Returns [`PatchError::InvalidSchema`] if the engine rejects the
    /// schema or it references an external document.
    pub fn compile(resource: &str, document: Value, draft: SchemaDraft) -> Result<Self, PatchError> {
        let validator = build_validator(&document, draft)
            .map_err(|reason| PatchError::invalid_schema(resource, reason))?;
        Ok(Self {
            document,
            draft,
            validator,
        })
    }

    pub fn document(&self) -> &Value {
        &self.document
    }

    pub fn draft(&self) -> SchemaDraft {
        self.draft
    }

    pub fn is_valid(&self, instance: &Value) -> bool {
        self.validator.is_valid(instance)
    }

    /// Validate `instance`, returning every structural complaint.
    ///
    /// Never fails: an invalid document is reported, not raised.
    pub fn validate(&self, instance: &Value) -> Vec<RawError> {
        Translator {
            root: &self.document,
            draft: self.draft,
        }
        .run(&self.validator, instance, "")
    }
}

/// Translates engine errors raised against one schema document.
struct Translator<'s> {
    root: &'s Value,
    draft: SchemaDraft,
}

impl Translator<'_> {
    fn run(&self, validator: &Validator, instance: &Value, base: &str) -> Vec<RawError> {
        let mut out = Vec::new();
        for error in validator.iter_errors(instance) {
            self.translate(&error, base, &mut out);
        }
        out
    }

    fn translate(&self, error: &jsonschema::ValidationError<'_>, base: &str, out: &mut Vec<RawError>) {
        let path = format!("{base}{}", error.instance_path);
        let location = error.schema_path.to_string();
        let instance: &Value = error.instance.as_ref();

        match &error.kind {
            ValidationErrorKind::Type { .. } => {
                out.push(self.type_error(path, &location, instance));
            }
            ValidationErrorKind::Required { property } => {
                let name = property.as_str().map_or_else(|| property.to_string(), str::to_string);
                out.push(RawError::leaf(child_path(&path, &name), ErrorKind::PropertyRequired));
            }
            ValidationErrorKind::AdditionalProperties { unexpected } => {
                out.extend(unexpected.iter().map(|name| {
                    RawError::leaf(child_path(&path, name), ErrorKind::NoAdditionalPropertiesAllowed)
                }));
            }
            ValidationErrorKind::UnevaluatedProperties { unexpected } => {
                out.extend(unexpected.iter().map(|name| {
                    RawError::leaf(child_path(&path, name), ErrorKind::NoUnevaluatedPropertiesAllowed)
                }));
            }
            ValidationErrorKind::OneOfNotValid { .. } => {
                out.push(self.composite(path, &location, instance, ErrorKind::NotOneOf));
            }
            ValidationErrorKind::AnyOf { .. } => {
                out.push(self.composite(path, &location, instance, ErrorKind::NotAnyOf));
            }
            other => out.push(RawError::leaf(path, simple_kind(other))),
        }
    }

    fn type_error(&self, path: String, location: &str, instance: &Value) -> RawError {
        if instance.is_null() {
            return RawError::leaf(path, ErrorKind::NullExpected);
        }
        let expected: Vec<&str> = match keyword_at(self.root, location) {
            Some(Value::String(name)) => vec![name.as_str()],
            Some(Value::Array(names)) => names.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        };
        match expected.as_slice() {
            [] => RawError::leaf(path, ErrorKind::TypeMismatch),
            [single] => RawError::leaf(path, expected_kind(single)),
            many => {
                let branches = many
                    .iter()
                    .map(|name| vec![RawError::leaf(path.clone(), expected_kind(name))])
                    .collect();
                RawError::composite(path, ErrorKind::TypeMismatch, branches)
            }
        }
    }

    /// Expand a failed `oneOf`/`anyOf` into per-branch records.
    fn composite(&self, path: String, location: &str, instance: &Value, kind: ErrorKind) -> RawError {
        let Some(Value::Array(branches)) = keyword_at(self.root, location) else {
            tracing::warn!(%location, "composite branches not found; reporting without branch detail");
            return RawError::leaf(path, kind);
        };

        let mut reports = Vec::with_capacity(branches.len());
        for (index, branch) in branches.iter().enumerate() {
            let standalone = self.standalone(branch);
            let validator = match build_validator(&standalone, self.draft) {
                Ok(validator) => validator,
                Err(reason) => {
                    tracing::warn!(%location, index, %reason, "composite branch failed to compile");
                    return RawError::leaf(path, kind);
                }
            };
            let nested = Translator {
                root: &standalone,
                draft: self.draft,
            };
            reports.push(nested.run(&validator, instance, &path));
        }
        RawError::composite(path, kind, reports)
    }

    /// A branch as a self-contained document: the root's definitions are
    /// attached and references to the root itself are redirected to a copy
    /// of it, so every reference inside the branch still resolves.
    fn standalone(&self, branch: &Value) -> Value {
        let Value::Object(body) = branch else {
            return branch.clone();
        };
        let defs_keyword = self.defs_keyword();
        let mut doc = body.clone();
        redirect_root_refs(&mut doc, defs_keyword);

        let mut defs = match self.root.get(defs_keyword) {
            Some(Value::Object(defs)) => defs.clone(),
            _ => Map::new(),
        };
        for def in defs.values_mut() {
            if let Value::Object(map) = def {
                redirect_root_refs(map, defs_keyword);
            }
        }
        // A root that is itself a standalone branch already carries the alias.
        if !defs.contains_key(ROOT_ALIAS) {
            let mut root_copy = self.root.clone();
            if let Value::Object(map) = &mut root_copy {
                map.remove("$defs");
                map.remove("definitions");
                map.remove("$schema");
                redirect_root_refs(map, defs_keyword);
            }
            defs.insert(ROOT_ALIAS.to_string(), root_copy);
        }

        for keyword in ["$defs", "definitions"] {
            if keyword == defs_keyword {
                continue;
            }
            if let Some(other) = self.root.get(keyword) {
                doc.entry(keyword.to_string()).or_insert_with(|| other.clone());
            }
        }
        doc.insert(defs_keyword.to_string(), Value::Object(defs));
        if let Some(dialect) = self.root.get("$schema") {
            doc.insert("$schema".to_string(), dialect.clone());
        }
        Value::Object(doc)
    }

    fn defs_keyword(&self) -> &'static str {
        match (self.root.get("$defs"), self.root.get("definitions"), self.draft) {
            (Some(_), _, _) => "$defs",
            (None, Some(_), _) => "definitions",
            (None, None, SchemaDraft::Draft7) => "definitions",
            (None, None, SchemaDraft::Draft202012) => "$defs",
        }
    }
}

/// Re-anchor every root-relative `$ref` in `map` (recursively) on the root
/// alias. References into the definitions travel with the branch unchanged.
fn redirect_root_refs(map: &mut Map<String, Value>, defs_keyword: &str) {
    for (key, value) in map.iter_mut() {
        match value {
            Value::String(target) if key == "$ref" => {
                if let Some(rebased) = rebase_root_ref(target, defs_keyword) {
                    *target = rebased;
                }
            }
            Value::Object(inner) => redirect_root_refs(inner, defs_keyword),
            Value::Array(items) => {
                for item in items {
                    if let Value::Object(inner) = item {
                        redirect_root_refs(inner, defs_keyword);
                    }
                }
            }
            _ => {}
        }
    }
}

/// `#` or `#/properties/x` rebased under the root alias; `None` for
/// definition and non-local references.
fn rebase_root_ref(target: &str, defs_keyword: &str) -> Option<String> {
    let pointer = target.strip_prefix('#')?;
    if !pointer.is_empty() {
        let first = pointer.strip_prefix('/')?.split('/').next().unwrap_or_default();
        if first == "$defs" || first == "definitions" {
            return None;
        }
    }
    Some(format!("#/{defs_keyword}/{ROOT_ALIAS}{pointer}"))
}

/// Resolve a schema location (JSON Pointer of keywords) against `root`,
/// following `$ref` hops the engine recorded along the way.
pub(crate) fn keyword_at<'s>(root: &'s Value, location: &str) -> Option<&'s Value> {
    let mut current = root;
    for raw in location.split('/').skip(1) {
        let token = unescape_pointer_token(raw);
        if token == "$ref" {
            if let Some(target) = current.get("$ref").and_then(Value::as_str) {
                current = resolve_local_ref(root, target)?;
                continue;
            }
        }
        current = match current {
            Value::Object(map) => map.get(&token)?,
            Value::Array(items) => items.get(token.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

fn resolve_local_ref<'s>(root: &'s Value, reference: &str) -> Option<&'s Value> {
    let pointer = reference.strip_prefix('#')?;
    if pointer.is_empty() {
        Some(root)
    } else {
        root.pointer(pointer)
    }
}

fn child_path(parent: &str, name: &str) -> String {
    format!("{parent}/{}", escape_pointer_token(name))
}

fn expected_kind(type_name: &str) -> ErrorKind {
    if type_name == "null" {
        return ErrorKind::NullExpected;
    }
    JsonType::from_keyword(type_name).map_or(ErrorKind::TypeMismatch, ErrorKind::Expected)
}

fn simple_kind(kind: &ValidationErrorKind) -> ErrorKind {
    match kind {
        ValidationErrorKind::Format { .. } => ErrorKind::FormatMismatch,
        ValidationErrorKind::Pattern { .. } => ErrorKind::PatternMismatch,
        ValidationErrorKind::Enum { .. } => ErrorKind::NotInEnumeration,
        ValidationErrorKind::Constant { .. } => ErrorKind::ConstMismatch,
        ValidationErrorKind::MinLength { .. } => ErrorKind::StringTooShort,
        ValidationErrorKind::MaxLength { .. } => ErrorKind::StringTooLong,
        ValidationErrorKind::Minimum { .. } | ValidationErrorKind::ExclusiveMinimum { .. } => {
            ErrorKind::NumberTooSmall
        }
        ValidationErrorKind::Maximum { .. } | ValidationErrorKind::ExclusiveMaximum { .. } => {
            ErrorKind::NumberTooBig
        }
        ValidationErrorKind::MultipleOf { .. } => ErrorKind::NumberNotMultipleOf,
        ValidationErrorKind::MinItems { .. } => ErrorKind::TooFewItems,
        ValidationErrorKind::MaxItems { .. } | ValidationErrorKind::AdditionalItems { .. } => {
            ErrorKind::TooManyItems
        }
        ValidationErrorKind::UniqueItems { .. } => ErrorKind::ItemsNotUnique,
        ValidationErrorKind::MinProperties { .. } => ErrorKind::TooFewProperties,
        ValidationErrorKind::MaxProperties { .. } => ErrorKind::TooManyProperties,
        ValidationErrorKind::Contains { .. } => ErrorKind::ContainsMissing,
        ValidationErrorKind::OneOfMultipleValid { .. } => ErrorKind::MultipleOneOfMatches,
        ValidationErrorKind::Not { .. } => ErrorKind::ExcludedSchemaMatches,
        ValidationErrorKind::FalseSchema { .. } => ErrorKind::FalseSchema,
        ValidationErrorKind::PropertyNames { .. } => ErrorKind::InvalidPropertyName,
        _ => ErrorKind::Other,
    }
}
