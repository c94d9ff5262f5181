//! Validator configuration.
//!
//! Defaults suit a service that validates incoming merge patches against
//! types it deserializes into: Draft 2020-12 schemas generated for the
//! deserialize contract, with undeclared properties accepted at any depth.
//! Override via environment variables or explicit construction.

use std::fmt;
use std::str::FromStr;

use mpatch_core::{PatchError, RelaxOptions};
use serde::{Deserialize, Serialize};

/// JSON Schema dialect used for generation and validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SchemaDraft {
    #[serde(rename = "draft7")]
    Draft7,
    #[default]
    #[serde(rename = "draft2020-12")]
    Draft202012,
}

impl SchemaDraft {
    pub(crate) fn engine_draft(self) -> jsonschema::Draft {
        match self {
            Self::Draft7 => jsonschema::Draft::Draft7,
            Self::Draft202012 => jsonschema::Draft::Draft202012,
        }
    }
}

impl FromStr for SchemaDraft {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "draft7" | "draft-07" | "7" => Ok(Self::Draft7),
            "draft2020-12" | "draft2020" | "2020-12" => Ok(Self::Draft202012),
            other => Err(ConfigError::invalid("MPATCH_SCHEMA_DRAFT", other, "draft7 | draft2020-12")),
        }
    }
}

/// Which side of a type's serde contract the schema describes.
///
/// Fields with `#[serde(default)]` or `skip_serializing_if` differ between
/// the two; patches are inbound, so the deserialize contract is the default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Contract {
    #[default]
    Deserialize,
    Serialize,
}

impl FromStr for Contract {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "deserialize" => Ok(Self::Deserialize),
            "serialize" => Ok(Self::Serialize),
            other => Err(ConfigError::invalid("MPATCH_CONTRACT", other, "deserialize | serialize")),
        }
    }
}

/// Schema generation policy. Part of the schema cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ContractPolicy {
    pub draft: SchemaDraft,
    pub contract: Contract,
}

impl fmt::Display for ContractPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}/{:?}", self.draft, self.contract)
    }
}

/// Configuration for a [`crate::PatchValidator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    pub policy: ContractPolicy,
    /// Accept properties the resource type does not declare, at any depth.
    pub allow_additional_properties: bool,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            policy: ContractPolicy::default(),
            allow_additional_properties: true,
        }
    }
}

impl ValidatorConfig {
    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `MPATCH_SCHEMA_DRAFT` (default: `draft2020-12`)
    /// - `MPATCH_CONTRACT` (default: `deserialize`)
    /// - `MPATCH_ALLOW_ADDITIONAL_PROPERTIES` (default: `true`)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(raw) = lookup("MPATCH_SCHEMA_DRAFT") {
            config.policy.draft = raw.parse()?;
        }
        if let Some(raw) = lookup("MPATCH_CONTRACT") {
            config.policy.contract = raw.parse()?;
        }
        if let Some(raw) = lookup("MPATCH_ALLOW_ADDITIONAL_PROPERTIES") {
            config.allow_additional_properties = parse_flag("MPATCH_ALLOW_ADDITIONAL_PROPERTIES", &raw)?;
        }
        Ok(config)
    }

    pub fn relax_options(&self) -> RelaxOptions {
        RelaxOptions {
            allow_additional_properties: self.allow_additional_properties,
        }
    }
}

fn parse_flag(var: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::invalid(var, other, "true | false")),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value '{value}' for {var} (expected {expected})")]
    InvalidValue {
        var: String,
        value: String,
        expected: &'static str,
    },
}

impl ConfigError {
    fn invalid(var: &str, value: &str, expected: &'static str) -> Self {
        Self::InvalidValue {
            var: var.to_string(),
            value: value.to_string(),
            expected,
        }
    }
}

impl From<ConfigError> for PatchError {
    fn from(err: ConfigError) -> Self {
        PatchError::Config(err.to_string())
    }
}
