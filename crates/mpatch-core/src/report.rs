//! # Raw Validation Records
//!
//! The shape of what a structural validation engine reports before it is
//! flattened for callers. A leaf record names one complaint at one document
//! path. A composite record stands for a failed `oneOf`/`anyOf` and carries,
//! per candidate branch, the records that branch produced.

use std::fmt;

/// Primitive JSON type named by a `type` keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum JsonType {
    String,
    Integer,
    Number,
    Boolean,
    Object,
    Array,
}

impl JsonType {
    /// Parse a `type` keyword value. `"null"` is not a [`JsonType`].
    pub fn from_keyword(name: &str) -> Option<Self> {
        Some(match name {
            "string" => Self::String,
            "integer" => Self::Integer,
            "number" => Self::Number,
            "boolean" => Self::Boolean,
            "object" => Self::Object,
            "array" => Self::Array,
            _ => return None,
        })
    }
}

/// Kind of a structural complaint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ErrorKind {
    /// A present value has the wrong type.
    Expected(JsonType),
    /// A present value matches none of several allowed types.
    TypeMismatch,
    /// Null where a value was declared, or a value where only null was
    /// allowed. An explicit null is the merge-patch deletion marker, so
    /// this kind is never reported.
    NullExpected,
    PropertyRequired,
    NoAdditionalPropertiesAllowed,
    NoUnevaluatedPropertiesAllowed,
    FormatMismatch,
    PatternMismatch,
    NotInEnumeration,
    ConstMismatch,
    StringTooShort,
    StringTooLong,
    NumberTooSmall,
    NumberTooBig,
    NumberNotMultipleOf,
    TooFewItems,
    TooManyItems,
    ItemsNotUnique,
    TooFewProperties,
    TooManyProperties,
    ContainsMissing,
    NotOneOf,
    NotAnyOf,
    MultipleOneOfMatches,
    ExcludedSchemaMatches,
    FalseSchema,
    InvalidPropertyName,
    Other,
}

impl ErrorKind {
    /// Stable name reported to callers.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Expected(JsonType::String) => "StringExpected",
            Self::Expected(JsonType::Integer) => "IntegerExpected",
            Self::Expected(JsonType::Number) => "NumberExpected",
            Self::Expected(JsonType::Boolean) => "BooleanExpected",
            Self::Expected(JsonType::Object) => "ObjectExpected",
            Self::Expected(JsonType::Array) => "ArrayExpected",
            Self::TypeMismatch => "TypeMismatch",
            Self::NullExpected => "NullExpected",
            Self::PropertyRequired => "PropertyRequired",
            Self::NoAdditionalPropertiesAllowed => "NoAdditionalPropertiesAllowed",
            Self::NoUnevaluatedPropertiesAllowed => "NoUnevaluatedPropertiesAllowed",
            Self::FormatMismatch => "FormatMismatch",
            Self::PatternMismatch => "PatternMismatch",
            Self::NotInEnumeration => "NotInEnumeration",
            Self::ConstMismatch => "ConstMismatch",
            Self::StringTooShort => "StringTooShort",
            Self::StringTooLong => "StringTooLong",
            Self::NumberTooSmall => "NumberTooSmall",
            Self::NumberTooBig => "NumberTooBig",
            Self::NumberNotMultipleOf => "NumberNotMultipleOf",
            Self::TooFewItems => "TooFewItems",
            Self::TooManyItems => "TooManyItems",
            Self::ItemsNotUnique => "ItemsNotUnique",
            Self::TooFewProperties => "TooFewProperties",
            Self::TooManyProperties => "TooManyProperties",
            Self::ContainsMissing => "ContainsMissing",
            Self::NotOneOf => "NotOneOf",
            Self::NotAnyOf => "NotAnyOf",
            Self::MultipleOneOfMatches => "MultipleOneOfMatches",
            Self::ExcludedSchemaMatches => "ExcludedSchemaMatches",
            Self::FalseSchema => "FalseSchema",
            Self::InvalidPropertyName => "InvalidPropertyName",
            Self::Other => "Other",
        }
    }

    /// Whether the collector drops this kind.
    pub fn is_suppressed(self) -> bool {
        self == Self::NullExpected
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One complaint at one document path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// JSON Pointer into the validated document (`""` is the root).
    pub path: String,
    pub kind: ErrorKind,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, kind: ErrorKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

/// A `oneOf`/`anyOf` failure with the reasons each branch rejected the value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildSchemaError {
    pub path: String,
    pub kind: ErrorKind,
    /// One record list per candidate branch, in branch order.
    pub branches: Vec<Vec<RawError>>,
}

/// A record produced by validating a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawError {
    Leaf(ValidationError),
    Composite(ChildSchemaError),
}

impl RawError {
    pub fn leaf(path: impl Into<String>, kind: ErrorKind) -> Self {
        Self::Leaf(ValidationError::new(path, kind))
    }

    pub fn composite(
        path: impl Into<String>,
        kind: ErrorKind,
        branches: Vec<Vec<RawError>>,
    ) -> Self {
        Self::Composite(ChildSchemaError {
            path: path.into(),
            kind,
            branches,
        })
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Leaf(err) => err.kind,
            Self::Composite(err) => err.kind,
        }
    }

    pub fn path(&self) -> &str {
        match self {
            Self::Leaf(err) => &err.path,
            Self::Composite(err) => &err.path,
        }
    }
}
