//! # Error Collection
//!
//! Flattens raw validation records into a map from document path to the
//! set of error kind names reported there. Composite records contribute the
//! union of everything their branches reported, at any nesting depth.
//! `NullExpected` is dropped wherever it appears.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::report::RawError;

/// Document path (JSON Pointer) to deduplicated error kind names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrorMap {
    entries: BTreeMap<String, BTreeSet<String>>,
}

impl FieldErrorMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `kind` at `path`, creating the entry if absent.
    pub fn insert(&mut self, path: impl Into<String>, kind: impl Into<String>) {
        self.entries.entry(path.into()).or_default().insert(kind.into());
    }

    /// Union `other` into `self`. No path or kind from either side is lost.
    pub fn merge(&mut self, other: FieldErrorMap) {
        for (path, kinds) in other.entries {
            self.entries.entry(path).or_default().extend(kinds);
        }
    }

    pub fn get(&self, path: &str) -> Option<&BTreeSet<String>> {
        self.entries.get(path)
    }

    pub fn contains(&self, path: &str, kind: &str) -> bool {
        self.entries.get(path).is_some_and(|kinds| kinds.contains(kind))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &BTreeSet<String>)> {
        self.entries.iter().map(|(path, kinds)| (path.as_str(), kinds))
    }
}

impl IntoIterator for FieldErrorMap {
    type Item = (String, BTreeSet<String>);
    type IntoIter = std::collections::btree_map::IntoIter<String, BTreeSet<String>>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Flatten `errors` into a [`FieldErrorMap`].
///
/// Total: an empty input yields an empty map.
pub fn collect(errors: &[RawError]) -> FieldErrorMap {
    let mut map = FieldErrorMap::new();
    for error in errors {
        if error.kind().is_suppressed() {
            continue;
        }
        match error {
            RawError::Composite(child) => {
                let nested: Vec<RawError> = child.branches.iter().flatten().cloned().collect();
                map.merge(collect(&nested));
            }
            RawError::Leaf(leaf) => map.insert(leaf.path.clone(), leaf.kind.as_str()),
        }
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{ErrorKind, JsonType};
    use proptest::prelude::*;

    const INT: ErrorKind = ErrorKind::Expected(JsonType::Integer);
    const STR: ErrorKind = ErrorKind::Expected(JsonType::String);

    #[test]
    fn empty_input_is_empty_map() {
        assert!(collect(&[]).is_empty());
    }

    #[test]
    fn leaf_errors_group_by_path() {
        let map = collect(&[
            RawError::leaf("/age", INT),
            RawError::leaf("/age", ErrorKind::NumberTooSmall),
            RawError::leaf("/name", ErrorKind::StringTooShort),
        ]);
        assert_eq!(map.len(), 2);
        assert_eq!(map.get("/age").unwrap().len(), 2);
        assert!(map.contains("/name", "StringTooShort"));
    }

    #[test]
    fn duplicate_kinds_collapse() {
        let map = collect(&[RawError::leaf("/age", INT), RawError::leaf("/age", INT)]);
        assert_eq!(map.get("/age").unwrap().len(), 1);
    }

    #[test]
    fn branch_errors_union_at_shared_path() {
        let map = collect(&[RawError::composite(
            "/pet",
            ErrorKind::NotOneOf,
            vec![
                vec![RawError::leaf("/pet/id", INT)],
                vec![RawError::leaf("/pet/id", STR)],
            ],
        )]);
        let kinds: Vec<&str> = map.get("/pet/id").unwrap().iter().map(String::as_str).collect();
        assert_eq!(kinds, vec!["IntegerExpected", "StringExpected"]);
        assert!(map.get("/pet").is_none(), "composite itself is not reported");
    }

    #[test]
    fn composite_merges_with_existing_entries() {
        let map = collect(&[
            RawError::leaf("/pet/id", ErrorKind::NumberTooBig),
            RawError::composite(
                "/pet",
                ErrorKind::NotAnyOf,
                vec![vec![RawError::leaf("/pet/id", INT)]],
            ),
        ]);
        assert_eq!(map.get("/pet/id").unwrap().len(), 2);
    }

    #[test]
    fn null_expected_is_dropped_at_every_depth() {
        let map = collect(&[
            RawError::leaf("/name", ErrorKind::NullExpected),
            RawError::composite(
                "/owner",
                ErrorKind::NotAnyOf,
                vec![
                    vec![RawError::leaf("/owner/email", ErrorKind::FormatMismatch)],
                    vec![RawError::composite(
                        "/owner",
                        ErrorKind::NotOneOf,
                        vec![vec![RawError::leaf("/owner", ErrorKind::NullExpected)]],
                    )],
                ],
            ),
        ]);
        assert_eq!(map.len(), 1);
        assert!(map.contains("/owner/email", "FormatMismatch"));
    }

    #[test]
    fn serializes_as_plain_map() {
        let map = collect(&[RawError::leaf("/age", INT)]);
        let json = serde_json::to_value(&map).unwrap();
        assert_eq!(json, serde_json::json!({ "/age": ["IntegerExpected"] }));
    }

    fn kind() -> impl Strategy<Value = ErrorKind> {
        prop_oneof![
            Just(INT),
            Just(STR),
            Just(ErrorKind::NullExpected),
            Just(ErrorKind::FormatMismatch),
            Just(ErrorKind::PatternMismatch),
        ]
    }

    fn raw_error() -> impl Strategy<Value = RawError> {
        let leaf = ("/[a-c]{1,2}", kind()).prop_map(|(path, kind)| RawError::leaf(path, kind));
        leaf.prop_recursive(3, 32, 4, |inner| {
            (
                "/[a-c]",
                prop::collection::vec(prop::collection::vec(inner, 0..4), 0..3),
            )
                .prop_map(|(path, branches)| {
                    RawError::composite(path, ErrorKind::NotOneOf, branches)
                })
        })
    }

    fn leaves(errors: &[RawError], out: &mut Vec<(String, ErrorKind)>) {
        for error in errors {
            match error {
                RawError::Leaf(leaf) => out.push((leaf.path.clone(), leaf.kind)),
                RawError::Composite(child) => {
                    for branch in &child.branches {
                        leaves(branch, out);
                    }
                }
            }
        }
    }

    proptest! {
        /// Every non-suppressed leaf shows up, and nothing else does.
        #[test]
        fn collect_is_lossless_union(errors in prop::collection::vec(raw_error(), 0..6)) {
            let map = collect(&errors);
            let mut all = Vec::new();
            leaves(&errors, &mut all);

            let mut expected = FieldErrorMap::new();
            for (path, kind) in &all {
                if !kind.is_suppressed() {
                    expected.insert(path.clone(), kind.as_str());
                }
            }
            prop_assert_eq!(map, expected);
        }

        /// NullExpected never reaches the output.
        #[test]
        fn null_expected_never_reported(errors in prop::collection::vec(raw_error(), 0..6)) {
            let map = collect(&errors);
            for (_, kinds) in map.iter() {
                prop_assert!(!kinds.contains("NullExpected"));
            }
        }
    }
}
