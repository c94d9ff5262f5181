//! Property tests: relaxation over generated schema documents.
//!
//! Schemas are drawn from the subset of JSON Schema a derive-based generator
//! emits: typed leaves, closed or open objects with required lists,
//! `oneOf`/`allOf` compositions, arrays, and `$ref` back to the root.

use mpatch_core::{relax, relaxed, RelaxOptions, SchemaGraph};
use proptest::prelude::*;
use serde_json::{json, Map, Value};

const OPEN: RelaxOptions = RelaxOptions {
    allow_additional_properties: true,
};

fn leaf_schema() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(json!({ "type": "string" })),
        Just(json!({ "type": "string", "format": "date-time" })),
        Just(json!({ "type": "integer", "minimum": 0 })),
        Just(json!({ "type": ["string", "null"] })),
        Just(json!({ "type": "boolean" })),
        Just(json!({ "$ref": "#" })),
        Just(json!(true)),
    ]
}

fn schema() -> impl Strategy<Value = Value> {
    leaf_schema().prop_recursive(4, 48, 5, |inner| {
        prop_oneof![
            (
                prop::collection::btree_map("[a-e]", inner.clone(), 0..5),
                any::<bool>(),
                any::<bool>(),
            )
                .prop_map(|(props, require_all, closed)| {
                    let mut map = Map::new();
                    map.insert("type".into(), json!("object"));
                    if require_all && !props.is_empty() {
                        map.insert(
                            "required".into(),
                            Value::Array(props.keys().cloned().map(Value::String).collect()),
                        );
                    }
                    map.insert("properties".into(), Value::Object(props.into_iter().collect()));
                    if closed {
                        map.insert("additionalProperties".into(), json!(false));
                    }
                    Value::Object(map)
                }),
            prop::collection::vec(inner.clone(), 1..3).prop_map(|b| json!({ "oneOf": b })),
            prop::collection::vec(inner.clone(), 1..3).prop_map(|b| json!({ "allOf": b })),
            inner.prop_map(|items| json!({ "type": "array", "items": items })),
        ]
    })
}

/// Collect every `type`/`format` keyword with its location.
fn type_keywords(value: &Value, at: String, out: &mut Vec<(String, Value)>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let here = format!("{at}/{key}");
                if key == "type" || key == "format" {
                    out.push((here, child.clone()));
                } else {
                    type_keywords(child, here, out);
                }
            }
        }
        Value::Array(items) => {
            for (i, child) in items.iter().enumerate() {
                type_keywords(child, format!("{at}/{i}"), out);
            }
        }
        _ => {}
    }
}

proptest! {
    #[test]
    fn relaxation_is_idempotent(doc in schema()) {
        let graph = SchemaGraph::from_value(&doc).unwrap();
        let once = relaxed(graph, OPEN);
        let twice = relaxed(once.clone(), OPEN);
        prop_assert_eq!(once.to_value(), twice.to_value());
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn relaxation_clears_every_reachable_required(doc in schema()) {
        let mut graph = SchemaGraph::from_value(&doc).unwrap();
        relax(&mut graph, OPEN);
        for id in graph.reachable(graph.root()) {
            prop_assert!(graph.node(id).required.is_empty());
            prop_assert!(graph.node(id).accepts_undeclared_properties());
        }
        let rendered = graph.to_value().to_string();
        prop_assert!(!rendered.contains("\"required\""));
        prop_assert!(!rendered.contains("\"additionalProperties\":false"));
    }

    #[test]
    fn relaxation_preserves_type_keywords(doc in schema()) {
        let mut graph = SchemaGraph::from_value(&doc).unwrap();
        relax(&mut graph, OPEN);

        let mut before = Vec::new();
        type_keywords(&doc, String::new(), &mut before);
        let mut after = Vec::new();
        type_keywords(&graph.to_value(), String::new(), &mut after);
        before.sort_by(|a, b| a.0.cmp(&b.0));
        after.sort_by(|a, b| a.0.cmp(&b.0));
        prop_assert_eq!(before, after);
    }
}

#[test]
fn mutual_recursion_terminates() {
    let doc = json!({
        "$ref": "#/$defs/A",
        "$defs": {
            "A": {
                "type": "object",
                "properties": { "b": { "$ref": "#/$defs/B" } },
                "required": ["b"]
            },
            "B": {
                "type": "object",
                "properties": { "a": { "$ref": "#/$defs/A" } },
                "required": ["a"],
                "additionalProperties": false
            }
        }
    });
    let graph = relaxed(SchemaGraph::from_value(&doc).unwrap(), OPEN);
    let rendered = graph.to_value();
    assert!(rendered.pointer("/$defs/A/required").is_none());
    assert!(rendered.pointer("/$defs/B/required").is_none());
    assert_eq!(rendered.pointer("/$defs/B/additionalProperties"), Some(&json!(true)));
}
