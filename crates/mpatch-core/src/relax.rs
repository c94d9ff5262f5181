//! # Schema Relaxation
//!
//! Turns a structural schema into one that accepts partial documents.
//! A merge patch only carries the fields being changed, so presence rules
//! must go while type, format and nested structural rules stay in force for
//! every field that *is* present.
//!
//! Relaxation walks every node reachable from the root (declared
//! properties, `oneOf`/`allOf`/`anyOf` branches, item schemas and `$ref`
//! targets) with a visited set, so recursive resource types terminate.
//! Each node is rewritten at most once per call.

use crate::graph::{ExtraProperties, NodeId, SchemaGraph};

/// Relaxation options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelaxOptions {
    /// Open every closed object schema (`additionalProperties: false`,
    /// `unevaluatedProperties: false`) at every depth.
    pub allow_additional_properties: bool,
}

impl Default for RelaxOptions {
    fn default() -> Self {
        Self {
            allow_additional_properties: true,
        }
    }
}

/// Relax `graph` in place.
///
/// Clears the `required` list of every reachable node and, when
/// [`RelaxOptions::allow_additional_properties`] is set, replaces every
/// `false` extra-properties keyword with `true`. Subschema-valued
/// `additionalProperties` are kept (they constrain map value types) and
/// relaxed like any other node. Returns the number of nodes visited.
pub fn relax(graph: &mut SchemaGraph, options: RelaxOptions) -> usize {
    let mut visited = vec![false; graph.len()];
    let mut stack: Vec<NodeId> = vec![graph.root()];
    let mut count = 0;

    while let Some(id) = stack.pop() {
        if std::mem::replace(&mut visited[id.index()], true) {
            continue;
        }
        count += 1;

        let node = graph.node_mut(id);
        node.required.clear();
        if options.allow_additional_properties {
            open(&mut node.additional_properties);
            open(&mut node.unevaluated_properties);
        }
        stack.extend(node.children());
    }
    count
}

/// Consume and return a relaxed graph.
pub fn relaxed(mut graph: SchemaGraph, options: RelaxOptions) -> SchemaGraph {
    relax(&mut graph, options);
    graph
}

fn open(extra: &mut ExtraProperties) {
    if *extra == ExtraProperties::Forbidden {
        *extra = ExtraProperties::Allowed;
    }
}
