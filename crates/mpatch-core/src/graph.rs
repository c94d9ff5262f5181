//! # Schema Graph
//!
//! An arena representation of a JSON Schema document. Every subschema is a
//! [`SchemaNode`] addressed by a [`NodeId`]; local `$ref`s (`#`,
//! `#/$defs/<name>`, `#/definitions/<name>`) become edges to the referenced
//! node, so a schema for a recursive resource type is a cyclic graph rather
//! than an infinitely deep tree.
//!
//! Only the keywords that whole-graph transforms need to see are lifted into
//! typed fields. Everything else (`type`, `format`, `enum`, `pattern`,
//! `minimum`, ...) is carried verbatim in [`SchemaNode::keywords`] and
//! re-emitted unchanged by [`SchemaGraph::to_value`].
//!
//! Subschemas under `not`, `if`/`then`/`else`, `contains` and
//! `propertyNames` stay opaque: relaxing presence rules inside a negation
//! would change what the negation rejects.

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::error::PatchError;

/// Index of a node in a [`SchemaGraph`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    /// Position of the node in the arena.
    pub fn index(self) -> usize {
        self.0
    }
}

/// State of an `additionalProperties` / `unevaluatedProperties` keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExtraProperties {
    /// Keyword absent. Undeclared properties are accepted.
    #[default]
    Unspecified,
    /// Keyword is `true`.
    Allowed,
    /// Keyword is `false`: the object is closed.
    Forbidden,
    /// Undeclared properties must match this subschema.
    Schema(NodeId),
}

/// Array item schemas: one schema for every element, or a positional tuple
/// (Draft 7 array-form `items`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Items {
    Single(NodeId),
    Tuple(Vec<NodeId>),
}

/// A single subschema.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SchemaNode {
    /// Set for the boolean schemas `true` and `false`.
    pub boolean: Option<bool>,
    /// Target of a local `$ref`.
    pub reference: Option<NodeId>,
    /// Declared properties in document order.
    pub properties: Vec<(String, NodeId)>,
    /// Names listed under `required`.
    pub required: Vec<String>,
    pub additional_properties: ExtraProperties,
    pub unevaluated_properties: ExtraProperties,
    pub pattern_properties: Vec<(String, NodeId)>,
    /// `oneOf` branches (disjunction).
    pub one_of: Vec<NodeId>,
    /// `allOf` branches (conjunction).
    pub all_of: Vec<NodeId>,
    /// `anyOf` branches.
    pub any_of: Vec<NodeId>,
    pub items: Option<Items>,
    pub prefix_items: Vec<NodeId>,
    /// Every other keyword, verbatim.
    pub keywords: Map<String, Value>,
}

impl SchemaNode {
    /// Every node this node points at, including its `$ref` target.
    pub fn children(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        out.extend(self.reference);
        out.extend(self.properties.iter().map(|(_, id)| *id));
        out.extend(self.pattern_properties.iter().map(|(_, id)| *id));
        if let ExtraProperties::Schema(id) = self.additional_properties {
            out.push(id);
        }
        if let ExtraProperties::Schema(id) = self.unevaluated_properties {
            out.push(id);
        }
        out.extend(self.one_of.iter().copied());
        out.extend(self.all_of.iter().copied());
        out.extend(self.any_of.iter().copied());
        match &self.items {
            Some(Items::Single(id)) => out.push(*id),
            Some(Items::Tuple(ids)) => out.extend(ids.iter().copied()),
            None => {}
        }
        out.extend(self.prefix_items.iter().copied());
        out
    }

    /// Look up a declared property's subschema.
    pub fn property(&self, name: &str) -> Option<NodeId> {
        self.properties
            .iter()
            .find(|(prop, _)| prop == name)
            .map(|(_, id)| *id)
    }

    /// True unless `additionalProperties` or `unevaluatedProperties` is `false`.
    pub fn accepts_undeclared_properties(&self) -> bool {
        self.additional_properties != ExtraProperties::Forbidden
            && self.unevaluated_properties != ExtraProperties::Forbidden
    }
}

/// Which root keyword a definition was declared under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DefinitionsKeyword {
    /// `$defs` (Draft 2019-09 and later).
    Defs,
    /// `definitions` (Draft 7 and earlier).
    Definitions,
}

impl DefinitionsKeyword {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Defs => "$defs",
            Self::Definitions => "definitions",
        }
    }
}

/// A named shared subschema declared at the document root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Definition {
    pub keyword: DefinitionsKeyword,
    pub name: String,
    pub node: NodeId,
}

/// Arena-backed JSON Schema document.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaGraph {
    nodes: Vec<SchemaNode>,
    root: NodeId,
    definitions: Vec<Definition>,
}

impl SchemaGraph {
    /// Parse a JSON Schema document into a graph.
    ///
    /// # Errors
    ///
    /// Returns [`PatchError::InvalidSchema`] if the root, a definition or a
    /// structural subschema is neither an object nor a boolean.
    pub fn from_value(value: &Value) -> Result<Self, PatchError> {
        let mut parser = Parser::default();
        let root = parser.reserve();
        parser.targets.insert("#".to_string(), root);

        let root_map = match value {
            Value::Object(map) => Some(map),
            Value::Bool(_) => None,
            other => {
                return Err(PatchError::invalid_schema(
                    "<root>",
                    format!("schema root must be an object or boolean, found {}", json_type(other)),
                ))
            }
        };

        // Reserve a slot per definition first so references resolve
        // regardless of declaration order.
        let mut pending = Vec::new();
        if let Some(map) = root_map {
            for keyword in [DefinitionsKeyword::Defs, DefinitionsKeyword::Definitions] {
                let Some(defs) = map.get(keyword.as_str()) else {
                    continue;
                };
                let Value::Object(defs) = defs else {
                    return Err(PatchError::invalid_schema(
                        "<root>",
                        format!("'{}' must be an object", keyword.as_str()),
                    ));
                };
                for (name, body) in defs {
                    let node = parser.reserve();
                    parser.targets.insert(
                        format!("#/{}/{}", keyword.as_str(), escape_pointer_token(name)),
                        node,
                    );
                    parser.definitions.push(Definition {
                        keyword,
                        name: name.clone(),
                        node,
                    });
                    pending.push((node, body));
                }
            }
        }

        for (node, body) in pending {
            parser
                .parse_into(node, body, false)
                .map_err(|reason| PatchError::invalid_schema("<root>", reason))?;
        }
        parser
            .parse_into(root, value, true)
            .map_err(|reason| PatchError::invalid_schema("<root>", reason))?;

        Ok(Self {
            nodes: parser.nodes,
            root,
            definitions: parser.definitions,
        })
    }

    /// Render the graph back into a JSON Schema document.
    ///
    /// Reference edges are emitted as `$ref` pointers to the root (`#`) or
    /// to the definition they target.
    pub fn to_value(&self) -> Value {
        let mut root = self.render(self.root);
        if let Value::Object(map) = &mut root {
            for def in &self.definitions {
                let rendered = self.render(def.node);
                let bucket = map
                    .entry(def.keyword.as_str())
                    .or_insert_with(|| Value::Object(Map::new()));
                if let Value::Object(bucket) = bucket {
                    bucket.insert(def.name.clone(), rendered);
                }
            }
        }
        root
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &SchemaNode {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut SchemaNode {
        &mut self.nodes[id.0]
    }

    /// Number of nodes in the arena, reachable or not.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn definitions(&self) -> &[Definition] {
        &self.definitions
    }

    /// Look up a root definition by name under either keyword.
    pub fn definition(&self, name: &str) -> Option<NodeId> {
        self.definitions
            .iter()
            .find(|def| def.name == name)
            .map(|def| def.node)
    }

    /// Nodes reachable from `start`, each listed once, in discovery order.
    ///
    /// Terminates on cyclic graphs.
    pub fn reachable(&self, start: NodeId) -> Vec<NodeId> {
        let mut visited = vec![false; self.nodes.len()];
        let mut order = Vec::new();
        let mut stack = vec![start];
        while let Some(id) = stack.pop() {
            if std::mem::replace(&mut visited[id.0], true) {
                continue;
            }
            order.push(id);
            stack.extend(self.nodes[id.0].children().into_iter().rev());
        }
        order
    }

    fn reference_pointer(&self, target: NodeId) -> String {
        if target == self.root {
            return "#".to_string();
        }
        self.definitions
            .iter()
            .find(|def| def.node == target)
            .map(|def| format!("#/{}/{}", def.keyword.as_str(), escape_pointer_token(&def.name)))
            .unwrap_or_else(|| "#".to_string())
    }

    fn render(&self, id: NodeId) -> Value {
        let node = &self.nodes[id.0];
        if let Some(flag) = node.boolean {
            return Value::Bool(flag);
        }

        let mut map = node.keywords.clone();
        if let Some(target) = node.reference {
            map.insert("$ref".into(), Value::String(self.reference_pointer(target)));
        }
        if !node.properties.is_empty() {
            map.insert("properties".into(), self.render_named(&node.properties));
        }
        if !node.pattern_properties.is_empty() {
            map.insert(
                "patternProperties".into(),
                self.render_named(&node.pattern_properties),
            );
        }
        if !node.required.is_empty() {
            map.insert(
                "required".into(),
                Value::Array(node.required.iter().cloned().map(Value::String).collect()),
            );
        }
        if let Some(extra) = self.render_extra(node.additional_properties) {
            map.insert("additionalProperties".into(), extra);
        }
        if let Some(extra) = self.render_extra(node.unevaluated_properties) {
            map.insert("unevaluatedProperties".into(), extra);
        }
        for (keyword, branches) in [
            ("oneOf", &node.one_of),
            ("allOf", &node.all_of),
            ("anyOf", &node.any_of),
            ("prefixItems", &node.prefix_items),
        ] {
            if !branches.is_empty() {
                map.insert(keyword.into(), self.render_list(branches));
            }
        }
        match &node.items {
            Some(Items::Single(item)) => {
                map.insert("items".into(), self.render(*item));
            }
            Some(Items::Tuple(items)) => {
                map.insert("items".into(), self.render_list(items));
            }
            None => {}
        }
        Value::Object(map)
    }

    fn render_named(&self, entries: &[(String, NodeId)]) -> Value {
        Value::Object(
            entries
                .iter()
                .map(|(name, id)| (name.clone(), self.render(*id)))
                .collect(),
        )
    }

    fn render_list(&self, ids: &[NodeId]) -> Value {
        Value::Array(ids.iter().map(|id| self.render(*id)).collect())
    }

    fn render_extra(&self, extra: ExtraProperties) -> Option<Value> {
        match extra {
            ExtraProperties::Unspecified => None,
            ExtraProperties::Allowed => Some(Value::Bool(true)),
            ExtraProperties::Forbidden => Some(Value::Bool(false)),
            ExtraProperties::Schema(id) => Some(self.render(id)),
        }
    }
}

#[derive(Default)]
struct Parser {
    nodes: Vec<SchemaNode>,
    targets: HashMap<String, NodeId>,
    definitions: Vec<Definition>,
}

impl Parser {
    fn reserve(&mut self) -> NodeId {
        self.nodes.push(SchemaNode::default());
        NodeId(self.nodes.len() - 1)
    }

    fn alloc(&mut self, value: &Value) -> Result<NodeId, String> {
        let id = self.reserve();
        self.parse_into(id, value, false)?;
        Ok(id)
    }

    fn alloc_named(&mut self, value: &Value) -> Result<Option<Vec<(String, NodeId)>>, String> {
        let Value::Object(entries) = value else {
            return Ok(None);
        };
        let mut out = Vec::with_capacity(entries.len());
        for (name, body) in entries {
            out.push((name.clone(), self.alloc(body)?));
        }
        Ok(Some(out))
    }

    fn alloc_list(&mut self, value: &Value) -> Result<Option<Vec<NodeId>>, String> {
        let Value::Array(items) = value else {
            return Ok(None);
        };
        items
            .iter()
            .map(|item| self.alloc(item))
            .collect::<Result<Vec<_>, _>>()
            .map(Some)
    }

    fn alloc_extra(&mut self, value: &Value) -> Result<Option<ExtraProperties>, String> {
        Ok(match value {
            Value::Bool(true) => Some(ExtraProperties::Allowed),
            Value::Bool(false) => Some(ExtraProperties::Forbidden),
            Value::Object(_) => Some(ExtraProperties::Schema(self.alloc(value)?)),
            _ => None,
        })
    }

    fn parse_into(&mut self, id: NodeId, value: &Value, is_root: bool) -> Result<(), String> {
        let map = match value {
            Value::Bool(flag) => {
                self.nodes[id.0].boolean = Some(*flag);
                return Ok(());
            }
            Value::Object(map) => map,
            other => {
                return Err(format!(
                    "subschema must be an object or boolean, found {}",
                    json_type(other)
                ))
            }
        };

        let mut node = SchemaNode::default();
        for (keyword, body) in map {
            let handled = match keyword.as_str() {
                "$defs" | "definitions" if is_root => true,
                "$ref" => match body.as_str().and_then(|r| self.targets.get(r)) {
                    Some(target) => {
                        node.reference = Some(*target);
                        true
                    }
                    None => false,
                },
                "properties" => match self.alloc_named(body)? {
                    Some(props) => {
                        node.properties = props;
                        true
                    }
                    None => false,
                },
                "patternProperties" => match self.alloc_named(body)? {
                    Some(props) => {
                        node.pattern_properties = props;
                        true
                    }
                    None => false,
                },
                "required" => match body.as_array() {
                    Some(names) if names.iter().all(Value::is_string) => {
                        node.required = names
                            .iter()
                            .filter_map(|n| n.as_str().map(str::to_string))
                            .collect();
                        true
                    }
                    _ => false,
                },
                "additionalProperties" => match self.alloc_extra(body)? {
                    Some(extra) => {
                        node.additional_properties = extra;
                        true
                    }
                    None => false,
                },
                "unevaluatedProperties" => match self.alloc_extra(body)? {
                    Some(extra) => {
                        node.unevaluated_properties = extra;
                        true
                    }
                    None => false,
                },
                "oneOf" | "allOf" | "anyOf" | "prefixItems" => match self.alloc_list(body)? {
                    Some(branches) => {
                        match keyword.as_str() {
                            "oneOf" => node.one_of = branches,
                            "allOf" => node.all_of = branches,
                            "anyOf" => node.any_of = branches,
                            _ => node.prefix_items = branches,
                        }
                        true
                    }
                    None => false,
                },
                "items" => match body {
                    Value::Array(_) => {
                        node.items = self.alloc_list(body)?.map(Items::Tuple);
                        true
                    }
                    Value::Object(_) | Value::Bool(_) => {
                        node.items = Some(Items::Single(self.alloc(body)?));
                        true
                    }
                    _ => false,
                },
                _ => false,
            };
            if !handled {
                node.keywords.insert(keyword.clone(), body.clone());
            }
        }

        self.nodes[id.0] = node;
        Ok(())
    }
}

/// Escape a JSON Pointer reference token (RFC 6901).
pub fn escape_pointer_token(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

/// Unescape a JSON Pointer reference token (RFC 6901).
pub fn unescape_pointer_token(token: &str) -> String {
    token.replace("~1", "/").replace("~0", "~")
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
