//! Discovery catalog construction.
//!
//! Each registered tool yields one [`CatalogEntry`]: the JSON schema a caller
//! must send to `call_tool`, plus a keyword string (parameter names and enum
//! values) that enriches the text fed to the embedder.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Schema keys whose values are maps of named sub-schemas.
const DEFINITION_KEYS: [&str; 2] = ["definitions", "$defs"];

/// Schema keys whose values are lists of alternative sub-schemas.
const COMBINATOR_KEYS: [&str; 3] = ["anyOf", "oneOf", "allOf"];

/// Discovery metadata derived 1:1 from a registered tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    pub name: String,
    pub title: String,
    pub description: String,
    pub input_schema: Value,
    /// Space-joined, sorted parameter names and enum values.
    pub keywords: String,
}

impl CatalogEntry {
    pub fn new(
        name: &str,
        title: &str,
        description: &str,
        params_schema: Option<&Value>,
        supports_paging: bool,
    ) -> Self {
        Self {
            name: name.to_string(),
            title: title.to_string(),
            description: description.to_string(),
            input_schema: build_input_schema(params_schema, supports_paging),
            keywords: params_schema.map(schema_keywords).unwrap_or_default(),
        }
    }

    /// Text embedded for this entry: `"{title}: {description}"`, optionally
    /// followed by the schema keywords.
    pub fn embedding_text(&self, with_keywords: bool) -> String {
        if with_keywords && !self.keywords.is_empty() {
            format!("{}: {} {}", self.title, self.description, self.keywords)
        } else {
            format!("{}: {}", self.title, self.description)
        }
    }

    pub fn info(&self) -> ToolInfo {
        ToolInfo {
            name: self.name.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            input_schema: self.input_schema.clone(),
        }
    }
}

/// Public projection of a catalog entry returned by discovery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolInfo {
    pub name: String,
    pub title: String,
    pub description: String,
    pub input_schema: Value,
}

/// Extract parameter names and string enum members from a params schema.
///
/// Walks `properties`, array `items`, combinators and shared definitions.
/// The result is deduplicated and sorted so it is independent of traversal order.
pub fn schema_keywords(schema: &Value) -> String {
    let mut keywords = BTreeSet::new();
    collect_keywords(schema, &mut keywords);
    keywords.into_iter().collect::<Vec<_>>().join(" ")
}

fn collect_keywords(node: &Value, keywords: &mut BTreeSet<String>) {
    let Some(object) = node.as_object() else {
        return;
    };

    if let Some(properties) = object.get("properties").and_then(Value::as_object) {
        for (name, property) in properties {
            keywords.insert(name.clone());
            collect_keywords(property, keywords);
        }
    }

    match object.get("items") {
        Some(Value::Array(items)) => items.iter().for_each(|item| collect_keywords(item, keywords)),
        Some(item) => collect_keywords(item, keywords),
        None => {}
    }

    if let Some(members) = object.get("enum").and_then(Value::as_array) {
        keywords.extend(members.iter().filter_map(Value::as_str).map(str::to_string));
    }

    for key in COMBINATOR_KEYS {
        if let Some(variants) = object.get(key).and_then(Value::as_array) {
            variants.iter().for_each(|v| collect_keywords(v, keywords));
        }
    }

    for key in DEFINITION_KEYS {
        if let Some(definitions) = object.get(key).and_then(Value::as_object) {
            definitions.values().for_each(|d| collect_keywords(d, keywords));
        }
    }
}

/// Build the `call_tool` arguments schema for a tool.
///
/// `target` is always required. `params` is added (and required) only when the
/// tool has a params schema; its shared definitions are hoisted to the root so
/// `#/definitions/..` references still resolve. `pageToken` is optional and
/// only present for paged tools.
pub fn build_input_schema(params_schema: Option<&Value>, supports_paging: bool) -> Value {
    let mut properties = Map::new();
    let mut required = vec![json!("target")];
    let mut root = Map::new();

    properties.insert(
        "target".to_string(),
        json!({
            "type": "integer",
            "description": "The backend target to act on. Find it with list_targets."
        }),
    );

    if let Some(schema) = params_schema {
        let mut params = schema.clone();
        if let Some(params_object) = params.as_object_mut() {
            params_object.remove("$schema");
            for key in DEFINITION_KEYS {
                if let Some(definitions) = params_object.remove(key) {
                    root.insert(key.to_string(), definitions);
                }
            }
        }
        properties.insert("params".to_string(), params);
        required.push(json!("params"));
    }

    if supports_paging {
        properties.insert(
            "pageToken".to_string(),
            json!({
                "type": "string",
                "description": "Token for the next page of results (for paginated responses)."
            }),
        );
    }

    root.insert("type".to_string(), json!("object"));
    root.insert("properties".to_string(), Value::Object(properties));
    root.insert("required".to_string(), Value::Array(required));
    Value::Object(root)
}
