//! MCP tool definitions
//!
//! The search tool is always exposed. The write tools are omitted entirely
//! in read-only mode, so a read-only server never advertises them. Declared
//! filterable fields with conditions surface as a structured `filter`
//! parameter on the search tool; without them, an arbitrary `query_filter`
//! object can be enabled instead.

use serde_json::{json, Map, Value};

use super::protocol::ToolDefinition;
use crate::types::{FieldCondition, QdrantConfig, ToolSettings};

pub const SEARCH_NOTES: &str = "qdrant-search-notes";
pub const ADD_NOTE: &str = "qdrant-add-note";
pub const UPDATE_NOTE: &str = "qdrant-update-note";
pub const DELETE_NOTE: &str = "qdrant-delete-note";

/// Build the tool list for the current configuration
pub fn tool_definitions(config: &QdrantConfig, settings: &ToolSettings) -> Vec<ToolDefinition> {
    let mut tools = vec![ToolDefinition {
        name: SEARCH_NOTES.to_string(),
        description: settings.hybrid_find_description.clone(),
        input_schema: search_notes_schema(config),
    }];

    if !config.read_only {
        tools.push(ToolDefinition {
            name: ADD_NOTE.to_string(),
            description: settings.add_note_description.clone(),
            input_schema: note_schema(false),
        });
        tools.push(ToolDefinition {
            name: UPDATE_NOTE.to_string(),
            description: settings.update_note_description.clone(),
            input_schema: note_schema(true),
        });
        tools.push(ToolDefinition {
            name: DELETE_NOTE.to_string(),
            description: settings.delete_note_description.clone(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "note_id": {
                        "type": "string",
                        "description": "The unique identifier of the note to delete"
                    }
                },
                "required": ["note_id"]
            }),
        });
    }

    tools
}

fn search_notes_schema(config: &QdrantConfig) -> Value {
    let mut properties = Map::new();
    properties.insert(
        "query".to_string(),
        json!({ "type": "string", "description": "What to search for" }),
    );
    properties.insert(
        "fusion_method".to_string(),
        json!({
            "type": "string",
            "description": "Fusion method: 'rrf' or 'dbsf'",
            "default": "rrf"
        }),
    );
    properties.insert(
        "dense_limit".to_string(),
        json!({
            "type": "integer",
            "description": "Max results from semantic search",
            "default": 20
        }),
    );
    properties.insert(
        "sparse_limit".to_string(),
        json!({
            "type": "integer",
            "description": "Max results from keyword search",
            "default": 20
        }),
    );
    properties.insert(
        "final_limit".to_string(),
        json!({
            "type": "integer",
            "description": "Final number of results after fusion",
            "default": 10
        }),
    );

    let mut required = vec![json!("query")];

    let conditioned = config.filterable_fields_with_conditions();
    if !conditioned.is_empty() {
        let mut filter_properties = Map::new();
        let mut filter_required = Vec::new();
        for field in &conditioned {
            let property = match field.condition {
                Some(FieldCondition::Any) | Some(FieldCondition::Except) => json!({
                    "type": "array",
                    "items": { "type": field.field_type.json_schema_type() },
                    "description": field.description
                }),
                _ => json!({
                    "type": field.field_type.json_schema_type(),
                    "description": field.description
                }),
            };
            filter_properties.insert(field.name.clone(), property);
            if field.required {
                filter_required.push(json!(field.name));
            }
        }

        let mut filter_schema = Map::new();
        filter_schema.insert("type".to_string(), json!("object"));
        filter_schema.insert(
            "description".to_string(),
            json!("Filter over the declared payload fields"),
        );
        filter_schema.insert("properties".to_string(), Value::Object(filter_properties));
        if !filter_required.is_empty() {
            filter_schema.insert("required".to_string(), Value::Array(filter_required));
            required.push(json!("filter"));
        }
        properties.insert("filter".to_string(), Value::Object(filter_schema));
    } else if config.allow_arbitrary_filter {
        properties.insert(
            "query_filter".to_string(),
            json!({
                "type": "object",
                "description": "Qdrant filter object applied to the search as-is"
            }),
        );
    }

    json!({
        "type": "object",
        "properties": properties,
        "required": required
    })
}

fn note_schema(with_note_id: bool) -> Value {
    let mut properties = Map::new();
    let mut required = Vec::new();

    if with_note_id {
        properties.insert(
            "note_id".to_string(),
            json!({
                "type": "string",
                "description": "The unique identifier of the note to update"
            }),
        );
        required.push(json!("note_id"));
    }

    properties.insert(
        "text".to_string(),
        json!({ "type": "string", "description": "The primary knowledge content" }),
    );
    properties.insert(
        "context".to_string(),
        json!({
            "type": "string",
            "description": "Explains when / why / how the text is useful"
        }),
    );
    properties.insert(
        "type".to_string(),
        json!({
            "type": "string",
            "description": "Type of note: cli | api | learning | snippet | pattern"
        }),
    );
    properties.insert(
        "created_at".to_string(),
        json!({
            "type": "string",
            "description": "ISO-8601 formatted timestamp of when the knowledge was recorded"
        }),
    );
    properties.insert(
        "tool".to_string(),
        json!({ "type": "string", "description": "Tool or command name (optional)" }),
    );
    properties.insert(
        "tags".to_string(),
        json!({
            "type": "array",
            "items": { "type": "string" },
            "description": "List of tags for categorization (optional)"
        }),
    );
    properties.insert(
        "language".to_string(),
        json!({
            "type": "string",
            "description": "Programming language if applicable (optional)"
        }),
    );
    properties.insert(
        "source".to_string(),
        json!({ "type": "string", "description": "Source or reference URL (optional)" }),
    );

    for name in ["text", "context", "type", "created_at"] {
        required.push(json!(name));
    }

    json!({
        "type": "object",
        "properties": properties,
        "required": required
    })
}
