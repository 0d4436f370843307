//! Core types for Recall

use serde::{Deserialize, Serialize};

/// Payload key under which entry metadata is stored in Qdrant
pub const METADATA_PATH: &str = "metadata";

/// A single entry in the memory collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    /// Main text content
    pub content: String,
    /// Arbitrary JSON metadata stored alongside the content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    /// Point id; set on entries read back from the store
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl Entry {
    /// Create an entry that has not been stored yet
    pub fn new(content: impl Into<String>, metadata: Option<serde_json::Value>) -> Self {
        Self {
            content: content.into(),
            metadata,
            id: None,
        }
    }
}

/// Sparse relevance vector: parallel term-id / weight arrays
///
/// Ids are unique within one vector and both arrays always have the same
/// length. An all-empty vector is the normal representation of "nothing to
/// score" and is omitted from stored points entirely.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SparseVector {
    pub ids: Vec<u32>,
    pub values: Vec<f32>,
}

impl SparseVector {
    /// Create a sparse vector from parallel arrays
    pub fn new(ids: Vec<u32>, values: Vec<f32>) -> Self {
        assert_eq!(
            ids.len(),
            values.len(),
            "sparse vector arrays must have equal length"
        );
        Self { ids, values }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Server-side fusion method for hybrid queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FusionMethod {
    /// Reciprocal rank fusion
    Rrf,
    /// Distribution-based score fusion
    Dbsf,
}

impl FusionMethod {
    /// Resolve a method name to a fusion method.
    ///
    /// The comparison is exact: only the string `"rrf"` selects
    /// reciprocal-rank fusion; every other spelling (including `"RRF"`)
    /// falls through to DBSF.
    pub fn resolve(name: &str) -> Self {
        if name == "rrf" {
            FusionMethod::Rrf
        } else {
            FusionMethod::Dbsf
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FusionMethod::Rrf => "rrf",
            FusionMethod::Dbsf => "dbsf",
        }
    }
}

impl std::fmt::Display for FusionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Payload field type for filterable fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Keyword,
    Integer,
    Float,
    Boolean,
}

impl FieldType {
    /// Qdrant payload index schema name
    pub fn payload_schema(&self) -> &'static str {
        match self {
            FieldType::Keyword => "keyword",
            FieldType::Integer => "integer",
            FieldType::Float => "float",
            FieldType::Boolean => "bool",
        }
    }

    /// JSON schema type for the tool parameter carrying this field
    pub fn json_schema_type(&self) -> &'static str {
        match self {
            FieldType::Keyword => "string",
            FieldType::Integer => "integer",
            FieldType::Float => "number",
            FieldType::Boolean => "boolean",
        }
    }
}

/// Filter condition applied to a filterable field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldCondition {
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Gte,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Lte,
    #[serde(rename = "any")]
    Any,
    #[serde(rename = "except")]
    Except,
}

/// A payload field that gets an index and, when a condition is set, a filter
/// parameter on the search tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterableField {
    /// Payload field name (e.g. "metadata.type")
    pub name: String,
    /// Description used in the tool schema
    pub description: String,
    /// Field type, determines the payload index schema
    pub field_type: FieldType,
    /// Condition exposed to the search tool; None = index only
    #[serde(default)]
    pub condition: Option<FieldCondition>,
    /// Whether the filter value must be provided
    #[serde(default)]
    pub required: bool,
}

/// Qdrant connection and behavior settings
#[derive(Debug, Clone)]
pub struct QdrantConfig {
    /// Base URL of the Qdrant server
    pub url: String,
    /// Optional API key sent as the `api-key` header
    pub api_key: Option<String>,
    /// Collection all entries live in
    pub collection_name: String,
    /// Result limit for plain dense search
    pub search_limit: usize,
    /// Disable the write tools
    pub read_only: bool,
    /// Expose a raw `query_filter` parameter on the search tool
    pub allow_arbitrary_filter: bool,
    /// Declared filterable payload fields
    pub filterable_fields: Vec<FilterableField>,
}

impl QdrantConfig {
    /// Fields that expose a filter parameter on the search tool
    pub fn filterable_fields_with_conditions(&self) -> Vec<&FilterableField> {
        self.filterable_fields
            .iter()
            .filter(|f| f.condition.is_some())
            .collect()
    }
}

impl Default for QdrantConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:6333".to_string(),
            api_key: None,
            collection_name: "memories".to_string(),
            search_limit: 10,
            read_only: false,
            allow_arbitrary_filter: false,
            filterable_fields: Vec::new(),
        }
    }
}

/// Embedding provider settings
#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    /// Provider name ("tfidf" or "openai")
    pub provider: String,
    /// Model name, used by the OpenAI-compatible provider
    pub model: String,
    /// API key for remote providers
    pub api_key: Option<String>,
    /// Override base URL for OpenAI-compatible APIs
    pub base_url: Option<String>,
    /// Expected embedding dimensions
    pub dimensions: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "tfidf".to_string(),
            model: "text-embedding-3-small".to_string(),
            api_key: None,
            base_url: None,
            dimensions: 384,
        }
    }
}

pub const DEFAULT_TOOL_HYBRID_FIND_DESCRIPTION: &str =
    "Advanced hybrid search combining semantic similarity and keyword matching. \
     Use this tool when you need: \n \
     - Best search results by combining meaning and exact word matches \n \
     - More precise results than semantic search alone \n \
     - To find content that matches both concepts and specific terms \n \
     - Superior search quality using RRF or DBSF fusion methods";

pub const DEFAULT_TOOL_ADD_NOTE_DESCRIPTION: &str =
    "Add a structured note to Qdrant. Use this tool when you need to store notes \
     with specific metadata such as commands, code snippets, API references, or \
     learning materials. The note will be automatically tagged and categorized \
     for easy retrieval.";

pub const DEFAULT_TOOL_UPDATE_NOTE_DESCRIPTION: &str =
    "Update an existing structured note in Qdrant. Use this tool when you need \
     to modify a previously stored note. Requires the unique identifier (ID) of \
     the note to update.";

pub const DEFAULT_TOOL_DELETE_NOTE_DESCRIPTION: &str =
    "Delete a note from Qdrant. Use this tool when you need to remove a stored \
     note. Requires the unique identifier (ID) of the note to delete.";

/// Tool descriptions, each overridable via environment
#[derive(Debug, Clone)]
pub struct ToolSettings {
    pub hybrid_find_description: String,
    pub add_note_description: String,
    pub update_note_description: String,
    pub delete_note_description: String,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            hybrid_find_description: DEFAULT_TOOL_HYBRID_FIND_DESCRIPTION.to_string(),
            add_note_description: DEFAULT_TOOL_ADD_NOTE_DESCRIPTION.to_string(),
            update_note_description: DEFAULT_TOOL_UPDATE_NOTE_DESCRIPTION.to_string(),
            delete_note_description: DEFAULT_TOOL_DELETE_NOTE_DESCRIPTION.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fusion_method_resolution_is_case_sensitive() {
        assert_eq!(FusionMethod::resolve("rrf"), FusionMethod::Rrf);
        assert_eq!(FusionMethod::resolve("RRF"), FusionMethod::Dbsf);
        assert_eq!(FusionMethod::resolve("dbsf"), FusionMethod::Dbsf);
        assert_eq!(FusionMethod::resolve("typo"), FusionMethod::Dbsf);
        assert_eq!(FusionMethod::resolve(""), FusionMethod::Dbsf);
    }

    #[test]
    fn test_fusion_method_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&FusionMethod::Rrf).unwrap(),
            "\"rrf\""
        );
        assert_eq!(
            serde_json::to_string(&FusionMethod::Dbsf).unwrap(),
            "\"dbsf\""
        );
    }

    #[test]
    fn test_filterable_field_parses_from_json() {
        let json = r#"{
            "name": "metadata.type",
            "description": "Note type",
            "field_type": "keyword",
            "condition": "==",
            "required": true
        }"#;
        let field: FilterableField = serde_json::from_str(json).unwrap();
        assert_eq!(field.name, "metadata.type");
        assert_eq!(field.field_type, FieldType::Keyword);
        assert_eq!(field.condition, Some(FieldCondition::Eq));
        assert!(field.required);
    }

    #[test]
    fn test_filterable_field_condition_defaults_to_none() {
        let json = r#"{
            "name": "metadata.year",
            "description": "Year",
            "field_type": "integer"
        }"#;
        let field: FilterableField = serde_json::from_str(json).unwrap();
        assert_eq!(field.condition, None);
        assert!(!field.required);
    }

    #[test]
    fn test_boolean_field_payload_schema() {
        assert_eq!(FieldType::Boolean.payload_schema(), "bool");
        assert_eq!(FieldType::Keyword.payload_schema(), "keyword");
    }

    #[test]
    #[should_panic(expected = "equal length")]
    fn test_sparse_vector_rejects_mismatched_arrays() {
        SparseVector::new(vec![1, 2], vec![0.5]);
    }

    #[test]
    fn test_empty_sparse_vector() {
        let v = SparseVector::default();
        assert!(v.is_empty());
        assert_eq!(v.len(), 0);
    }
}
