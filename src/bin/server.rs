//! Recall MCP Server
//!
//! Run with: recall-server

use clap::Parser;
use serde_json::{json, Map, Value};
use tokio::runtime::Handle;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use recall::embedding::create_embedder;
use recall::error::{RecallError, Result};
use recall::index::{Bm25Params, SparseIndex};
use recall::mcp::{
    methods, tool_definitions, tools, InitializeResult, McpHandler, McpRequest, McpResponse,
    McpServer, ToolCallResult,
};
use recall::search::HybridRequest;
use recall::storage::{build_filter, QdrantStore};
use recall::types::{
    EmbeddingConfig, Entry, FilterableField, FusionMethod, QdrantConfig, ToolSettings,
    DEFAULT_TOOL_ADD_NOTE_DESCRIPTION, DEFAULT_TOOL_DELETE_NOTE_DESCRIPTION,
    DEFAULT_TOOL_HYBRID_FIND_DESCRIPTION, DEFAULT_TOOL_UPDATE_NOTE_DESCRIPTION,
};

#[derive(Parser, Debug)]
#[command(name = "recall-server")]
#[command(about = "Recall MCP server for Qdrant-backed agent memory")]
struct Args {
    /// Qdrant server URL
    #[arg(long, env = "QDRANT_URL", default_value = "http://localhost:6333")]
    qdrant_url: String,

    /// Qdrant API key
    #[arg(long, env = "QDRANT_API_KEY")]
    qdrant_api_key: Option<String>,

    /// Collection holding the entries
    #[arg(long, env = "COLLECTION_NAME", default_value = "memories")]
    collection_name: String,

    /// Result limit for dense-only search
    #[arg(long, env = "QDRANT_SEARCH_LIMIT", default_value = "10")]
    search_limit: usize,

    /// Hide the write tools
    #[arg(long, env = "QDRANT_READ_ONLY")]
    read_only: bool,

    /// Expose a raw query_filter parameter on the search tool
    #[arg(long, env = "QDRANT_ALLOW_ARBITRARY_FILTER")]
    allow_arbitrary_filter: bool,

    /// Filterable payload fields as a JSON list
    #[arg(long, env = "QDRANT_FILTERABLE_FIELDS")]
    filterable_fields: Option<String>,

    /// Embedding provider (tfidf or openai)
    #[arg(long, env = "EMBEDDING_PROVIDER", default_value = "tfidf")]
    embedding_provider: String,

    /// Embedding model name
    #[arg(long, env = "EMBEDDING_MODEL", default_value = "text-embedding-3-small")]
    embedding_model: String,

    /// Base URL override for OpenAI-compatible embedding APIs
    #[arg(long, env = "EMBEDDING_BASE_URL")]
    embedding_base_url: Option<String>,

    /// Embedding vector dimensions
    #[arg(long, env = "EMBEDDING_DIMENSIONS", default_value = "384")]
    embedding_dimensions: usize,

    /// OpenAI API key
    #[arg(long, env = "OPENAI_API_KEY")]
    openai_key: Option<String>,

    /// Default fusion method for the search tool
    #[arg(long, env = "QDRANT_FUSION_METHOD", default_value = "rrf")]
    fusion_method: String,

    /// Default dense prefetch limit
    #[arg(long, env = "QDRANT_DENSE_LIMIT", default_value = "20")]
    dense_limit: usize,

    /// Default sparse prefetch limit
    #[arg(long, env = "QDRANT_SPARSE_LIMIT", default_value = "20")]
    sparse_limit: usize,

    /// Default result limit after fusion
    #[arg(long, env = "QDRANT_FINAL_LIMIT", default_value = "10")]
    final_limit: usize,

    /// BM25 vocabulary cap
    #[arg(long, env = "BM25_MAX_VOCAB", default_value = "32768")]
    bm25_max_vocab: usize,

    /// BM25 k1 parameter
    #[arg(long, env = "BM25_K1", default_value = "1.5")]
    bm25_k1: f64,

    /// BM25 b parameter
    #[arg(long, env = "BM25_B", default_value = "0.75")]
    bm25_b: f64,

    /// Search tool description
    #[arg(
        long,
        env = "TOOL_HYBRID_FIND_DESCRIPTION",
        default_value = DEFAULT_TOOL_HYBRID_FIND_DESCRIPTION
    )]
    hybrid_find_description: String,

    /// Add-note tool description
    #[arg(
        long,
        env = "TOOL_ADD_NOTE_DESCRIPTION",
        default_value = DEFAULT_TOOL_ADD_NOTE_DESCRIPTION
    )]
    add_note_description: String,

    /// Update-note tool description
    #[arg(
        long,
        env = "TOOL_UPDATE_NOTE_DESCRIPTION",
        default_value = DEFAULT_TOOL_UPDATE_NOTE_DESCRIPTION
    )]
    update_note_description: String,

    /// Delete-note tool description
    #[arg(
        long,
        env = "TOOL_DELETE_NOTE_DESCRIPTION",
        default_value = DEFAULT_TOOL_DELETE_NOTE_DESCRIPTION
    )]
    delete_note_description: String,
}

/// Defaults applied when the search tool omits its tuning parameters
struct SearchDefaults {
    fusion_method: String,
    dense_limit: usize,
    sparse_limit: usize,
    final_limit: usize,
}

/// MCP request handler
struct RecallHandler {
    store: QdrantStore,
    config: QdrantConfig,
    settings: ToolSettings,
    defaults: SearchDefaults,
    runtime: Handle,
}

impl RecallHandler {
    fn handle_tool_call(&self, name: &str, params: Value) -> Value {
        match name {
            tools::SEARCH_NOTES => self.tool_search_notes(params),
            tools::ADD_NOTE if !self.config.read_only => self.tool_add_note(params),
            tools::UPDATE_NOTE if !self.config.read_only => self.tool_update_note(params),
            tools::DELETE_NOTE if !self.config.read_only => self.tool_delete_note(params),
            _ => json!({"error": format!("Unknown tool: {}", name)}),
        }
    }

    /// Translate the search tool's filter arguments into a Qdrant filter.
    /// Declared fields take precedence over the arbitrary query_filter.
    fn search_filter(&self, params: &Value) -> Result<Option<Value>> {
        let fields = self.config.filterable_fields_with_conditions();
        if !fields.is_empty() {
            let empty = Map::new();
            let args = params
                .get("filter")
                .and_then(Value::as_object)
                .unwrap_or(&empty);
            return build_filter(&fields, args);
        }
        if self.config.allow_arbitrary_filter {
            return Ok(params
                .get("query_filter")
                .filter(|v| !v.is_null())
                .cloned());
        }
        Ok(None)
    }

    fn tool_search_notes(&self, params: Value) -> Value {
        let query = match params.get("query").and_then(Value::as_str) {
            Some(q) => q.to_string(),
            None => return json!({"error": "query is required"}),
        };

        let filter = match self.search_filter(&params) {
            Ok(filter) => filter,
            Err(e) => return json!({"error": e.to_string()}),
        };

        // The reply echoes the fusion name as given, resolved or not.
        let fusion_name = params
            .get("fusion_method")
            .and_then(Value::as_str)
            .unwrap_or(&self.defaults.fusion_method)
            .to_string();

        let request = HybridRequest {
            query: query.clone(),
            fusion: FusionMethod::resolve(&fusion_name),
            dense_limit: usize_param(&params, "dense_limit", self.defaults.dense_limit),
            sparse_limit: usize_param(&params, "sparse_limit", self.defaults.sparse_limit),
            final_limit: usize_param(&params, "final_limit", self.defaults.final_limit),
            filter,
        };

        let entries = match self.runtime.block_on(self.store.find_hybrid(request)) {
            Ok(entries) => entries,
            Err(e) => return json!({"error": e.to_string()}),
        };
        if entries.is_empty() {
            return Value::Null;
        }

        let mut content = vec![json!(format!(
            "Hybrid search results for '{}' (fusion: {})",
            query, fusion_name
        ))];
        for entry in &entries {
            content.push(json!(format_entry(entry)));
        }
        Value::Array(content)
    }

    fn tool_add_note(&self, params: Value) -> Value {
        let text = match params.get("text").and_then(Value::as_str) {
            Some(t) => t.to_string(),
            None => return json!({"error": "text is required"}),
        };
        let metadata = match note_metadata(&params) {
            Ok(metadata) => metadata,
            Err(message) => return json!({ "error": message }),
        };
        let note_type = params
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let entry = Entry::new(text.clone(), Some(Value::Object(metadata)));
        match self.runtime.block_on(self.store.store(entry)) {
            Ok(_) => json!(format!(
                "Note added: {}... (type: {})",
                truncate(&text, 50),
                note_type
            )),
            Err(e) => json!({"error": e.to_string()}),
        }
    }

    fn tool_update_note(&self, params: Value) -> Value {
        let note_id = match params.get("note_id").and_then(Value::as_str) {
            Some(id) => id.to_string(),
            None => return json!({"error": "note_id is required"}),
        };
        let text = match params.get("text").and_then(Value::as_str) {
            Some(t) => t.to_string(),
            None => return json!({"error": "text is required"}),
        };
        let metadata = match note_metadata(&params) {
            Ok(metadata) => metadata,
            Err(message) => return json!({ "error": message }),
        };
        let note_type = params
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let entry = Entry::new(text.clone(), Some(Value::Object(metadata)));
        match self.runtime.block_on(self.store.update(&note_id, entry)) {
            Ok(()) => json!(format!(
                "Note updated: {}... (type: {}, id: {})",
                truncate(&text, 50),
                note_type,
                note_id
            )),
            Err(e) => json!({"error": e.to_string()}),
        }
    }

    fn tool_delete_note(&self, params: Value) -> Value {
        let note_id = match params.get("note_id").and_then(Value::as_str) {
            Some(id) => id.to_string(),
            None => return json!({"error": "note_id is required"}),
        };
        match self.runtime.block_on(self.store.delete(&note_id)) {
            Ok(()) => json!(format!("Note deleted: {}", note_id)),
            Err(e) => json!({"error": e.to_string()}),
        }
    }
}

impl McpHandler for RecallHandler {
    fn handle_request(&self, request: McpRequest) -> McpResponse {
        match request.method.as_str() {
            methods::INITIALIZE => {
                let result = InitializeResult::default();
                McpResponse::success(request.id, json!(result))
            }
            methods::INITIALIZED => {
                // Notification, no response needed
                McpResponse::success(request.id, json!({}))
            }
            methods::LIST_TOOLS => {
                let tools = tool_definitions(&self.config, &self.settings);
                McpResponse::success(request.id, json!({"tools": tools}))
            }
            methods::CALL_TOOL => {
                let name = request
                    .params
                    .get("name")
                    .and_then(|v| v.as_str())
                    .unwrap_or("");
                let arguments = request
                    .params
                    .get("arguments")
                    .cloned()
                    .unwrap_or(json!({}));

                let result = self.handle_tool_call(name, arguments);
                let tool_result = match result {
                    Value::String(text) => ToolCallResult::text(text),
                    other => ToolCallResult::json(&other),
                };
                McpResponse::success(request.id, json!(tool_result))
            }
            _ => McpResponse::error(
                request.id,
                -32601,
                format!("Method not found: {}", request.method),
            ),
        }
    }
}

/// Build note metadata from tool arguments. The context, type, and
/// created_at fields are mandatory; the rest are copied when present.
fn note_metadata(params: &Value) -> std::result::Result<Map<String, Value>, String> {
    let mut metadata = Map::new();
    for key in ["context", "type", "created_at"] {
        match params.get(key) {
            Some(value) if !value.is_null() => {
                metadata.insert(key.to_string(), value.clone());
            }
            _ => return Err(format!("{} is required", key)),
        }
    }
    for key in ["tool", "tags", "language", "source"] {
        if let Some(value) = params.get(key) {
            if !value.is_null() {
                metadata.insert(key.to_string(), value.clone());
            }
        }
    }
    Ok(metadata)
}

/// Render an entry as the search tool returns it
fn format_entry(entry: &Entry) -> String {
    let entry_id = entry.id.as_deref().unwrap_or_default();
    let metadata = match &entry.metadata {
        Some(Value::Object(map)) if map.is_empty() => String::new(),
        Some(value) => value.to_string(),
        None => String::new(),
    };
    format!(
        "<entry><id>{}</id><content>{}</content><metadata>{}</metadata></entry>",
        entry_id, entry.content, metadata
    )
}

fn truncate(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}

fn usize_param(params: &Value, key: &str, default: usize) -> usize {
    params
        .get(key)
        .and_then(Value::as_u64)
        .map(|v| v as usize)
        .unwrap_or(default)
}

/// Parse the QDRANT_FILTERABLE_FIELDS JSON list
fn parse_filterable_fields(raw: Option<&str>) -> Result<Vec<FilterableField>> {
    match raw {
        Some(raw) if !raw.trim().is_empty() => serde_json::from_str(raw)
            .map_err(|e| RecallError::Config(format!("Invalid QDRANT_FILTERABLE_FIELDS: {}", e))),
        _ => Ok(Vec::new()),
    }
}

fn main() -> Result<()> {
    // Initialize logging to stderr (stdout is for MCP protocol)
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(false),
        )
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let filterable_fields = parse_filterable_fields(args.filterable_fields.as_deref())?;

    let config = QdrantConfig {
        url: args.qdrant_url,
        api_key: args.qdrant_api_key,
        collection_name: args.collection_name,
        search_limit: args.search_limit,
        read_only: args.read_only,
        allow_arbitrary_filter: args.allow_arbitrary_filter,
        filterable_fields,
    };

    let embedding_config = EmbeddingConfig {
        provider: args.embedding_provider,
        model: args.embedding_model,
        api_key: args.openai_key,
        base_url: args.embedding_base_url,
        dimensions: args.embedding_dimensions,
    };
    let embedder = create_embedder(&embedding_config)?;

    let index = SparseIndex::new(
        args.bm25_max_vocab,
        Bm25Params {
            k1: args.bm25_k1,
            b: args.bm25_b,
        },
    );
    let store = QdrantStore::from_config(&config, embedder).with_sparse_index(index);

    let settings = ToolSettings {
        hybrid_find_description: args.hybrid_find_description,
        add_note_description: args.add_note_description,
        update_note_description: args.update_note_description,
        delete_note_description: args.delete_note_description,
    };
    let defaults = SearchDefaults {
        fusion_method: args.fusion_method,
        dense_limit: args.dense_limit,
        sparse_limit: args.sparse_limit,
        final_limit: args.final_limit,
    };

    let runtime = tokio::runtime::Runtime::new()?;
    let handler = RecallHandler {
        store,
        config,
        settings,
        defaults,
        runtime: runtime.handle().clone(),
    };
    let server = McpServer::new(handler);

    tracing::info!("Recall MCP server starting...");
    server.run()?;

    Ok(())
}
