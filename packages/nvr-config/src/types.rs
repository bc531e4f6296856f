use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
	pub service: Service,
	pub providers: Providers,
	pub storage: Storage,
	pub warehouse: Warehouse,
	pub research: Research,
	pub security: Security,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub log_level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Providers {
	/// Chat model used by the router, the finalizer, and SQL drafting.
	pub llm: LlmProviderConfig,
	pub embedding: EmbeddingProviderConfig,
	pub web_search: WebSearchProviderConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub temperature: f32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebSearchProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	/// Search vertical hint, e.g. "news" or "finance".
	#[serde(default = "default_web_topic")]
	pub topic: String,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Storage {
	pub qdrant: Qdrant,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Qdrant {
	pub url: String,
	pub collection: String,
	pub vector_dim: u32,
	pub api_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Warehouse {
	pub api_base: String,
	#[serde(default = "default_warehouse_path")]
	pub path: String,
	pub token: String,
	pub database: String,
	pub schema: String,
	pub warehouse: String,
	pub role: Option<String>,
	/// Fully qualified table the structured search is allowed to read.
	pub table: String,
	/// Column listing shown to the model when it drafts SQL.
	pub table_description: String,
	pub timeout_ms: u64,
	pub max_rows: u32,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Research {
	/// Cap on router invocations per run.
	#[serde(default = "default_max_steps")]
	pub max_steps: u32,
	#[serde(default = "default_deadline_ms")]
	pub deadline_ms: u64,
	#[serde(default = "default_finalize_grace_ms")]
	pub finalize_grace_ms: u64,
	pub vector_top_k: u32,
	pub web_max_results: u32,
	#[serde(default = "default_max_evidence_chars")]
	pub max_evidence_chars: usize,
	/// Period labels offered to callers, e.g. "2023-Q4".
	pub periods: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Security {
	pub bind_localhost_only: bool,
}

fn default_web_topic() -> String {
	"news".to_string()
}

fn default_warehouse_path() -> String {
	"/api/v2/statements".to_string()
}

fn default_max_steps() -> u32 {
	6
}

fn default_deadline_ms() -> u64 {
	120_000
}

fn default_finalize_grace_ms() -> u64 {
	30_000
}

fn default_max_evidence_chars() -> usize {
	2_000
}
