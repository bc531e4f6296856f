pub mod structured;
pub mod vector;
pub mod web;

use std::sync::Arc;

use crate::{
	BoxFuture,
	deadline::Deadline,
	state::{EvidenceBatch, EvidenceRecord, PeriodFilters, Tool},
	usage::UsageMeter,
};

pub use structured::WarehouseSearch;
pub use vector::QdrantVectorSearch;
pub use web::WebSearch;

/// One retrieval capability. "No results" is an empty vector, not an error.
///
/// Backends that call the language model record its usage on `usage`.
pub trait SearchBackend
where
	Self: Send + Sync,
{
	fn search<'a>(
		&'a self,
		query: &'a str,
		filters: &'a PeriodFilters,
		usage: &'a UsageMeter,
	) -> BoxFuture<'a, color_eyre::Result<Vec<EvidenceRecord>>>;
}

/// The three backends, fixed at construction.
#[derive(Clone)]
pub struct Retrievers {
	pub vector: Arc<dyn SearchBackend>,
	pub web: Arc<dyn SearchBackend>,
	pub structured: Arc<dyn SearchBackend>,
}
impl Retrievers {
	pub fn new(
		vector: Arc<dyn SearchBackend>,
		web: Arc<dyn SearchBackend>,
		structured: Arc<dyn SearchBackend>,
	) -> Self {
		Self { vector, web, structured }
	}

	pub fn get(&self, tool: Tool) -> &dyn SearchBackend {
		match tool {
			Tool::VectorSearch => self.vector.as_ref(),
			Tool::WebSearch => self.web.as_ref(),
			Tool::StructuredSearch => self.structured.as_ref(),
		}
	}
}

/// Runs one retrieval node. Always yields a batch; backend failures become an error batch.
pub async fn run_node(
	backend: &dyn SearchBackend,
	tool: Tool,
	query: &str,
	filters: &PeriodFilters,
	usage: &UsageMeter,
	deadline: &Deadline,
) -> EvidenceBatch {
	match deadline.guard(tool.as_str(), backend.search(query, filters, usage)).await {
		Ok(records) => {
			tracing::info!(tool = %tool, hits = records.len(), "Retrieval completed.");

			EvidenceBatch::found(tool, query, records)
		},
		Err(err) => {
			tracing::warn!(tool = %tool, error = %err, "Retrieval failed; recording an empty batch.");

			EvidenceBatch::failed(tool, query, err.to_string())
		},
	}
}
