use std::sync::Arc;

use nvr_config::Config;
use nvr_research::ResearchGraph;

#[derive(Clone)]
pub struct AppState {
	pub graph: Arc<ResearchGraph>,
	/// Period labels requests may filter on.
	pub periods: Arc<Vec<String>>,
}
impl AppState {
	pub fn new(config: &Config) -> color_eyre::Result<Self> {
		let graph = ResearchGraph::from_config(config)?;

		Ok(Self::with_graph(graph, config.research.periods.clone()))
	}

	pub fn with_graph(graph: ResearchGraph, periods: Vec<String>) -> Self {
		Self { graph: Arc::new(graph), periods: Arc::new(periods) }
	}
}
