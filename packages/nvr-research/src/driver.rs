use std::{
	sync::Arc,
	time::{Duration, Instant},
};

use serde::{Deserialize, Serialize};
use tracing::Instrument;
use uuid::Uuid;

use nvr_config::Config;

use crate::{
	Error, FALLBACK_ANSWER, Result,
	deadline::Deadline,
	decision::{RouterOutcome, RoutingDecision},
	finalizer,
	model::{ChatModel, OpenAiChat},
	retrieval::{self, QdrantVectorSearch, Retrievers, WarehouseSearch, WebSearch},
	router,
	state::{ChatTurn, EvidenceLog, Mode, PeriodFilters, ResearchState, Tool},
	usage::{Usage, UsageMeter},
};

#[derive(Debug, Clone, Copy)]
pub struct Limits {
	/// Cap on router invocations.
	pub max_steps: u32,
	pub deadline: Duration,
	/// Extra time the finalizer gets once it starts, even past `deadline`.
	pub finalize_grace: Duration,
	pub max_evidence_chars: usize,
}
impl Limits {
	pub fn from_config(research: &nvr_config::Research) -> Self {
		Self {
			max_steps: research.max_steps,
			deadline: Duration::from_millis(research.deadline_ms),
			finalize_grace: Duration::from_millis(research.finalize_grace_ms),
			max_evidence_chars: research.max_evidence_chars,
		}
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResearchRequest {
	pub query: String,
	#[serde(default)]
	pub filters: PeriodFilters,
	#[serde(default)]
	pub mode: Mode,
	#[serde(default)]
	pub chat_history: Vec<ChatTurn>,
}
impl ResearchRequest {
	pub fn new(query: impl Into<String>, filters: PeriodFilters, mode: Mode) -> Self {
		Self { query: query.into(), filters, mode, chat_history: Vec::new() }
	}

	/// Rejects blank queries and period labels outside `known_periods`.
	pub fn validate(&self, known_periods: &[String]) -> Result<()> {
		if self.query.trim().is_empty() {
			return Err(Error::InvalidRequest {
				message: "query must be non-empty.".to_string(),
				fields: vec!["query".to_string()],
			});
		}

		let unknown: Vec<String> = self
			.filters
			.labels()
			.filter(|label| !known_periods.iter().any(|known| known == label))
			.map(|label| format!("filters.{label}"))
			.collect();

		if !unknown.is_empty() {
			return Err(Error::InvalidRequest {
				message: "filters reference unknown periods.".to_string(),
				fields: unknown,
			});
		}

		Ok(())
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
	/// The router chose to finish.
	Finished,
	Unparseable,
	RouterFailed,
	StepBudgetExhausted,
	DeadlineExceeded,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResearchReport {
	pub run_id: Uuid,
	pub answer: String,
	/// False when `answer` is the fallback message.
	pub answered: bool,
	pub termination: Termination,
	pub router_steps: u32,
	pub evidence: EvidenceLog,
	/// Wall-clock time of the whole run.
	pub elapsed_ms: u64,
	pub model: Option<String>,
	pub usage: Usage,
}

enum Node {
	Router,
	Retrieve { tool: Tool, query: String },
	Finalize(Termination),
	Terminated(Termination),
}

/// Router, retrieval nodes, and finalizer wired as an explicit state machine.
#[derive(Clone)]
pub struct ResearchGraph {
	chat: Arc<dyn ChatModel>,
	retrievers: Retrievers,
	limits: Limits,
}
impl ResearchGraph {
	pub fn new(chat: Arc<dyn ChatModel>, retrievers: Retrievers, limits: Limits) -> Self {
		Self { chat, retrievers, limits }
	}

	pub fn from_config(cfg: &Config) -> Result<Self> {
		let chat: Arc<dyn ChatModel> = Arc::new(OpenAiChat::new(cfg.providers.llm.clone()));
		let vector = QdrantVectorSearch::new(
			&cfg.storage.qdrant,
			cfg.providers.embedding.clone(),
			cfg.research.vector_top_k,
		)?;
		let web = WebSearch::new(cfg.providers.web_search.clone(), cfg.research.web_max_results);
		let structured = WarehouseSearch::new(chat.clone(), cfg.warehouse.clone());
		let retrievers = Retrievers::new(Arc::new(vector), Arc::new(web), Arc::new(structured));

		Ok(Self::new(chat, retrievers, Limits::from_config(&cfg.research)))
	}

	/// Runs one query to completion and returns the answer, or the fallback message.
	pub async fn run(&self, query: &str, filters: PeriodFilters, mode: Mode) -> String {
		self.run_report(ResearchRequest::new(query, filters, mode)).await.answer
	}

	pub async fn run_report(&self, request: ResearchRequest) -> ResearchReport {
		let run_id = Uuid::new_v4();
		let span = tracing::info_span!("research_run", %run_id, mode = request.mode.as_str());

		self.drive(run_id, request).instrument(span).await
	}

	async fn drive(&self, run_id: Uuid, request: ResearchRequest) -> ResearchReport {
		let ResearchRequest { query, filters, mode, chat_history } = request;
		let started = Instant::now();
		let mut state = ResearchState::new(query, chat_history, filters, mode);
		let usage = UsageMeter::new();
		let deadline = Deadline::after(self.limits.deadline);
		let mut router_steps = 0;
		let mut node = Node::Router;

		tracing::info!(query = %state.input, "Research run started.");

		let termination = loop {
			node = match node {
				Node::Router => {
					if deadline.is_expired() {
						Node::Finalize(Termination::DeadlineExceeded)
					} else if router_steps >= self.limits.max_steps {
						tracing::info!(router_steps, "Step budget exhausted; finalizing.");

						Node::Finalize(Termination::StepBudgetExhausted)
					} else {
						router_steps += 1;

						self.next_after_router(&state, &usage, &deadline).await
					}
				},
				Node::Retrieve { tool, query } => {
					let backend = self.retrievers.get(tool);
					let batch = retrieval::run_node(
						backend,
						tool,
						&query,
						&state.filters,
						&usage,
						&deadline,
					)
					.await;

					state.evidence.push(batch);

					Node::Router
				},
				Node::Finalize(reason) => {
					let grace = Deadline::after(self.limits.finalize_grace.max(deadline.remaining()));

					finalizer::finalize(
						self.chat.as_ref(),
						&mut state,
						&usage,
						&grace,
						self.limits.max_evidence_chars,
					)
					.await;

					Node::Terminated(reason)
				},
				Node::Terminated(reason) => break reason,
			};
		};
		let answered = state.output.is_some();
		let answer = state.output.unwrap_or_else(|| FALLBACK_ANSWER.to_string());
		let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
		let usage = usage.total();

		tracing::info!(
			?termination,
			router_steps,
			evidence_batches = state.evidence.len(),
			answered,
			elapsed_ms,
			total_tokens = usage.total_tokens,
			"Research run finished."
		);

		ResearchReport {
			run_id,
			answer,
			answered,
			termination,
			router_steps,
			evidence: state.evidence,
			elapsed_ms,
			model: self.chat.model().map(str::to_string),
			usage,
		}
	}

	async fn next_after_router(
		&self,
		state: &ResearchState,
		usage: &UsageMeter,
		deadline: &Deadline,
	) -> Node {
		match router::route(self.chat.as_ref(), state, usage, deadline).await {
			RouterOutcome::Decided(RoutingDecision::Finish) => Node::Finalize(Termination::Finished),
			RouterOutcome::Decided(decision) => match decision.tool() {
				Some(tool) => {
					let query = decision.query().unwrap_or(state.input.as_str()).to_string();

					tracing::info!(tool = %tool, query = %query, "Router selected a tool.");

					Node::Retrieve { tool, query }
				},
				None => Node::Finalize(Termination::Finished),
			},
			RouterOutcome::Unparseable { .. } => Node::Finalize(Termination::Unparseable),
			RouterOutcome::Failed { .. } if deadline.is_expired() =>
				Node::Finalize(Termination::DeadlineExceeded),
			RouterOutcome::Failed { .. } => Node::Finalize(Termination::RouterFailed),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn request_defaults_to_combined_mode() {
		let request: ResearchRequest =
			serde_json::from_str(r#"{"query": "Q"}"#).expect("decode failed");
		assert_eq!(request.mode, Mode::Combined);
		assert!(request.filters.is_unrestricted());
		assert!(request.chat_history.is_empty());
	}

	#[test]
	fn validation_rejects_blank_query_and_unknown_periods() {
		let known = vec!["2024-Q1".to_string()];
		let blank = ResearchRequest::new("  ", PeriodFilters::new(), Mode::Web);
		assert!(matches!(
			blank.validate(&known),
			Err(Error::InvalidRequest { ref fields, .. }) if fields == &["query"]
		));

		let unknown =
			ResearchRequest::new("Q", PeriodFilters::new().include("2019-Q1"), Mode::Web);
		assert!(matches!(
			unknown.validate(&known),
			Err(Error::InvalidRequest { ref fields, .. }) if fields == &["filters.2019-Q1"]
		));

		let ok = ResearchRequest::new("Q", PeriodFilters::new().include("2024-Q1"), Mode::Web);
		assert!(ok.validate(&known).is_ok());
	}
}
