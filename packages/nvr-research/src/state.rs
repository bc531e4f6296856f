use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Which retrieval tools a run may use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
	/// Filing index plus the structured warehouse.
	#[serde(alias = "pinecone")]
	Vector,
	#[serde(alias = "web_search")]
	Web,
	#[default]
	Combined,
}
impl Mode {
	pub fn allowed_tools(self) -> &'static [Tool] {
		match self {
			Self::Vector => &[Tool::VectorSearch, Tool::StructuredSearch],
			Self::Web => &[Tool::WebSearch],
			Self::Combined => &[Tool::VectorSearch, Tool::WebSearch, Tool::StructuredSearch],
		}
	}

	pub fn allows(self, tool: Tool) -> bool {
		self.allowed_tools().contains(&tool)
	}

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Vector => "vector",
			Self::Web => "web",
			Self::Combined => "combined",
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tool {
	VectorSearch,
	WebSearch,
	StructuredSearch,
}
impl Tool {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::VectorSearch => "vector_search",
			Self::WebSearch => "web_search",
			Self::StructuredSearch => "structured_search",
		}
	}

	pub fn purpose(self) -> &'static str {
		match self {
			Self::VectorSearch =>
				"Semantic search over NVIDIA quarterly and annual filings; honors the period filters.",
			Self::WebSearch =>
				"General web and news search for recent events, analyst commentary, and market context.",
			Self::StructuredSearch =>
				"SQL over daily NVDA price history with technical indicators for exact numeric facts.",
		}
	}
}
impl fmt::Display for Tool {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
	User,
	Assistant,
}
impl Role {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::User => "user",
			Self::Assistant => "assistant",
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
	pub role: Role,
	pub content: String,
}

/// Period label (e.g. "2023-Q4") to inclusion flag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeriodFilters(BTreeMap<String, bool>);
impl PeriodFilters {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn include(mut self, label: impl Into<String>) -> Self {
		self.0.insert(label.into(), true);

		self
	}

	/// Labels flagged for inclusion, in sorted order.
	pub fn selected(&self) -> Vec<String> {
		self.0.iter().filter(|(_, included)| **included).map(|(label, _)| label.clone()).collect()
	}

	pub fn labels(&self) -> impl Iterator<Item = &str> {
		self.0.keys().map(String::as_str)
	}

	pub fn is_unrestricted(&self) -> bool {
		!self.0.values().any(|included| *included)
	}
}
impl FromIterator<(String, bool)> for PeriodFilters {
	fn from_iter<I: IntoIterator<Item = (String, bool)>>(iter: I) -> Self {
		Self(iter.into_iter().collect())
	}
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
	pub document_id: Option<String>,
	pub period: Option<String>,
	pub score: Option<f32>,
	pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceRecord {
	pub tool: Tool,
	pub text: String,
	pub provenance: Provenance,
}

/// Everything one retrieval node appended: the hits, or the error that replaced them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceBatch {
	pub tool: Tool,
	pub query: String,
	pub records: Vec<EvidenceRecord>,
	pub error: Option<String>,
	#[serde(with = "crate::time_serde")]
	pub retrieved_at: OffsetDateTime,
}
impl EvidenceBatch {
	pub fn found(tool: Tool, query: impl Into<String>, records: Vec<EvidenceRecord>) -> Self {
		Self {
			tool,
			query: query.into(),
			records,
			error: None,
			retrieved_at: OffsetDateTime::now_utc(),
		}
	}

	pub fn failed(tool: Tool, query: impl Into<String>, error: impl Into<String>) -> Self {
		Self {
			tool,
			query: query.into(),
			records: Vec::new(),
			error: Some(error.into()),
			retrieved_at: OffsetDateTime::now_utc(),
		}
	}

	pub fn is_failed(&self) -> bool {
		self.error.is_some()
	}
}

/// Append-only evidence log.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct EvidenceLog(Vec<EvidenceBatch>);
impl EvidenceLog {
	pub fn push(&mut self, batch: EvidenceBatch) {
		self.0.push(batch);
	}

	pub fn batches(&self) -> &[EvidenceBatch] {
		&self.0
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn records(&self) -> impl Iterator<Item = &EvidenceRecord> {
		self.0.iter().flat_map(|batch| batch.records.iter())
	}
}

/// The record every node reads and the currently running node mutates.
#[derive(Debug, Clone)]
pub struct ResearchState {
	pub input: String,
	pub chat_history: Vec<ChatTurn>,
	pub evidence: EvidenceLog,
	pub filters: PeriodFilters,
	pub mode: Mode,
	pub output: Option<String>,
}
impl ResearchState {
	pub fn new(
		input: impl Into<String>,
		chat_history: Vec<ChatTurn>,
		filters: PeriodFilters,
		mode: Mode,
	) -> Self {
		Self {
			input: input.into(),
			chat_history,
			evidence: EvidenceLog::default(),
			filters,
			mode,
			output: None,
		}
	}
}
