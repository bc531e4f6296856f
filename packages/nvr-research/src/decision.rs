use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::state::{Mode, Tool};

static FENCED_JSON: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"(?s)```(?:json)?\s*(\{.*?\})\s*```").expect("Fenced JSON pattern must compile.")
});

/// The router's choice for the next node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutingDecision {
	VectorSearch { query: Option<String> },
	WebSearch { query: Option<String> },
	StructuredSearch { query: Option<String> },
	Finish,
}
impl RoutingDecision {
	pub fn search(tool: Tool, query: Option<String>) -> Self {
		match tool {
			Tool::VectorSearch => Self::VectorSearch { query },
			Tool::WebSearch => Self::WebSearch { query },
			Tool::StructuredSearch => Self::StructuredSearch { query },
		}
	}

	pub fn tool(&self) -> Option<Tool> {
		match self {
			Self::VectorSearch { .. } => Some(Tool::VectorSearch),
			Self::WebSearch { .. } => Some(Tool::WebSearch),
			Self::StructuredSearch { .. } => Some(Tool::StructuredSearch),
			Self::Finish => None,
		}
	}

	pub fn query(&self) -> Option<&str> {
		match self {
			Self::VectorSearch { query }
			| Self::WebSearch { query }
			| Self::StructuredSearch { query } => query.as_deref(),
			Self::Finish => None,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouterOutcome {
	Decided(RoutingDecision),
	/// The reply named no known action, or a tool the mode does not allow.
	Unparseable { raw: String },
	/// The model call itself failed.
	Failed { message: String },
}

/// Parses a router reply into a decision restricted to `mode`'s tools.
pub fn parse_routing_reply(raw: &str, mode: Mode) -> RouterOutcome {
	let unparseable = || RouterOutcome::Unparseable { raw: raw.to_string() };
	let (action, query) = match extract_object(raw) {
		Some(object) => {
			let action = object
				.get("action")
				.and_then(Value::as_str)
				.or_else(|| object.get("tool").and_then(Value::as_str))
				.map(str::to_string);
			let query = object
				.get("query")
				.and_then(|v| v.as_str())
				.map(str::trim)
				.filter(|q| !q.is_empty())
				.map(str::to_string);

			(action, query)
		},
		None => (Some(raw.trim().trim_matches(['"', '`', '.']).to_string()), None),
	};
	let Some(action) = action else {
		return unparseable();
	};

	match parse_action(&action) {
		Some(Action::Finish) => RouterOutcome::Decided(RoutingDecision::Finish),
		Some(Action::Search(tool)) if mode.allows(tool) =>
			RouterOutcome::Decided(RoutingDecision::search(tool, query)),
		_ => unparseable(),
	}
}

enum Action {
	Search(Tool),
	Finish,
}

fn parse_action(raw: &str) -> Option<Action> {
	let normalized = raw.trim().to_ascii_lowercase().replace(['-', ' '], "_");

	match normalized.as_str() {
		"vector_search" | "rag_search" | "vector" => Some(Action::Search(Tool::VectorSearch)),
		"web_search" | "web" => Some(Action::Search(Tool::WebSearch)),
		"structured_search" | "snowflake_search" | "structured" =>
			Some(Action::Search(Tool::StructuredSearch)),
		"finish" | "final_answer" => Some(Action::Finish),
		_ => None,
	}
}

fn extract_object(raw: &str) -> Option<serde_json::Map<String, Value>> {
	let candidate = match FENCED_JSON.captures(raw) {
		Some(captures) => captures.get(1).map(|m| m.as_str())?,
		None => {
			let start = raw.find('{')?;
			let end = raw.rfind('}')?;

			raw.get(start..=end)?
		},
	};

	match serde_json::from_str(candidate).ok()? {
		Value::Object(object) => Some(object),
		_ => None,
	}
}
