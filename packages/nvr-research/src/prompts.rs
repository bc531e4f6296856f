use std::fmt::Write as _;

use nvr_providers::chat::ResponseFormat;

use crate::{
	model::{ChatRequest, Purpose},
	state::{EvidenceRecord, ResearchState},
};

const ROUTER_SYSTEM: &str = "\
You are the research router for an assistant that answers questions about NVIDIA's business, \
financial filings, and stock performance. Decide which single tool to call next, or finish when \
the gathered evidence is enough to answer. Avoid repeating a call that already returned nothing \
useful; prefer a different tool instead.";

const FINALIZER_SYSTEM: &str = "\
You are a financial research analyst writing the final answer to a user's question about NVIDIA. \
Use only the numbered evidence provided. Cite evidence inline as [n]. State figures with their \
period. If the evidence is missing or insufficient, say so plainly instead of guessing.";

const PREVIEW_CHARS: usize = 200;
const PREVIEW_RECORDS: usize = 3;

pub fn router_request(state: &ResearchState) -> ChatRequest {
	let mut system = String::from(ROUTER_SYSTEM);

	system.push_str("\n\nAvailable tools:\n");

	for tool in state.mode.allowed_tools() {
		let _ = writeln!(system, "- {}: {}", tool.as_str(), tool.purpose());
	}

	system.push_str(
		"- finish: Stop searching and write the final answer.\n\n\
Reply with a JSON object only: {\"action\": \"<tool or finish>\", \"query\": \"<search text>\"}.",
	);

	let mut user = format!("Question: {}\n", state.input);
	let periods = state.filters.selected();

	if periods.is_empty() {
		user.push_str("Period filter: none\n");
	} else {
		let _ = writeln!(user, "Period filter: {}", periods.join(", "));
	}

	user.push_str("\nEvidence gathered so far:\n");

	if state.evidence.is_empty() {
		user.push_str("(none)\n");
	}

	for (index, batch) in state.evidence.batches().iter().enumerate() {
		match batch.error.as_deref() {
			Some(error) => {
				let _ = writeln!(
					user,
					"{}. {}(\"{}\") failed: {error}",
					index + 1,
					batch.tool,
					batch.query
				);
			},
			None => {
				let _ = writeln!(
					user,
					"{}. {}(\"{}\") returned {} result(s)",
					index + 1,
					batch.tool,
					batch.query,
					batch.records.len()
				);

				for record in batch.records.iter().take(PREVIEW_RECORDS) {
					let _ = writeln!(user, "   - {}", truncate_chars(&record.text, PREVIEW_CHARS));
				}
			},
		}
	}

	with_history(ChatRequest::new(Purpose::Route, ResponseFormat::JsonObject), state, system)
		.message("user", user)
}

pub fn finalizer_request(state: &ResearchState, max_evidence_chars: usize) -> ChatRequest {
	let mut user = format!("Question: {}\n\nEvidence:\n", state.input);
	let mut numbered = 0;

	for record in state.evidence.records() {
		numbered += 1;

		let _ = writeln!(
			user,
			"[{numbered}] ({}{}) {}",
			record.tool,
			provenance_suffix(record),
			truncate_chars(&record.text, max_evidence_chars)
		);
	}

	if numbered == 0 {
		user.push_str("(no evidence was retrieved)\n");
	}

	let failures: Vec<_> = state
		.evidence
		.batches()
		.iter()
		.filter_map(|batch| batch.error.as_deref().map(|error| (batch.tool, error)))
		.collect();

	if !failures.is_empty() {
		user.push_str("\nTools that failed:\n");

		for (tool, error) in failures {
			let _ = writeln!(user, "- {tool}: {error}");
		}
	}

	with_history(
		ChatRequest::new(Purpose::Finalize, ResponseFormat::Text),
		state,
		FINALIZER_SYSTEM.to_string(),
	)
	.message("user", user)
}

pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> String {
	let text = text.trim();

	match text.char_indices().nth(max_chars) {
		Some((cut, _)) => format!("{}…", &text[..cut]),
		None => text.to_string(),
	}
}

fn with_history(request: ChatRequest, state: &ResearchState, system: String) -> ChatRequest {
	state
		.chat_history
		.iter()
		.fold(request.message("system", system), |request, turn| {
			request.message(turn.role.as_str(), turn.content.clone())
		})
}

fn provenance_suffix(record: &EvidenceRecord) -> String {
	let p = &record.provenance;
	let mut parts = Vec::new();

	if let Some(document_id) = p.document_id.as_deref() {
		parts.push(document_id.to_string());
	}
	if let Some(period) = p.period.as_deref() {
		parts.push(period.to_string());
	}
	if let Some(url) = p.url.as_deref() {
		parts.push(url.to_string());
	}
	if let Some(score) = p.score {
		parts.push(format!("score={score:.2}"));
	}

	if parts.is_empty() { String::new() } else { format!(": {}", parts.join(", ")) }
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::state::{
		ChatTurn, EvidenceBatch, Mode, PeriodFilters, Provenance, Role, Tool,
	};

	fn state_with_evidence() -> ResearchState {
		let mut state = ResearchState::new(
			"What drove data center revenue?",
			vec![ChatTurn { role: Role::User, content: "Earlier question".to_string() }],
			PeriodFilters::new().include("2024-Q1"),
			Mode::Web,
		);

		state.evidence.push(EvidenceBatch::found(
			Tool::WebSearch,
			"data center revenue drivers",
			vec![EvidenceRecord {
				tool: Tool::WebSearch,
				text: "Hopper demand from cloud providers.".to_string(),
				provenance: Provenance {
					url: Some("https://news.example/a".to_string()),
					score: Some(0.8712),
					..Default::default()
				},
			}],
		));
		state.evidence.push(EvidenceBatch::failed(Tool::WebSearch, "retry", "HTTP 429"));

		state
	}

	#[test]
	fn router_prompt_lists_only_allowed_tools() {
		let request = router_request(&state_with_evidence());
		let system = request.messages[0]["content"].as_str().expect("system content");
		assert!(system.contains("- web_search:"));
		assert!(!system.contains("- vector_search:"));
		assert!(system.contains("- finish:"));
		assert_eq!(request.messages[1]["role"], "user");
		assert_eq!(request.messages[1]["content"], "Earlier question");
	}

	#[test]
	fn router_prompt_digests_evidence() {
		let request = router_request(&state_with_evidence());
		let user = request.messages.last().and_then(|m| m["content"].as_str()).expect("user");
		assert!(user.contains("Period filter: 2024-Q1"));
		assert!(user.contains("1. web_search(\"data center revenue drivers\") returned 1 result(s)"));
		assert!(user.contains("2. web_search(\"retry\") failed: HTTP 429"));
	}

	#[test]
	fn finalizer_prompt_numbers_evidence() {
		let request = finalizer_request(&state_with_evidence(), 10);
		let user = request.messages.last().and_then(|m| m["content"].as_str()).expect("user");
		assert!(user.contains("[1] (web_search: https://news.example/a, score=0.87) Hopper dem…"));
		assert!(user.contains("- web_search: HTTP 429"));
		assert_eq!(request.purpose, Purpose::Finalize);
	}

	#[test]
	fn truncation_respects_char_boundaries() {
		assert_eq!(truncate_chars("résumé", 3), "rés…");
		assert_eq!(truncate_chars("  short ", 10), "short");
	}
}
