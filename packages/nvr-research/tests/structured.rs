use std::{sync::Arc, time::Duration};

use serde_json::Map;

use nvr_config::Warehouse;
use nvr_research::{
	ChatModel, PeriodFilters, Purpose, Tool, UsageMeter,
	deadline::Deadline,
	retrieval::{self, WarehouseSearch},
};
use nvr_testkit::ScriptedChat;

const TABLE: &str = "NVIDIA_DB.MARKET.NVDA_DAILY";

// Nothing listens on port 1, so any HTTP attempt would surface as a connection error.
fn warehouse() -> Warehouse {
	Warehouse {
		api_base: "http://127.0.0.1:1".to_string(),
		path: "/api/v2/statements".to_string(),
		token: "test-token".to_string(),
		database: "NVIDIA_DB".to_string(),
		schema: "MARKET".to_string(),
		warehouse: "COMPUTE_WH".to_string(),
		role: None,
		table: TABLE.to_string(),
		table_description: "DATE, OPEN, HIGH, LOW, CLOSE, VOLUME, RSI".to_string(),
		timeout_ms: 1_000,
		max_rows: 50,
		default_headers: Map::new(),
	}
}

#[tokio::test]
async fn drafted_write_is_refused_before_any_request() {
	let chat = Arc::new(
		ScriptedChat::new("unused").sql(format!("DELETE FROM {TABLE}")).usage_per_call(420, 12),
	);
	let model: Arc<dyn ChatModel> = chat.clone();
	let backend = WarehouseSearch::new(model, warehouse());
	let filters = PeriodFilters::new().include("2024-Q1");
	let usage = UsageMeter::new();
	let deadline = Deadline::after(Duration::from_secs(5));
	let batch = retrieval::run_node(
		&backend,
		Tool::StructuredSearch,
		"closing price trend",
		&filters,
		&usage,
		&deadline,
	)
	.await;
	let error = batch.error.clone().unwrap_or_default();

	assert!(batch.is_failed());
	assert!(batch.records.is_empty());
	assert!(error.contains("forbidden keyword"), "unexpected error: {error}");
	assert!(!error.to_lowercase().contains("connect"), "a request was attempted: {error}");

	let drafts = chat.requests(Purpose::DraftSql);

	assert_eq!(drafts.len(), 1);

	let user = drafts[0].messages.last().and_then(|m| m["content"].as_str()).unwrap_or_default();

	assert!(user.starts_with("closing price trend"));
	assert!(user.contains("Restrict to fiscal periods: 2024-Q1."));
	assert_eq!(usage.total().input_tokens, 420);
	assert_eq!(usage.total().model_calls, 1);
}

#[tokio::test]
async fn drafted_query_on_another_table_is_refused() {
	let chat = Arc::new(
		ScriptedChat::new("unused").sql(format!("SELECT '{TABLE}' AS SOURCE FROM OTHER_DB.PUBLIC.T")),
	);
	let model: Arc<dyn ChatModel> = chat.clone();
	let backend = WarehouseSearch::new(model, warehouse());
	let batch = retrieval::run_node(
		&backend,
		Tool::StructuredSearch,
		"latest close",
		&PeriodFilters::new(),
		&UsageMeter::new(),
		&Deadline::after(Duration::from_secs(5)),
	)
	.await;

	assert!(batch.error.unwrap_or_default().contains("OTHER_DB.PUBLIC.T"));
	assert_eq!(chat.calls(Purpose::DraftSql), 1);

	let drafts = chat.requests(Purpose::DraftSql);
	let draft = &drafts[0];
	let system = draft.messages[0]["content"].as_str().unwrap_or_default();
	let user = draft.messages[1]["content"].as_str().unwrap_or_default();

	assert!(system.contains(TABLE));
	assert!(user.ends_with("No period restriction."));
}
