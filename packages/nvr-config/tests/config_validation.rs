use std::{
	env, fs,
	path::PathBuf,
	sync::atomic::{AtomicU64, Ordering},
	time::{SystemTime, UNIX_EPOCH},
};

use toml::Value;

use nvr_config::Error;

const SAMPLE_CONFIG_TEMPLATE_TOML: &str = include_str!("fixtures/sample_config.template.toml");

fn sample_with(section: &str, key: &str, value: Value) -> String {
	let mut root: Value =
		toml::from_str(SAMPLE_CONFIG_TEMPLATE_TOML).expect("Failed to parse template config.");
	let mut table = root.as_table_mut().expect("Template config must be a table.");

	for part in section.split('.') {
		table = table
			.get_mut(part)
			.and_then(Value::as_table_mut)
			.unwrap_or_else(|| panic!("Template config must include [{section}]."));
	}

	table.insert(key.to_string(), value);

	toml::to_string(&root).expect("Failed to render template config.")
}

fn write_temp_config(payload: String) -> PathBuf {
	static COUNTER: AtomicU64 = AtomicU64::new(0);

	let nanos = SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.expect("System time must be valid.")
		.as_nanos();
	let ordinal = COUNTER.fetch_add(1, Ordering::SeqCst);
	let pid = std::process::id();
	let mut path = env::temp_dir();

	path.push(format!("nvr_config_test_{nanos}_{pid}_{ordinal}.toml"));

	fs::write(&path, payload).expect("Failed to write test config.");

	path
}

fn load_payload(payload: String) -> nvr_config::Result<nvr_config::Config> {
	let path = write_temp_config(payload);
	let result = nvr_config::load(&path);

	fs::remove_file(&path).expect("Failed to remove test config.");

	result
}

fn expect_validation(payload: String, needle: &str) {
	let err = load_payload(payload).expect_err("Expected validation error.");
	let message = err.to_string();

	assert!(message.contains(needle), "Unexpected error message: {message}");
}

#[test]
fn sample_config_loads_and_normalizes() {
	let cfg = load_payload(SAMPLE_CONFIG_TEMPLATE_TOML.to_string())
		.expect("Sample config should load.");

	assert_eq!(cfg.providers.llm.api_base, "https://api.openai.com/v1");
	assert!(cfg.storage.qdrant.api_key.is_none());
	assert!(cfg.warehouse.role.is_none());
	assert_eq!(cfg.warehouse.path, "/api/v2/statements");
	assert_eq!(cfg.research.periods, vec!["2022-Q4", "2023-Q1", "2023-Q2"]);
	assert_eq!(cfg.providers.web_search.topic, "finance");
}

#[test]
fn research_defaults_apply_when_omitted() {
	let mut root: Value = toml::from_str(SAMPLE_CONFIG_TEMPLATE_TOML).expect("Template parses.");
	let research = root
		.get_mut("research")
		.and_then(Value::as_table_mut)
		.expect("Template config must include [research].");

	research.remove("max_steps");
	research.remove("deadline_ms");

	let cfg = load_payload(toml::to_string(&root).expect("Render config."))
		.expect("Config without optional research keys should load.");

	assert_eq!(cfg.research.max_steps, 6);
	assert_eq!(cfg.research.deadline_ms, 120_000);
}

#[test]
fn max_steps_must_be_positive() {
	expect_validation(
		sample_with("research", "max_steps", Value::Integer(0)),
		"research.max_steps must be greater than zero.",
	);
}

#[test]
fn embedding_dimensions_must_match_collection() {
	expect_validation(
		sample_with("storage.qdrant", "vector_dim", Value::Integer(768)),
		"providers.embedding.dimensions must match storage.qdrant.vector_dim.",
	);
}

#[test]
fn provider_keys_must_be_non_empty() {
	expect_validation(
		sample_with("providers.web_search", "api_key", Value::String("  ".to_string())),
		"Provider web_search api_key must be non-empty.",
	);
}

#[test]
fn warehouse_table_must_be_an_identifier() {
	expect_validation(
		sample_with("warehouse", "table", Value::String("NVDA; DROP TABLE x".to_string())),
		"warehouse.table must be a dotted identifier",
	);
}

#[test]
fn periods_must_be_well_formed() {
	let payload = sample_with(
		"research",
		"periods",
		Value::Array(vec![Value::String("2023-Q5".to_string())]),
	);
	let err = load_payload(payload).expect_err("Expected period validation error.");

	assert!(matches!(err, Error::InvalidPeriod { ref label } if label == "2023-Q5"));
}

#[test]
fn periods_must_be_unique() {
	expect_validation(
		sample_with(
			"research",
			"periods",
			Value::Array(vec![
				Value::String("2023-Q1".to_string()),
				Value::String("2023-Q1".to_string()),
			]),
		),
		"research.periods contains duplicate label 2023-Q1.",
	);
}

#[test]
fn period_label_shapes() {
	assert!(nvr_config::validate_period_label("2024-Q3").is_ok());

	for label in ["2024", "24-Q1", "2024-Q0", "2024-q1", "2024-Q12", "abcd-Q1"] {
		assert!(nvr_config::validate_period_label(label).is_err(), "{label} should be rejected");
	}
}
