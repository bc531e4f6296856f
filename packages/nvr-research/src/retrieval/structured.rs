use std::sync::{Arc, LazyLock};

use color_eyre::eyre;
use regex::Regex;

use nvr_config::Warehouse;
use nvr_providers::{
	chat::ResponseFormat,
	warehouse::{self, Rows},
};

use crate::{
	BoxFuture,
	model::{ChatModel, ChatRequest, Purpose},
	retrieval::SearchBackend,
	state::{EvidenceRecord, PeriodFilters, Provenance, Tool},
	usage::UsageMeter,
};

static FENCED_SQL: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"(?is)```(?:sql)?\s*(.*?)\s*```").expect("Fenced SQL pattern must compile.")
});
static READ_ONLY_START: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"(?i)^\s*(select|with)\b").expect("Read-only start pattern must compile.")
});
static WRITE_KEYWORDS: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(
		r"(?i)\b(insert|update|delete|merge|drop|alter|create|truncate|grant|revoke|call|copy|put|remove|use)\b",
	)
	.expect("Write keyword pattern must compile.")
});
static LITERALS_AND_COMMENTS: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"(?s)'(?:[^']|'')*'|--[^\n]*|/\*.*?\*/")
		.expect("Literal and comment pattern must compile.")
});
static EXTRACT_FROM: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"(?i)\bextract\s*\(\s*\w+\s+from\b").expect("Extract pattern must compile.")
});
static TABLE_SOURCES: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r#"(?i)\b(?:from|join)\s+([A-Za-z0-9_$."]+)"#)
		.expect("Table source pattern must compile.")
});
static CTE_NAMES: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"(?i)\b([A-Za-z_][A-Za-z0-9_]*)\s+as\s*\(").expect("CTE name pattern must compile.")
});

/// Numeric facts from the price-history warehouse, reached through model-drafted SQL.
pub struct WarehouseSearch {
	chat: Arc<dyn ChatModel>,
	cfg: Warehouse,
}
impl WarehouseSearch {
	pub fn new(chat: Arc<dyn ChatModel>, cfg: Warehouse) -> Self {
		Self { chat, cfg }
	}

	async fn query(
		&self,
		query: &str,
		filters: &PeriodFilters,
		usage: &UsageMeter,
	) -> color_eyre::Result<Vec<EvidenceRecord>> {
		let request = self.sql_request(query, filters);
		let reply = self.chat.generate(&request).await?;

		usage.record(reply.usage);

		let statement = read_only_statement(&reply.text, &self.cfg.table)?;

		tracing::info!(statement = %statement, "Running drafted warehouse query.");

		let rows = warehouse::execute(&self.cfg, &statement).await?;

		Ok(rows_to_records(&rows, &self.cfg.table))
	}

	fn sql_request(&self, query: &str, filters: &PeriodFilters) -> ChatRequest {
		let periods = filters.selected();
		let period_hint = if periods.is_empty() {
			"No period restriction.".to_string()
		} else {
			format!("Restrict to fiscal periods: {}.", periods.join(", "))
		};
		let system = format!(
			"You write one read-only Snowflake SQL SELECT statement against the table {table}.\n\
Columns: {columns}\n\
Return only the SQL, without commentary. Never modify data. Limit results to {max_rows} rows.",
			table = self.cfg.table,
			columns = self.cfg.table_description,
			max_rows = self.cfg.max_rows,
		);

		ChatRequest::new(Purpose::DraftSql, ResponseFormat::Text)
			.message("system", system)
			.message("user", format!("{query}\n{period_hint}"))
	}
}
impl SearchBackend for WarehouseSearch {
	fn search<'a>(
		&'a self,
		query: &'a str,
		filters: &'a PeriodFilters,
		usage: &'a UsageMeter,
	) -> BoxFuture<'a, color_eyre::Result<Vec<EvidenceRecord>>> {
		Box::pin(self.query(query, filters, usage))
	}
}

/// Extracts a single SELECT/WITH statement that reads `table`, or refuses.
fn read_only_statement(reply: &str, table: &str) -> color_eyre::Result<String> {
	let body = FENCED_SQL
		.captures(reply)
		.and_then(|captures| captures.get(1))
		.map(|m| m.as_str())
		.unwrap_or(reply);
	let statement = body.trim().trim_end_matches(';').trim();

	if statement.is_empty() {
		return Err(eyre::eyre!("Model returned an empty SQL statement."));
	}
	if statement.contains(';') {
		return Err(eyre::eyre!("Drafted SQL contains more than one statement."));
	}
	if let Some(found) = WRITE_KEYWORDS.find(statement) {
		return Err(eyre::eyre!("Drafted SQL uses forbidden keyword {}.", found.as_str()));
	}
	if !READ_ONLY_START.is_match(statement) {
		return Err(eyre::eyre!("Drafted SQL is not a SELECT statement."));
	}

	check_table_sources(statement, table)?;

	Ok(statement.to_string())
}

/// Every `FROM`/`JOIN` target must be `table` or a CTE, and `table` must be read at least once.
/// String literals and comments are ignored.
fn check_table_sources(statement: &str, table: &str) -> color_eyre::Result<()> {
	let code = LITERALS_AND_COMMENTS.replace_all(statement, " ");
	let code = EXTRACT_FROM.replace_all(&code, "extract(");
	let ctes: Vec<String> = CTE_NAMES
		.captures_iter(&code)
		.filter_map(|captures| captures.get(1))
		.map(|m| normalize_identifier(m.as_str()))
		.collect();
	let table = normalize_identifier(table);
	let mut reads_table = false;

	for source in TABLE_SOURCES.captures_iter(&code).filter_map(|captures| captures.get(1)) {
		let source = normalize_identifier(source.as_str());

		if names_table(&source, &table) {
			reads_table = true;
		} else if !ctes.contains(&source) {
			return Err(eyre::eyre!("Drafted SQL reads {source}, which is not {table}."));
		}
	}

	if !reads_table {
		return Err(eyre::eyre!("Drafted SQL does not read {table}."));
	}

	Ok(())
}

fn normalize_identifier(raw: &str) -> String {
	raw.trim_end_matches('.').replace('"', "").to_ascii_uppercase()
}

/// `source` may omit the database and schema the session already selects.
fn names_table(source: &str, table: &str) -> bool {
	source == table || table.ends_with(&format!(".{source}"))
}

fn rows_to_records(rows: &Rows, table: &str) -> Vec<EvidenceRecord> {
	rows.rows
		.iter()
		.map(|row| {
			let text = rows
				.columns
				.iter()
				.zip(row)
				.map(|(column, cell)| format!("{column}={}", cell.as_deref().unwrap_or("NULL")))
				.collect::<Vec<_>>()
				.join(", ");

			EvidenceRecord {
				tool: Tool::StructuredSearch,
				text,
				provenance: Provenance {
					document_id: Some(table.to_string()),
					..Default::default()
				},
			}
		})
		.collect()
}
