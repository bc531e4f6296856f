use color_eyre::{Result, eyre};
use serde_json::Value;

use nvr_config::Warehouse;

/// Result set of one warehouse statement, cells rendered as text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Rows {
	pub columns: Vec<String>,
	pub rows: Vec<Vec<Option<String>>>,
}

pub async fn execute(cfg: &Warehouse, statement: &str) -> Result<Rows> {
	let client = crate::client(cfg.timeout_ms)?;
	let url = crate::endpoint(&cfg.api_base, &cfg.path);
	let mut body = serde_json::json!({
		"statement": statement,
		"timeout": cfg.timeout_ms.div_ceil(1_000),
		"database": cfg.database,
		"schema": cfg.schema,
		"warehouse": cfg.warehouse,
	});

	if let Some(role) = cfg.role.as_deref() {
		body["role"] = Value::String(role.to_string());
	}

	tracing::debug!(table = %cfg.table, "Executing warehouse statement.");

	let res = client
		.post(url)
		.headers(crate::auth_headers(&cfg.token, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;
	let mut rows = parse_statement_response(&json)?;

	rows.rows.truncate(cfg.max_rows as usize);

	Ok(rows)
}

fn parse_statement_response(json: &Value) -> Result<Rows> {
	let columns = json
		.get("resultSetMetaData")
		.and_then(|meta| meta.get("rowType"))
		.and_then(|v| v.as_array())
		.ok_or_else(|| eyre::eyre!("Warehouse response is missing resultSetMetaData.rowType."))?
		.iter()
		.map(|column| {
			column
				.get("name")
				.and_then(|v| v.as_str())
				.map(str::to_string)
				.ok_or_else(|| eyre::eyre!("Warehouse column is missing a name."))
		})
		.collect::<Result<Vec<_>>>()?;
	let data = json.get("data").and_then(|v| v.as_array()).map(Vec::as_slice).unwrap_or(&[]);
	let mut rows = Vec::with_capacity(data.len());

	for raw in data {
		let cells = raw.as_array().ok_or_else(|| eyre::eyre!("Warehouse row is not an array."))?;

		if cells.len() != columns.len() {
			return Err(eyre::eyre!(
				"Warehouse row has {} cells; expected {}.",
				cells.len(),
				columns.len()
			));
		}

		rows.push(cells.iter().map(cell_text).collect());
	}

	Ok(Rows { columns, rows })
}

fn cell_text(cell: &Value) -> Option<String> {
	match cell {
		Value::Null => None,
		Value::String(text) => Some(text.clone()),
		other => Some(other.to_string()),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_columns_and_rows() {
		let json = serde_json::json!({
			"resultSetMetaData": { "rowType": [ { "name": "DATE" }, { "name": "CLOSE" } ] },
			"data": [ ["2024-05-22", "1037.99"], ["2024-05-23", null] ]
		});
		let rows = parse_statement_response(&json).expect("parse failed");
		assert_eq!(rows.columns, vec!["DATE", "CLOSE"]);
		assert_eq!(rows.rows[0], vec![Some("2024-05-22".to_string()), Some("1037.99".to_string())]);
		assert_eq!(rows.rows[1][1], None);
	}

	#[test]
	fn missing_data_is_an_empty_result() {
		let json = serde_json::json!({ "resultSetMetaData": { "rowType": [ { "name": "N" } ] } });
		let rows = parse_statement_response(&json).expect("parse failed");
		assert!(rows.rows.is_empty());
	}

	#[test]
	fn rejects_ragged_rows() {
		let json = serde_json::json!({
			"resultSetMetaData": { "rowType": [ { "name": "A" }, { "name": "B" } ] },
			"data": [ ["only-one"] ]
		});
		assert!(parse_statement_response(&json).is_err());
	}
}
