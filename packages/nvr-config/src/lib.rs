mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Config, EmbeddingProviderConfig, LlmProviderConfig, Providers, Qdrant, Research, Security,
	Service, Storage, Warehouse, WebSearchProviderConfig,
};

use std::{collections::HashSet, fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.http_bind.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.http_bind must be non-empty.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions != cfg.storage.qdrant.vector_dim {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must match storage.qdrant.vector_dim."
				.to_string(),
		});
	}
	if !cfg.providers.llm.temperature.is_finite() {
		return Err(Error::Validation {
			message: "providers.llm.temperature must be a finite number.".to_string(),
		});
	}
	if !(0.0..=2.0).contains(&cfg.providers.llm.temperature) {
		return Err(Error::Validation {
			message: "providers.llm.temperature must be in the range 0.0-2.0.".to_string(),
		});
	}

	for (label, key) in [
		("llm", &cfg.providers.llm.api_key),
		("embedding", &cfg.providers.embedding.api_key),
		("web_search", &cfg.providers.web_search.api_key),
	] {
		if key.trim().is_empty() {
			return Err(Error::Validation {
				message: format!("Provider {label} api_key must be non-empty."),
			});
		}
	}
	for (label, timeout_ms) in [
		("providers.llm.timeout_ms", cfg.providers.llm.timeout_ms),
		("providers.embedding.timeout_ms", cfg.providers.embedding.timeout_ms),
		("providers.web_search.timeout_ms", cfg.providers.web_search.timeout_ms),
		("warehouse.timeout_ms", cfg.warehouse.timeout_ms),
	] {
		if timeout_ms == 0 {
			return Err(Error::Validation {
				message: format!("{label} must be greater than zero."),
			});
		}
	}

	if cfg.storage.qdrant.collection.trim().is_empty() {
		return Err(Error::Validation {
			message: "storage.qdrant.collection must be non-empty.".to_string(),
		});
	}
	if cfg.warehouse.token.trim().is_empty() {
		return Err(Error::Validation {
			message: "warehouse.token must be non-empty.".to_string(),
		});
	}
	if !is_qualified_identifier(&cfg.warehouse.table) {
		return Err(Error::Validation {
			message: "warehouse.table must be a dotted identifier such as DB.SCHEMA.TABLE."
				.to_string(),
		});
	}
	if cfg.warehouse.max_rows == 0 {
		return Err(Error::Validation {
			message: "warehouse.max_rows must be greater than zero.".to_string(),
		});
	}

	validate_research(&cfg.research)?;

	Ok(())
}

/// Checks that `label` has the form `YYYY-Qn` with `n` in 1..=4.
pub fn validate_period_label(label: &str) -> Result<()> {
	let invalid = || Error::InvalidPeriod { label: label.to_string() };
	let (year, quarter) = label.split_once("-Q").ok_or_else(invalid)?;

	if year.len() != 4 || !year.chars().all(|c| c.is_ascii_digit()) {
		return Err(invalid());
	}
	if !matches!(quarter, "1" | "2" | "3" | "4") {
		return Err(invalid());
	}

	Ok(())
}

fn validate_research(research: &Research) -> Result<()> {
	if research.max_steps == 0 {
		return Err(Error::Validation {
			message: "research.max_steps must be greater than zero.".to_string(),
		});
	}
	if research.deadline_ms == 0 {
		return Err(Error::Validation {
			message: "research.deadline_ms must be greater than zero.".to_string(),
		});
	}
	if research.finalize_grace_ms == 0 {
		return Err(Error::Validation {
			message: "research.finalize_grace_ms must be greater than zero.".to_string(),
		});
	}
	if research.vector_top_k == 0 {
		return Err(Error::Validation {
			message: "research.vector_top_k must be greater than zero.".to_string(),
		});
	}
	if research.web_max_results == 0 {
		return Err(Error::Validation {
			message: "research.web_max_results must be greater than zero.".to_string(),
		});
	}
	if research.max_evidence_chars == 0 {
		return Err(Error::Validation {
			message: "research.max_evidence_chars must be greater than zero.".to_string(),
		});
	}

	let mut seen = HashSet::new();

	for label in &research.periods {
		validate_period_label(label)?;

		if !seen.insert(label.as_str()) {
			return Err(Error::Validation {
				message: format!("research.periods contains duplicate label {label}."),
			});
		}
	}

	Ok(())
}

fn is_qualified_identifier(raw: &str) -> bool {
	!raw.is_empty()
		&& raw.split('.').all(|part| {
			!part.is_empty() && part.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
		})
}

fn normalize(cfg: &mut Config) {
	if cfg.storage.qdrant.api_key.as_deref().map(|key| key.trim().is_empty()).unwrap_or(false) {
		cfg.storage.qdrant.api_key = None;
	}
	if cfg.warehouse.role.as_deref().map(|role| role.trim().is_empty()).unwrap_or(false) {
		cfg.warehouse.role = None;
	}

	for base in [
		&mut cfg.providers.llm.api_base,
		&mut cfg.providers.embedding.api_base,
		&mut cfg.providers.web_search.api_base,
		&mut cfg.warehouse.api_base,
	] {
		let trimmed = base.trim_end_matches('/').len();

		base.truncate(trimmed);
	}

	cfg.research.periods.sort();
}
