use nvr_config::WebSearchProviderConfig;
use nvr_providers::web::{self, WebHit};

use crate::{
	BoxFuture,
	retrieval::SearchBackend,
	state::{EvidenceRecord, PeriodFilters, Provenance, Tool},
	usage::UsageMeter,
};

pub struct WebSearch {
	cfg: WebSearchProviderConfig,
	max_results: u32,
}
impl WebSearch {
	pub fn new(cfg: WebSearchProviderConfig, max_results: u32) -> Self {
		Self { cfg, max_results }
	}

	async fn query(
		&self,
		query: &str,
		filters: &PeriodFilters,
	) -> color_eyre::Result<Vec<EvidenceRecord>> {
		let hits = web::search(&self.cfg, &scoped_query(query, filters), self.max_results).await?;

		Ok(hits.into_iter().map(hit_to_record).collect())
	}
}
impl SearchBackend for WebSearch {
	fn search<'a>(
		&'a self,
		query: &'a str,
		filters: &'a PeriodFilters,
		_usage: &'a UsageMeter,
	) -> BoxFuture<'a, color_eyre::Result<Vec<EvidenceRecord>>> {
		Box::pin(self.query(query, filters))
	}
}

/// Web search has no period metadata, so selected periods become part of the query text.
fn scoped_query(query: &str, filters: &PeriodFilters) -> String {
	let periods = filters.selected();

	if periods.is_empty() {
		return query.to_string();
	}

	let readable: Vec<_> = periods.iter().map(|label| label.replace('-', " ")).collect();

	format!("{query} ({})", readable.join(", "))
}

fn hit_to_record(hit: WebHit) -> EvidenceRecord {
	let mut text = if hit.title.trim().is_empty() {
		hit.content
	} else {
		format!("{}: {}", hit.title.trim(), hit.content)
	};

	if let Some(date) = hit.published_date.as_deref() {
		text.push_str(&format!(" (published {date})"));
	}

	EvidenceRecord {
		tool: Tool::WebSearch,
		text,
		provenance: Provenance {
			document_id: None,
			period: None,
			score: hit.score,
			url: Some(hit.url),
		},
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn appends_selected_periods_to_query() {
		let filters = PeriodFilters::new().include("2023-Q4").include("2024-Q1");
		assert_eq!(
			scoped_query("NVIDIA guidance", &filters),
			"NVIDIA guidance (2023 Q4, 2024 Q1)"
		);
		assert_eq!(scoped_query("NVIDIA guidance", &PeriodFilters::new()), "NVIDIA guidance");
	}

	#[test]
	fn titles_prefix_hit_text() {
		let record = hit_to_record(WebHit {
			title: "Earnings recap".to_string(),
			url: "https://news.example/recap".to_string(),
			content: "Revenue tripled.".to_string(),
			score: Some(0.7),
			published_date: Some("2024-05-22".to_string()),
		});
		assert_eq!(record.text, "Earnings recap: Revenue tripled. (published 2024-05-22)");
		assert_eq!(record.provenance.url.as_deref(), Some("https://news.example/recap"));
	}
}
