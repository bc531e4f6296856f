use std::collections::HashMap;

use qdrant_client::{
	Qdrant,
	qdrant::{
		Condition, Filter, Query, QueryPointsBuilder, ScoredPoint, Value, point_id::PointIdOptions,
		value::Kind,
	},
};

use nvr_config::EmbeddingProviderConfig;
use nvr_providers::embedding;

use crate::{
	BoxFuture, Result,
	retrieval::SearchBackend,
	state::{EvidenceRecord, PeriodFilters, Provenance, Tool},
	usage::UsageMeter,
};

pub const PAYLOAD_TEXT: &str = "text";
pub const PAYLOAD_DOCUMENT_ID: &str = "document_id";
pub const PAYLOAD_PERIOD: &str = "period";

/// Filing chunks embedded in a Qdrant collection.
pub struct QdrantVectorSearch {
	client: Qdrant,
	collection: String,
	embedding: EmbeddingProviderConfig,
	top_k: u32,
}
impl QdrantVectorSearch {
	pub fn new(
		cfg: &nvr_config::Qdrant,
		embedding: EmbeddingProviderConfig,
		top_k: u32,
	) -> Result<Self> {
		let mut builder = Qdrant::from_url(&cfg.url);

		if let Some(key) = cfg.api_key.as_deref() {
			builder = builder.api_key(key);
		}

		Ok(Self { client: builder.build()?, collection: cfg.collection.clone(), embedding, top_k })
	}

	async fn query(
		&self,
		query: &str,
		filters: &PeriodFilters,
	) -> color_eyre::Result<Vec<EvidenceRecord>> {
		let vector = embedding::embed_query(&self.embedding, query).await?;
		let mut request = QueryPointsBuilder::new(self.collection.clone())
			.query(Query::new_nearest(vector))
			.limit(self.top_k as u64)
			.with_payload(true);

		if let Some(filter) = period_filter(filters) {
			request = request.filter(filter);
		}

		let response = self.client.query(request).await?;

		Ok(response.result.into_iter().filter_map(point_to_record).collect())
	}
}
impl SearchBackend for QdrantVectorSearch {
	fn search<'a>(
		&'a self,
		query: &'a str,
		filters: &'a PeriodFilters,
		_usage: &'a UsageMeter,
	) -> BoxFuture<'a, color_eyre::Result<Vec<EvidenceRecord>>> {
		Box::pin(self.query(query, filters))
	}
}

fn period_filter(filters: &PeriodFilters) -> Option<Filter> {
	let periods = filters.selected();

	if periods.is_empty() {
		return None;
	}

	Some(Filter::must([Condition::matches(PAYLOAD_PERIOD, periods)]))
}

fn point_to_record(point: ScoredPoint) -> Option<EvidenceRecord> {
	let text = payload_str(&point.payload, PAYLOAD_TEXT)?;

	if text.trim().is_empty() {
		return None;
	}

	let document_id = payload_str(&point.payload, PAYLOAD_DOCUMENT_ID)
		.or_else(|| point.id.as_ref().and_then(|id| id.point_id_options.as_ref()).map(point_id_text));

	Some(EvidenceRecord {
		tool: Tool::VectorSearch,
		text,
		provenance: Provenance {
			document_id,
			period: payload_str(&point.payload, PAYLOAD_PERIOD),
			score: Some(point.score),
			url: None,
		},
	})
}

fn point_id_text(id: &PointIdOptions) -> String {
	match id {
		PointIdOptions::Uuid(uuid) => uuid.clone(),
		PointIdOptions::Num(num) => num.to_string(),
	}
}

fn payload_str(payload: &HashMap<String, Value>, key: &str) -> Option<String> {
	match &payload.get(key)?.kind {
		Some(Kind::StringValue(text)) => Some(text.clone()),
		_ => None,
	}
}

#[cfg(test)]
mod tests {
	use qdrant_client::qdrant::PointId;

	use super::*;

	fn string_value(text: &str) -> Value {
		Value { kind: Some(Kind::StringValue(text.to_string())) }
	}

	fn scored_point(payload: HashMap<String, Value>) -> ScoredPoint {
		ScoredPoint {
			id: Some(PointId { point_id_options: Some(PointIdOptions::Num(42)) }),
			payload,
			score: 0.83,
			..Default::default()
		}
	}

	#[test]
	fn unrestricted_filters_build_no_filter() {
		assert!(period_filter(&PeriodFilters::new()).is_none());
		assert!(period_filter(&PeriodFilters::new().include("2024-Q1")).is_some());
	}

	#[test]
	fn maps_payload_into_provenance() {
		let payload = HashMap::from([
			(PAYLOAD_TEXT.to_string(), string_value("Revenue was $26.0 billion.")),
			(PAYLOAD_DOCUMENT_ID.to_string(), string_value("10-Q-2025-Q1")),
			(PAYLOAD_PERIOD.to_string(), string_value("2024-Q1")),
		]);
		let record = point_to_record(scored_point(payload)).expect("record expected");
		assert_eq!(record.tool, Tool::VectorSearch);
		assert_eq!(record.provenance.document_id.as_deref(), Some("10-Q-2025-Q1"));
		assert_eq!(record.provenance.period.as_deref(), Some("2024-Q1"));
		assert_eq!(record.provenance.score, Some(0.83));
	}

	#[test]
	fn falls_back_to_point_id_and_skips_textless_points() {
		let payload =
			HashMap::from([(PAYLOAD_TEXT.to_string(), string_value("Gaming revenue fell."))]);
		let record = point_to_record(scored_point(payload)).expect("record expected");
		assert_eq!(record.provenance.document_id.as_deref(), Some("42"));
		assert!(point_to_record(scored_point(HashMap::new())).is_none());
	}
}
