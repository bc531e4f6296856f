use color_eyre::{Result, eyre};
use serde::Deserialize;

use nvr_config::EmbeddingProviderConfig;

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
	data: Vec<EmbeddingItem>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingItem {
	index: Option<usize>,
	embedding: Vec<f32>,
}

pub async fn embed(cfg: &EmbeddingProviderConfig, texts: &[String]) -> Result<Vec<Vec<f32>>> {
	let client = crate::client(cfg.timeout_ms)?;
	let url = crate::endpoint(&cfg.api_base, &cfg.path);
	let body = serde_json::json!({
		"model": cfg.model,
		"input": texts,
		"dimensions": cfg.dimensions,
	});
	let res = client
		.post(url)
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let parsed: EmbeddingResponse = res.error_for_status()?.json().await?;

	Ok(order_embeddings(parsed))
}

/// Embeds a single query and checks its width against the configured dimensions.
pub async fn embed_query(cfg: &EmbeddingProviderConfig, text: &str) -> Result<Vec<f32>> {
	let Some(vector) = embed(cfg, &[text.to_string()]).await?.into_iter().next() else {
		return Err(eyre::eyre!("Embedding provider returned no vectors."));
	};

	if vector.len() != cfg.dimensions as usize {
		return Err(eyre::eyre!(
			"Embedding vector has {} dimensions; expected {}.",
			vector.len(),
			cfg.dimensions
		));
	}

	Ok(vector)
}

fn order_embeddings(response: EmbeddingResponse) -> Vec<Vec<f32>> {
	let mut indexed: Vec<(usize, Vec<f32>)> = response
		.data
		.into_iter()
		.enumerate()
		.map(|(fallback, item)| (item.index.unwrap_or(fallback), item.embedding))
		.collect();

	indexed.sort_by_key(|(index, _)| *index);

	indexed.into_iter().map(|(_, vec)| vec).collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn orders_embeddings_by_index() {
		let response: EmbeddingResponse = serde_json::from_value(serde_json::json!({
			"data": [
				{ "index": 1, "embedding": [2.0, 3.0] },
				{ "index": 0, "embedding": [0.5, 1.5] }
			]
		}))
		.expect("decode failed");
		let ordered = order_embeddings(response);
		assert_eq!(ordered, vec![vec![0.5, 1.5], vec![2.0, 3.0]]);
	}

	#[test]
	fn missing_index_keeps_arrival_order() {
		let response: EmbeddingResponse = serde_json::from_value(serde_json::json!({
			"data": [ { "embedding": [1.0] }, { "embedding": [2.0] } ]
		}))
		.expect("decode failed");
		assert_eq!(order_embeddings(response), vec![vec![1.0], vec![2.0]]);
	}
}
