use color_eyre::{Result, eyre};
use serde_json::Value;

use nvr_config::WebSearchProviderConfig;

#[derive(Debug, Clone, PartialEq)]
pub struct WebHit {
	pub title: String,
	pub url: String,
	pub content: String,
	pub score: Option<f32>,
	pub published_date: Option<String>,
}

pub async fn search(
	cfg: &WebSearchProviderConfig,
	query: &str,
	max_results: u32,
) -> Result<Vec<WebHit>> {
	let client = crate::client(cfg.timeout_ms)?;
	let url = crate::endpoint(&cfg.api_base, &cfg.path);
	let body = serde_json::json!({
		"query": query,
		"max_results": max_results,
		"topic": cfg.topic,
		"search_depth": "basic",
	});
	let res = client
		.post(url)
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;
	let mut hits = parse_web_response(&json)?;

	hits.truncate(max_results as usize);

	tracing::debug!(provider = %cfg.provider_id, hits = hits.len(), "Web search completed.");

	Ok(hits)
}

fn parse_web_response(json: &Value) -> Result<Vec<WebHit>> {
	let results = json
		.get("results")
		.or_else(|| json.get("data"))
		.and_then(|v| v.as_array())
		.ok_or_else(|| eyre::eyre!("Web search response is missing results array."))?;
	let mut hits = Vec::with_capacity(results.len());

	for item in results {
		let text = |key: &str| item.get(key).and_then(|v| v.as_str()).map(str::to_string);
		let Some(url) = text("url").or_else(|| text("link")) else {
			continue;
		};
		let content = text("content").or_else(|| text("snippet")).unwrap_or_default();

		if content.trim().is_empty() {
			continue;
		}

		hits.push(WebHit {
			title: text("title").unwrap_or_default(),
			url,
			content,
			score: item.get("score").and_then(|v| v.as_f64()).map(|v| v as f32),
			published_date: text("published_date"),
		});
	}

	Ok(hits)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_results_and_skips_empty_hits() {
		let json = serde_json::json!({
			"results": [
				{
					"title": "NVIDIA beats estimates",
					"url": "https://news.example/nvda",
					"content": "Data center revenue grew.",
					"score": 0.91
				},
				{ "title": "No body", "url": "https://news.example/empty", "content": "" },
				{ "title": "No url", "content": "orphan" }
			]
		});
		let hits = parse_web_response(&json).expect("parse failed");
		assert_eq!(hits.len(), 1);
		assert_eq!(hits[0].url, "https://news.example/nvda");
		assert_eq!(hits[0].score, Some(0.91));
	}

	#[test]
	fn accepts_link_and_snippet_aliases() {
		let json = serde_json::json!({
			"data": [ { "title": "T", "link": "https://x.example", "snippet": "S" } ]
		});
		let hits = parse_web_response(&json).expect("parse failed");
		assert_eq!(hits[0].url, "https://x.example");
		assert_eq!(hits[0].content, "S");
		assert_eq!(hits[0].score, None);
	}
}
