use color_eyre::{Result, eyre};
use serde::Deserialize;
use serde_json::Value;

use nvr_config::LlmProviderConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
	Text,
	/// Asks the provider to constrain the reply to a JSON object.
	JsonObject,
}

/// Token counts from the response's `usage` object.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct TokenUsage {
	#[serde(default)]
	pub prompt_tokens: u64,
	#[serde(default)]
	pub completion_tokens: u64,
	#[serde(default)]
	pub total_tokens: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
	pub text: String,
	/// Absent when the provider does not report usage.
	pub usage: Option<TokenUsage>,
}

/// Sends one chat-completions request and returns the first choice's text with its usage.
pub async fn complete(
	cfg: &LlmProviderConfig,
	messages: &[Value],
	format: ResponseFormat,
) -> Result<Completion> {
	let client = crate::client(cfg.timeout_ms)?;
	let url = crate::endpoint(&cfg.api_base, &cfg.path);
	let mut body = serde_json::json!({
		"model": cfg.model,
		"temperature": cfg.temperature,
		"messages": messages,
	});

	if format == ResponseFormat::JsonObject {
		body["response_format"] = serde_json::json!({ "type": "json_object" });
	}

	let res = client
		.post(&url)
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;
	let text = parse_chat_content(&json)?;
	let usage = parse_usage(&json);

	if let Some(usage) = usage {
		tracing::debug!(
			provider = %cfg.provider_id,
			prompt_tokens = usage.prompt_tokens,
			completion_tokens = usage.completion_tokens,
			"Chat completion usage."
		);
	}

	Ok(Completion { text, usage })
}

fn parse_usage(json: &Value) -> Option<TokenUsage> {
	let mut usage = TokenUsage::deserialize(json.get("usage")?).ok()?;

	if usage.total_tokens == 0 {
		usage.total_tokens = usage.prompt_tokens + usage.completion_tokens;
	}

	Some(usage)
}

fn parse_chat_content(json: &Value) -> Result<String> {
	let content = json
		.get("choices")
		.and_then(|v| v.as_array())
		.and_then(|arr| arr.first())
		.and_then(|choice| choice.get("message"))
		.and_then(|msg| msg.get("content"))
		.ok_or_else(|| eyre::eyre!("Chat response is missing choices[0].message.content."))?;

	match content {
		Value::String(text) => Ok(text.clone()),
		// Some providers return content as a list of typed parts.
		Value::Array(parts) => Ok(parts
			.iter()
			.filter_map(|part| part.get("text").and_then(|t| t.as_str()))
			.collect::<Vec<_>>()
			.join("")),
		Value::Null => Err(eyre::eyre!("Chat response content is null.")),
		_ => Err(eyre::eyre!("Chat response content has an unexpected type.")),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_string_content() {
		let json = serde_json::json!({
			"choices": [
				{ "message": { "role": "assistant", "content": "{\"action\": \"finish\"}" } }
			]
		});
		let text = parse_chat_content(&json).expect("parse failed");
		assert_eq!(text, "{\"action\": \"finish\"}");
	}

	#[test]
	fn joins_content_parts() {
		let json = serde_json::json!({
			"choices": [
				{ "message": { "content": [
					{ "type": "text", "text": "Revenue rose " },
					{ "type": "text", "text": "sharply." }
				] } }
			]
		});
		assert_eq!(parse_chat_content(&json).expect("parse failed"), "Revenue rose sharply.");
	}

	#[test]
	fn reads_usage_and_fills_missing_total() {
		let json = serde_json::json!({
			"choices": [ { "message": { "content": "ok" } } ],
			"usage": { "prompt_tokens": 812, "completion_tokens": 64 }
		});
		assert_eq!(
			parse_usage(&json),
			Some(TokenUsage { prompt_tokens: 812, completion_tokens: 64, total_tokens: 876 })
		);
		assert_eq!(parse_usage(&serde_json::json!({ "choices": [] })), None);
	}

	#[test]
	fn rejects_missing_choices() {
		let json = serde_json::json!({ "error": { "message": "rate limited" } });
		assert!(parse_chat_content(&json).is_err());
	}
}
