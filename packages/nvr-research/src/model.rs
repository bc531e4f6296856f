use serde_json::Value;

use nvr_config::LlmProviderConfig;
use nvr_providers::chat::{self, ResponseFormat};

use crate::{BoxFuture, usage::Usage};

/// Why a node is calling the language model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Purpose {
	Route,
	Finalize,
	DraftSql,
}

#[derive(Debug, Clone)]
pub struct ChatRequest {
	pub purpose: Purpose,
	pub messages: Vec<Value>,
	pub format: ResponseFormat,
}
impl ChatRequest {
	pub fn new(purpose: Purpose, format: ResponseFormat) -> Self {
		Self { purpose, messages: Vec::new(), format }
	}

	pub fn message(mut self, role: &str, content: impl Into<String>) -> Self {
		self.messages.push(serde_json::json!({ "role": role, "content": content.into() }));

		self
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatReply {
	pub text: String,
	pub usage: Usage,
}
impl ChatReply {
	/// A reply whose provider reported no token counts.
	pub fn text(text: impl Into<String>) -> Self {
		Self { text: text.into(), usage: Usage { model_calls: 1, ..Default::default() } }
	}
}

pub trait ChatModel
where
	Self: Send + Sync,
{
	fn generate<'a>(
		&'a self,
		request: &'a ChatRequest,
	) -> BoxFuture<'a, color_eyre::Result<ChatReply>>;

	/// Model identifier shown in run reports.
	fn model(&self) -> Option<&str> {
		None
	}
}

/// Chat-completions backed model.
pub struct OpenAiChat {
	cfg: LlmProviderConfig,
}
impl OpenAiChat {
	pub fn new(cfg: LlmProviderConfig) -> Self {
		Self { cfg }
	}
}
impl ChatModel for OpenAiChat {
	fn generate<'a>(
		&'a self,
		request: &'a ChatRequest,
	) -> BoxFuture<'a, color_eyre::Result<ChatReply>> {
		Box::pin(async move {
			let completion = chat::complete(&self.cfg, &request.messages, request.format).await?;
			let usage = completion.usage.map(Usage::from);

			Ok(ChatReply {
				text: completion.text,
				usage: usage.unwrap_or(Usage { model_calls: 1, ..Default::default() }),
			})
		})
	}

	fn model(&self) -> Option<&str> {
		Some(&self.cfg.model)
	}
}
