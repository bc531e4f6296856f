//! Scripted language models and in-memory retrieval backends for driving the research graph
//! without network access.

use std::{
	collections::VecDeque,
	sync::{Arc, Mutex, MutexGuard},
	time::Duration,
};

use color_eyre::eyre;
use tokio::time;

use nvr_research::{
	BoxFuture, ChatModel, ChatReply, ChatRequest, EvidenceRecord, Limits, PeriodFilters,
	Provenance, Purpose, Retrievers, SearchBackend, Tool, Usage, UsageMeter,
};

pub const FINISH: &str = r#"{"action": "finish"}"#;

/// Builds a router reply that selects `tool` with `query`.
pub fn route_to(tool: Tool, query: &str) -> String {
	format!(r#"{{"action": "{}", "query": "{}"}}"#, tool.as_str(), query)
}

pub fn limits(max_steps: u32, deadline: Duration) -> Limits {
	Limits {
		max_steps,
		deadline,
		finalize_grace: Duration::from_secs(2),
		max_evidence_chars: 2_000,
	}
}

pub fn record(tool: Tool, text: &str) -> EvidenceRecord {
	EvidenceRecord { tool, text: text.to_string(), provenance: Provenance::default() }
}

/// Language model that replays scripted router replies.
///
/// Router replies are consumed in order. Once the script runs out the model answers with the
/// repeating reply when one is set, otherwise with [`FINISH`].
pub struct ScriptedChat {
	routes: Mutex<VecDeque<String>>,
	repeat_route: Option<String>,
	route_error: Option<String>,
	route_delay: Option<Duration>,
	answer: Result<String, String>,
	sql: String,
	usage: Option<Usage>,
	model: Option<String>,
	requests: Mutex<Vec<ChatRequest>>,
}
impl ScriptedChat {
	pub fn new(answer: impl Into<String>) -> Self {
		Self {
			routes: Mutex::new(VecDeque::new()),
			repeat_route: None,
			route_error: None,
			route_delay: None,
			answer: Ok(answer.into()),
			sql: "SELECT 1".to_string(),
			usage: None,
			model: None,
			requests: Mutex::new(Vec::new()),
		}
	}

	pub fn routes<I, S>(self, replies: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		lock(&self.routes).extend(replies.into_iter().map(Into::into));

		self
	}

	pub fn repeat_route(mut self, reply: impl Into<String>) -> Self {
		self.repeat_route = Some(reply.into());

		self
	}

	pub fn failing_router(mut self, message: impl Into<String>) -> Self {
		self.route_error = Some(message.into());

		self
	}

	pub fn slow_router(mut self, delay: Duration) -> Self {
		self.route_delay = Some(delay);

		self
	}

	pub fn failing_finalizer(mut self, message: impl Into<String>) -> Self {
		self.answer = Err(message.into());

		self
	}

	pub fn sql(mut self, reply: impl Into<String>) -> Self {
		self.sql = reply.into();

		self
	}

	/// Reports the same token counts on every successful reply.
	pub fn usage_per_call(mut self, input_tokens: u64, output_tokens: u64) -> Self {
		self.usage = Some(Usage::new(input_tokens, output_tokens));

		self
	}

	pub fn named(mut self, model: impl Into<String>) -> Self {
		self.model = Some(model.into());

		self
	}

	pub fn calls(&self, purpose: Purpose) -> usize {
		lock(&self.requests).iter().filter(|request| request.purpose == purpose).count()
	}

	pub fn requests(&self, purpose: Purpose) -> Vec<ChatRequest> {
		lock(&self.requests).iter().filter(|request| request.purpose == purpose).cloned().collect()
	}

	fn reply(&self, purpose: Purpose) -> (Option<Duration>, color_eyre::Result<String>) {
		match purpose {
			Purpose::Route => {
				if let Some(message) = &self.route_error {
					return (self.route_delay, Err(eyre::eyre!("{message}")));
				}

				let next = lock(&self.routes).pop_front();
				let reply = next
					.or_else(|| self.repeat_route.clone())
					.unwrap_or_else(|| FINISH.to_string());

				(self.route_delay, Ok(reply))
			},
			Purpose::Finalize => match &self.answer {
				Ok(answer) => (None, Ok(answer.clone())),
				Err(message) => (None, Err(eyre::eyre!("{message}"))),
			},
			Purpose::DraftSql => (None, Ok(self.sql.clone())),
		}
	}
}
impl ChatModel for ScriptedChat {
	fn generate<'a>(
		&'a self,
		request: &'a ChatRequest,
	) -> BoxFuture<'a, color_eyre::Result<ChatReply>> {
		lock(&self.requests).push(request.clone());

		let (delay, reply) = self.reply(request.purpose);
		let reply = reply.map(|text| match self.usage {
			Some(usage) => ChatReply { text, usage },
			None => ChatReply::text(text),
		});

		Box::pin(async move {
			if let Some(delay) = delay {
				time::sleep(delay).await;
			}

			reply
		})
	}

	fn model(&self) -> Option<&str> {
		self.model.as_deref()
	}
}

/// Backend that returns fixed records and remembers what it was asked.
pub struct StaticBackend {
	records: Vec<EvidenceRecord>,
	seen: Mutex<Vec<(String, PeriodFilters)>>,
}
impl StaticBackend {
	pub fn new(records: Vec<EvidenceRecord>) -> Self {
		Self { records, seen: Mutex::new(Vec::new()) }
	}

	pub fn with_texts(tool: Tool, texts: &[&str]) -> Self {
		Self::new(texts.iter().map(|text| record(tool, text)).collect())
	}

	pub fn empty() -> Self {
		Self::new(Vec::new())
	}

	pub fn calls(&self) -> usize {
		lock(&self.seen).len()
	}

	pub fn queries(&self) -> Vec<String> {
		lock(&self.seen).iter().map(|(query, _)| query.clone()).collect()
	}

	pub fn filters(&self) -> Vec<PeriodFilters> {
		lock(&self.seen).iter().map(|(_, filters)| filters.clone()).collect()
	}
}
impl SearchBackend for StaticBackend {
	fn search<'a>(
		&'a self,
		query: &'a str,
		filters: &'a PeriodFilters,
		_usage: &'a UsageMeter,
	) -> BoxFuture<'a, color_eyre::Result<Vec<EvidenceRecord>>> {
		lock(&self.seen).push((query.to_string(), filters.clone()));

		let records = self.records.clone();

		Box::pin(async move { Ok(records) })
	}
}

pub struct FailingBackend {
	message: String,
}
impl FailingBackend {
	pub fn new(message: impl Into<String>) -> Self {
		Self { message: message.into() }
	}
}
impl SearchBackend for FailingBackend {
	fn search<'a>(
		&'a self,
		_query: &'a str,
		_filters: &'a PeriodFilters,
		_usage: &'a UsageMeter,
	) -> BoxFuture<'a, color_eyre::Result<Vec<EvidenceRecord>>> {
		Box::pin(async move { Err(eyre::eyre!("{}", self.message)) })
	}
}

/// Backend that sleeps before answering, for exercising deadlines.
pub struct SlowBackend {
	delay: Duration,
	records: Vec<EvidenceRecord>,
}
impl SlowBackend {
	pub fn new(delay: Duration, records: Vec<EvidenceRecord>) -> Self {
		Self { delay, records }
	}
}
impl SearchBackend for SlowBackend {
	fn search<'a>(
		&'a self,
		_query: &'a str,
		_filters: &'a PeriodFilters,
		_usage: &'a UsageMeter,
	) -> BoxFuture<'a, color_eyre::Result<Vec<EvidenceRecord>>> {
		Box::pin(async move {
			time::sleep(self.delay).await;

			Ok(self.records.clone())
		})
	}
}

/// Retrievers where every slot returns one canned record named after its tool.
pub fn canned_retrievers() -> Retrievers {
	Retrievers::new(
		Arc::new(StaticBackend::with_texts(Tool::VectorSearch, &["Data center revenue rose."])),
		Arc::new(StaticBackend::with_texts(Tool::WebSearch, &["Analysts raised targets."])),
		Arc::new(StaticBackend::with_texts(Tool::StructuredSearch, &["DATE=2024-05-22, CLOSE=949.50"])),
	)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
	mutex.lock().unwrap_or_else(|err| err.into_inner())
}
