use std::{
	ops::AddAssign,
	sync::{Mutex, MutexGuard},
};

use serde::Serialize;

use nvr_providers::chat::TokenUsage;

/// Language-model token usage summed over one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Usage {
	pub input_tokens: u64,
	pub output_tokens: u64,
	pub total_tokens: u64,
	/// Model calls that returned a reply, including those without usage numbers.
	pub model_calls: u32,
}
impl Usage {
	pub fn new(input_tokens: u64, output_tokens: u64) -> Self {
		Self {
			input_tokens,
			output_tokens,
			total_tokens: input_tokens + output_tokens,
			model_calls: 1,
		}
	}
}
impl From<TokenUsage> for Usage {
	fn from(usage: TokenUsage) -> Self {
		Self {
			input_tokens: usage.prompt_tokens,
			output_tokens: usage.completion_tokens,
			total_tokens: usage.total_tokens,
			model_calls: 1,
		}
	}
}
impl AddAssign for Usage {
	fn add_assign(&mut self, rhs: Self) {
		self.input_tokens += rhs.input_tokens;
		self.output_tokens += rhs.output_tokens;
		self.total_tokens += rhs.total_tokens;
		self.model_calls += rhs.model_calls;
	}
}

/// Per-run accumulator shared by every node that calls the model.
#[derive(Debug, Default)]
pub struct UsageMeter(Mutex<Usage>);
impl UsageMeter {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn record(&self, usage: Usage) {
		*self.lock() += usage;
	}

	pub fn total(&self) -> Usage {
		*self.lock()
	}

	fn lock(&self) -> MutexGuard<'_, Usage> {
		self.0.lock().unwrap_or_else(|err| err.into_inner())
	}
}
