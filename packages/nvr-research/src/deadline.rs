use std::{future::Future, time::Duration};

use color_eyre::{Result, eyre};
use tokio::time::{self, Instant};

/// Wall-clock budget shared by every node of one run.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
	at: Instant,
}
impl Deadline {
	pub fn after(budget: Duration) -> Self {
		Self { at: Instant::now() + budget }
	}

	pub fn is_expired(&self) -> bool {
		Instant::now() >= self.at
	}

	pub fn remaining(&self) -> Duration {
		self.at.saturating_duration_since(Instant::now())
	}

	/// Runs `fut` unless the deadline has already passed, cancelling it when time runs out.
	pub async fn guard<T, F>(&self, what: &str, fut: F) -> Result<T>
	where
		F: Future<Output = Result<T>>,
	{
		if self.is_expired() {
			return Err(eyre::eyre!("Deadline exceeded before {what}."));
		}

		match time::timeout_at(self.at, fut).await {
			Ok(result) => result,
			Err(_) => Err(eyre::eyre!("Deadline exceeded during {what}.")),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn passes_through_fast_results() {
		let deadline = Deadline::after(Duration::from_secs(5));
		let value = deadline.guard("noop", async { Ok(7) }).await.expect("guard failed");
		assert_eq!(value, 7);
		assert!(!deadline.is_expired());
	}

	#[tokio::test]
	async fn cancels_slow_futures() {
		let deadline = Deadline::after(Duration::from_millis(20));
		let err = deadline
			.guard("sleep", async {
				time::sleep(Duration::from_secs(5)).await;

				Ok(())
			})
			.await
			.expect_err("slow future should time out");
		assert!(err.to_string().contains("Deadline exceeded during sleep."));
	}

	#[tokio::test]
	async fn refuses_to_start_after_expiry() {
		let deadline = Deadline::after(Duration::ZERO);
		let err = deadline.guard("call", async { Ok(()) }).await.expect_err("should refuse");
		assert!(err.to_string().contains("before call"));
		assert_eq!(deadline.remaining(), Duration::ZERO);
	}
}
