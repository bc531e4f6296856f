use crate::{
	deadline::Deadline, model::ChatModel, prompts, state::ResearchState, usage::UsageMeter,
};

/// Summarizes the evidence log into `state.output`. Leaves it empty when the model fails.
pub async fn finalize(
	chat: &dyn ChatModel,
	state: &mut ResearchState,
	usage: &UsageMeter,
	deadline: &Deadline,
	max_evidence_chars: usize,
) {
	let request = prompts::finalizer_request(state, max_evidence_chars);

	match deadline.guard("finalizing", chat.generate(&request)).await {
		Ok(reply) => {
			usage.record(reply.usage);

			let answer = reply.text.trim();

			if answer.is_empty() {
				tracing::warn!("Finalizer returned an empty answer.");
			} else {
				state.output = Some(answer.to_string());
			}
		},
		Err(err) => tracing::error!(error = %err, "Finalizer call failed."),
	}
}
